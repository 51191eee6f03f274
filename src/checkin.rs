use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;

use crate::error::ApiError;
use crate::periods;
use crate::profiles;

/// Streak advance rule. `None` means the user already checked in today.
/// A check-in the day after the previous one extends the streak; any gap
/// (or a first-ever check-in) restarts it at 1.
pub fn next_streak(
    last_check_in: Option<&str>,
    today: &str,
    yesterday: &str,
    current_streak: i32,
) -> Option<i32> {
    match last_check_in {
        Some(date) if date == today => None,
        Some(date) if date == yesterday => Some(current_streak + 1),
        _ => Some(1),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinRequest {
    pub user_id: String,
}

pub async fn daily_checkin(
    body: web::Json<CheckinRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, ApiError> {
    let telegram_id = profiles::parse_user_id(&body.user_id)?;

    let profile = profiles::by_telegram_id(pool.get_ref(), telegram_id)
        .await?
        .ok_or(ApiError::ProfileNotFound)?;

    let now = periods::now();
    let today = periods::date_string(now);
    let yesterday = periods::yesterday_string(now);

    let new_streak = next_streak(
        profile.last_check_in.as_deref(),
        &today,
        &yesterday,
        profile.daily_streak,
    )
    .ok_or(ApiError::AlreadyCheckedIn)?;

    sqlx::query(
        "UPDATE farm_profiles
         SET daily_streak = $1, last_check_in = $2, updated_at = $3
         WHERE telegram_id = $4",
    )
    .bind(new_streak)
    .bind(&today)
    .bind(now)
    .bind(telegram_id)
    .execute(pool.get_ref())
    .await?;

    log::info!("📅 Check-in for user {}: streak {}", telegram_id, new_streak);

    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "newStreak": new_streak,
        "checkInDate": today,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_checkin_starts_at_one() {
        assert_eq!(next_streak(None, "2024-01-02", "2024-01-01", 0), Some(1));
    }

    #[test]
    fn consecutive_days_extend_the_streak() {
        assert_eq!(
            next_streak(Some("2024-01-01"), "2024-01-02", "2024-01-01", 1),
            Some(2)
        );
        assert_eq!(
            next_streak(Some("2024-01-02"), "2024-01-03", "2024-01-02", 2),
            Some(3)
        );
    }

    #[test]
    fn same_day_checkin_is_rejected() {
        assert_eq!(
            next_streak(Some("2024-01-02"), "2024-01-02", "2024-01-01", 5),
            None
        );
    }

    #[test]
    fn a_missed_day_resets_the_streak() {
        assert_eq!(
            next_streak(Some("2024-01-01"), "2024-01-05", "2024-01-04", 7),
            Some(1)
        );
    }

    #[test]
    fn three_consecutive_days_count_one_two_three() {
        let days = ["2024-01-01", "2024-01-02", "2024-01-03"];
        let mut last: Option<String> = None;
        let mut streak = 0;
        for (i, day) in days.iter().enumerate() {
            let yesterday = if i == 0 { "2023-12-31" } else { days[i - 1] };
            streak = next_streak(last.as_deref(), day, yesterday, streak).unwrap();
            assert_eq!(streak, i as i32 + 1);
            last = Some(day.to_string());
        }
    }
}
