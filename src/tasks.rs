use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use sqlx::{PgPool, Row};

use crate::db::money;
use crate::error::ApiError;
use crate::periods;
use crate::profiles;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Special,
    Daily,
    Weekly,
    Other,
}

impl TaskKind {
    pub fn parse(raw: &str) -> TaskKind {
        match raw {
            "special" => TaskKind::Special,
            "daily" => TaskKind::Daily,
            "weekly" => TaskKind::Weekly,
            _ => TaskKind::Other,
        }
    }
}

/// Window a prior completion must fall in to block this claim.
/// `Ever` blocks on any prior row, `Since` only on rows at or after the
/// boundary, `Always` never blocks (open-ended task types).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Ever,
    Since(i64),
    Always,
}

pub fn eligibility_window(kind: TaskKind, now: i64) -> Eligibility {
    match kind {
        TaskKind::Special => Eligibility::Ever,
        TaskKind::Daily => Eligibility::Since(periods::day_start(now)),
        TaskKind::Weekly => Eligibility::Since(periods::week_start(now)),
        TaskKind::Other => Eligibility::Always,
    }
}

fn already_completed_error(kind: TaskKind) -> ApiError {
    match kind {
        TaskKind::Daily => ApiError::TaskAlreadyCompletedToday,
        TaskKind::Weekly => ApiError::TaskAlreadyCompletedThisWeek,
        _ => ApiError::TaskAlreadyCompleted,
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTaskRequest {
    pub user_id: String,
    pub task_type: String,
    pub task_id: String,
    pub reward_amount: f64,
}

pub async fn complete_task(
    body: web::Json<CompleteTaskRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, ApiError> {
    let telegram_id = profiles::parse_user_id(&body.user_id)?;

    let profile = profiles::by_telegram_id(pool.get_ref(), telegram_id)
        .await?
        .ok_or(ApiError::ProfileNotFound)?;

    let now = periods::now();
    let kind = TaskKind::parse(&body.task_type);

    let blocked = match eligibility_window(kind, now) {
        Eligibility::Ever => {
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(
                     SELECT 1 FROM farm_task_completions
                     WHERE user_id = $1 AND task_type = $2 AND task_id = $3
                 )",
            )
            .bind(profile.id)
            .bind(&body.task_type)
            .bind(&body.task_id)
            .fetch_one(pool.get_ref())
            .await?
        }
        Eligibility::Since(boundary) => {
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(
                     SELECT 1 FROM farm_task_completions
                     WHERE user_id = $1 AND task_type = $2 AND task_id = $3
                       AND completed_at >= $4
                 )",
            )
            .bind(profile.id)
            .bind(&body.task_type)
            .bind(&body.task_id)
            .bind(boundary)
            .fetch_one(pool.get_ref())
            .await?
        }
        Eligibility::Always => {
            log::debug!("Task type {} has no completion window", body.task_type);
            false
        }
    };

    if blocked {
        return Err(already_completed_error(kind));
    }

    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO farm_task_completions (user_id, task_type, task_id, reward_amount, completed_at)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(profile.id)
    .bind(&body.task_type)
    .bind(&body.task_id)
    .bind(body.reward_amount)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let row = sqlx::query(
        "UPDATE farm_profiles
         SET tonix_balance = tonix_balance + $1,
             today_earnings = today_earnings + $1,
             updated_at = $2
         WHERE id = $3
         RETURNING tonix_balance, today_earnings",
    )
    .bind(body.reward_amount)
    .bind(now)
    .bind(profile.id)
    .fetch_one(&mut *tx)
    .await?;

    let new_balance = money(row.get(0));
    let new_today_earnings = money(row.get(1));

    tx.commit().await?;

    log::info!(
        "🏆 Task {}/{} completed by user {}, reward {:.6}",
        body.task_type,
        body.task_id,
        telegram_id,
        body.reward_amount
    );

    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "rewardAmount": body.reward_amount,
        "newBalance": new_balance,
        "newTodayEarnings": new_today_earnings,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Monday 2024-01-01 00:00:00 UTC+4
    const MONDAY_MIDNIGHT: i64 = 1_704_052_800;

    #[test]
    fn task_kinds_parse_from_wire_strings() {
        assert_eq!(TaskKind::parse("special"), TaskKind::Special);
        assert_eq!(TaskKind::parse("daily"), TaskKind::Daily);
        assert_eq!(TaskKind::parse("weekly"), TaskKind::Weekly);
        assert_eq!(TaskKind::parse("promo"), TaskKind::Other);
    }

    #[test]
    fn special_tasks_block_on_any_prior_completion() {
        assert_eq!(
            eligibility_window(TaskKind::Special, MONDAY_MIDNIGHT),
            Eligibility::Ever
        );
    }

    #[test]
    fn daily_window_opens_at_reset_zone_midnight() {
        let midday = MONDAY_MIDNIGHT + 12 * 3600;
        assert_eq!(
            eligibility_window(TaskKind::Daily, midday),
            Eligibility::Since(MONDAY_MIDNIGHT)
        );
    }

    #[test]
    fn weekly_window_opens_at_monday_midnight() {
        let thursday = MONDAY_MIDNIGHT + 3 * periods::DAY_SECS + 5 * 3600;
        assert_eq!(
            eligibility_window(TaskKind::Weekly, thursday),
            Eligibility::Since(MONDAY_MIDNIGHT)
        );
    }

    #[test]
    fn open_ended_types_never_block() {
        assert_eq!(
            eligibility_window(TaskKind::Other, MONDAY_MIDNIGHT),
            Eligibility::Always
        );
    }

    #[test]
    fn period_errors_are_scoped() {
        assert!(matches!(
            already_completed_error(TaskKind::Daily),
            ApiError::TaskAlreadyCompletedToday
        ));
        assert!(matches!(
            already_completed_error(TaskKind::Weekly),
            ApiError::TaskAlreadyCompletedThisWeek
        ));
        assert!(matches!(
            already_completed_error(TaskKind::Special),
            ApiError::TaskAlreadyCompleted
        ));
    }
}
