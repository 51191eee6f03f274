use actix_web::{web, HttpResponse};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;

use crate::db::money;
use crate::error::ApiError;
use crate::farming;
use crate::periods;
use crate::profiles;

#[derive(Debug, sqlx::FromRow)]
struct TaskCompletionRow {
    id: i64,
    user_id: i64,
    task_type: String,
    task_id: String,
    reward_amount: Decimal,
    completed_at: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct ReferralRow {
    id: i64,
    referrer_id: i64,
    referred_id: i64,
    created_at: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsRequest {
    pub user_id: String,
}

/// Composite read view for the client: profile with fresh accrual, task
/// history, referral list, and the reset countdowns. No mutation.
pub async fn get_user_stats(
    body: web::Json<StatsRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, ApiError> {
    let telegram_id = profiles::parse_user_id(&body.user_id)?;

    let profile = profiles::by_telegram_id(pool.get_ref(), telegram_id)
        .await?
        .ok_or(ApiError::ProfileNotFound)?;

    let completions = sqlx::query_as::<_, TaskCompletionRow>(
        "SELECT * FROM farm_task_completions WHERE user_id = $1 ORDER BY completed_at",
    )
    .bind(profile.id)
    .fetch_all(pool.get_ref())
    .await?;

    let referrals = sqlx::query_as::<_, ReferralRow>(
        "SELECT * FROM farm_referrals WHERE referrer_id = $1 ORDER BY created_at",
    )
    .bind(profile.id)
    .fetch_all(pool.get_ref())
    .await?;

    let now = periods::now();
    let cap = farming::cap_hours();
    let rate = money(profile.farming_rate);
    let reference = profile.last_collect.unwrap_or(profile.created_at);

    // The cached column may be stale; the view always recomputes
    let ready_to_collect =
        farming::accrued_amount(now, profile.last_collect, profile.created_at, rate, cap);

    let today = periods::date_string(now);
    let has_checked_in_today = profile.last_check_in.as_deref() == Some(today.as_str());

    let mut profile_view = profiles::profile_json(&profile);
    profile_view["readyToCollect"] = json!(ready_to_collect);

    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "profile": profile_view,
        "taskCompletions": completions
            .iter()
            .map(|c| json!({
                "id": c.id,
                "user_id": c.user_id,
                "task_type": c.task_type,
                "task_id": c.task_id,
                "reward_amount": money(c.reward_amount),
                "completed_at": c.completed_at,
            }))
            .collect::<Vec<_>>(),
        "referrals": referrals
            .iter()
            .map(|r| json!({
                "id": r.id,
                "referrer_id": r.referrer_id,
                "referred_id": r.referred_id,
                "created_at": r.created_at,
            }))
            .collect::<Vec<_>>(),
        "timers": {
            "hasCheckedInToday": has_checked_in_today,
            "timeUntilReset": periods::until_daily_reset(now),
            "timeUntilWeeklyReset": periods::until_weekly_reset(now),
        },
        "farming": {
            "readyToCollect": ready_to_collect,
            "maxAccumulation": cap * rate,
            "farmingRate": rate,
            "lastCollect": periods::rfc3339(reference),
        },
    })))
}
