use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use sqlx::{PgPool, Row};

use crate::db::money;
use crate::error::ApiError;
use crate::periods;
use crate::profiles;
use crate::referrals;

/// Longest stretch of unclaimed accrual that keeps earning, in hours.
pub const DEFAULT_CAP_HOURS: f64 = 48.0;

/// Collections below this are rejected as noise.
pub const COLLECT_EPSILON: f64 = 0.001;

pub fn cap_hours() -> f64 {
    std::env::var("FARM_CAP_HOURS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_CAP_HOURS)
}

/// Points buffered since the reference time: capped elapsed hours times the
/// hourly rate. The reference is the last collection, or account creation for
/// users who never collected.
pub fn accrued_amount(
    now: i64,
    last_collect: Option<i64>,
    created_at: i64,
    farming_rate: f64,
    cap_hours: f64,
) -> f64 {
    let reference = last_collect.unwrap_or(created_at);
    let elapsed_hours = (now - reference).max(0) as f64 / 3600.0;
    elapsed_hours.min(cap_hours) * farming_rate
}

pub fn collectible(amount: f64) -> bool {
    amount >= COLLECT_EPSILON
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmingRequest {
    pub user_id: String,
}

pub async fn accrue(
    body: web::Json<FarmingRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, ApiError> {
    let telegram_id = profiles::parse_user_id(&body.user_id)?;

    let profile = profiles::by_telegram_id(pool.get_ref(), telegram_id)
        .await?
        .ok_or(ApiError::ProfileNotFound)?;

    let now = periods::now();
    let cap = cap_hours();
    let rate = money(profile.farming_rate);
    let reference = profile.last_collect.unwrap_or(profile.created_at);
    let elapsed_hours = (now - reference).max(0) as f64 / 3600.0;
    let accrued = accrued_amount(now, profile.last_collect, profile.created_at, rate, cap);

    sqlx::query(
        "UPDATE farm_profiles
         SET ready_to_collect = $1, updated_at = $2
         WHERE telegram_id = $3",
    )
    .bind(accrued)
    .bind(now)
    .bind(telegram_id)
    .execute(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "readyToCollect": accrued,
        "maxAccumulation": cap * rate,
        "farmingRate": rate,
        "lastCollect": periods::rfc3339(reference),
        "timeSinceLastCollect": elapsed_hours,
    })))
}

pub async fn collect(
    body: web::Json<FarmingRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, ApiError> {
    let telegram_id = profiles::parse_user_id(&body.user_id)?;
    let now = periods::now();

    let mut tx = pool.begin().await?;

    // Lock the profile row so concurrent collects cannot double-spend
    let profile = sqlx::query_as::<_, profiles::Profile>(
        "SELECT * FROM farm_profiles WHERE telegram_id = $1 FOR UPDATE",
    )
    .bind(telegram_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(ApiError::ProfileNotFound)?;

    let rate = money(profile.farming_rate);
    let amount = accrued_amount(now, profile.last_collect, profile.created_at, rate, cap_hours());

    if !collectible(amount) {
        return Err(ApiError::NothingToCollect);
    }

    let row = sqlx::query(
        "UPDATE farm_profiles
         SET tonix_balance = tonix_balance + $1,
             today_earnings = today_earnings + $1,
             ready_to_collect = 0,
             last_collect = $2,
             updated_at = $2
         WHERE telegram_id = $3
         RETURNING tonix_balance, today_earnings",
    )
    .bind(amount)
    .bind(now)
    .bind(telegram_id)
    .fetch_one(&mut *tx)
    .await?;

    let new_balance = money(row.get(0));
    let new_today_earnings = money(row.get(1));

    tx.commit().await?;

    log::info!("🌱 Collected {:.6} TONIX for user {}", amount, telegram_id);

    // Commission is a side effect of collection: it runs detached and its
    // failure never reaches the collecting user.
    let commission_pool = pool.get_ref().clone();
    let referred_id = profile.id;
    tokio::spawn(async move {
        match referrals::pay_commission(&commission_pool, referred_id, amount).await {
            Ok(referrals::CommissionOutcome::Paid { referrer_id, amount }) => {
                log::info!("💸 Commission {:.6} paid to referrer {}", amount, referrer_id);
            }
            Ok(referrals::CommissionOutcome::NotReferred) => {}
            Err(e) => log::error!("❌ Commission processing failed: {}", e),
        }
    });

    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "collected": amount,
        "newBalance": new_balance,
        "newTodayEarnings": new_today_earnings,
    })))
}

/// Scheduler sweep: refresh every profile's cached `ready_to_collect` with a
/// single server-side expression, independent of client polling.
pub async fn sweep_ready_to_collect(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let now = periods::now();

    let result = sqlx::query(
        "UPDATE farm_profiles
         SET ready_to_collect =
                 LEAST(GREATEST($1 - COALESCE(last_collect, created_at), 0) / 3600.0, $2)
                 * farming_rate,
             updated_at = $1",
    )
    .bind(now)
    .bind(cap_hours())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: i64 = 3600;

    #[test]
    fn five_hours_at_unit_rate_accrues_five() {
        assert_eq!(accrued_amount(5 * HOUR, None, 0, 1.0, 48.0), 5.0);
    }

    #[test]
    fn accrual_is_capped() {
        assert_eq!(accrued_amount(100 * HOUR, None, 0, 1.0, 48.0), 48.0);
        assert_eq!(accrued_amount(100 * HOUR, None, 0, 2.5, 48.0), 120.0);
    }

    #[test]
    fn last_collect_takes_precedence_over_creation() {
        let created = 0;
        let collected = 10 * HOUR;
        let now = 12 * HOUR;
        assert_eq!(accrued_amount(now, Some(collected), created, 1.0, 48.0), 2.0);
    }

    #[test]
    fn never_collected_measures_from_creation() {
        let created = 4 * HOUR;
        let now = 7 * HOUR;
        assert_eq!(accrued_amount(now, None, created, 1.0, 48.0), 3.0);
    }

    #[test]
    fn clock_skew_never_goes_negative() {
        assert_eq!(accrued_amount(0, Some(10 * HOUR), 0, 1.0, 48.0), 0.0);
    }

    #[test]
    fn accrual_is_monotonic_between_collections() {
        let mut previous = 0.0;
        for h in 0..60 {
            let amount = accrued_amount(h * HOUR, None, 0, 1.5, 48.0);
            assert!(amount >= previous);
            previous = amount;
        }
    }

    #[test]
    fn epsilon_gates_collection() {
        assert!(collectible(0.001));
        assert!(collectible(5.0));
        assert!(!collectible(0.0009));
        assert!(!collectible(0.0));
    }
}
