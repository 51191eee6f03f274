use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use sqlx::{PgPool, Row};

use crate::db::money;
use crate::error::ApiError;
use crate::periods;
use crate::profiles;

/// One-time joining bonus, credited to both parties.
pub const REFERRAL_BONUS: f64 = 5.0;

/// Share of every collection by a referred user, paid to the referrer.
pub const COMMISSION_RATE: f64 = 0.10;

/// A referral code is the referrer's Telegram id as a decimal string.
pub fn parse_referral_code(code: &str) -> Option<i64> {
    code.trim().parse::<i64>().ok()
}

pub fn commission_for(collected_amount: f64) -> f64 {
    collected_amount * COMMISSION_RATE
}

pub struct ReferralOutcome {
    pub bonus: f64,
    pub new_user_balance: f64,
    pub referrer_name: String,
}

/// Record a referrer→referred edge and pay the joining bonus to both sides.
/// A user can be referred at most once, ever; the unique constraint on
/// `referred_id` backs that under concurrent submissions.
pub async fn apply_referral_code(
    pool: &PgPool,
    submitter_telegram_id: i64,
    code: &str,
) -> Result<ReferralOutcome, ApiError> {
    let referrer_telegram_id =
        parse_referral_code(code).ok_or(ApiError::InvalidReferralCode)?;

    if referrer_telegram_id == submitter_telegram_id {
        return Err(ApiError::SelfReferral);
    }

    let submitter = profiles::by_telegram_id(pool, submitter_telegram_id)
        .await?
        .ok_or(ApiError::ProfileNotFound)?;

    let referrer = profiles::by_telegram_id(pool, referrer_telegram_id)
        .await?
        .ok_or(ApiError::ReferrerNotFound)?;

    let now = periods::now();

    let inserted = sqlx::query(
        "INSERT INTO farm_referrals (referrer_id, referred_id, created_at)
         VALUES ($1, $2, $3)
         ON CONFLICT (referred_id) DO NOTHING",
    )
    .bind(referrer.id)
    .bind(submitter.id)
    .bind(now)
    .execute(pool)
    .await?;

    if inserted.rows_affected() == 0 {
        return Err(ApiError::AlreadyReferred);
    }

    let row = sqlx::query(
        "UPDATE farm_profiles
         SET tonix_balance = tonix_balance + $1,
             today_earnings = today_earnings + $1,
             updated_at = $2
         WHERE id = $3
         RETURNING tonix_balance",
    )
    .bind(REFERRAL_BONUS)
    .bind(now)
    .bind(submitter.id)
    .fetch_one(pool)
    .await?;

    sqlx::query(
        "UPDATE farm_profiles
         SET tonix_balance = tonix_balance + $1,
             today_earnings = today_earnings + $1,
             updated_at = $2
         WHERE id = $3",
    )
    .bind(REFERRAL_BONUS)
    .bind(now)
    .bind(referrer.id)
    .execute(pool)
    .await?;

    log::info!(
        "🤝 Referral recorded: {} invited {}, both awarded {} TONIX",
        referrer_telegram_id,
        submitter_telegram_id,
        REFERRAL_BONUS
    );

    Ok(ReferralOutcome {
        bonus: REFERRAL_BONUS,
        new_user_balance: money(row.get(0)),
        referrer_name: referrer.first_name.unwrap_or_else(|| "User".to_string()),
    })
}

pub enum CommissionOutcome {
    NotReferred,
    Paid { referrer_id: i64, amount: f64 },
}

/// Pay the referrer their cut of a collection. Commission goes to the
/// durable balance only, never `today_earnings`. Runs on every collection
/// for the lifetime of the referral edge.
pub async fn pay_commission(
    pool: &PgPool,
    referred_profile_id: i64,
    collected_amount: f64,
) -> Result<CommissionOutcome, sqlx::Error> {
    let referrer_id: Option<i64> =
        sqlx::query_scalar("SELECT referrer_id FROM farm_referrals WHERE referred_id = $1")
            .bind(referred_profile_id)
            .fetch_optional(pool)
            .await?;

    let referrer_id = match referrer_id {
        Some(id) => id,
        None => return Ok(CommissionOutcome::NotReferred),
    };

    let amount = commission_for(collected_amount);

    let updated = sqlx::query(
        "UPDATE farm_profiles
         SET tonix_balance = tonix_balance + $1, updated_at = $2
         WHERE id = $3",
    )
    .bind(amount)
    .bind(periods::now())
    .bind(referrer_id)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }

    Ok(CommissionOutcome::Paid { referrer_id, amount })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReferralRequest {
    pub user_id: String,
    pub referral_code: String,
}

pub async fn submit_referral(
    body: web::Json<SubmitReferralRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, ApiError> {
    let telegram_id = profiles::parse_user_id(&body.user_id)?;

    let outcome = apply_referral_code(pool.get_ref(), telegram_id, &body.referral_code).await?;

    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "bonusAmount": outcome.bonus,
        "newUserBalance": outcome.new_user_balance,
        "referrerName": outcome.referrer_name,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionRequest {
    pub user_id: i64,
    pub collected_amount: f64,
}

pub async fn pay_commission_endpoint(
    body: web::Json<CommissionRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, ApiError> {
    match pay_commission(pool.get_ref(), body.user_id, body.collected_amount).await? {
        CommissionOutcome::NotReferred => Ok(HttpResponse::Ok().json(json!({
            "ok": true,
            "message": "No referral found",
        }))),
        CommissionOutcome::Paid { referrer_id, amount } => Ok(HttpResponse::Ok().json(json!({
            "ok": true,
            "commissionAmount": amount,
            "referrerId": referrer_id,
        }))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referral_codes_are_numeric_telegram_ids() {
        assert_eq!(parse_referral_code("5274439601"), Some(5_274_439_601));
        assert_eq!(parse_referral_code("  42 "), Some(42));
        assert_eq!(parse_referral_code("not-a-code"), None);
        assert_eq!(parse_referral_code("12.5"), None);
        assert_eq!(parse_referral_code(""), None);
    }

    #[test]
    fn commission_is_ten_percent_of_collection() {
        assert_eq!(commission_for(10.0), 1.0);
        assert_eq!(commission_for(0.0), 0.0);
        assert!((commission_for(3.33) - 0.333).abs() < 1e-12);
    }
}
