use actix_web::{web, HttpResponse};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;

use crate::db::money;
use crate::error::ApiError;
use crate::periods;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Profile {
    pub id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub tonix_balance: Decimal,
    pub farming_rate: Decimal,
    pub ready_to_collect: Decimal,
    pub today_earnings: Decimal,
    pub last_collect: Option<i64>,
    pub last_check_in: Option<String>,
    pub daily_streak: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

/// External ids arrive as strings in request payloads.
pub fn parse_user_id(raw: &str) -> Result<i64, ApiError> {
    raw.trim().parse::<i64>().map_err(|_| ApiError::ProfileNotFound)
}

pub async fn by_telegram_id(pool: &PgPool, telegram_id: i64) -> Result<Option<Profile>, sqlx::Error> {
    sqlx::query_as::<_, Profile>("SELECT * FROM farm_profiles WHERE telegram_id = $1")
        .bind(telegram_id)
        .fetch_optional(pool)
        .await
}

/// Find-or-create upsert keyed on the Telegram id. Display fields are
/// refreshed on every contact; everything else keeps its stored value.
pub async fn ensure_profile(
    pool: &PgPool,
    telegram_id: i64,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
) -> Result<Profile, sqlx::Error> {
    let now = periods::now();

    sqlx::query_as::<_, Profile>(
        "INSERT INTO farm_profiles (telegram_id, username, first_name, last_name, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $5)
         ON CONFLICT (telegram_id) DO UPDATE
         SET username = COALESCE(EXCLUDED.username, farm_profiles.username),
             first_name = COALESCE(EXCLUDED.first_name, farm_profiles.first_name),
             last_name = COALESCE(EXCLUDED.last_name, farm_profiles.last_name),
             updated_at = EXCLUDED.updated_at
         RETURNING *",
    )
    .bind(telegram_id)
    .bind(&username)
    .bind(&first_name)
    .bind(&last_name)
    .bind(now)
    .fetch_one(pool)
    .await
}

pub fn profile_json(p: &Profile) -> serde_json::Value {
    json!({
        "id": p.id,
        "telegram_id": p.telegram_id,
        "username": p.username,
        "first_name": p.first_name,
        "last_name": p.last_name,
        "tonix_balance": money(p.tonix_balance),
        "farming_rate": money(p.farming_rate),
        "ready_to_collect": money(p.ready_to_collect),
        "today_earnings": money(p.today_earnings),
        "last_collect": p.last_collect,
        "last_check_in": p.last_check_in,
        "daily_streak": p.daily_streak,
        "created_at": p.created_at,
        "updated_at": p.updated_at,
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsureProfileRequest {
    pub user_id: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

pub async fn ensure_profile_handler(
    body: web::Json<EnsureProfileRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, ApiError> {
    let telegram_id = parse_user_id(&body.user_id)?;

    let profile = ensure_profile(
        pool.get_ref(),
        telegram_id,
        body.username.clone(),
        body.first_name.clone(),
        body.last_name.clone(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "profile": profile_json(&profile)
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_ids_parse_with_surrounding_whitespace() {
        assert_eq!(parse_user_id("5274439601").unwrap(), 5_274_439_601);
        assert_eq!(parse_user_id("  42 ").unwrap(), 42);
    }

    #[test]
    fn malformed_user_ids_read_as_missing_profiles() {
        assert!(matches!(parse_user_id("alice"), Err(ApiError::ProfileNotFound)));
        assert!(matches!(parse_user_id(""), Err(ApiError::ProfileNotFound)));
        assert!(matches!(parse_user_id("12.5"), Err(ApiError::ProfileNotFound)));
    }
}
