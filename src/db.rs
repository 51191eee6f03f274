use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::PgPool;

/// NUMERIC columns come back as `Decimal`; handler arithmetic and JSON
/// payloads use f64.
pub fn money(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

pub async fn init_db(pool: &PgPool) -> Result<(), sqlx::Error> {
    log::info!("🛠️ init_db() — Tonix Farm");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS farm_profiles (
            id BIGSERIAL PRIMARY KEY,
            telegram_id BIGINT UNIQUE NOT NULL,
            username TEXT,
            first_name TEXT,
            last_name TEXT,
            tonix_balance NUMERIC(18,6) DEFAULT 0,
            farming_rate NUMERIC(18,6) DEFAULT 1.0,
            ready_to_collect NUMERIC(18,6) DEFAULT 0,
            today_earnings NUMERIC(18,6) DEFAULT 0,
            last_collect BIGINT,
            last_check_in TEXT,
            daily_streak INTEGER DEFAULT 0,
            created_at BIGINT NOT NULL,
            updated_at BIGINT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS farm_task_completions (
            id BIGSERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL,
            task_type TEXT NOT NULL,
            task_id TEXT NOT NULL,
            reward_amount NUMERIC(18,6) DEFAULT 0,
            completed_at BIGINT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS farm_referrals (
            id BIGSERIAL PRIMARY KEY,
            referrer_id BIGINT NOT NULL,
            referred_id BIGINT UNIQUE NOT NULL,
            created_at BIGINT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_farm_completions_user
         ON farm_task_completions (user_id, task_type, task_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_farm_referrals_referrer
         ON farm_referrals (referrer_id)",
    )
    .execute(pool)
    .await?;

    run_db_migrations(pool).await;

    Ok(())
}

/// ALTER patches for columns added after the first deployments. Failures are
/// tolerated so a fresh schema and an old one both end up current.
async fn run_db_migrations(pool: &PgPool) {
    let alters = [
        "ALTER TABLE farm_profiles ADD COLUMN IF NOT EXISTS today_earnings NUMERIC(18,6) DEFAULT 0",
        "ALTER TABLE farm_profiles ADD COLUMN IF NOT EXISTS last_check_in TEXT",
        "ALTER TABLE farm_profiles ADD COLUMN IF NOT EXISTS daily_streak INTEGER DEFAULT 0",
        "ALTER TABLE farm_task_completions ADD COLUMN IF NOT EXISTS reward_amount NUMERIC(18,6) DEFAULT 0",
    ];

    for alter in alters.iter() {
        sqlx::query(alter).execute(pool).await.ok();
    }

    log::info!("✅ Database migrations completed");
}

/// Zero every profile's `today_earnings`. Runs from the scheduler at the
/// daily reset boundary.
pub async fn reset_today_earnings(pool: &PgPool, now: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE farm_profiles
         SET today_earnings = 0, updated_at = $1
         WHERE today_earnings <> 0",
    )
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
