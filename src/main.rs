mod bot;
mod checkin;
mod db;
mod error;
mod farming;
mod periods;
mod profiles;
mod referrals;
mod stats;
mod tasks;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpResponse, HttpServer};
use sqlx::postgres::PgPoolOptions;
use tokio_cron_scheduler::{Job, JobScheduler};

async fn index() -> HttpResponse {
    HttpResponse::Ok().body("✅ Tonix Farm backend is online.")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "10000".to_string())
        .parse()
        .unwrap_or(10000);

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&database_url)
        .await?;
    log::info!("✅ Database connection pool created");

    db::init_db(&pool).await?;
    log::info!("✅ Database initialized");

    match std::env::var("BOT_TOKEN") {
        Ok(token) => {
            let bot_pool = pool.clone();
            tokio::spawn(async move {
                bot::run_bot(token, bot_pool).await;
            });
        }
        Err(_) => log::warn!("⚠️ BOT_TOKEN not set, Telegram bot disabled"),
    }

    let scheduler = JobScheduler::new().await?;

    // Per-minute accrual sweep keeps every ready_to_collect cache warm
    let sweep_pool = pool.clone();
    let sweep_job = Job::new_async("0 * * * * *", move |_uuid, _l| {
        let pool = sweep_pool.clone();
        Box::pin(async move {
            if let Err(e) = farming::sweep_ready_to_collect(&pool).await {
                log::error!("❌ Accrual sweep failed: {}", e);
            }
        })
    })?;
    scheduler.add(sweep_job).await?;

    // today_earnings reset at midnight UTC+4 (20:00:00 UTC)
    let reset_pool = pool.clone();
    let reset_job = Job::new_async("0 0 20 * * *", move |_uuid, _l| {
        let pool = reset_pool.clone();
        Box::pin(async move {
            match db::reset_today_earnings(&pool, periods::now()).await {
                Ok(n) => log::info!("🔄 Daily earnings reset for {} profiles", n),
                Err(e) => log::error!("❌ Daily earnings reset failed: {}", e),
            }
        })
    })?;
    scheduler.add(reset_job).await?;

    scheduler.start().await?;
    log::info!("✅ Farm schedulers started");

    log::info!("🌍 HTTP server starting on 0.0.0.0:{} ...", port);

    let data_pool = web::Data::new(pool);
    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(Logger::default())
            .app_data(data_pool.clone())
            .route("/", web::get().to(index))
            .route("/api/profile", web::post().to(profiles::ensure_profile_handler))
            .route("/api/farming/accrue", web::post().to(farming::accrue))
            .route("/api/farming/collect", web::post().to(farming::collect))
            .route("/api/checkin", web::post().to(checkin::daily_checkin))
            .route("/api/tasks/complete", web::post().to(tasks::complete_task))
            .route("/api/referrals/submit", web::post().to(referrals::submit_referral))
            .route(
                "/api/referrals/commission",
                web::post().to(referrals::pay_commission_endpoint),
            )
            .route("/api/stats", web::post().to(stats::get_user_stats))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await?;

    Ok(())
}
