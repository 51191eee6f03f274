use sqlx::PgPool;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, WebAppInfo};

use crate::profiles;
use crate::referrals;

/// Long-polling `/start` handler: upserts the sender's profile, applies an
/// optional referral payload, and replies with the WebApp button.
pub async fn run_bot(token: String, pool: PgPool) {
    let bot = Bot::new(token);

    let webapp_url = std::env::var("WEBAPP_URL")
        .unwrap_or_else(|_| "https://tonix-farm.online".to_string());
    let webapp_url = match url::Url::parse(&webapp_url) {
        Ok(u) => Some(u),
        Err(e) => {
            log::warn!("⚠️ WEBAPP_URL is not a valid URL ({}), button disabled", e);
            None
        }
    };

    log::info!("🤖 Tonix Telegram bot starting (long polling)...");

    teloxide::repl(bot, move |bot: Bot, msg: Message| {
        let pool = pool.clone();
        let webapp_url = webapp_url.clone();
        async move {
            let user = match msg.from() {
                Some(user) => user.clone(),
                None => return Ok(()),
            };
            let text = msg.text().unwrap_or("");
            if !text.starts_with("/start") {
                return Ok(());
            }

            let telegram_id = user.id.0 as i64;
            let payload = text["/start".len()..].trim().to_string();

            if let Err(e) = profiles::ensure_profile(
                &pool,
                telegram_id,
                user.username.clone(),
                Some(user.first_name.clone()),
                user.last_name.clone(),
            )
            .await
            {
                log::error!("❌ Failed to upsert profile for {}: {}", telegram_id, e);
            }

            // Deep links carry the inviter's Telegram id as the payload
            if !payload.is_empty() {
                match referrals::apply_referral_code(&pool, telegram_id, &payload).await {
                    Ok(outcome) => log::info!(
                        "🤝 Start-payload referral accepted for {} (bonus {})",
                        telegram_id,
                        outcome.bonus
                    ),
                    Err(e) => {
                        log::debug!("Start-payload referral rejected for {}: {}", telegram_id, e)
                    }
                }
            }

            let mut request =
                bot.send_message(msg.chat.id, "Welcome to Tonix Farm! Start farming 👇");
            if let Some(url) = webapp_url {
                let keyboard = InlineKeyboardMarkup::new([[InlineKeyboardButton::web_app(
                    "🌱 Open Tonix Farm",
                    WebAppInfo { url },
                )]]);
                request = request.reply_markup(keyboard);
            }
            request.await?;

            Ok(())
        }
    })
    .await;
}
