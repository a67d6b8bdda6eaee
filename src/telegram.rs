use anyhow::{Context, Result};
use teloxide::{prelude::*, types::ChatId};

pub async fn send_telegram_message(bot_token: &str, chat_ids: &[String], text: &str) -> Result<()> {
    if chat_ids.is_empty() {
        return Ok(());
    }

    let bot = Bot::new(bot_token);

    for recipient in chat_ids {
        let chat_id: i64 = recipient
            .parse()
            .with_context(|| format!("Invalid telegram chat id `{}`", recipient))?;
        bot.send_message(ChatId(chat_id), text).await?;
    }

    Ok(())
}
