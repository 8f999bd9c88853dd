//! Inline-button dispatch: lazy sections and the self-employment check.

use crate::bot::formatters::{format_section, format_selfemployed};
use crate::bot::keyboards::{parse_callback, Callback};
use crate::config::TELEGRAM_MESSAGE_LIMIT;
use crate::registry::Aggregator;
use crate::utils::split_long_message;
use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, ParseMode};
use tracing::debug;

const SECTION_UNAVAILABLE_TEXT: &str =
    "Данные раздела временно недоступны, попробуйте позже.";

/// Dispatches a card-keyboard callback
///
/// # Errors
///
/// Returns an error if a Telegram API call fails.
pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    aggregator: Arc<Aggregator>,
) -> Result<()> {
    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    // Acknowledge immediately so the button stops spinning while we fetch
    let _ = bot.answer_callback_query(q.id.clone()).await;

    let Some(chat_id) = q.message.as_ref().map(|msg| msg.chat().id) else {
        return Ok(());
    };

    match parse_callback(data) {
        Some(Callback::Section(section, inn)) => {
            debug!("section {} requested for {inn}", section.as_str());
            match aggregator.get_section(&inn, section).await {
                Some(section_data) => {
                    let text = format_section(&section_data);
                    for part in split_long_message(&text, TELEGRAM_MESSAGE_LIMIT) {
                        bot.send_message(chat_id, part)
                            .parse_mode(ParseMode::Html)
                            .await?;
                    }
                }
                None => {
                    bot.send_message(chat_id, SECTION_UNAVAILABLE_TEXT).await?;
                }
            }
        }
        Some(Callback::SelfEmployed(inn)) => {
            match aggregator.check_selfemployed(&inn).await {
                Some(status) => {
                    bot.send_message(chat_id, format_selfemployed(&status))
                        .parse_mode(ParseMode::Html)
                        .await?;
                }
                None => {
                    bot.send_message(chat_id, SECTION_UNAVAILABLE_TEXT).await?;
                }
            }
        }
        None => {
            debug!("ignoring unknown callback data: {data}");
        }
    }
    Ok(())
}
