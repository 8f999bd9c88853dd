//! Command and message handlers.

use crate::bot::formatters::format_card;
use crate::bot::keyboards::{card_keyboard, main_keyboard, BTN_CHECK, BTN_HELP};
use crate::bot::state::State;
use crate::bot::{RateNoticeCache, SessionStore};
use crate::registry::rate_limit::KeyedRateLimiter;
use crate::registry::{Aggregator, Query};
use crate::validation::normalize_query;
use anyhow::{anyhow, Result};
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

/// Type alias for dialogue
pub type BotDialogue = Dialogue<State, InMemStorage<State>>;

const WELCOME_TEXT: &str = "👋 Привет! Отправьте ИНН (10 или 12 цифр) или ОГРН, \
                            и я соберу сведения о контрагенте.";
const HELP_TEXT: &str = "Отправьте ИНН (10/12 цифр) или ОГРН (13/15 цифр) одним сообщением.\n\
                         После карточки используйте кнопки, чтобы открыть суды, долги, \
                         финансы и другие разделы.";
const ASK_INN_TEXT: &str = "Введите ИНН (10 или 12 цифр) или ОГРН:";
const BAD_INN_TEXT: &str = "Не похоже на ИНН/ОГРН: нужны 10, 12, 13 или 15 цифр \
                            с корректной контрольной суммой.";
const NOT_FOUND_TEXT: &str = "Ничего не найдено по этому номеру.";
const RATE_LIMIT_TEXT: &str = "Слишком много запросов, подождите немного.";
const SEARCHING_TEXT: &str = "⏳ Ищу данные…";

/// Supported commands for the bot
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Start the bot and show welcome message
    #[command(description = "Start the bot.")]
    Start,
    /// Show usage help
    #[command(description = "Show help.")]
    Help,
    /// Repeat the last lookup in this chat
    #[command(description = "Repeat the last lookup.")]
    Last,
}

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
#[must_use]
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Start handler
///
/// # Errors
///
/// Returns an error if the welcome message cannot be sent.
pub async fn start(bot: Bot, msg: Message, dialogue: BotDialogue) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    info!("User {user_id} initiated /start command.");

    dialogue
        .update(State::Start)
        .await
        .map_err(|e| anyhow!(e.to_string()))?;
    bot.send_message(msg.chat.id, WELCOME_TEXT)
        .reply_markup(main_keyboard())
        .await?;
    Ok(())
}

/// Help handler
///
/// # Errors
///
/// Returns an error if the help message cannot be sent.
pub async fn help(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, HELP_TEXT).await?;
    Ok(())
}

/// Free-form text in the initial state: menu buttons or a direct lookup
///
/// # Errors
///
/// Returns an error if a Telegram API call fails.
pub async fn handle_text(
    bot: Bot,
    msg: Message,
    dialogue: BotDialogue,
    services: Arc<LookupServices>,
) -> Result<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    match text {
        BTN_CHECK => {
            dialogue
                .update(State::AwaitingInn)
                .await
                .map_err(|e| anyhow!(e.to_string()))?;
            bot.send_message(msg.chat.id, ASK_INN_TEXT).await?;
        }
        BTN_HELP => help(bot, msg).await?,
        _ => lookup_and_reply(&bot, &msg, &services).await?,
    }
    Ok(())
}

/// Text received while the dialogue waits for an identifier
///
/// # Errors
///
/// Returns an error if a Telegram API call fails.
pub async fn handle_awaiting_inn(
    bot: Bot,
    msg: Message,
    dialogue: BotDialogue,
    services: Arc<LookupServices>,
) -> Result<()> {
    dialogue
        .update(State::Start)
        .await
        .map_err(|e| anyhow!(e.to_string()))?;
    lookup_and_reply(&bot, &msg, &services).await
}

/// Repeats the last lookup this chat made, if the session still remembers it
///
/// # Errors
///
/// Returns an error if a Telegram API call fails.
pub async fn handle_last(bot: Bot, msg: Message, services: Arc<LookupServices>) -> Result<()> {
    match services.sessions.last_inn(msg.chat.id.0).await {
        Some(inn) => {
            let query = Query::parse(&inn).map_err(|e| anyhow!("stored inn parse: {e}"))?;
            show_card(&bot, &msg, &services, &query).await
        }
        None => {
            bot.send_message(msg.chat.id, ASK_INN_TEXT).await?;
            Ok(())
        }
    }
}

/// Everything the lookup flow needs, bundled for dptree injection
pub struct LookupServices {
    /// The data-access layer
    pub aggregator: Arc<Aggregator>,
    /// Per-user admission control
    pub limiter: Arc<KeyedRateLimiter>,
    /// Flood-silenced rate-limit notices
    pub notices: Arc<RateNoticeCache>,
    /// Per-chat last-resolved-INN store
    pub sessions: Arc<SessionStore>,
}

async fn lookup_and_reply(bot: &Bot, msg: &Message, services: &LookupServices) -> Result<()> {
    let raw = msg.text().unwrap_or_default();
    let Some(normalized) = normalize_query(raw) else {
        bot.send_message(msg.chat.id, BAD_INN_TEXT).await?;
        return Ok(());
    };

    let user_id = get_user_id_safe(msg);
    if !services.limiter.allow(user_id) {
        if services.notices.should_send(user_id).await {
            bot.send_message(msg.chat.id, RATE_LIMIT_TEXT).await?;
            services.notices.mark_sent(user_id).await;
        }
        return Ok(());
    }

    // Validated input: a parse failure here is a bug, not user error
    let query = Query::parse(&normalized).map_err(|e| anyhow!("query parse: {e}"))?;
    show_card(bot, msg, services, &query).await
}

async fn show_card(
    bot: &Bot,
    msg: &Message,
    services: &LookupServices,
    query: &Query,
) -> Result<()> {
    let waiting = bot.send_message(msg.chat.id, SEARCHING_TEXT).await?;
    match services.aggregator.get_card(query).await {
        Some(card) => {
            services.sessions.remember(msg.chat.id.0, &card.inn).await;
            let keyboard = card_keyboard(&card.inn, card.kind);
            if let Err(e) = bot
                .edit_message_text(msg.chat.id, waiting.id, format_card(&card))
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await
            {
                warn!("failed to edit card message: {e}");
            }
        }
        None => {
            bot.edit_message_text(msg.chat.id, waiting.id, NOT_FOUND_TEXT)
                .await?;
        }
    }
    Ok(())
}
