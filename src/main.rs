use dotenvy::dotenv;
use kontragent_bot::bot::handlers::{get_user_id_safe, BotDialogue, Command, LookupServices};
use kontragent_bot::bot::state::State;
use kontragent_bot::bot::{callbacks, handlers, RateNoticeCache, SessionStore};
use kontragent_bot::config::{
    Settings, CACHE_CLEANUP_INTERVAL_SECS, RATE_NOTICE_COOLDOWN_SECS, RATE_NOTICE_MAX_CAPACITY,
    SESSION_MAX_CAPACITY, SESSION_TTL_SECS, USER_MIN_INTERVAL_MS,
};
use kontragent_bot::registry::cache::SqliteCache;
use kontragent_bot::registry::clients::{CheckoClient, DadataClient, NalogClient};
use kontragent_bot::registry::rate_limit::KeyedRateLimiter;
use kontragent_bot::registry::reference::ReferenceData;
use kontragent_bot::registry::Aggregator;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, ChatId};
use tracing::{error, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting credentials from log output
struct RedactionPatterns {
    telegram_token: Regex,
    key_param: Regex,
    dadata_token: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            telegram_token: Regex::new(r"[0-9]{8,10}:[A-Za-z0-9_-]{35}")?,
            key_param: Regex::new(r"([?&]key=)[^&\s]+")?,
            dadata_token: Regex::new(r"(Token )[A-Za-z0-9]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = self
            .telegram_token
            .replace_all(input, "[TELEGRAM_TOKEN]")
            .to_string();
        output = self.key_param.replace_all(&output, "$1[MASKED]").to_string();
        self.dadata_token
            .replace_all(&output, "$1[MASKED]")
            .to_string()
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // We return the original buffer length to satisfy the contract,
        // even if the redacted string length differs.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: (self.make_inner)(),
            patterns: self.patterns.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);
    init_logging(patterns);

    info!("Starting Kontragent bot...");

    let settings = init_settings();
    let services = init_services(&settings);

    let bot = Bot::new(settings.telegram_token.clone());
    let dialogue_storage = InMemStorage::<State>::new();
    let handler = setup_handler();

    spawn_cache_cleanup(services.aggregator.clone());

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![
            services.aggregator.clone(),
            services,
            dialogue_storage
        ])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter {
        make_inner: io::stderr,
        patterns,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_services(settings: &Settings) -> Arc<LookupServices> {
    let checko_key = settings.checko_api_key.clone().unwrap_or_default();
    if checko_key.is_empty() {
        warn!("CHECKO_API_KEY is not set; Checko requests will fail");
    }
    let dadata_key = settings.dadata_api_key.clone().unwrap_or_default();
    if dadata_key.is_empty() {
        warn!("DADATA_API_KEY is not set; DaData requests will fail");
    }

    let cache = match SqliteCache::open(&settings.cache_db_path) {
        Ok(cache) => {
            info!("Cache DB ready at {}", settings.cache_db_path);
            cache
        }
        Err(e) => {
            error!("Failed to open cache DB: {}", e);
            std::process::exit(1);
        }
    };
    let reference = match ReferenceData::open(&settings.reference_db_path) {
        Ok(reference) => {
            info!("Reference DB ready at {}", settings.reference_db_path);
            reference
        }
        Err(e) => {
            error!("Failed to open reference DB: {}", e);
            std::process::exit(1);
        }
    };

    let aggregator = Arc::new(Aggregator::new(
        CheckoClient::new(checko_key),
        DadataClient::new(&dadata_key),
        NalogClient::new(),
        cache,
        reference,
    ));

    Arc::new(LookupServices {
        aggregator,
        limiter: Arc::new(KeyedRateLimiter::new(Duration::from_millis(
            USER_MIN_INTERVAL_MS,
        ))),
        notices: Arc::new(RateNoticeCache::new(
            RATE_NOTICE_COOLDOWN_SECS,
            RATE_NOTICE_MAX_CAPACITY,
        )),
        sessions: Arc::new(SessionStore::new(SESSION_TTL_SECS, SESSION_MAX_CAPACITY)),
    })
}

fn spawn_cache_cleanup(aggregator: Arc<Aggregator>) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(CACHE_CLEANUP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            match aggregator.cache().cleanup().await {
                Ok(0) => {}
                Ok(removed) => info!("cache cleanup removed {removed} expired rows"),
                Err(e) => warn!("cache cleanup failed: {e}"),
            }
        }
    });
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handle_callback))
        .branch(
            Update::filter_message()
                .enter_dialogue::<Message, InMemStorage<State>, State>()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                )
                .branch(dptree::case![State::AwaitingInn].endpoint(handle_awaiting_inn))
                .branch(
                    dptree::case![State::Start]
                        .branch(
                            Update::filter_message()
                                .filter(|msg: Message| msg.text().is_some())
                                .endpoint(handle_text),
                        ),
                ),
        )
}

const TECH_ERROR_TEXT: &str = "Техническая ошибка, попробуйте позже.";

async fn report_failure(bot: &Bot, chat_id: ChatId) {
    let _ = bot.send_message(chat_id, TECH_ERROR_TEXT).await;
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    dialogue: BotDialogue,
    services: Arc<LookupServices>,
) -> Result<(), teloxide::RequestError> {
    let chat_id = msg.chat.id;
    let res = match cmd {
        Command::Start => handlers::start(bot.clone(), msg, dialogue).await,
        Command::Help => handlers::help(bot.clone(), msg).await,
        Command::Last => handlers::handle_last(bot.clone(), msg, services).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
        report_failure(&bot, chat_id).await;
    }
    respond(())
}

async fn handle_text(
    bot: Bot,
    msg: Message,
    dialogue: BotDialogue,
    services: Arc<LookupServices>,
) -> Result<(), teloxide::RequestError> {
    let user_id = get_user_id_safe(&msg);
    let chat_id = msg.chat.id;
    if let Err(e) = handlers::handle_text(bot.clone(), msg, dialogue, services).await {
        error!("Text handler error for user {user_id}: {e}");
        report_failure(&bot, chat_id).await;
    }
    respond(())
}

async fn handle_awaiting_inn(
    bot: Bot,
    msg: Message,
    dialogue: BotDialogue,
    services: Arc<LookupServices>,
) -> Result<(), teloxide::RequestError> {
    let chat_id = msg.chat.id;
    if let Err(e) = handlers::handle_awaiting_inn(bot.clone(), msg, dialogue, services).await {
        error!("Lookup handler error: {}", e);
        report_failure(&bot, chat_id).await;
    }
    respond(())
}

async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    aggregator: Arc<Aggregator>,
) -> Result<(), teloxide::RequestError> {
    let chat_id = q.message.as_ref().map(|msg| msg.chat().id);
    if let Err(e) = callbacks::handle_callback(bot.clone(), q, aggregator).await {
        error!("Callback handler error: {}", e);
        if let Some(chat_id) = chat_id {
            report_failure(&bot, chat_id).await;
        }
    }
    respond(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redaction_masks_credentials() {
        let patterns = RedactionPatterns::new().expect("valid patterns");
        let line = "GET https://api.checko.ru/v2/company?inn=77&key=secret123 \
                    via bot 1234567890:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA \
                    auth Token abcdef0123456789";
        let redacted = patterns.redact(line);
        assert!(!redacted.contains("secret123"));
        assert!(!redacted.contains("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"));
        assert!(!redacted.contains("abcdef0123456789"));
        assert!(redacted.contains("key=[MASKED]"));
        assert!(redacted.contains("[TELEGRAM_TOKEN]"));
    }
}
