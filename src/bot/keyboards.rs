//! Keyboard layouts and the callback-data codec.
//!
//! Callback data stays well under Telegram's 64-byte limit:
//! `sec:<section>:<inn>` for lazy sections, `npd:<inn>` for the
//! self-employment check.

use crate::registry::{EntityKind, Section};
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup,
};

/// Reply-keyboard button: start a lookup
pub const BTN_CHECK: &str = "🔍 Проверить ИНН";
/// Reply-keyboard button: show help
pub const BTN_HELP: &str = "ℹ️ Помощь";

/// Create the main menu keyboard
#[must_use]
pub fn main_keyboard() -> KeyboardMarkup {
    let keyboard = vec![vec![
        KeyboardButton::new(BTN_CHECK),
        KeyboardButton::new(BTN_HELP),
    ]];
    KeyboardMarkup::new(keyboard).resize_keyboard()
}

fn section_label(section: Section) -> &'static str {
    match section {
        Section::Courts => "⚖️ Суды",
        Section::Debts => "💸 Долги",
        Section::Checks => "🔎 Проверки",
        Section::Bankruptcy => "📉 Банкротство",
        Section::Tenders => "📑 Госзакупки",
        Section::Finance => "📊 Финансы",
        Section::Connections => "🔗 Связи",
        Section::Risks => "⚠️ Риски",
    }
}

/// Inline keyboard attached to a resolved card: one button per lazy
/// section, plus the self-employment check for individuals
#[must_use]
pub fn card_keyboard(inn: &str, kind: EntityKind) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = Section::ALL
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|section| {
                    InlineKeyboardButton::callback(
                        section_label(*section),
                        section_callback(*section, inn),
                    )
                })
                .collect()
        })
        .collect();
    if kind == EntityKind::Individual {
        rows.push(vec![InlineKeyboardButton::callback(
            "🧾 Самозанятость",
            format!("npd:{inn}"),
        )]);
    }
    InlineKeyboardMarkup::new(rows)
}

/// Callback data for a section button
#[must_use]
pub fn section_callback(section: Section, inn: &str) -> String {
    format!("sec:{}:{inn}", section.as_str())
}

/// Parsed callback payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    /// Fetch one lazy section for an INN
    Section(Section, String),
    /// Run the self-employment check for an INN
    SelfEmployed(String),
}

/// Decodes callback data produced by [`card_keyboard`]
#[must_use]
pub fn parse_callback(data: &str) -> Option<Callback> {
    if let Some(rest) = data.strip_prefix("sec:") {
        let (section, inn) = rest.split_once(':')?;
        return Some(Callback::Section(Section::parse(section)?, inn.to_string()));
    }
    if let Some(inn) = data.strip_prefix("npd:") {
        return Some(Callback::SelfEmployed(inn.to_string()));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_keyboard_not_empty() {
        let keyboard = main_keyboard();
        assert!(!keyboard.keyboard.is_empty());
    }

    #[test]
    fn test_card_keyboard_has_all_sections() {
        let keyboard = card_keyboard("7707083893", EntityKind::Legal);
        let buttons: usize = keyboard.inline_keyboard.iter().map(Vec::len).sum();
        assert_eq!(buttons, Section::ALL.len());
    }

    #[test]
    fn test_individual_card_gets_selfemployed_button() {
        let legal = card_keyboard("7707083893", EntityKind::Legal);
        let individual = card_keyboard("500100732259", EntityKind::Individual);
        let count = |kb: &InlineKeyboardMarkup| -> usize {
            kb.inline_keyboard.iter().map(Vec::len).sum()
        };
        assert_eq!(count(&individual), count(&legal) + 1);
    }

    #[test]
    fn test_callback_round_trip() {
        let data = section_callback(Section::Courts, "7707083893");
        assert_eq!(
            parse_callback(&data),
            Some(Callback::Section(Section::Courts, "7707083893".to_string()))
        );
        assert_eq!(
            parse_callback("npd:500100732259"),
            Some(Callback::SelfEmployed("500100732259".to_string()))
        );
    }

    #[test]
    fn test_callback_data_fits_telegram_limit() {
        for section in Section::ALL {
            assert!(section_callback(section, "315774600002662").len() <= 64);
        }
    }

    #[test]
    fn test_malformed_callback_rejected() {
        assert_eq!(parse_callback("sec:unknown:123"), None);
        assert_eq!(parse_callback("sec:courts"), None);
        assert_eq!(parse_callback("garbage"), None);
    }
}
