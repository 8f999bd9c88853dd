//! HTML rendering of merged cards and lazy sections.
//!
//! All dynamic values pass through `html_escape` before they reach a
//! Telegram HTML message.

use crate::registry::sections::{SectionData, SelfEmployedStatus};
use crate::registry::{EntityKind, MergedCard};
use std::fmt::Write as _;

fn esc(value: &str) -> String {
    html_escape::encode_text(value).to_string()
}

fn fmt_amount(amount: f64) -> String {
    // 1234567.5 → "1 234 567.50 ₽"
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let (whole, frac) = (cents / 100, cents % 100);
    let digits = whole.to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }
    format!(
        "{}{grouped}.{frac:02} ₽",
        if negative { "-" } else { "" }
    )
}

fn push_field(out: &mut String, label: &str, value: Option<&str>) {
    if let Some(value) = value {
        if !value.is_empty() {
            let _ = writeln!(out, "<b>{label}:</b> {}", esc(value));
        }
    }
}

/// Renders the merged card as a Telegram HTML message
#[must_use]
pub fn format_card(card: &MergedCard) -> String {
    let mut out = String::new();
    let title = card.field_str("name").unwrap_or("Без названия");
    let kind = match card.kind {
        EntityKind::Legal => "Юридическое лицо",
        EntityKind::Individual => "ИП / физическое лицо",
    };
    let _ = writeln!(out, "<b>{}</b>", esc(title));
    let _ = writeln!(out, "<i>{kind}</i>\n");

    push_field(&mut out, "ИНН", Some(&card.inn));
    push_field(&mut out, "КПП", card.field_str("kpp"));
    push_field(&mut out, "ОГРН", card.field_str("ogrn"));
    push_field(&mut out, "Статус", card.field_str("status"));
    push_field(&mut out, "Адрес", card.field_str("address"));
    push_field(&mut out, "Руководитель", card.field_str("management"));

    if let Some(okved) = card.field_str("okved") {
        match &card.okved_name {
            Some(name) => {
                let _ = writeln!(out, "<b>ОКВЭД:</b> {} — {}", esc(okved), esc(name));
            }
            None => push_field(&mut out, "ОКВЭД", Some(okved)),
        }
    }

    out.trim_end().to_string()
}

fn format_list_header(out: &mut String, title: &str, total: u64) {
    let _ = writeln!(out, "<b>{title}</b>: {total}\n");
}

/// Renders one lazy section as a Telegram HTML message
#[must_use]
pub fn format_section(data: &SectionData) -> String {
    let mut out = String::new();
    match data {
        SectionData::Courts(s) => {
            format_list_header(&mut out, "⚖️ Арбитражные дела", s.total);
            if s.plaintiff_pct > 0.0 || s.defendant_pct > 0.0 {
                let _ = writeln!(
                    out,
                    "Истец: {:.0}% · Ответчик: {:.0}%\n",
                    s.plaintiff_pct, s.defendant_pct
                );
            }
            for case in &s.cases {
                let _ = writeln!(
                    out,
                    "• <b>{}</b> {}",
                    esc(case.number.as_deref().unwrap_or("—")),
                    esc(case.court.as_deref().unwrap_or(""))
                );
                if let Some(amount) = case.amount {
                    let _ = writeln!(out, "  {}", fmt_amount(amount));
                }
            }
            if s.cases.is_empty() {
                out.push_str("Дел не найдено.");
            }
        }
        SectionData::Debts(s) => {
            format_list_header(&mut out, "💸 Исполнительные производства", s.total);
            if let Some(sum) = s.total_sum {
                let _ = writeln!(out, "Общая сумма: {}\n", fmt_amount(sum));
            }
            for item in &s.items {
                let _ = writeln!(
                    out,
                    "• {} {}{}",
                    esc(item.date.as_deref().unwrap_or("—")),
                    esc(item.subject.as_deref().unwrap_or("")),
                    item.amount
                        .map(|a| format!(" — {}", fmt_amount(a)))
                        .unwrap_or_default()
                );
            }
            if s.items.is_empty() {
                out.push_str("Открытых производств нет.");
            }
        }
        SectionData::Checks(s) => {
            format_list_header(&mut out, "🔎 Проверки", s.total);
            for item in &s.items {
                let _ = writeln!(
                    out,
                    "• {} — {} ({})",
                    esc(item.period.as_deref().unwrap_or("—")),
                    esc(item.kind.as_deref().unwrap_or("проверка")),
                    esc(item.result.as_deref().unwrap_or("нет результата"))
                );
            }
            if s.items.is_empty() {
                out.push_str("Проверок не найдено.");
            }
        }
        SectionData::Bankruptcy(s) => {
            if s.found {
                out.push_str("<b>📉 Банкротство: найдено</b>\n\n");
                push_field(&mut out, "Статус", s.status.as_deref());
                push_field(&mut out, "Дело", s.case_number.as_deref());
                push_field(&mut out, "Суд", s.court.as_deref());
                push_field(&mut out, "Стадия", s.stage.as_deref());
                push_field(&mut out, "Дата", s.date.as_deref());
            } else {
                out.push_str("📉 Сведений о банкротстве не найдено.");
            }
        }
        SectionData::Tenders(s) => {
            format_list_header(&mut out, "📑 Госконтракты", s.total);
            if let Some(sum) = s.total_sum {
                let _ = writeln!(out, "Общая сумма: {}\n", fmt_amount(sum));
            }
            for item in &s.items {
                let _ = writeln!(
                    out,
                    "• <b>{}</b> {}{}",
                    esc(item.number.as_deref().unwrap_or("—")),
                    esc(item.customer.as_deref().unwrap_or("")),
                    item.amount
                        .map(|a| format!(" — {}", fmt_amount(a)))
                        .unwrap_or_default()
                );
            }
            if s.items.is_empty() {
                out.push_str("Контрактов не найдено.");
            }
        }
        SectionData::Finance(s) => {
            out.push_str("<b>📊 Финансовая отчётность</b>\n\n");
            for row in &s.rows {
                let _ = writeln!(
                    out,
                    "<b>{}</b>: выручка {}, прибыль {}",
                    row.year.map_or("—".to_string(), |y| y.to_string()),
                    row.revenue.map_or("—".to_string(), fmt_amount),
                    row.net_profit.map_or("—".to_string(), fmt_amount)
                );
            }
            if s.rows.is_empty() {
                out.push_str("Отчётность не опубликована.");
            }
        }
        SectionData::Connections(s) => {
            out.push_str("<b>🔗 Связи</b>\n");
            if !s.owners.is_empty() {
                out.push_str("\n<b>Учредители:</b>\n");
                for owner in &s.owners {
                    let _ = writeln!(
                        out,
                        "• {}{}",
                        esc(owner.name.as_deref().unwrap_or("—")),
                        owner
                            .share
                            .map(|p| format!(" — {p:.1}%"))
                            .unwrap_or_default()
                    );
                }
            }
            if !s.related.is_empty() {
                out.push_str("\n<b>Связанные организации:</b>\n");
                for related in &s.related {
                    let _ = writeln!(
                        out,
                        "• {} {}",
                        esc(related.name.as_deref().unwrap_or("—")),
                        esc(related.inn.as_deref().unwrap_or(""))
                    );
                }
            }
            if s.owners.is_empty() && s.related.is_empty() {
                out.push_str("\nСведений о связях нет.");
            }
        }
        SectionData::Risks(s) => {
            out.push_str("<b>⚠️ Риски</b>\n\n");
            match s.state_status.as_deref() {
                Some("ACTIVE") => out.push_str("Организация действует, явных рисков по реестру нет."),
                Some(status) => {
                    let _ = write!(out, "Статус в реестре: <b>{}</b>", esc(status));
                }
                None => out.push_str("Статус в реестре неизвестен."),
            }
        }
    }
    out.trim_end().to_string()
}

/// Renders the self-employment check result
#[must_use]
pub fn format_selfemployed(status: &SelfEmployedStatus) -> String {
    let headline = if status.registered {
        "🧾 Зарегистрирован как самозанятый (НПД)."
    } else {
        "🧾 Не зарегистрирован как самозанятый."
    };
    match &status.message {
        Some(message) if !message.is_empty() => {
            format!("{headline}\n<i>{}</i>", esc(message))
        }
        _ => headline.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::aggregator::SourcedValue;
    use crate::registry::sections::{BankruptcySection, DebtItem, DebtsSection};
    use crate::registry::Source;
    use chrono::Utc;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn card_with(fields: &[(&str, &str)]) -> MergedCard {
        let fields: BTreeMap<String, SourcedValue> = fields
            .iter()
            .map(|(k, v)| {
                (
                    (*k).to_string(),
                    SourcedValue {
                        value: json!(v),
                        source: Source::Checko,
                    },
                )
            })
            .collect();
        MergedCard {
            query: "7707083893".to_string(),
            inn: "7707083893".to_string(),
            kind: EntityKind::Legal,
            fields,
            okved_name: None,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_card_escapes_html_in_values() {
        let card = card_with(&[("name", "ООО <script>"), ("status", "ACTIVE")]);
        let html = format_card(&card);
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_card_skips_missing_fields() {
        let card = card_with(&[("name", "ООО Ромашка")]);
        let html = format_card(&card);
        assert!(html.contains("ООО Ромашка"));
        assert!(!html.contains("КПП"));
        assert!(!html.contains("Адрес"));
    }

    #[test]
    fn test_card_shows_okved_display_name() {
        let mut card = card_with(&[("name", "ООО Ромашка"), ("okved", "62.01")]);
        card.okved_name = Some("Разработка ПО".to_string());
        let html = format_card(&card);
        assert!(html.contains("62.01 — Разработка ПО"));
    }

    #[test]
    fn test_amount_grouping() {
        assert_eq!(fmt_amount(1_234_567.5), "1 234 567.50 ₽");
        assert_eq!(fmt_amount(42.0), "42.00 ₽");
        assert_eq!(fmt_amount(-500.25), "-500.25 ₽");
    }

    #[test]
    fn test_empty_debts_section_renders_placeholder() {
        let html = format_section(&SectionData::Debts(DebtsSection::default()));
        assert!(html.contains("Открытых производств нет"));
    }

    #[test]
    fn test_debts_section_lists_items() {
        let section = SectionData::Debts(DebtsSection {
            total: 1,
            total_sum: Some(500.0),
            items: vec![DebtItem {
                date: Some("2024-03-01".into()),
                subject: Some("налоги".into()),
                amount: Some(500.0),
                region: None,
            }],
        });
        let html = format_section(&section);
        assert!(html.contains("налоги"));
        assert!(html.contains("500.00 ₽"));
    }

    #[test]
    fn test_bankruptcy_found_renders_details() {
        let section = SectionData::Bankruptcy(BankruptcySection {
            found: true,
            status: Some("банкрот".into()),
            case_number: Some("А40-77".into()),
            court: None,
            stage: Some("наблюдение".into()),
            date: None,
        });
        let html = format_section(&section);
        assert!(html.contains("найдено"));
        assert!(html.contains("А40-77"));
    }

    #[test]
    fn test_selfemployed_formatting() {
        let yes = format_selfemployed(&SelfEmployedStatus {
            registered: true,
            message: None,
        });
        assert!(yes.contains("Зарегистрирован"));
        let no = format_selfemployed(&SelfEmployedStatus {
            registered: false,
            message: Some("не найден".into()),
        });
        assert!(no.contains("Не зарегистрирован"));
        assert!(no.contains("не найден"));
    }
}
