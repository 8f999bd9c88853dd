//! Typed lazy-section data and the parsers that normalize raw upstream
//! payloads into it.
//!
//! Upstream payload shapes drift between API versions, so every field is
//! read through a fallback key chain and anything unparseable degrades to
//! `None` rather than failing the section.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One lazily fetched section of an entity's dossier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    /// Arbitration court cases
    Courts,
    /// Enforcement proceedings
    Debts,
    /// Government inspections
    Checks,
    /// Bankruptcy status
    Bankruptcy,
    /// Public procurement contracts
    Tenders,
    /// Financial statements
    Finance,
    /// Founders and affiliated parties
    Connections,
    /// Registry-state risk flags
    Risks,
}

impl Section {
    /// Stable identifier used in cache keys and callback data
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Courts => "courts",
            Self::Debts => "debts",
            Self::Checks => "checks",
            Self::Bankruptcy => "bankruptcy",
            Self::Tenders => "tenders",
            Self::Finance => "finance",
            Self::Connections => "connections",
            Self::Risks => "risks",
        }
    }

    /// Inverse of [`Section::as_str`]
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "courts" => Some(Self::Courts),
            "debts" => Some(Self::Debts),
            "checks" => Some(Self::Checks),
            "bankruptcy" => Some(Self::Bankruptcy),
            "tenders" => Some(Self::Tenders),
            "finance" => Some(Self::Finance),
            "connections" => Some(Self::Connections),
            "risks" => Some(Self::Risks),
            _ => None,
        }
    }

    /// All sections, in display order
    pub const ALL: [Self; 8] = [
        Self::Courts,
        Self::Debts,
        Self::Checks,
        Self::Bankruptcy,
        Self::Tenders,
        Self::Finance,
        Self::Connections,
        Self::Risks,
    ];
}

/// Parsed payload of one section, tagged for cache round-trips
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "section", rename_all = "snake_case")]
pub enum SectionData {
    /// Arbitration cases
    Courts(CourtsSection),
    /// Enforcement proceedings
    Debts(DebtsSection),
    /// Inspections
    Checks(ChecksSection),
    /// Bankruptcy status
    Bankruptcy(BankruptcySection),
    /// Procurement contracts
    Tenders(TendersSection),
    /// Financial statements
    Finance(FinanceSection),
    /// Founders and affiliates
    Connections(ConnectionsSection),
    /// Risk flags
    Risks(RisksSection),
}

/// One arbitration case
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CourtCase {
    /// Case number
    pub number: Option<String>,
    /// Court name
    pub court: Option<String>,
    /// Start date as reported upstream
    pub date: Option<String>,
    /// Case status
    pub status: Option<String>,
    /// Claim amount, rubles
    pub amount: Option<f64>,
}

/// Arbitration summary
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CourtsSection {
    /// Total number of cases
    pub total: u64,
    /// Share of cases where the entity is the plaintiff
    pub plaintiff_pct: f64,
    /// Share of cases where the entity is the defendant
    pub defendant_pct: f64,
    /// Most recent cases
    pub cases: Vec<CourtCase>,
}

/// One enforcement proceeding
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DebtItem {
    /// Opening date
    pub date: Option<String>,
    /// Subject of the proceeding
    pub subject: Option<String>,
    /// Outstanding amount, rubles
    pub amount: Option<f64>,
    /// Region
    pub region: Option<String>,
}

/// Enforcement proceedings summary
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DebtsSection {
    /// Total number of proceedings
    pub total: u64,
    /// Total outstanding amount, rubles
    pub total_sum: Option<f64>,
    /// Most recent proceedings
    pub items: Vec<DebtItem>,
}

/// One government inspection
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CheckItem {
    /// Inspection type
    pub kind: Option<String>,
    /// Period or date
    pub period: Option<String>,
    /// Result, if finished
    pub result: Option<String>,
}

/// Inspections summary
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChecksSection {
    /// Total number of inspections
    pub total: u64,
    /// Most recent inspections
    pub items: Vec<CheckItem>,
}

/// Bankruptcy status
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BankruptcySection {
    /// Whether a bankruptcy record exists
    pub found: bool,
    /// Human-readable status
    pub status: Option<String>,
    /// Bankruptcy case number
    pub case_number: Option<String>,
    /// Court handling the case
    pub court: Option<String>,
    /// Procedure stage
    pub stage: Option<String>,
    /// Status date
    pub date: Option<String>,
}

/// One procurement contract
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TenderItem {
    /// Contract number
    pub number: Option<String>,
    /// Signing date
    pub date: Option<String>,
    /// Contract amount, rubles
    pub amount: Option<f64>,
    /// Customer name
    pub customer: Option<String>,
}

/// Procurement summary
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TendersSection {
    /// Total number of contracts
    pub total: u64,
    /// Total contract amount, rubles
    pub total_sum: Option<f64>,
    /// Most recent contracts
    pub items: Vec<TenderItem>,
}

/// One financial-statement year
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FinanceRow {
    /// Reporting year
    pub year: Option<i64>,
    /// Revenue, rubles
    pub revenue: Option<f64>,
    /// Net profit (or loss), rubles
    pub net_profit: Option<f64>,
}

/// Financial statements by year
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FinanceSection {
    /// Rows, most recent year first as reported upstream
    pub rows: Vec<FinanceRow>,
}

/// One founder/owner
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Founder {
    /// Name
    pub name: Option<String>,
    /// Ownership share, percent
    pub share: Option<f64>,
}

/// One affiliated party
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RelatedParty {
    /// Name
    pub name: Option<String>,
    /// INN
    pub inn: Option<String>,
    /// Relation role
    pub role: Option<String>,
}

/// Founders and affiliates
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConnectionsSection {
    /// Founders/owners with shares
    pub owners: Vec<Founder>,
    /// Affiliated parties
    pub related: Vec<RelatedParty>,
}

/// Registry-state risk flags
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RisksSection {
    /// Registry state status (ACTIVE, LIQUIDATING, …)
    pub state_status: Option<String>,
}

/// Self-employment check result
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelfEmployedStatus {
    /// Whether the person is registered as self-employed
    pub registered: bool,
    /// Tracker message, if any
    pub message: Option<String>,
}

// ── field pickers ────────────────────────────────────────────────────────

fn pick<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|k| obj.get(*k))
        .filter(|v| !v.is_null())
}

fn pick_string(obj: &Value, keys: &[&str]) -> Option<String> {
    pick(obj, keys).map(|v| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

fn pick_f64(obj: &Value, keys: &[&str]) -> Option<f64> {
    pick(obj, keys).and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.replace(' ', "").replace(',', ".").parse().ok(),
        _ => None,
    })
}

fn pick_i64(obj: &Value, keys: &[&str]) -> Option<i64> {
    pick(obj, keys).and_then(|v| match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    })
}

fn items_of<'a>(raw: &'a Value, keys: &[&str]) -> &'a [Value] {
    pick(raw, keys)
        .and_then(Value::as_array)
        .map_or(&[], Vec::as_slice)
}

// ── section parsers ──────────────────────────────────────────────────────

/// Parses an arbitration payload
#[must_use]
pub fn parse_courts(raw: &Value) -> CourtsSection {
    let cases: Vec<CourtCase> = items_of(raw, &["cases", "items"])
        .iter()
        .map(|c| CourtCase {
            number: pick_string(c, &["number", "case_number", "id"]),
            court: pick_string(c, &["court", "court_name"]),
            date: pick_string(c, &["date", "start_date"]),
            status: pick_string(c, &["status"]),
            amount: pick_f64(c, &["amount", "sum"]),
        })
        .collect();
    CourtsSection {
        total: pick_i64(raw, &["total"])
            .map_or(cases.len() as u64, |t| t.max(0).unsigned_abs()),
        plaintiff_pct: pick_f64(raw, &["plaintiff_pct"]).unwrap_or(0.0),
        defendant_pct: pick_f64(raw, &["defendant_pct"]).unwrap_or(0.0),
        cases,
    }
}

/// Parses an enforcement-proceedings payload
#[must_use]
pub fn parse_debts(raw: &Value) -> DebtsSection {
    let items: Vec<DebtItem> = items_of(raw, &["items", "data"])
        .iter()
        .map(|it| DebtItem {
            date: pick_string(it, &["date", "open_date"]),
            subject: pick_string(it, &["subject", "reason"]),
            amount: pick_f64(it, &["amount", "sum"]),
            region: pick_string(it, &["region"]),
        })
        .collect();
    DebtsSection {
        total: pick_i64(raw, &["total"])
            .map_or(items.len() as u64, |t| t.max(0).unsigned_abs()),
        total_sum: pick_f64(raw, &["total_sum", "sum"]),
        items,
    }
}

/// Parses an inspections payload
#[must_use]
pub fn parse_checks(raw: &Value) -> ChecksSection {
    let items: Vec<CheckItem> = items_of(raw, &["items"])
        .iter()
        .map(|it| CheckItem {
            kind: pick_string(it, &["type", "kind"]),
            period: pick_string(it, &["period", "date"]),
            result: pick_string(it, &["result"]),
        })
        .collect();
    ChecksSection {
        total: pick_i64(raw, &["total"])
            .map_or(items.len() as u64, |t| t.max(0).unsigned_abs()),
        items,
    }
}

/// Derives the bankruptcy status from a company card payload
#[must_use]
pub fn parse_bankruptcy(raw: &Value) -> BankruptcySection {
    let status = pick_string(raw, &["status"]).unwrap_or_default();
    let flagged = status.eq_ignore_ascii_case("BANKRUPT")
        || pick(raw, &["bankruptcy"]).is_some_and(|v| !matches!(v, Value::Bool(false)));
    if !flagged {
        return BankruptcySection::default();
    }
    BankruptcySection {
        found: true,
        status: Some(
            pick_string(raw, &["bankruptcy_status"]).unwrap_or_else(|| "банкрот".to_string()),
        ),
        case_number: pick_string(raw, &["bankruptcy_case"]),
        court: pick_string(raw, &["bankruptcy_court"]),
        stage: pick_string(raw, &["bankruptcy_stage"]),
        date: pick_string(raw, &["bankruptcy_date"]),
    }
}

/// Parses a procurement-contracts payload
#[must_use]
pub fn parse_tenders(raw: &Value) -> TendersSection {
    let items: Vec<TenderItem> = items_of(raw, &["items", "contracts"])
        .iter()
        .map(|it| TenderItem {
            number: pick_string(it, &["number", "id"]),
            date: pick_string(it, &["date", "sign_date"]),
            amount: pick_f64(it, &["amount", "price"]),
            customer: pick_string(it, &["customer", "customer_name"]),
        })
        .collect();
    TendersSection {
        total: pick_i64(raw, &["total"])
            .map_or(items.len() as u64, |t| t.max(0).unsigned_abs()),
        total_sum: pick_f64(raw, &["total_sum", "sum"]),
        items,
    }
}

/// Parses a financial-statements payload
#[must_use]
pub fn parse_finance(raw: &Value) -> FinanceSection {
    let rows = items_of(raw, &["years", "rows"])
        .iter()
        .map(|r| FinanceRow {
            year: pick_i64(r, &["year"]),
            revenue: pick_f64(r, &["revenue", "income", "выручка"]),
            net_profit: pick_f64(r, &["net_profit", "profit", "прибыль"]),
        })
        .collect();
    FinanceSection { rows }
}

/// Extracts founders and affiliates from a company card payload
#[must_use]
pub fn parse_connections(raw: &Value) -> ConnectionsSection {
    let owners = items_of(raw, &["founders", "owners"])
        .iter()
        .map(|f| Founder {
            name: pick_string(f, &["name", "fio"]),
            share: pick_f64(f, &["share", "percent"]),
        })
        .collect();
    let related = items_of(raw, &["related", "affiliates"])
        .iter()
        .map(|r| RelatedParty {
            name: pick_string(r, &["name"]),
            inn: pick_string(r, &["inn"]),
            role: pick_string(r, &["role"]),
        })
        .collect();
    ConnectionsSection { owners, related }
}
