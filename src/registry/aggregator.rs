//! Merges the upstream sources into one coherent record.
//!
//! Checko is the primary truth; DaData fills gaps and never overrides a
//! primary field. Every merged field remembers which source supplied it so
//! tie-breaks stay auditable. Results land in the durable cache under both
//! the original query key and the resolved-INN key, with a TTL matched to
//! how fast the data class changes upstream.

use crate::config::{TTL_CARD_SECS, TTL_FINANCE_SECS, TTL_SECTION_SECS};
use crate::registry::cache::SqliteCache;
use crate::registry::clients::{CheckoClient, DadataClient, NalogClient};
use crate::registry::error::QueryError;
use crate::registry::reference::ReferenceData;
use crate::registry::sections::{
    parse_bankruptcy, parse_checks, parse_connections, parse_courts, parse_debts, parse_finance,
    parse_tenders, RisksSection, Section, SectionData, SelfEmployedStatus,
};
use crate::registry::Source;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Entity classification derived from the identifier shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Legal entity: 10-digit INN or 13-digit OGRN
    Legal,
    /// Sole proprietor / individual: 12-digit INN or 15-digit OGRNIP
    Individual,
}

/// Normalized lookup request. Immutable once parsed; its string form is the
/// cache and deduplication key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    id: String,
    kind: EntityKind,
    branch_type: Option<String>,
}

impl Query {
    /// Parses a raw digit string into a query.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the input is not a plausible registry
    /// identifier — a programmer error at this boundary, since user input
    /// is validated before it gets here.
    pub fn parse(raw: &str) -> Result<Self, QueryError> {
        let id = raw.trim();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(QueryError::NotDigits);
        }
        let kind = match id.len() {
            10 | 13 => EntityKind::Legal,
            12 | 15 => EntityKind::Individual,
            n => return Err(QueryError::BadLength(n)),
        };
        Ok(Self {
            id: id.to_string(),
            kind,
            branch_type: None,
        })
    }

    /// Restricts the secondary-source lookup to a branch type
    #[must_use]
    pub fn with_branch_type(mut self, branch_type: impl Into<String>) -> Self {
        self.branch_type = Some(branch_type.into());
        self
    }

    /// The normalized identifier
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Entity classification
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    fn cache_key(&self) -> String {
        card_cache_key(&self.id, self.branch_type.as_deref())
    }
}

fn card_cache_key(id: &str, branch_type: Option<&str>) -> String {
    format!("card|{id}|{}", branch_type.unwrap_or(""))
}

/// Raw normalized payload from one upstream source for one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Which upstream produced this record
    pub source: Source,
    /// When it was fetched
    pub fetched_at: DateTime<Utc>,
    /// Flat field map (scalars only)
    pub fields: Map<String, Value>,
}

/// One merged field together with the source that supplied it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcedValue {
    /// The field value
    pub value: Value,
    /// Provenance for tie-break auditability
    pub source: Source,
}

/// The synthesis of all source records for one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedCard {
    /// The identifier the caller asked about
    pub query: String,
    /// Canonical INN resolved from the responses (falls back to the query)
    pub inn: String,
    /// Entity classification
    pub kind: EntityKind,
    /// Merged fields with per-field provenance
    pub fields: BTreeMap<String, SourcedValue>,
    /// OKVED display name, when reference data knows the code
    pub okved_name: Option<String>,
    /// When the card was assembled
    pub fetched_at: DateTime<Utc>,
}

impl MergedCard {
    /// Raw value of a merged field
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).map(|f| &f.value)
    }

    /// String value of a merged field
    #[must_use]
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }

    /// Which source supplied a merged field
    #[must_use]
    pub fn provenance(&self, name: &str) -> Option<Source> {
        self.fields.get(name).map(|f| f.source)
    }
}

/// Orchestrates the upstream clients, the cache and the merge policy
pub struct Aggregator {
    checko: CheckoClient,
    dadata: DadataClient,
    nalog: NalogClient,
    cache: SqliteCache,
    reference: ReferenceData,
}

impl Aggregator {
    /// Assembles the aggregator from its owned components. Constructed once
    /// at process start and shared behind an `Arc`.
    #[must_use]
    pub fn new(
        checko: CheckoClient,
        dadata: DadataClient,
        nalog: NalogClient,
        cache: SqliteCache,
        reference: ReferenceData,
    ) -> Self {
        Self {
            checko,
            dadata,
            nalog,
            cache,
            reference,
        }
    }

    /// Handle to the durable cache (for the background cleanup sweep)
    #[must_use]
    pub fn cache(&self) -> &SqliteCache {
        &self.cache
    }

    /// Resolves a query into a merged card.
    ///
    /// Cache hit is the dominant path and makes no upstream calls. On a
    /// miss both sources are queried concurrently; either one alone is
    /// enough to produce a card. `None` means genuinely "not found or all
    /// sources unavailable" — never an error, and never cached.
    pub async fn get_card(&self, query: &Query) -> Option<MergedCard> {
        let cache_key = query.cache_key();
        match self.cache.get::<MergedCard>(&cache_key).await {
            Ok(Some(card)) => {
                debug!("cache hit for card {}", query.id());
                return Some(card);
            }
            Ok(None) => {}
            Err(e) => warn!("cache read failed for {cache_key}: {e}"),
        }

        let checko_raw = async {
            match query.kind() {
                EntityKind::Legal => self.checko.company(query.id()).await,
                EntityKind::Individual => self.checko.entrepreneur(query.id()).await,
            }
        };
        let dadata_raw = self
            .dadata
            .find_party(query.id(), query.branch_type.as_deref());
        let (checko_raw, dadata_raw) = tokio::join!(checko_raw, dadata_raw);

        if checko_raw.is_none() && dadata_raw.is_none() {
            debug!("no source returned data for {}", query.id());
            return None;
        }

        let fetched_at = Utc::now();
        let primary = checko_raw.map(|v| SourceRecord {
            source: Source::Checko,
            fetched_at,
            fields: normalize_checko(&v),
        });
        let secondary = dadata_raw.map(|v| SourceRecord {
            source: Source::Dadata,
            fetched_at,
            fields: normalize_dadata(&v),
        });
        let fields = merge_sources(primary.as_ref(), secondary.as_ref());

        let inn = fields
            .get("inn")
            .and_then(|f| f.value.as_str())
            .unwrap_or(query.id())
            .to_string();

        let okved_name = match fields.get("okved").and_then(|f| f.value.as_str()) {
            Some(code) => self.reference.okved_name(code).await,
            None => None,
        };

        let card = MergedCard {
            query: query.id().to_string(),
            inn,
            kind: query.kind(),
            fields,
            okved_name,
            fetched_at,
        };

        let ttl = Duration::from_secs(TTL_CARD_SECS);
        if let Err(e) = self.cache.set(&cache_key, &card, ttl).await {
            warn!("cache write failed for {cache_key}: {e}");
        }
        // Secondary slot: section callbacks come back keyed by the resolved
        // INN, which may differ from the original query (OGRN lookups)
        let resolved_key = card_cache_key(&card.inn, query.branch_type.as_deref());
        if resolved_key != cache_key {
            if let Err(e) = self.cache.set(&resolved_key, &card, ttl).await {
                warn!("cache write failed for {resolved_key}: {e}");
            }
        }

        Some(card)
    }

    /// Fetches one lazy section for an already-resolved INN.
    ///
    /// `None` means the upstream was unavailable; an empty section means the
    /// upstream answered and there is nothing to show. Only the latter is
    /// cached.
    pub async fn get_section(&self, inn: &str, section: Section) -> Option<SectionData> {
        let cache_key = format!("section|{}|{inn}", section.as_str());
        match self.cache.get::<SectionData>(&cache_key).await {
            Ok(Some(data)) => return Some(data),
            Ok(None) => {}
            Err(e) => warn!("cache read failed for {cache_key}: {e}"),
        }

        let data = match section {
            Section::Courts => self
                .checko
                .arbitrage(inn)
                .await
                .map(|raw| SectionData::Courts(parse_courts(&raw))),
            Section::Debts => self
                .checko
                .fssp(inn)
                .await
                .map(|raw| SectionData::Debts(parse_debts(&raw))),
            Section::Checks => self
                .checko
                .inspections(inn)
                .await
                .map(|raw| SectionData::Checks(parse_checks(&raw))),
            Section::Bankruptcy => self
                .checko
                .company(inn)
                .await
                .map(|raw| SectionData::Bankruptcy(parse_bankruptcy(&raw))),
            Section::Tenders => self
                .checko
                .contracts(inn)
                .await
                .map(|raw| SectionData::Tenders(parse_tenders(&raw))),
            Section::Finance => self
                .checko
                .finances(inn)
                .await
                .map(|raw| SectionData::Finance(parse_finance(&raw))),
            Section::Connections => self
                .checko
                .company(inn)
                .await
                .map(|raw| SectionData::Connections(parse_connections(&raw))),
            Section::Risks => self.risks_from_card(inn).await,
        }?;

        let ttl = match section {
            Section::Finance => Duration::from_secs(TTL_FINANCE_SECS),
            _ => Duration::from_secs(TTL_SECTION_SECS),
        };
        if let Err(e) = self.cache.set(&cache_key, &data, ttl).await {
            warn!("cache write failed for {cache_key}: {e}");
        }
        Some(data)
    }

    /// Checks self-employment status for a 12-digit INN, cached like a
    /// section
    pub async fn check_selfemployed(&self, inn: &str) -> Option<SelfEmployedStatus> {
        let cache_key = format!("selfemployed|{inn}");
        match self.cache.get::<SelfEmployedStatus>(&cache_key).await {
            Ok(Some(status)) => return Some(status),
            Ok(None) => {}
            Err(e) => warn!("cache read failed for {cache_key}: {e}"),
        }

        let raw = self.nalog.check_selfemployed(inn, None).await?;
        let status = SelfEmployedStatus {
            registered: raw.get("status").and_then(Value::as_bool).unwrap_or(false),
            message: raw
                .get("message")
                .and_then(Value::as_str)
                .map(ToString::to_string),
        };
        if let Err(e) = self
            .cache
            .set(&cache_key, &status, Duration::from_secs(TTL_SECTION_SECS))
            .await
        {
            warn!("cache write failed for {cache_key}: {e}");
        }
        Some(status)
    }

    /// Risk flags derive from the merged card rather than a dedicated
    /// endpoint
    async fn risks_from_card(&self, inn: &str) -> Option<SectionData> {
        let query = Query::parse(inn).ok()?;
        let card = self.get_card(&query).await?;
        let state_status = card
            .field_str("status")
            .map(ToString::to_string)
            .or_else(|| card.field_str("state_status").map(ToString::to_string));
        Some(SectionData::Risks(RisksSection { state_status }))
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(
        value,
        Value::String(_) | Value::Number(_) | Value::Bool(_)
    )
}

/// Checko payloads are already flat where it matters: keep the scalars
fn normalize_checko(raw: &Value) -> Map<String, Value> {
    raw.as_object()
        .map(|obj| {
            obj.iter()
                .filter(|(_, v)| is_scalar(v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default()
}

/// DaData nests everything under `data`; flatten the scalars and lift the
/// handful of nested fields the card renders
fn normalize_dadata(suggestion: &Value) -> Map<String, Value> {
    let mut fields: Map<String, Value> = suggestion
        .get("data")
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter(|(_, v)| is_scalar(v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default();

    let lifted = [
        ("name", &["/data/name/short_with_opf", "/value"][..]),
        ("status", &["/data/state/status"][..]),
        ("address", &["/data/address/value"][..]),
        ("management", &["/data/management/name"][..]),
        ("okved", &["/data/okved"][..]),
    ];
    for (field, pointers) in lifted {
        if fields.contains_key(field) {
            continue;
        }
        if let Some(value) = pointers
            .iter()
            .find_map(|p| suggestion.pointer(p))
            .filter(|v| is_scalar(v))
        {
            fields.insert(field.to_string(), value.clone());
        }
    }
    fields
}

/// Later-priority source fields fill gaps; the primary source wins on
/// conflict
fn merge_sources(
    primary: Option<&SourceRecord>,
    secondary: Option<&SourceRecord>,
) -> BTreeMap<String, SourcedValue> {
    let mut merged = BTreeMap::new();
    for record in [secondary, primary].into_iter().flatten() {
        for (key, value) in &record.fields {
            merged.insert(
                key.clone(),
                SourcedValue {
                    value: value.clone(),
                    source: record.source,
                },
            );
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_classification_by_length() {
        assert_eq!(
            Query::parse("7707083893").map(|q| q.kind()),
            Ok(EntityKind::Legal)
        );
        assert_eq!(
            Query::parse("500100732259").map(|q| q.kind()),
            Ok(EntityKind::Individual)
        );
        assert_eq!(
            Query::parse("1027700132195").map(|q| q.kind()),
            Ok(EntityKind::Legal)
        );
        assert_eq!(
            Query::parse("315774600002662").map(|q| q.kind()),
            Ok(EntityKind::Individual)
        );
    }

    #[test]
    fn test_query_rejects_garbage() {
        assert_eq!(Query::parse("77070abc93"), Err(QueryError::NotDigits));
        assert_eq!(Query::parse(""), Err(QueryError::NotDigits));
        assert_eq!(Query::parse("12345"), Err(QueryError::BadLength(5)));
    }

    #[test]
    fn test_cache_key_includes_filters() {
        let plain = Query::parse("7707083893").expect("valid query");
        let filtered = Query::parse("7707083893")
            .expect("valid query")
            .with_branch_type("MAIN");
        assert_ne!(plain.cache_key(), filtered.cache_key());
        assert_eq!(plain.cache_key(), "card|7707083893|");
    }

    #[test]
    fn test_merge_primary_wins_on_conflict() {
        let now = Utc::now();
        let primary = SourceRecord {
            source: Source::Checko,
            fetched_at: now,
            fields: normalize_checko(&json!({"inn": "7707083893", "name": "Foo"})),
        };
        let secondary = SourceRecord {
            source: Source::Dadata,
            fetched_at: now,
            fields: normalize_dadata(&json!({
                "value": "Bar",
                "data": {"inn": "7707083893", "okved": "62.01"}
            })),
        };
        let merged = merge_sources(Some(&primary), Some(&secondary));

        assert_eq!(merged["name"].value, json!("Foo"));
        assert_eq!(merged["name"].source, Source::Checko);
        // The gap left by the primary source is filled from the secondary
        assert_eq!(merged["okved"].value, json!("62.01"));
        assert_eq!(merged["okved"].source, Source::Dadata);
    }

    #[test]
    fn test_normalize_dadata_lifts_nested_fields() {
        let suggestion = json!({
            "value": "ПАО СБЕРБАНК",
            "data": {
                "inn": "7707083893",
                "ogrn": "1027700132195",
                "name": {"short_with_opf": "ПАО Сбербанк"},
                "state": {"status": "ACTIVE"},
                "address": {"value": "г Москва, ул Вавилова, д 19"},
                "management": {"name": "Греф Герман Оскарович"}
            }
        });
        let fields = normalize_dadata(&suggestion);
        assert_eq!(fields["name"], json!("ПАО Сбербанк"));
        assert_eq!(fields["status"], json!("ACTIVE"));
        assert_eq!(fields["address"], json!("г Москва, ул Вавилова, д 19"));
        assert_eq!(fields["management"], json!("Греф Герман Оскарович"));
        assert_eq!(fields["inn"], json!("7707083893"));
        // Nested objects themselves never leak into the flat map
        assert!(fields.values().all(|v| !v.is_object()));
    }

    #[test]
    fn test_normalize_dadata_falls_back_to_value_for_name() {
        let suggestion = json!({
            "value": "ИП Иванов",
            "data": {"inn": "500100732259"}
        });
        let fields = normalize_dadata(&suggestion);
        assert_eq!(fields["name"], json!("ИП Иванов"));
    }

    #[test]
    fn test_merged_card_round_trips_through_json() {
        let now = Utc::now();
        let primary = SourceRecord {
            source: Source::Checko,
            fetched_at: now,
            fields: normalize_checko(&json!({"inn": "7707083893", "name": "Foo"})),
        };
        let card = MergedCard {
            query: "7707083893".to_string(),
            inn: "7707083893".to_string(),
            kind: EntityKind::Legal,
            fields: merge_sources(Some(&primary), None),
            okved_name: None,
            fetched_at: now,
        };
        let text = serde_json::to_string(&card).expect("serialize card");
        let back: MergedCard = serde_json::from_str(&text).expect("deserialize card");
        assert_eq!(card, back);
    }
}
