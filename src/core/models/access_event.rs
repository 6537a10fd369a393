use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, Locale, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde_json::Value;

use crate::core::models::collection::Snapshot;

static TIMESTAMP_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{8}_\d{6}$").expect("static pattern is valid"));

/// Long date-time layout shown to operators.
const DISPLAY_FORMAT: &str = "%d de %B de %Y às %H:%M:%S";

/// Key of an access event: `YYYYMMDD_HHMMSS` in UTC.
///
/// The layout is fixed-width with the most significant field first, so
/// comparing keys as strings orders them chronologically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimestampKey(String);

impl TimestampKey {
    /// Accept a key only if it has the `YYYYMMDD_HHMMSS` shape.
    pub fn parse(raw: &str) -> Option<Self> {
        TIMESTAMP_KEY
            .is_match(raw)
            .then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The UTC instant this key names, if the digits form a real date.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(&self.0, "%Y%m%d_%H%M%S")
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive))
    }

    /// Render for operators in the given display offset.
    ///
    /// Keys that do not decode (e.g. month 13) are shown verbatim.
    pub fn display(&self, offset: FixedOffset) -> String {
        match self.instant() {
            Some(instant) => instant
                .with_timezone(&offset)
                .format_localized(DISPLAY_FORMAT, Locale::pt_BR)
                .to_string(),
            None => self.0.clone(),
        }
    }
}

impl std::fmt::Display for TimestampKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the badge reader decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Granted,
    Denied,
    Unrecognized,
    Other(String),
}

impl Outcome {
    /// Map the reader's `status` string.
    pub fn from_status(status: &str) -> Self {
        match status {
            "autorizado" => Outcome::Granted,
            "negado" => Outcome::Denied,
            "nao_encontrado" => Outcome::Unrecognized,
            other => Outcome::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Outcome::Granted => "granted",
            Outcome::Denied => "denied",
            Outcome::Unrecognized => "unrecognized",
            Outcome::Other(status) => status,
        }
    }
}

/// One access attempt recorded by the badge reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessEvent {
    pub timestamp_key: TimestampKey,
    pub card_id: String,
    pub outcome: Outcome,
}

impl AccessEvent {
    /// Decode one `registros/{key}` entry.
    ///
    /// A missing `uid` decodes as an empty card id, which never matches a
    /// student. Returns `None` for malformed keys or non-object payloads.
    pub fn from_entry(key: &str, value: &Value) -> Option<Self> {
        let timestamp_key = TimestampKey::parse(key)?;
        let fields = value.as_object()?;
        let card_id = match fields.get("uid") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        let status = fields.get("status").and_then(Value::as_str).unwrap_or("");
        Some(Self {
            timestamp_key,
            card_id,
            outcome: Outcome::from_status(status),
        })
    }
}

/// Decode a `registros` snapshot in key order, skipping malformed entries.
pub fn decode_events(entries: &Snapshot) -> Vec<AccessEvent> {
    entries
        .iter()
        .filter_map(|(key, value)| {
            let event = AccessEvent::from_entry(key, value);
            if event.is_none() {
                tracing::warn!(key = %key, "skipping malformed access event");
            }
            event
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn brt() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).unwrap()
    }

    #[test]
    fn timestamp_key_requires_fixed_layout() {
        assert!(TimestampKey::parse("20240101_080000").is_some());
        assert!(TimestampKey::parse("2024011_080000").is_none());
        assert!(TimestampKey::parse("20240101-080000").is_none());
        assert!(TimestampKey::parse("20240101_0800001").is_none());
    }

    #[test]
    fn string_order_matches_instant_order() {
        let a = TimestampKey::parse("20231231_235959").unwrap();
        let b = TimestampKey::parse("20240101_000000").unwrap();
        assert!(a < b);
        assert!(a.instant().unwrap() < b.instant().unwrap());
    }

    #[test]
    fn display_converts_from_utc() {
        let key = TimestampKey::parse("20240101_020000").unwrap();
        // 02:00 UTC is 23:00 of the previous day at -03:00.
        assert_eq!(key.display(brt()), "31 de dezembro de 2023 às 23:00:00");
    }

    #[test]
    fn display_uses_portuguese_month_names() {
        let key = TimestampKey::parse("20241019_150507").unwrap();
        assert_eq!(key.display(brt()), "19 de outubro de 2024 às 12:05:07");
    }

    #[test]
    fn impossible_dates_render_verbatim() {
        let key = TimestampKey::parse("20241399_250000").unwrap();
        assert!(key.instant().is_none());
        assert_eq!(key.display(brt()), "20241399_250000");
    }

    #[test]
    fn outcome_maps_reader_statuses() {
        assert_eq!(Outcome::from_status("autorizado"), Outcome::Granted);
        assert_eq!(Outcome::from_status("negado"), Outcome::Denied);
        assert_eq!(Outcome::from_status("nao_encontrado"), Outcome::Unrecognized);
        assert_eq!(
            Outcome::from_status("porta_aberta"),
            Outcome::Other("porta_aberta".into())
        );
        assert_eq!(Outcome::Other("porta_aberta".into()).label(), "porta_aberta");
    }

    #[test]
    fn decode_skips_bad_keys_and_keeps_order() {
        let mut snap = Snapshot::new();
        snap.insert("20240101_090000".into(), json!({"uid": "C2", "status": "autorizado"}));
        snap.insert("20240101_080000".into(), json!({"uid": "C1", "status": "negado"}));
        snap.insert("garbage".into(), json!({"uid": "C3", "status": "negado"}));
        snap.insert("20240101_100000".into(), json!(42));

        let events = decode_events(&snap);
        let keys: Vec<_> = events.iter().map(|e| e.timestamp_key.as_str()).collect();
        assert_eq!(keys, vec!["20240101_080000", "20240101_090000"]);
        assert_eq!(events[0].outcome, Outcome::Denied);
    }

    #[test]
    fn missing_uid_decodes_as_empty_card() {
        let event = AccessEvent::from_entry("20240101_080000", &json!({"status": "nao_encontrado"}))
            .unwrap();
        assert_eq!(event.card_id, "");
        assert_eq!(event.outcome, Outcome::Unrecognized);
    }
}
