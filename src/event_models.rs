use chrono::{DateTime, Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::models::{Outcome, Reconciliation};
use crate::validation::is_valid_email;

/// Inbound payload on `/v1/identify` - can be single object or array
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    Single(IdentifyEvent),
    Batch(Vec<IdentifyEvent>),
}

impl EventPayload {
    /// Convert to a vec of events for uniform processing
    pub fn into_events(self) -> Vec<IdentifyEvent> {
        match self {
            EventPayload::Single(event) => vec![event],
            EventPayload::Batch(events) => events,
        }
    }
}

/// A user-profile message from the upstream event pipeline.
///
/// Traits are kept as a loose JSON bag. The accessor methods resolve them the
/// way the pipeline's own facade does: keys match regardless of case and
/// separators (`first_name`, `firstName`), blank strings count as missing, and
/// several traits fall back to an alias when the primary key is absent.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyEvent {
    /// Message type (`identify`, `track`, ...).
    #[serde(rename = "type", default = "default_event_type")]
    pub event_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_id: Option<String>,

    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub anonymous_id: Option<String>,

    /// Source channel (`server`, `client`, `mobile`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// ISO 8601 time the event happened, kept raw and parsed on demand.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    #[serde(default)]
    pub traits: Map<String, Value>,
}

fn default_event_type() -> String {
    "identify".to_string()
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

impl IdentifyEvent {
    /// Builds an identify event from a trait bag, mostly for tests and tooling.
    pub fn with_traits(traits: Value) -> Self {
        Self {
            event_type: default_event_type(),
            traits: match traits {
                Value::Object(map) => map,
                _ => Map::new(),
            },
            ..Default::default()
        }
    }

    pub fn is_identify(&self) -> bool {
        self.event_type.eq_ignore_ascii_case("identify")
    }

    /// Email trait, falling back to a `userId` that is itself an email.
    pub fn email(&self) -> Option<String> {
        self.text(&["email"]).or_else(|| {
            self.user_id
                .as_deref()
                .map(str::trim)
                .filter(|id| is_valid_email(id))
                .map(str::to_string)
        })
    }

    pub fn name(&self) -> Option<String> {
        self.text(&["name"])
    }

    pub fn first_name(&self) -> Option<String> {
        self.text(&["firstName"]).or_else(|| {
            self.name()
                .and_then(|name| name.split_whitespace().next().map(str::to_string))
        })
    }

    pub fn last_name(&self) -> Option<String> {
        self.text(&["lastName"]).or_else(|| {
            self.name().and_then(|name| {
                name.split_once(char::is_whitespace)
                    .map(|(_, rest)| rest.trim().to_string())
                    .filter(|rest| !rest.is_empty())
            })
        })
    }

    pub fn gender(&self) -> Option<String> {
        self.text(&["gender"])
    }

    /// Age in whole years: the `age` trait, else derived from `birthday` as of the
    /// event timestamp. Never reads the wall clock.
    pub fn age(&self) -> Option<u32> {
        match self.trait_value("age") {
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
                .and_then(|age| u32::try_from(age).ok()),
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().parse().ok(),
            _ => self.age_from_birthday(),
        }
    }

    fn age_from_birthday(&self) -> Option<u32> {
        let birthday = self.text(&["birthday"]).and_then(|s| parse_date(&s))?;
        let as_of = self.timestamp.as_deref().and_then(parse_date)?;

        let mut years = as_of.year() - birthday.year();
        if (as_of.month(), as_of.day()) < (birthday.month(), birthday.day()) {
            years -= 1;
        }
        u32::try_from(years).ok()
    }

    pub fn avatar(&self) -> Option<String> {
        self.text(&["avatar", "photoUrl", "avatarUrl"])
    }

    pub fn position(&self) -> Option<String> {
        self.text(&["position", "jobTitle"])
    }

    pub fn description(&self) -> Option<String> {
        self.text(&["description", "background"])
    }

    pub fn organization(&self) -> Option<String> {
        self.text(&["organization"])
    }

    /// Company trait; either a plain name or an object carrying `name`.
    pub fn company(&self) -> Option<String> {
        match self.trait_value("company") {
            Some(Value::Object(company)) => lookup(company, "name").and_then(value_text),
            Some(other) => value_text(other),
            None => None,
        }
    }

    pub fn street(&self) -> Option<String> {
        self.address_text(&["street"])
    }

    pub fn city(&self) -> Option<String> {
        self.address_text(&["city"])
    }

    pub fn state(&self) -> Option<String> {
        self.address_text(&["state"])
    }

    pub fn zip(&self) -> Option<String> {
        self.address_text(&["zip", "postalCode"])
    }

    pub fn country(&self) -> Option<String> {
        self.address_text(&["country"])
    }

    /// Arbitrary `location` trait, passed through unless null or blank.
    pub fn location(&self) -> Option<Value> {
        match self.trait_value("location")? {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            other => Some(other.clone()),
        }
    }

    /// Raw website entries: the `websites` list, else a single `website`.
    pub fn websites(&self) -> Vec<&Value> {
        self.list("websites", "website")
    }

    /// Raw phone entries: the `phones` list, else a single `phone`.
    pub fn phones(&self) -> Vec<&Value> {
        self.list("phones", "phone")
    }

    /// Looks a trait up by key, exact match first, then ignoring case and separators.
    pub fn trait_value(&self, key: &str) -> Option<&Value> {
        lookup(&self.traits, key)
    }

    fn text(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .find_map(|key| self.trait_value(key).and_then(value_text))
    }

    fn address_text(&self, keys: &[&str]) -> Option<String> {
        self.text(keys).or_else(|| match self.trait_value("address") {
            Some(Value::Object(address)) => keys
                .iter()
                .find_map(|key| lookup(address, key).and_then(value_text)),
            _ => None,
        })
    }

    fn list(&self, plural: &str, singular: &str) -> Vec<&Value> {
        match self.trait_value(plural) {
            Some(Value::Array(items)) => items.iter().filter(|v| !v.is_null()).collect(),
            Some(Value::Null) | None => self
                .trait_value(singular)
                .filter(|v| !v.is_null())
                .into_iter()
                .collect(),
            Some(single) => vec![single],
        }
    }
}

/// Exact key first, then the first key equal after normalization.
pub(crate) fn lookup<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    if let Some(value) = map.get(key) {
        return Some(value);
    }
    let wanted = normalize_key(key);
    map.iter()
        .find(|(k, _)| normalize_key(k) == wanted)
        .map(|(_, v)| v)
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, '_' | '-' | '.' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Text view of a scalar trait; blank strings are treated as missing.
pub(crate) fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

/// Per-event result in a batch response
#[derive(Debug, Clone, Serialize)]
pub struct EventResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub status: EventStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Created,
    Updated,
    Ignored,
    Failed,
}

impl EventResult {
    pub fn reconciled(message_id: Option<String>, reconciliation: &Reconciliation) -> Self {
        Self {
            message_id,
            status: match reconciliation.outcome {
                Outcome::Created => EventStatus::Created,
                Outcome::Updated => EventStatus::Updated,
            },
            customer_id: Some(reconciliation.customer.id.clone()),
            error: None,
        }
    }

    pub fn ignored(message_id: Option<String>) -> Self {
        Self {
            message_id,
            status: EventStatus::Ignored,
            customer_id: None,
            error: None,
        }
    }

    pub fn failed(message_id: Option<String>, error: String) -> Self {
        Self {
            message_id,
            status: EventStatus::Failed,
            customer_id: None,
            error: Some(error),
        }
    }
}

/// Response sent back for a batch of events
#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub received: usize,
    pub created: usize,
    pub updated: usize,
    pub ignored: usize,
    pub failed: usize,
    pub results: Vec<EventResult>,
}

impl SyncResponse {
    pub fn from_results(results: Vec<EventResult>) -> Self {
        let count = |status: EventStatus| results.iter().filter(|r| r.status == status).count();
        Self {
            received: results.len(),
            created: count(EventStatus::Created),
            updated: count(EventStatus::Updated),
            ignored: count(EventStatus::Ignored),
            failed: count(EventStatus::Failed),
            results,
        }
    }
}
