use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ============ Outbound Payload ============

/// Customer record in Help Scout's schema, built fresh for every reconciliation.
///
/// Every optional field is an explicit `Option`; unset fields are dropped at
/// serialization time, so Help Scout never sees a `null` placeholder and leaves
/// the stored value untouched on update. `websites` is always emitted (an empty
/// list is meaningful), `phones` is dropped when there are none.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub emails: Vec<ContactEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default)]
    pub websites: Vec<ContactEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phones: Option<Vec<ContactEntry>>,
}

/// A `{value, location?}` entry, used for emails, websites and phones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactEntry {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ContactEntry {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            location: None,
        }
    }
}

/// Postal address. Only ever built when all parts are known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub lines: Vec<String>,
}

// ============ Remote Records ============

/// A customer as stored by Help Scout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCustomer {
    /// Opaque Help Scout id (numeric on the wire, kept as text).
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "text_or_none")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "text_or_none")]
    pub last_name: Option<String>,
    /// `null` or a non-list reads as empty; entries without a text `value` are skipped.
    #[serde(default, deserialize_with = "lenient_contacts")]
    pub emails: Vec<ContactEntry>,

    /// Remaining fields as returned by Help Scout
    #[serde(flatten)]
    pub raw: Map<String, Value>,
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "customer id must be a string or number, got {}",
            other
        ))),
    }
}

fn text_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_contacts<'de, D>(deserializer: D) -> Result<Vec<ContactEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = match Value::deserialize(deserializer)? {
        Value::Array(entries) => entries,
        _ => return Ok(Vec::new()),
    };

    Ok(entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value::<ContactEntry>(entry).ok())
        .collect())
}

/// `GET /customers.json` response body.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemsEnvelope {
    #[serde(default)]
    pub items: Option<Vec<RemoteCustomer>>,
}

/// Create/update response body with `reload=true`.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemEnvelope {
    pub item: RemoteCustomer,
}

// ============ Reconciliation Result ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Created,
    Updated,
}

/// Terminal success state of a reconciliation.
#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub outcome: Outcome,
    pub customer: RemoteCustomer,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unset_fields_are_omitted() {
        let payload = CustomerPayload {
            first_name: Some("Cal".into()),
            emails: vec![ContactEntry::new("a@x.com")],
            ..Default::default()
        };

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "firstName": "Cal",
                "emails": [{ "value": "a@x.com" }],
                "websites": []
            })
        );
    }

    #[test]
    fn test_remote_customer_numeric_id() {
        let customer: RemoteCustomer = serde_json::from_value(json!({
            "id": 42,
            "firstName": "Calvin",
            "emails": [{ "id": 7, "value": "calvin@segment.io", "location": "work" }],
            "organization": "Segment"
        }))
        .unwrap();

        assert_eq!(customer.id, "42");
        assert_eq!(customer.emails[0].value, "calvin@segment.io");
        assert_eq!(customer.raw.get("organization"), Some(&json!("Segment")));
    }

    #[test]
    fn test_remote_customer_tolerates_odd_side_fields() {
        let customer: RemoteCustomer = serde_json::from_value(json!({
            "id": 42,
            "firstName": null,
            "lastName": 7,
            "emails": null
        }))
        .unwrap();
        assert_eq!(customer.id, "42");
        assert!(customer.first_name.is_none());
        assert!(customer.last_name.is_none());
        assert!(customer.emails.is_empty());

        let customer: RemoteCustomer = serde_json::from_value(json!({
            "id": "43",
            "emails": ["bare@x.com", { "value": "b@x.com" }, { "value": null }, { "id": 3 }]
        }))
        .unwrap();
        assert_eq!(customer.emails, vec![ContactEntry::new("b@x.com")]);
    }

    #[test]
    fn test_items_envelope_missing_items() {
        let envelope: ItemsEnvelope = serde_json::from_value(json!({ "page": 1 })).unwrap();
        assert!(envelope.items.is_none());
    }
}
