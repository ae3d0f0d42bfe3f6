//! Maps identify events onto Help Scout's customer schema.
//!
//! http://developer.helpscout.net/customers/update/

use serde_json::Value;

use crate::event_models::{lookup, value_text, IdentifyEvent};
use crate::models::{Address, ContactEntry, CustomerPayload};

/// Location Help Scout stores for a phone that did not name one.
pub const DEFAULT_PHONE_LOCATION: &str = "mobile";

/// Build the customer payload for an identify event.
///
/// Pure: no I/O, no clock, same input gives the same payload. Missing optional
/// traits are left unset rather than rejected; email presence is checked before
/// an event gets here.
pub fn map_identify(event: &IdentifyEvent) -> CustomerPayload {
    CustomerPayload {
        gender: event.gender(),
        age: event.age(),
        location: event.location(),
        photo_url: event.avatar(),
        first_name: event.first_name(),
        last_name: event.last_name(),
        emails: vec![ContactEntry::new(event.email().unwrap_or_default())],
        organization: event.organization().or_else(|| event.company()),
        job_title: event.position(),
        background: event.description(),
        address: format_address(event),
        websites: event
            .websites()
            .into_iter()
            .filter_map(|entry| format_entry(entry, &["value", "url"]))
            .collect(),
        phones: format_phones(event),
    }
}

/// All five parts or nothing.
fn format_address(event: &IdentifyEvent) -> Option<Address> {
    let street = event.street()?;
    let city = event.city()?;
    let state = event.state()?;
    let postal_code = event.zip()?;
    let country = event.country()?;

    Some(Address {
        city,
        state,
        postal_code,
        country,
        lines: vec![street],
    })
}

fn format_phones(event: &IdentifyEvent) -> Option<Vec<ContactEntry>> {
    let phones: Vec<ContactEntry> = event
        .phones()
        .into_iter()
        .filter_map(|entry| format_entry(entry, &["value", "number", "phone"]))
        .map(|mut phone| {
            phone
                .location
                .get_or_insert_with(|| DEFAULT_PHONE_LOCATION.to_string());
            phone
        })
        .collect();

    if phones.is_empty() {
        return None;
    }
    Some(phones)
}

/// Wraps a raw list entry as `{value}`. Object entries may carry their own
/// value under one of `value_keys` and a `location` (or `type`).
fn format_entry(entry: &Value, value_keys: &[&str]) -> Option<ContactEntry> {
    match entry {
        Value::Object(fields) => {
            let value = value_keys
                .iter()
                .find_map(|key| lookup(fields, key).and_then(value_text))?;
            let location = lookup(fields, "location")
                .or_else(|| lookup(fields, "type"))
                .and_then(value_text);
            Some(ContactEntry { value, location })
        }
        other => value_text(other).map(ContactEntry::new),
    }
}
