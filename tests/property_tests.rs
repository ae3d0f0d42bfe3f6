/// Property-based tests using proptest
/// Tests invariants of the identify mapper that should hold for all inputs
use proptest::prelude::*;
use rust_helpscout_sync::event_models::IdentifyEvent;
use rust_helpscout_sync::mapper::map_identify;
use serde_json::{json, Map, Value};

fn optional_text() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some(String::new())),
        Just(Some("   ".to_string())),
        "[a-zA-Z0-9 .@-]{1,20}".prop_map(Some),
    ]
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).map_or(true, str::is_empty)
}

fn traits_from(fields: &[(&str, &Option<String>)]) -> Value {
    let mut traits = Map::new();
    traits.insert("email".to_string(), json!("prop@x.com"));
    for (key, value) in fields {
        if let Some(value) = value {
            traits.insert(key.to_string(), json!(value));
        }
    }
    Value::Object(traits)
}

// Property: mapping is pure and deterministic
proptest! {
    #[test]
    fn mapping_is_deterministic(
        first in optional_text(),
        last in optional_text(),
        company in optional_text(),
        phone in optional_text(),
        website in optional_text(),
    ) {
        let traits = traits_from(&[
            ("firstName", &first),
            ("lastName", &last),
            ("company", &company),
            ("phone", &phone),
            ("website", &website),
        ]);
        let event = IdentifyEvent::with_traits(traits);

        let once = serde_json::to_vec(&map_identify(&event)).unwrap();
        let twice = serde_json::to_vec(&map_identify(&event)).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn mapping_never_panics(key in "\\PC{1,12}", value in "\\PC*") {
        let event = IdentifyEvent::with_traits(json!({ key: value }));
        let _ = map_identify(&event);
    }
}

// Property: address is present iff all five parts are non-blank
proptest! {
    #[test]
    fn address_all_or_nothing(
        street in optional_text(),
        city in optional_text(),
        state in optional_text(),
        zip in optional_text(),
        country in optional_text(),
    ) {
        let traits = traits_from(&[
            ("street", &street),
            ("city", &city),
            ("state", &state),
            ("zip", &zip),
            ("country", &country),
        ]);
        let payload = map_identify(&IdentifyEvent::with_traits(traits));

        let complete = [&street, &city, &state, &zip, &country]
            .iter()
            .all(|part| !is_blank(part));
        prop_assert_eq!(payload.address.is_some(), complete);

        if let Some(address) = payload.address {
            prop_assert_eq!(address.lines.len(), 1);
            prop_assert_eq!(Some(address.lines[0].clone()), street.map(|s| s.trim().to_string()));
        }
    }
}

// Property: omission and list rules
proptest! {
    #[test]
    fn blank_optionals_never_serialized(
        first in optional_text(),
        gender in optional_text(),
        title in optional_text(),
    ) {
        let traits = traits_from(&[
            ("firstName", &first),
            ("gender", &gender),
            ("jobTitle", &title),
        ]);
        let value = serde_json::to_value(map_identify(&IdentifyEvent::with_traits(traits))).unwrap();
        let object = value.as_object().unwrap();

        prop_assert_eq!(object.contains_key("firstName"), !is_blank(&first));
        prop_assert_eq!(object.contains_key("gender"), !is_blank(&gender));
        prop_assert_eq!(object.contains_key("jobTitle"), !is_blank(&title));
        prop_assert!(object.values().all(|v| !v.is_null()));
    }

    #[test]
    fn phones_default_to_mobile(phones in prop::collection::vec("[0-9-]{3,12}", 0..5)) {
        let event = IdentifyEvent::with_traits(json!({ "email": "prop@x.com", "phones": phones }));
        let payload = map_identify(&event);

        match payload.phones {
            None => prop_assert!(phones.is_empty()),
            Some(mapped) => {
                prop_assert_eq!(mapped.len(), phones.len());
                for (entry, raw) in mapped.iter().zip(phones.iter()) {
                    prop_assert_eq!(&entry.value, raw);
                    prop_assert_eq!(entry.location.as_deref(), Some("mobile"));
                }
            }
        }
    }

    #[test]
    fn websites_keep_order(websites in prop::collection::vec("[a-z]{1,10}\\.com", 0..5)) {
        let event = IdentifyEvent::with_traits(json!({ "email": "prop@x.com", "websites": websites }));
        let payload = map_identify(&event);

        let values: Vec<String> = payload.websites.into_iter().map(|w| w.value).collect();
        prop_assert_eq!(values, websites);
    }
}
