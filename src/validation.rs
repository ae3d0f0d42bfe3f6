//! Checks that run before an event reaches the reconciler.

use regex::Regex;
use std::sync::OnceLock;

use crate::errors::AppError;
use crate::event_models::IdentifyEvent;

/// An identify event whose identity key has been resolved.
#[derive(Debug, Clone)]
pub struct ValidIdentify<'a> {
    pub event: &'a IdentifyEvent,
    pub email: String,
}

/// Fails fast on an empty API key, before any request is built.
pub fn ensure_api_key(api_key: &str) -> Result<(), AppError> {
    if api_key.trim().is_empty() {
        return Err(AppError::Configuration(
            "Help Scout API key is missing".to_string(),
        ));
    }
    Ok(())
}

/// Only identify events that resolve to an email are accepted.
pub fn validate_identify(event: &IdentifyEvent) -> Result<ValidIdentify<'_>, AppError> {
    if !event.is_identify() {
        return Err(AppError::Validation(format!(
            "unsupported message type '{}'",
            event.event_type
        )));
    }

    let email = event
        .email()
        .ok_or_else(|| AppError::Validation("identify event is missing an email".to_string()))?;

    if !is_valid_email(&email) {
        tracing::warn!("Email does not look well-formed: {}", email);
    }

    Ok(ValidIdentify { event, email })
}

/// RFC 5322 simplified email check (local@domain.tld).
pub fn is_valid_email(email: &str) -> bool {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();

    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    EMAIL_REGEX
        .get_or_init(|| {
            Regex::new(
                r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
            )
            .expect("email pattern compiles")
        })
        .is_match(email)
}
