use async_trait::async_trait;
use reqwest::Method;

use crate::errors::{AppError, Stage};
use crate::models::{CustomerPayload, ItemEnvelope, ItemsEnvelope, RemoteCustomer};
use crate::transport::HttpTransport;

/// The three customer operations reconciliation needs from Help Scout.
///
/// No business logic lives behind this trait; implementations only translate
/// calls into requests and responses into records.
#[async_trait]
pub trait CustomerGateway: Send + Sync {
    /// First customer whose email matches, or `None` when the search is empty.
    async fn find_by_email(&self, email: &str) -> Result<Option<RemoteCustomer>, AppError>;

    /// Creates a customer and returns the persisted record.
    async fn create(&self, payload: &CustomerPayload) -> Result<RemoteCustomer, AppError>;

    /// Updates customer `id` and returns the persisted record.
    async fn update(
        &self,
        id: &str,
        payload: &CustomerPayload,
    ) -> Result<RemoteCustomer, AppError>;
}

/// Client for the Help Scout customers endpoints.
///
/// http://developer.helpscout.net/customers/create/
/// http://developer.helpscout.net/customers/update/
#[derive(Clone)]
pub struct HelpScoutClient {
    transport: HttpTransport,
}

impl HelpScoutClient {
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }
}

/// Asks Help Scout to return the stored record instead of a bare acknowledgement.
const RELOAD: (&str, &str) = ("reload", "true");

#[async_trait]
impl CustomerGateway for HelpScoutClient {
    async fn find_by_email(&self, email: &str) -> Result<Option<RemoteCustomer>, AppError> {
        tracing::debug!("Looking up Help Scout customer by email");

        let envelope: ItemsEnvelope = self
            .transport
            .send::<(), _>(
                Stage::Lookup,
                Method::GET,
                &["customers.json"],
                &[("email", email)],
                None,
            )
            .await?;

        // Emails are not unique on Help Scout's side; first item wins.
        let customer = envelope.items.and_then(|items| items.into_iter().next());
        match &customer {
            Some(found) => tracing::debug!("Found Help Scout customer {}", found.id),
            None => tracing::debug!("No Help Scout customer for this email"),
        }
        Ok(customer)
    }

    async fn create(&self, payload: &CustomerPayload) -> Result<RemoteCustomer, AppError> {
        let envelope: ItemEnvelope = self
            .transport
            .send(
                Stage::Create,
                Method::POST,
                &["customers.json"],
                &[RELOAD],
                Some(payload),
            )
            .await?;

        tracing::info!("✓ Help Scout customer created: {}", envelope.item.id);
        Ok(envelope.item)
    }

    async fn update(
        &self,
        id: &str,
        payload: &CustomerPayload,
    ) -> Result<RemoteCustomer, AppError> {
        let document = format!("{}.json", id);
        let envelope: ItemEnvelope = self
            .transport
            .send(
                Stage::Update,
                Method::PUT,
                &["customers", document.as_str()],
                &[RELOAD],
                Some(payload),
            )
            .await?;

        tracing::info!("✓ Help Scout customer updated: {}", envelope.item.id);
        Ok(envelope.item)
    }
}
