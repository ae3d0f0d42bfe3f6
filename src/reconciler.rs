use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::errors::AppError;
use crate::gateway_client::CustomerGateway;
use crate::identity_lock::{IdentityLock, NoIdentityLock};
use crate::mapper::map_identify;
use crate::models::{Outcome, Reconciliation};
use crate::validation::ValidIdentify;

/// Keeps a Help Scout customer in sync with identify events.
///
/// Help Scout has no upsert, so each event is a lookup by email followed by
/// either a create or an update of the first match. Gateway errors are returned
/// unchanged; an empty search result is the only response interpreted here.
pub struct Reconciler {
    gateway: Arc<dyn CustomerGateway>,
    lock: Arc<dyn IdentityLock>,
}

impl Reconciler {
    pub fn new(gateway: Arc<dyn CustomerGateway>) -> Self {
        Self {
            gateway,
            lock: Arc::new(NoIdentityLock),
        }
    }

    /// Serialize reconciliations per identity with `lock`.
    pub fn with_lock(mut self, lock: Arc<dyn IdentityLock>) -> Self {
        self.lock = lock;
        self
    }

    pub async fn reconcile(&self, identify: ValidIdentify<'_>) -> Result<Reconciliation, AppError> {
        let reconciliation_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "reconcile",
            %reconciliation_id,
            message_id = identify.event.message_id.as_deref().unwrap_or("-")
        );

        async move {
            let _guard = self.lock.acquire(&identify.email).await;

            let existing = self.gateway.find_by_email(&identify.email).await?;
            let payload = map_identify(identify.event);

            let reconciliation = match existing {
                None => {
                    tracing::info!("No Help Scout customer found, creating");
                    let customer = self.gateway.create(&payload).await?;
                    Reconciliation {
                        outcome: Outcome::Created,
                        customer,
                    }
                }
                Some(found) => {
                    tracing::info!("Updating Help Scout customer {}", found.id);
                    let customer = self.gateway.update(&found.id, &payload).await?;
                    Reconciliation {
                        outcome: Outcome::Updated,
                        customer,
                    }
                }
            };

            Ok(reconciliation)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Stage;
    use crate::event_models::IdentifyEvent;
    use crate::identity_lock::KeyedIdentityLock;
    use crate::models::{ContactEntry, CustomerPayload, RemoteCustomer};
    use crate::validation::validate_identify;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Find(String),
        Create(CustomerPayload),
        Update(String, CustomerPayload),
    }

    fn customer(id: &str, email: &str) -> RemoteCustomer {
        RemoteCustomer {
            id: id.to_string(),
            first_name: None,
            last_name: None,
            emails: vec![ContactEntry::new(email)],
            raw: Default::default(),
        }
    }

    /// Scripted lookup result; records every call.
    struct MockGateway {
        lookup: Result<Option<RemoteCustomer>, AppError>,
        calls: Mutex<Vec<Call>>,
    }

    impl MockGateway {
        fn new(lookup: Result<Option<RemoteCustomer>, AppError>) -> Arc<Self> {
            Arc::new(Self {
                lookup,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CustomerGateway for MockGateway {
        async fn find_by_email(&self, email: &str) -> Result<Option<RemoteCustomer>, AppError> {
            self.calls.lock().unwrap().push(Call::Find(email.to_string()));
            self.lookup.clone()
        }

        async fn create(&self, payload: &CustomerPayload) -> Result<RemoteCustomer, AppError> {
            self.calls.lock().unwrap().push(Call::Create(payload.clone()));
            Ok(customer("new", &payload.emails[0].value))
        }

        async fn update(
            &self,
            id: &str,
            payload: &CustomerPayload,
        ) -> Result<RemoteCustomer, AppError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Update(id.to_string(), payload.clone()));
            Ok(customer(id, &payload.emails[0].value))
        }
    }

    /// In-memory store with a slow lookup, to widen the lookup-then-write window.
    #[derive(Default)]
    struct SlowStoreGateway {
        customers: Mutex<Vec<RemoteCustomer>>,
        creates: Mutex<usize>,
    }

    #[async_trait]
    impl CustomerGateway for SlowStoreGateway {
        async fn find_by_email(&self, email: &str) -> Result<Option<RemoteCustomer>, AppError> {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok(self
                .customers
                .lock()
                .unwrap()
                .iter()
                .find(|c| c.emails.iter().any(|e| e.value.eq_ignore_ascii_case(email)))
                .cloned())
        }

        async fn create(&self, payload: &CustomerPayload) -> Result<RemoteCustomer, AppError> {
            let mut creates = self.creates.lock().unwrap();
            *creates += 1;
            let created = customer(&creates.to_string(), &payload.emails[0].value);
            self.customers.lock().unwrap().push(created.clone());
            Ok(created)
        }

        async fn update(
            &self,
            id: &str,
            payload: &CustomerPayload,
        ) -> Result<RemoteCustomer, AppError> {
            Ok(customer(id, &payload.emails[0].value))
        }
    }

    fn event(traits: serde_json::Value) -> IdentifyEvent {
        IdentifyEvent::with_traits(traits)
    }

    #[tokio::test]
    async fn test_absent_customer_is_created() {
        let gateway = MockGateway::new(Ok(None));
        let reconciler = Reconciler::new(gateway.clone());
        let event = event(json!({ "email": "a@x.com", "firstName": "Cal" }));

        let result = reconciler
            .reconcile(validate_identify(&event).unwrap())
            .await
            .unwrap();

        assert_eq!(result.outcome, Outcome::Created);
        let calls = gateway.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], Call::Find("a@x.com".into()));
        assert!(matches!(&calls[1], Call::Create(p) if p.first_name.as_deref() == Some("Cal")));
    }

    #[tokio::test]
    async fn test_existing_customer_is_updated_by_id() {
        let gateway = MockGateway::new(Ok(Some(customer("42", "b@x.com"))));
        let reconciler = Reconciler::new(gateway.clone());
        let event = event(json!({ "email": "b@x.com" }));

        let result = reconciler
            .reconcile(validate_identify(&event).unwrap())
            .await
            .unwrap();

        assert_eq!(result.outcome, Outcome::Updated);
        assert_eq!(result.customer.id, "42");
        let calls = gateway.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(&calls[1], Call::Update(id, _) if id == "42"));
        assert!(!calls.iter().any(|c| matches!(c, Call::Create(_))));
    }

    #[tokio::test]
    async fn test_lookup_error_stops_reconciliation() {
        let gateway = MockGateway::new(Err(AppError::RemoteApi {
            stage: Stage::Lookup,
            status: 401,
            message: "cannot GET /customers.json (401)".into(),
        }));
        let reconciler = Reconciler::new(gateway.clone());
        let event = event(json!({ "email": "a@x.com" }));

        let err = reconciler
            .reconcile(validate_identify(&event).unwrap())
            .await
            .unwrap_err();

        assert_eq!(err.remote_status(), Some(401));
        assert_eq!(err.stage(), Some(Stage::Lookup));
        assert_eq!(gateway.calls(), vec![Call::Find("a@x.com".into())]);
    }

    #[tokio::test]
    async fn test_without_lock_concurrent_identifies_duplicate() {
        let gateway = Arc::new(SlowStoreGateway::default());
        let reconciler = Reconciler::new(gateway.clone());
        let first = event(json!({ "email": "new@x.com" }));
        let second = event(json!({ "email": "new@x.com" }));

        let (a, b) = tokio::join!(
            reconciler.reconcile(validate_identify(&first).unwrap()),
            reconciler.reconcile(validate_identify(&second).unwrap()),
        );

        assert_eq!(a.unwrap().outcome, Outcome::Created);
        assert_eq!(b.unwrap().outcome, Outcome::Created);
        assert_eq!(*gateway.creates.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_keyed_lock_prevents_duplicate_create() {
        let gateway = Arc::new(SlowStoreGateway::default());
        let reconciler =
            Reconciler::new(gateway.clone()).with_lock(Arc::new(KeyedIdentityLock::new()));
        let first = event(json!({ "email": "new@x.com" }));
        let second = event(json!({ "email": "NEW@x.com" }));

        let (a, b) = tokio::join!(
            reconciler.reconcile(validate_identify(&first).unwrap()),
            reconciler.reconcile(validate_identify(&second).unwrap()),
        );

        let mut outcomes = vec![a.unwrap().outcome, b.unwrap().outcome];
        outcomes.sort_by_key(|o| *o == Outcome::Updated);
        assert_eq!(outcomes, vec![Outcome::Created, Outcome::Updated]);
        assert_eq!(*gateway.creates.lock().unwrap(), 1);
    }
}
