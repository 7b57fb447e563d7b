//! Customer directory trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use common::CustomerId;
use serde::{Deserialize, Serialize};

use super::ServiceError;

/// What the saga needs to know about a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerView {
    #[serde(alias = "clienteId")]
    pub id: CustomerId,
    #[serde(alias = "nomeCliente")]
    pub name: String,
    pub email: String,
    /// Taxpayer id (CPF) sent to the payment gateway.
    #[serde(alias = "cpf")]
    pub tax_id: String,
}

impl CustomerView {
    pub fn new(
        id: impl Into<CustomerId>,
        name: impl Into<String>,
        email: impl Into<String>,
        tax_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            tax_id: tax_id.into(),
        }
    }
}

/// Trait for looking up customers owned by the customer service.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// Fetches a customer. Returns `ServiceError::NotFound` if it doesn't exist.
    async fn get_customer(&self, customer_id: &CustomerId) -> Result<CustomerView, ServiceError>;
}

#[async_trait]
impl<T: CustomerDirectory + ?Sized> CustomerDirectory for Arc<T> {
    async fn get_customer(&self, customer_id: &CustomerId) -> Result<CustomerView, ServiceError> {
        (**self).get_customer(customer_id).await
    }
}

#[derive(Debug, Default)]
struct DirectoryState {
    customers: HashMap<CustomerId, CustomerView>,
    lookups: usize,
    fail_on_lookup: bool,
}

/// In-memory customer directory for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCustomerDirectory {
    state: Arc<Mutex<DirectoryState>>,
}

impl InMemoryCustomerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, DirectoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds or replaces a customer.
    pub fn add_customer(&self, customer: CustomerView) {
        self.state().customers.insert(customer.id.clone(), customer);
    }

    /// Makes every lookup fail with a remote error.
    pub fn set_fail_on_lookup(&self, fail: bool) {
        self.state().fail_on_lookup = fail;
    }

    /// Number of `get_customer` calls served so far.
    pub fn lookup_count(&self) -> usize {
        self.state().lookups
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryCustomerDirectory {
    async fn get_customer(&self, customer_id: &CustomerId) -> Result<CustomerView, ServiceError> {
        let mut state = self.state();
        state.lookups += 1;

        if state.fail_on_lookup {
            return Err(ServiceError::Remote("customer service unreachable".to_string()));
        }

        state
            .customers
            .get(customer_id)
            .cloned()
            .ok_or(ServiceError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_known_and_unknown_customer() {
        let directory = InMemoryCustomerDirectory::new();
        directory.add_customer(CustomerView::new(
            "cust-1",
            "Ana Souza",
            "ana@example.com",
            "12345678909",
        ));

        let customer = directory
            .get_customer(&CustomerId::new("cust-1"))
            .await
            .unwrap();
        assert_eq!(customer.name, "Ana Souza");

        let missing = directory.get_customer(&CustomerId::new("nobody")).await;
        assert_eq!(missing, Err(ServiceError::NotFound));
        assert_eq!(directory.lookup_count(), 2);
    }

    #[tokio::test]
    async fn test_fail_on_lookup() {
        let directory = InMemoryCustomerDirectory::new();
        directory.set_fail_on_lookup(true);

        let result = directory.get_customer(&CustomerId::new("cust-1")).await;
        assert!(matches!(result, Err(ServiceError::Remote(_))));
    }

    #[test]
    fn test_deserialize_customer_service_payload() {
        let customer: CustomerView = serde_json::from_value(serde_json::json!({
            "clienteId": "cust-9",
            "nomeCliente": "Bruno Lima",
            "email": "bruno@example.com",
            "cpf": "98765432100"
        }))
        .unwrap();

        assert_eq!(customer.id, CustomerId::new("cust-9"));
        assert_eq!(customer.tax_id, "98765432100");
    }
}
