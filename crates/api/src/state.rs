//! Shared application state.

use std::sync::Arc;

use domain::Money;
use order_store::{InMemoryOrderStore, OrderStore, PostgresOrderStore};
use saga::{
    CompensationJournal, CustomerDirectory, CustomerView, HttpCustomerDirectory,
    HttpInventoryService, InMemoryCustomerDirectory, InMemoryInventoryService,
    InMemoryPaymentGateway, InventoryService, OrderSagaCoordinator, PagSeguroGateway,
    PaymentGateway, PaymentOrchestrator, PaymentSettings, VehicleView, build_http_client,
};
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::config::Config;

/// Errors raised while wiring the application at startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP client setup failed: {0}")]
    HttpClient(String),
}

pub type DynOrderStore = Arc<dyn OrderStore>;
pub type DynCustomerDirectory = Arc<dyn CustomerDirectory>;
pub type DynInventoryService = Arc<dyn InventoryService>;
pub type DynPaymentGateway = Arc<dyn PaymentGateway>;

pub type Coordinator =
    OrderSagaCoordinator<DynOrderStore, DynCustomerDirectory, DynInventoryService>;
pub type Payments = PaymentOrchestrator<
    DynOrderStore,
    DynCustomerDirectory,
    DynInventoryService,
    DynPaymentGateway,
>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub payments: Payments,
}

impl AppState {
    /// Wires the coordinator and payment orchestration over the given collaborators.
    pub fn new(
        store: DynOrderStore,
        customers: DynCustomerDirectory,
        inventory: DynInventoryService,
        gateway: DynPaymentGateway,
        settings: PaymentSettings,
    ) -> Self {
        let coordinator = Arc::new(OrderSagaCoordinator::with_journal(
            store,
            customers,
            inventory,
            CompensationJournal::new(),
        ));
        let payments = PaymentOrchestrator::new(coordinator.clone(), gateway, settings);
        Self {
            coordinator,
            payments,
        }
    }

    pub fn journal(&self) -> &CompensationJournal {
        self.coordinator.journal()
    }
}

/// Builds the application state from configuration.
///
/// Each collaborator falls back to its in-memory version when its setting is
/// absent, so the server runs standalone with demo data.
pub async fn build_state(config: &Config) -> Result<Arc<AppState>, StartupError> {
    let client = build_http_client(config.http_timeout)
        .map_err(|e| StartupError::HttpClient(e.to_string()))?;

    let store: DynOrderStore = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
            let store = PostgresOrderStore::new(pool);
            store.run_migrations().await?;
            tracing::info!("using Postgres order store");
            Arc::new(store)
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory order store");
            Arc::new(InMemoryOrderStore::new())
        }
    };

    let customers: DynCustomerDirectory = match &config.customer_service_url {
        Some(url) => Arc::new(HttpCustomerDirectory::new(client.clone(), url.as_str())),
        None => {
            tracing::info!("CUSTOMER_SERVICE_URL not set, using demo customers");
            Arc::new(demo_customers())
        }
    };

    let inventory: DynInventoryService = match &config.inventory_service_url {
        Some(url) => Arc::new(HttpInventoryService::new(client.clone(), url.as_str())),
        None => {
            tracing::info!("INVENTORY_SERVICE_URL not set, using demo inventory");
            Arc::new(demo_inventory())
        }
    };

    let gateway: DynPaymentGateway = match &config.pagseguro_token {
        Some(token) => Arc::new(PagSeguroGateway::new(
            client,
            config.pagseguro_base_url.as_str(),
            token.as_str(),
        )),
        None => {
            tracing::info!("PAGSEGURO_TOKEN not set, using in-memory payment gateway");
            Arc::new(InMemoryPaymentGateway::new())
        }
    };

    let settings = PaymentSettings {
        notification_urls: config.notification_urls(),
        ..PaymentSettings::default()
    };

    Ok(Arc::new(AppState::new(
        store, customers, inventory, gateway, settings,
    )))
}

/// Customers available when no customer service is configured.
pub fn demo_customers() -> InMemoryCustomerDirectory {
    let customers = InMemoryCustomerDirectory::new();
    customers.add_customer(CustomerView::new(
        "cust-1",
        "Ana Souza",
        "ana.souza@example.com",
        "12345678909",
    ));
    customers.add_customer(CustomerView::new(
        "cust-2",
        "Bruno Lima",
        "bruno.lima@example.com",
        "98765432100",
    ));
    customers
}

/// Vehicles available when no inventory service is configured.
pub fn demo_inventory() -> InMemoryInventoryService {
    let inventory = InMemoryInventoryService::new();
    inventory.add_vehicle(VehicleView::available(
        "veh-1",
        "Toyota",
        "Corolla",
        2022,
        Money::from_units(50000),
        "ABC1D23",
    ));
    inventory.add_vehicle(VehicleView::available(
        "veh-2",
        "Honda",
        "Civic",
        2021,
        Money::from_units(42000),
        "XYZ9K87",
    ));
    inventory.add_vehicle(VehicleView::available(
        "veh-3",
        "Volkswagen",
        "Gol",
        2019,
        Money::from_units(38000),
        "BRA2E19",
    ));
    inventory
}

/// Creates an in-memory application state seeded with demo collaborators.
pub fn create_default_state() -> Arc<AppState> {
    Arc::new(AppState::new(
        Arc::new(InMemoryOrderStore::new()),
        Arc::new(demo_customers()),
        Arc::new(demo_inventory()),
        Arc::new(InMemoryPaymentGateway::new()),
        PaymentSettings::default(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_state_without_settings_uses_demo_data() {
        let state = build_state(&Config::default()).await.unwrap();

        let order = state
            .coordinator
            .create_order("cust-1".into(), "veh-1".into())
            .await
            .unwrap();
        assert_eq!(order.total(), Money::from_units(50000));
        assert!(state.journal().is_empty());
    }
}
