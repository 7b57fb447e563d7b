//! Inventory service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use common::{CustomerId, VehicleId};
use domain::{Money, VehicleSnapshot};
use serde::{Deserialize, Serialize};

use super::ServiceError;

/// Whether a vehicle can be sold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleAvailability {
    Available,
    /// Held for a customer while their order is open.
    Reserved { customer_id: CustomerId },
}

/// A vehicle as the inventory service describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleView {
    pub id: VehicleId,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price: Money,
    pub plate: String,
    pub availability: VehicleAvailability,
}

impl VehicleView {
    /// Creates an available vehicle.
    pub fn available(
        id: impl Into<VehicleId>,
        make: impl Into<String>,
        model: impl Into<String>,
        year: i32,
        price: Money,
        plate: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            make: make.into(),
            model: model.into(),
            year,
            price,
            plate: plate.into(),
            availability: VehicleAvailability::Available,
        }
    }

    pub fn is_available(&self) -> bool {
        self.availability == VehicleAvailability::Available
    }

    /// Copies the fields an order keeps about the vehicle.
    pub fn snapshot(&self) -> VehicleSnapshot {
        VehicleSnapshot {
            vehicle_id: self.id.clone(),
            make: self.make.clone(),
            model: self.model.clone(),
            year: self.year,
            price: self.price,
            plate: self.plate.clone(),
        }
    }
}

/// Trait for inventory operations.
#[async_trait]
pub trait InventoryService: Send + Sync {
    /// Fetches a vehicle. Returns `ServiceError::NotFound` if it doesn't exist.
    async fn get_vehicle(&self, vehicle_id: &VehicleId) -> Result<VehicleView, ServiceError>;

    /// Reserves the vehicle for a customer if, and only if, it is still available.
    ///
    /// The check and the update are a single step on the inventory side; a
    /// vehicle that is no longer available yields `ServiceError::Unavailable`.
    async fn reserve(
        &self,
        vehicle_id: &VehicleId,
        customer_id: &CustomerId,
    ) -> Result<(), ServiceError>;

    /// Makes a reserved vehicle available again.
    async fn release(&self, vehicle_id: &VehicleId) -> Result<(), ServiceError>;

    /// Removes a sold vehicle from stock.
    async fn remove_from_stock(&self, vehicle_id: &VehicleId) -> Result<(), ServiceError>;
}

#[async_trait]
impl<T: InventoryService + ?Sized> InventoryService for Arc<T> {
    async fn get_vehicle(&self, vehicle_id: &VehicleId) -> Result<VehicleView, ServiceError> {
        (**self).get_vehicle(vehicle_id).await
    }

    async fn reserve(
        &self,
        vehicle_id: &VehicleId,
        customer_id: &CustomerId,
    ) -> Result<(), ServiceError> {
        (**self).reserve(vehicle_id, customer_id).await
    }

    async fn release(&self, vehicle_id: &VehicleId) -> Result<(), ServiceError> {
        (**self).release(vehicle_id).await
    }

    async fn remove_from_stock(&self, vehicle_id: &VehicleId) -> Result<(), ServiceError> {
        (**self).remove_from_stock(vehicle_id).await
    }
}

/// A state-changing call received by [`InMemoryInventoryService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryCall {
    Reserve(VehicleId),
    Release(VehicleId),
    Remove(VehicleId),
}

#[derive(Debug, Default)]
struct InventoryState {
    vehicles: HashMap<VehicleId, VehicleView>,
    calls: Vec<InventoryCall>,
    fail_on_reserve: bool,
    fail_on_release: bool,
    fail_on_remove: bool,
}

/// In-memory inventory service for testing and local runs.
///
/// Every state-changing call is recorded, including failed ones, so tests can
/// assert exactly which side effects a saga attempted.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryService {
    state: Arc<Mutex<InventoryState>>,
}

impl InMemoryInventoryService {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InventoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds or replaces a vehicle.
    pub fn add_vehicle(&self, vehicle: VehicleView) {
        self.state().vehicles.insert(vehicle.id.clone(), vehicle);
    }

    /// Returns the vehicle as currently stored, or None once removed.
    pub fn vehicle(&self, vehicle_id: &VehicleId) -> Option<VehicleView> {
        self.state().vehicles.get(vehicle_id).cloned()
    }

    /// Configures the service to fail reserve calls.
    pub fn set_fail_on_reserve(&self, fail: bool) {
        self.state().fail_on_reserve = fail;
    }

    /// Configures the service to fail release calls.
    pub fn set_fail_on_release(&self, fail: bool) {
        self.state().fail_on_release = fail;
    }

    /// Configures the service to fail remove calls.
    pub fn set_fail_on_remove(&self, fail: bool) {
        self.state().fail_on_remove = fail;
    }

    /// Returns every state-changing call, oldest first.
    pub fn calls(&self) -> Vec<InventoryCall> {
        self.state().calls.clone()
    }

    pub fn reserve_count(&self) -> usize {
        self.count(|call| matches!(call, InventoryCall::Reserve(_)))
    }

    pub fn release_count(&self) -> usize {
        self.count(|call| matches!(call, InventoryCall::Release(_)))
    }

    pub fn remove_count(&self) -> usize {
        self.count(|call| matches!(call, InventoryCall::Remove(_)))
    }

    fn count(&self, filter: impl Fn(&InventoryCall) -> bool) -> usize {
        self.state().calls.iter().filter(|call| filter(call)).count()
    }
}

#[async_trait]
impl InventoryService for InMemoryInventoryService {
    async fn get_vehicle(&self, vehicle_id: &VehicleId) -> Result<VehicleView, ServiceError> {
        self.state()
            .vehicles
            .get(vehicle_id)
            .cloned()
            .ok_or(ServiceError::NotFound)
    }

    async fn reserve(
        &self,
        vehicle_id: &VehicleId,
        customer_id: &CustomerId,
    ) -> Result<(), ServiceError> {
        let mut state = self.state();
        state.calls.push(InventoryCall::Reserve(vehicle_id.clone()));

        if state.fail_on_reserve {
            return Err(ServiceError::Remote("inventory rejected the reservation".to_string()));
        }

        let vehicle = state
            .vehicles
            .get_mut(vehicle_id)
            .ok_or(ServiceError::NotFound)?;
        if !vehicle.is_available() {
            return Err(ServiceError::Unavailable(format!(
                "vehicle {vehicle_id} is not available"
            )));
        }
        vehicle.availability = VehicleAvailability::Reserved {
            customer_id: customer_id.clone(),
        };
        Ok(())
    }

    async fn release(&self, vehicle_id: &VehicleId) -> Result<(), ServiceError> {
        let mut state = self.state();
        state.calls.push(InventoryCall::Release(vehicle_id.clone()));

        if state.fail_on_release {
            return Err(ServiceError::Remote("inventory rejected the release".to_string()));
        }

        let vehicle = state
            .vehicles
            .get_mut(vehicle_id)
            .ok_or(ServiceError::NotFound)?;
        vehicle.availability = VehicleAvailability::Available;
        Ok(())
    }

    async fn remove_from_stock(&self, vehicle_id: &VehicleId) -> Result<(), ServiceError> {
        let mut state = self.state();
        state.calls.push(InventoryCall::Remove(vehicle_id.clone()));

        if state.fail_on_remove {
            return Err(ServiceError::Remote("inventory rejected the removal".to_string()));
        }

        state
            .vehicles
            .remove(vehicle_id)
            .map(|_| ())
            .ok_or(ServiceError::NotFound)
    }
}
