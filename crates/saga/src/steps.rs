//! The individual remote steps of the saga.
//!
//! Each step makes one collaborator call and turns its failure into the
//! matching [`SagaError`]. Deciding what to do on failure is the
//! coordinator's job.

use common::{CustomerId, VehicleId};

use crate::error::{Result, SagaError};
use crate::order_fulfillment;
use crate::services::{CustomerDirectory, CustomerView, InventoryService, ServiceError, VehicleView};

/// Saga steps over a customer directory and an inventory service.
pub struct SagaSteps<C, I> {
    customers: C,
    inventory: I,
}

impl<C, I> SagaSteps<C, I>
where
    C: CustomerDirectory,
    I: InventoryService,
{
    pub fn new(customers: C, inventory: I) -> Self {
        Self {
            customers,
            inventory,
        }
    }

    pub fn customers(&self) -> &C {
        &self.customers
    }

    pub fn inventory(&self) -> &I {
        &self.inventory
    }

    /// Loads the customer, failing with `CustomerNotFound` if it doesn't exist.
    pub async fn verify_customer(&self, customer_id: &CustomerId) -> Result<CustomerView> {
        tracing::debug!(step = order_fulfillment::STEP_VERIFY_CUSTOMER, %customer_id, "saga step started");

        self.customers
            .get_customer(customer_id)
            .await
            .map_err(|e| match e {
                ServiceError::NotFound => SagaError::CustomerNotFound(customer_id.clone()),
                other => SagaError::LookupFailed(other),
            })
    }

    /// Loads the vehicle and checks that it is available.
    pub async fn verify_vehicle(&self, vehicle_id: &VehicleId) -> Result<VehicleView> {
        tracing::debug!(step = order_fulfillment::STEP_VERIFY_VEHICLE, %vehicle_id, "saga step started");

        let vehicle = self
            .inventory
            .get_vehicle(vehicle_id)
            .await
            .map_err(|e| match e {
                ServiceError::NotFound => SagaError::VehicleNotFound(vehicle_id.clone()),
                other => SagaError::LookupFailed(other),
            })?;

        if !vehicle.is_available() {
            return Err(SagaError::VehicleUnavailable(vehicle_id.clone()));
        }
        Ok(vehicle)
    }

    /// Reserves the vehicle. A reservation refused because the vehicle was
    /// taken in the meantime is reported as `VehicleUnavailable`.
    pub async fn reserve_vehicle(
        &self,
        vehicle_id: &VehicleId,
        customer_id: &CustomerId,
    ) -> Result<()> {
        tracing::info!(step = order_fulfillment::STEP_RESERVE_VEHICLE, %vehicle_id, "saga step started");

        self.inventory
            .reserve(vehicle_id, customer_id)
            .await
            .map_err(|e| match e {
                ServiceError::Unavailable(_) => SagaError::VehicleUnavailable(vehicle_id.clone()),
                ServiceError::NotFound => SagaError::VehicleNotFound(vehicle_id.clone()),
                source => SagaError::ReservationFailed {
                    vehicle_id: vehicle_id.clone(),
                    source,
                },
            })
    }

    /// Releases the vehicle reservation.
    pub async fn release_vehicle(&self, vehicle_id: &VehicleId) -> Result<()> {
        tracing::info!(step = order_fulfillment::STEP_RELEASE_VEHICLE, %vehicle_id, "saga step started");

        self.inventory
            .release(vehicle_id)
            .await
            .map_err(|source| SagaError::ReleaseFailed {
                vehicle_id: vehicle_id.clone(),
                source,
            })
    }

    /// Removes the vehicle from stock.
    pub async fn remove_vehicle(&self, vehicle_id: &VehicleId) -> Result<()> {
        tracing::info!(step = order_fulfillment::STEP_REMOVE_VEHICLE, %vehicle_id, "saga step started");

        self.inventory
            .remove_from_stock(vehicle_id)
            .await
            .map_err(|source| SagaError::RemovalFailed {
                vehicle_id: vehicle_id.clone(),
                source,
            })
    }
}
