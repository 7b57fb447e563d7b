//! Value objects for the order domain.

use chrono::{DateTime, Utc};
use common::VehicleId;
use serde::{Deserialize, Serialize};

use super::OrderStatus;

/// Money amount represented in cents to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = 10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a new Money amount from whole currency units.
    pub fn from_units(units: i64) -> Self {
        Self { cents: units * 100 }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the whole-unit portion.
    pub fn units(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the cents portion (remainder after units).
    pub fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-{}.{:02}", self.units().abs(), self.cents_part())
        } else {
            write!(f, "{}.{:02}", self.units(), self.cents_part())
        }
    }
}

/// Copy of the vehicle as the inventory described it when it was reserved.
///
/// The snapshot is never refreshed: later price or plate changes in the
/// inventory do not affect an existing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub vehicle_id: VehicleId,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price: Money,
    pub plate: String,
}

impl VehicleSnapshot {
    /// Human-readable label, e.g. `"Toyota Corolla 2022"`.
    pub fn label(&self) -> String {
        format!("{} {} {}", self.make, self.model, self.year)
    }
}

/// One entry of an order's append-only status history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: OrderStatus,
    pub at: DateTime<Utc>,
}

impl StatusEntry {
    pub fn new(status: OrderStatus, at: DateTime<Utc>) -> Self {
        Self { status, at }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_from_cents() {
        let money = Money::from_cents(1234);
        assert_eq!(money.cents(), 1234);
        assert_eq!(money.units(), 12);
        assert_eq!(money.cents_part(), 34);
    }

    #[test]
    fn test_money_from_units() {
        let money = Money::from_units(50000);
        assert_eq!(money.cents(), 5_000_000);
        assert_eq!(money.units(), 50000);
        assert_eq!(money.cents_part(), 0);
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(1234).to_string(), "12.34");
        assert_eq!(Money::from_units(50000).to_string(), "50000.00");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-12.34");
    }

    #[test]
    fn test_vehicle_label() {
        let vehicle = VehicleSnapshot {
            vehicle_id: VehicleId::new("veh-1"),
            make: "Toyota".to_string(),
            model: "Corolla".to_string(),
            year: 2022,
            price: Money::from_units(50000),
            plate: "ABC1D23".to_string(),
        };
        assert_eq!(vehicle.label(), "Toyota Corolla 2022");
    }
}
