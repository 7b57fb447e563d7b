//! Payment record created when an order is sent to the gateway.

use chrono::{DateTime, Utc};
use common::{GatewayPaymentId, OrderId, VehicleId};
use serde::{Deserialize, Serialize};

use crate::order::{Money, PaymentStatus};

/// Payment method used for every vehicle sale.
pub const PAYMENT_METHOD_PIX: &str = "PIX";

/// Name of the gateway the payments are issued by.
pub const GATEWAY_PAGSEGURO: &str = "PagSeguro";

/// A payment issued by the gateway for one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub gateway_payment_id: GatewayPaymentId,
    pub order_id: OrderId,
    pub vehicle_id: VehicleId,
    pub amount: Money,
    pub status: PaymentStatus,
    /// Link to the QR code image the customer pays with.
    pub qr_code_link: String,
    pub method: String,
    pub gateway: String,
    /// Gateway response body, kept verbatim.
    pub raw: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a freshly issued PIX payment in `Processing` status.
    pub fn issued(
        gateway_payment_id: GatewayPaymentId,
        order_id: OrderId,
        vehicle_id: VehicleId,
        amount: Money,
        qr_code_link: impl Into<String>,
        raw: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            gateway_payment_id,
            order_id,
            vehicle_id,
            amount,
            status: PaymentStatus::Processing,
            qr_code_link: qr_code_link.into(),
            method: PAYMENT_METHOD_PIX.to_string(),
            gateway: GATEWAY_PAGSEGURO.to_string(),
            raw,
            created_at: now,
            updated_at: now,
        }
    }
}
