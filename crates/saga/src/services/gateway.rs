//! Payment gateway trait, request payload, and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use common::GatewayPaymentId;
use domain::{Order, PaymentStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::CustomerView;

/// Failure reported by the payment gateway.
///
/// `status` carries the HTTP status the gateway answered with, or None when
/// the request never got an answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Payment gateway error{}: {message}", status_suffix(.status))]
pub struct GatewayError {
    pub status: Option<u16>,
    pub message: String,
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl GatewayError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// The gateway rejected the request (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(self.status, Some(400..=499))
    }

    /// The gateway failed to process the request (5xx).
    pub fn is_server_error(&self) -> bool {
        matches!(self.status, Some(500..=599))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        Self::new(err.status().map(|s| s.as_u16()), err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentCustomer {
    pub name: String,
    pub email: String,
    pub tax_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentItem {
    pub name: String,
    pub quantity: u32,
    /// Amount in cents.
    pub unit_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QrCodeAmount {
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QrCodeRequest {
    pub amount: QrCodeAmount,
    pub expiration_date: String,
}

/// Body of a PIX payment creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentRequest {
    /// The order id, echoed back by the gateway in notifications.
    pub reference_id: String,
    pub customer: PaymentCustomer,
    pub items: Vec<PaymentItem>,
    pub qr_codes: Vec<QrCodeRequest>,
    pub notification_urls: Vec<String>,
}

impl PaymentRequest {
    /// Builds the request for one order: a single item named after the
    /// vehicle and a QR code for the order total that expires after `ttl`.
    pub fn for_order(
        order: &Order,
        customer: &CustomerView,
        notification_urls: &[String],
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        let amount = order.total().cents();
        Self {
            reference_id: order.id().to_string(),
            customer: PaymentCustomer {
                name: customer.name.clone(),
                email: customer.email.clone(),
                tax_id: customer.tax_id.clone(),
            },
            items: vec![PaymentItem {
                name: order.vehicle().label(),
                quantity: 1,
                unit_amount: amount,
            }],
            qr_codes: vec![QrCodeRequest {
                amount: QrCodeAmount { value: amount },
                expiration_date: (now + ttl).to_rfc3339_opts(SecondsFormat::Millis, true),
            }],
            notification_urls: notification_urls.to_vec(),
        }
    }

    /// Total charged by the request, in cents.
    pub fn amount_cents(&self) -> i64 {
        self.qr_codes.iter().map(|qr| qr.amount.value).sum()
    }
}

/// A payment the gateway accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayPayment {
    pub id: GatewayPaymentId,
    pub qr_code_link: String,
    /// Full response body.
    pub raw: serde_json::Value,
}

#[derive(Deserialize)]
struct OrderResponse {
    id: String,
    #[serde(default)]
    qr_codes: Vec<QrCodeResponse>,
}

#[derive(Deserialize)]
struct QrCodeResponse {
    #[serde(default)]
    links: Vec<LinkResponse>,
}

#[derive(Deserialize)]
struct LinkResponse {
    #[serde(default)]
    rel: String,
    href: String,
}

impl GatewayPayment {
    /// Extracts the payment id and the QR code image link from a creation response.
    pub fn from_response(raw: serde_json::Value) -> Result<Self, GatewayError> {
        let parsed: OrderResponse = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::new(None, format!("unexpected gateway response: {e}")))?;

        let links = parsed
            .qr_codes
            .into_iter()
            .next()
            .map(|qr| qr.links)
            .unwrap_or_default();
        let qr_code_link = links
            .iter()
            .find(|link| link.rel.eq_ignore_ascii_case("QRCODE.PNG"))
            .or_else(|| links.first())
            .map(|link| link.href.clone())
            .ok_or_else(|| GatewayError::new(None, "gateway response has no QR code link"))?;

        Ok(Self {
            id: GatewayPaymentId::new(parsed.id),
            qr_code_link,
            raw,
        })
    }
}

/// Payment state as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayPaymentStatus {
    pub id: GatewayPaymentId,
    /// Status in the gateway's vocabulary, e.g. `PAID`.
    pub external_status: String,
}

impl GatewayPaymentStatus {
    /// Reads the status from a query response: the order-level `status` when
    /// present, otherwise the status of the first charge.
    pub fn from_response(
        id: GatewayPaymentId,
        raw: &serde_json::Value,
    ) -> Result<Self, GatewayError> {
        let external_status = raw
            .get("status")
            .and_then(|s| s.as_str())
            .or_else(|| raw.pointer("/charges/0/status").and_then(|s| s.as_str()))
            .ok_or_else(|| GatewayError::new(None, "gateway response has no payment status"))?;

        Ok(Self {
            id,
            external_status: external_status.to_string(),
        })
    }

    /// The status mapped onto the internal vocabulary.
    pub fn payment_status(&self) -> PaymentStatus {
        map_external_status(&self.external_status)
    }
}

/// Maps a gateway status onto the internal payment status.
///
/// Anything that is not a settled outcome is treated as still pending.
pub fn map_external_status(external: &str) -> PaymentStatus {
    match external.trim().to_ascii_uppercase().as_str() {
        "PAID" => PaymentStatus::Approved,
        "DECLINED" => PaymentStatus::Declined,
        "CANCELED" | "CANCELLED" => PaymentStatus::Cancelled,
        _ => PaymentStatus::Pending,
    }
}

/// Trait for payment gateway operations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Issues a payment for the request.
    async fn create_payment(&self, request: &PaymentRequest)
    -> Result<GatewayPayment, GatewayError>;

    /// Looks up the current status of a payment.
    async fn query_payment(
        &self,
        payment_id: &GatewayPaymentId,
    ) -> Result<GatewayPaymentStatus, GatewayError>;
}

#[async_trait]
impl<T: PaymentGateway + ?Sized> PaymentGateway for Arc<T> {
    async fn create_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<GatewayPayment, GatewayError> {
        (**self).create_payment(request).await
    }

    async fn query_payment(
        &self,
        payment_id: &GatewayPaymentId,
    ) -> Result<GatewayPaymentStatus, GatewayError> {
        (**self).query_payment(payment_id).await
    }
}

#[derive(Debug, Default)]
struct GatewayState {
    requests: Vec<PaymentRequest>,
    /// Issued responses by reference id, replayed for repeated requests.
    issued: HashMap<String, serde_json::Value>,
    statuses: HashMap<GatewayPaymentId, String>,
    next_id: u32,
    fail_on_create: Option<GatewayError>,
    fail_on_query: bool,
    queries: usize,
}

/// In-memory payment gateway for testing and local runs.
///
/// Issued payments start as `WAITING`; tests move them along with
/// [`InMemoryPaymentGateway::set_external_status`]. A repeated request for
/// the same reference id gets the payment issued the first time.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, GatewayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes create calls fail with the given error, or succeed again with None.
    pub fn set_fail_on_create(&self, error: Option<GatewayError>) {
        self.state().fail_on_create = error;
    }

    /// Makes query calls fail with a transport error.
    pub fn set_fail_on_query(&self, fail: bool) {
        self.state().fail_on_query = fail;
    }

    /// Sets the status the gateway reports for a payment.
    pub fn set_external_status(&self, payment_id: &GatewayPaymentId, status: impl Into<String>) {
        self.state()
            .statuses
            .insert(payment_id.clone(), status.into());
    }

    /// Number of payments issued so far.
    pub fn created_count(&self) -> usize {
        self.state().requests.len()
    }

    /// Number of status queries received so far.
    pub fn query_count(&self) -> usize {
        self.state().queries
    }

    /// The most recent successful creation request.
    pub fn last_request(&self) -> Option<PaymentRequest> {
        self.state().requests.last().cloned()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<GatewayPayment, GatewayError> {
        let mut state = self.state();
        if let Some(error) = &state.fail_on_create {
            return Err(error.clone());
        }
        if let Some(raw) = state.issued.get(&request.reference_id) {
            return GatewayPayment::from_response(raw.clone());
        }

        state.next_id += 1;
        let id = format!("ORDE_{:08}", state.next_id);
        let payment_id = GatewayPaymentId::new(id.clone());
        state.requests.push(request.clone());
        state.statuses.insert(payment_id.clone(), "WAITING".to_string());

        let raw = serde_json::json!({
            "id": id,
            "reference_id": request.reference_id,
            "qr_codes": [{
                "id": format!("QRCO_{:08}", state.next_id),
                "amount": { "value": request.amount_cents() },
                "links": [
                    { "rel": "QRCODE.BASE64", "href": format!("https://sandbox.gateway.local/qrcode/{id}/base64") },
                    { "rel": "QRCODE.PNG", "href": format!("https://sandbox.gateway.local/qrcode/{id}/png") },
                ],
            }],
        });
        state
            .issued
            .insert(request.reference_id.clone(), raw.clone());
        GatewayPayment::from_response(raw)
    }

    async fn query_payment(
        &self,
        payment_id: &GatewayPaymentId,
    ) -> Result<GatewayPaymentStatus, GatewayError> {
        let mut state = self.state();
        state.queries += 1;

        if state.fail_on_query {
            return Err(GatewayError::new(None, "gateway unreachable"));
        }

        let status = state
            .statuses
            .get(payment_id)
            .cloned()
            .ok_or_else(|| GatewayError::new(Some(404), format!("payment {payment_id} not found")))?;

        Ok(GatewayPaymentStatus {
            id: payment_id.clone(),
            external_status: status,
        })
    }
}
