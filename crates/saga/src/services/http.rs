//! HTTP clients for the customer service, the inventory service, and PagSeguro.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::{CustomerId, GatewayPaymentId, VehicleId};
use domain::Money;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use super::{
    CustomerDirectory, CustomerView, GatewayError, GatewayPayment, GatewayPaymentStatus,
    InventoryService, PaymentGateway, PaymentRequest, ServiceError, VehicleAvailability,
    VehicleView,
};

/// Inventory status string for a vehicle that can be sold.
const STATUS_AVAILABLE: &str = "Disponivel";

/// Inventory status string for a vehicle held by an order.
const STATUS_RESERVED: &str = "Reservado";

/// Builds the shared HTTP client with a per-request timeout.
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

fn join(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Maps a non-success answer from the customer or inventory service.
async fn service_error(response: Response) -> ServiceError {
    let status = response.status();
    match status {
        StatusCode::NOT_FOUND => ServiceError::NotFound,
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => {
            let body = response.text().await.unwrap_or_default();
            ServiceError::Unavailable(body)
        }
        _ => {
            let body = response.text().await.unwrap_or_default();
            ServiceError::Remote(format!("unexpected status {status}: {body}"))
        }
    }
}

/// Customer directory backed by the customer service (`/api/cliente/{id}`).
#[derive(Debug, Clone)]
pub struct HttpCustomerDirectory {
    client: Client,
    base_url: String,
}

impl HttpCustomerDirectory {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl CustomerDirectory for HttpCustomerDirectory {
    #[tracing::instrument(skip_all, fields(%customer_id))]
    async fn get_customer(&self, customer_id: &CustomerId) -> Result<CustomerView, ServiceError> {
        let url = join(&self.base_url, &format!("/api/cliente/{customer_id}"));
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(service_error(response).await);
        }
        Ok(response.json::<CustomerView>().await?)
    }
}

/// Vehicle record as served by the inventory service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductPayload {
    produto_id: String,
    marca: String,
    modelo: String,
    ano: serde_json::Value,
    placa: String,
    preco: f64,
    status: String,
    #[serde(default)]
    reserva: Option<ReservationPayload>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReservationPayload {
    #[serde(default)]
    cliente_id: Option<String>,
}

impl TryFrom<ProductPayload> for VehicleView {
    type Error = ServiceError;

    fn try_from(payload: ProductPayload) -> Result<Self, Self::Error> {
        // The inventory service stores the year as a string.
        let year = match &payload.ano {
            serde_json::Value::Number(n) => n.as_i64().map(|y| y as i32),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| ServiceError::Remote(format!("invalid vehicle year: {}", payload.ano)))?;

        let availability = if payload.status.eq_ignore_ascii_case(STATUS_AVAILABLE) {
            VehicleAvailability::Available
        } else {
            let customer_id = payload
                .reserva
                .and_then(|r| r.cliente_id)
                .unwrap_or_default();
            VehicleAvailability::Reserved {
                customer_id: CustomerId::new(customer_id),
            }
        };

        Ok(Self {
            id: VehicleId::new(payload.produto_id),
            make: payload.marca,
            model: payload.modelo,
            year,
            price: Money::from_cents((payload.preco * 100.0).round() as i64),
            plate: payload.placa,
            availability,
        })
    }
}

/// Inventory service backed by the product service (`/api/produto/{id}`).
#[derive(Debug, Clone)]
pub struct HttpInventoryService {
    client: Client,
    base_url: String,
}

impl HttpInventoryService {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn vehicle_url(&self, vehicle_id: &VehicleId) -> String {
        join(&self.base_url, &format!("/api/produto/{vehicle_id}"))
    }
}

#[async_trait]
impl InventoryService for HttpInventoryService {
    #[tracing::instrument(skip_all, fields(%vehicle_id))]
    async fn get_vehicle(&self, vehicle_id: &VehicleId) -> Result<VehicleView, ServiceError> {
        let response = self.client.get(self.vehicle_url(vehicle_id)).send().await?;

        if !response.status().is_success() {
            return Err(service_error(response).await);
        }
        response.json::<ProductPayload>().await?.try_into()
    }

    /// Sends a conditional reservation; the service answers 409 when the
    /// vehicle is no longer available.
    #[tracing::instrument(skip_all, fields(%vehicle_id, %customer_id))]
    async fn reserve(
        &self,
        vehicle_id: &VehicleId,
        customer_id: &CustomerId,
    ) -> Result<(), ServiceError> {
        let body = serde_json::json!({
            "expectedStatus": STATUS_AVAILABLE,
            "status": STATUS_RESERVED,
            "reserva": {
                "clienteId": customer_id,
                "dataReserva": Utc::now(),
            },
        });
        let url = format!("{}/reserva", self.vehicle_url(vehicle_id));
        let response = self.client.put(url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(service_error(response).await);
        }
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(%vehicle_id))]
    async fn release(&self, vehicle_id: &VehicleId) -> Result<(), ServiceError> {
        let body = serde_json::json!({
            "status": STATUS_AVAILABLE,
            "reserva": { "clienteId": null, "dataReserva": null },
        });
        let response = self
            .client
            .put(self.vehicle_url(vehicle_id))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(service_error(response).await);
        }
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(%vehicle_id))]
    async fn remove_from_stock(&self, vehicle_id: &VehicleId) -> Result<(), ServiceError> {
        let response = self
            .client
            .delete(self.vehicle_url(vehicle_id))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(service_error(response).await);
        }
        Ok(())
    }
}

const IDEMPOTENCY_KEY_HEADER: &str = "x-idempotency-key";

/// Payment gateway backed by the PagSeguro orders API.
#[derive(Clone)]
pub struct PagSeguroGateway {
    client: Client,
    base_url: String,
    token: String,
}

impl PagSeguroGateway {
    /// Sandbox endpoint used when no base url is configured.
    pub const SANDBOX_URL: &'static str = "https://sandbox.api.pagseguro.com";

    pub fn new(client: Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    /// Builds the order creation call. The idempotency key is the order id,
    /// so a repeated request for one order yields the same gateway payment.
    fn order_request(&self, request: &PaymentRequest) -> RequestBuilder {
        self.client
            .post(join(&self.base_url, "/orders"))
            .header(reqwest::header::AUTHORIZATION, &self.token)
            .header(IDEMPOTENCY_KEY_HEADER, &request.reference_id)
            .json(request)
    }

    /// Turns the gateway's answer into its JSON body, or an error that keeps
    /// the HTTP status.
    async fn read_body(response: Response) -> Result<serde_json::Value, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), %body, "payment gateway returned an error");
            return Err(GatewayError::new(
                Some(status.as_u16()),
                format!("gateway answered {status}: {body}"),
            ));
        }
        Ok(response.json().await?)
    }
}

impl std::fmt::Debug for PagSeguroGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagSeguroGateway")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PaymentGateway for PagSeguroGateway {
    #[tracing::instrument(skip_all, fields(reference_id = %request.reference_id))]
    async fn create_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<GatewayPayment, GatewayError> {
        let response = self.order_request(request).send().await?;

        let body = Self::read_body(response).await?;
        GatewayPayment::from_response(body)
    }

    #[tracing::instrument(skip_all, fields(%payment_id))]
    async fn query_payment(
        &self,
        payment_id: &GatewayPaymentId,
    ) -> Result<GatewayPaymentStatus, GatewayError> {
        let response = self
            .client
            .get(join(&self.base_url, &format!("/orders/{payment_id}")))
            .header(reqwest::header::AUTHORIZATION, &self.token)
            .send()
            .await?;

        let body = Self::read_body(response).await?;
        GatewayPaymentStatus::from_response(payment_id.clone(), &body)
    }
}
