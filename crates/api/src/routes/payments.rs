//! Payment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use domain::Payment;
use serde::{Deserialize, Serialize};

use super::orders::OrderResponse;
use super::parse_order_id;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Serialize)]
pub struct PaymentResponse {
    pub payment_id: String,
    pub order_id: String,
    pub vehicle_id: String,
    pub amount_cents: i64,
    pub status: String,
    pub qr_code_link: String,
    pub method: String,
    pub gateway: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Payment> for PaymentResponse {
    fn from(payment: &Payment) -> Self {
        Self {
            payment_id: payment.gateway_payment_id.to_string(),
            order_id: payment.order_id.to_string(),
            vehicle_id: payment.vehicle_id.to_string(),
            amount_cents: payment.amount.cents(),
            status: payment.status.to_string(),
            qr_code_link: payment.qr_code_link.clone(),
            method: payment.method.clone(),
            gateway: payment.gateway.clone(),
            created_at: payment.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct PaymentStatusResponse {
    pub order: OrderResponse,
    pub payment: Option<PaymentResponse>,
}

/// POST /payments/:order_id: request a PIX payment for a reserved order.
#[tracing::instrument(skip(state))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<(StatusCode, Json<PaymentResponse>), ApiError> {
    let order_id = parse_order_id(&order_id)?;
    let payment = state.payments.create_payment(order_id).await?;
    Ok((StatusCode::CREATED, Json(PaymentResponse::from(&payment))))
}

/// GET /payments/:order_id?refresh=true
#[tracing::instrument(skip(state))]
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<PaymentStatusResponse>, ApiError> {
    let order_id = parse_order_id(&order_id)?;
    let order = state.payments.query_status(order_id, query.refresh).await?;
    let payment = state.payments.get_payment(order_id).await?;

    Ok(Json(PaymentStatusResponse {
        order: OrderResponse::from(&order),
        payment: payment.as_ref().map(PaymentResponse::from),
    }))
}
