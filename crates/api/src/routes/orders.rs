//! Order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{CustomerId, VehicleId};
use domain::{Order, OrderStatus};
use serde::{Deserialize, Serialize};

use super::parse_order_id;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: String,
    pub vehicle_id: String,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct VehicleResponse {
    pub vehicle_id: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price_cents: i64,
    pub plate: String,
}

#[derive(Serialize)]
pub struct StatusEntryResponse {
    pub status: String,
    pub at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub customer_id: String,
    pub vehicle: VehicleResponse,
    pub total_cents: i64,
    pub status: String,
    pub payment_status: String,
    pub payment_id: Option<String>,
    pub status_history: Vec<StatusEntryResponse>,
    pub created_at: DateTime<Utc>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        let vehicle = order.vehicle();
        Self {
            id: order.id().to_string(),
            customer_id: order.customer_id().to_string(),
            vehicle: VehicleResponse {
                vehicle_id: vehicle.vehicle_id.to_string(),
                make: vehicle.make.clone(),
                model: vehicle.model.clone(),
                year: vehicle.year,
                price_cents: vehicle.price.cents(),
                plate: vehicle.plate.clone(),
            },
            total_cents: order.total().cents(),
            status: order.status().to_string(),
            payment_status: order.payment_status().to_string(),
            payment_id: order.payment_id().map(|id| id.to_string()),
            status_history: order
                .status_history()
                .iter()
                .map(|entry| StatusEntryResponse {
                    status: entry.status.to_string(),
                    at: entry.at,
                })
                .collect(),
            created_at: order.created_at(),
        }
    }
}

fn to_responses(orders: &[Order]) -> Vec<OrderResponse> {
    orders.iter().map(OrderResponse::from).collect()
}

// -- Handlers --

/// POST /orders: run the sale saga for a customer and a vehicle.
#[tracing::instrument(skip(state, req), fields(customer_id = %req.customer_id, vehicle_id = %req.vehicle_id))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state
        .coordinator
        .create_order(CustomerId::new(req.customer_id), VehicleId::new(req.vehicle_id))
        .await?;

    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// GET /orders/:id
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.coordinator.get_order(order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// GET /orders
#[tracing::instrument(skip(state))]
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.coordinator.list_orders().await?;
    Ok(Json(to_responses(&orders)))
}

/// GET /orders/active: orders that are neither completed nor cancelled.
#[tracing::instrument(skip(state))]
pub async fn list_active(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.coordinator.list_active_orders().await?;
    Ok(Json(to_responses(&orders)))
}

/// GET /orders/status/:status
#[tracing::instrument(skip(state))]
pub async fn list_by_status(
    State(state): State<Arc<AppState>>,
    Path(status): Path<String>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let status: OrderStatus = status.parse()?;
    let orders = state.coordinator.list_by_status(status).await?;
    Ok(Json(to_responses(&orders)))
}

/// GET /orders/customer/:customer_id
#[tracing::instrument(skip(state))]
pub async fn list_by_customer(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<String>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state
        .coordinator
        .list_by_customer(&CustomerId::new(customer_id))
        .await?;
    Ok(Json(to_responses(&orders)))
}

/// PUT /orders/:id/status: cancel or complete an order.
#[tracing::instrument(skip(state, req), fields(target = %req.status))]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let target: OrderStatus = req.status.parse()?;
    let order = state
        .coordinator
        .update_order_status(order_id, target)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}
