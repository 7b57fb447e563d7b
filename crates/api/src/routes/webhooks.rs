//! Payment gateway webhooks.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::PaymentOutcome;
use saga::{WebhookNotification, WebhookOutcome};
use serde::Serialize;

use super::orders::OrderResponse;
use super::parse_order_id;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// POST /webhooks/pagseguro
///
/// Always answers 200 so the gateway does not re-deliver; failures are logged.
#[tracing::instrument(skip_all)]
pub async fn pagseguro(State(state): State<Arc<AppState>>, body: Bytes) -> (StatusCode, Json<WebhookAck>) {
    metrics::counter!("webhooks_received_total").increment(1);

    match serde_json::from_slice::<WebhookNotification>(&body) {
        Ok(notification) => match state.payments.handle_webhook(&notification).await {
            Ok(WebhookOutcome::Applied(outcome)) => {
                tracing::info!(%outcome, "webhook applied");
            }
            Ok(outcome) => {
                tracing::debug!(?outcome, "webhook acknowledged without changes");
            }
            Err(e) => {
                tracing::warn!(error = %e, "webhook processing failed");
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "malformed webhook body");
        }
    }

    (StatusCode::OK, Json(WebhookAck { received: true }))
}

/// POST /webhooks/simulation/:order_id/:outcome: confirm a payment by hand.
#[tracing::instrument(skip(state))]
pub async fn simulate(
    State(state): State<Arc<AppState>>,
    Path((order_id, outcome)): Path<(String, String)>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&order_id)?;
    let outcome: PaymentOutcome = outcome.parse()?;
    let order = state.payments.confirm_payment(order_id, outcome).await?;
    Ok(Json(OrderResponse::from(&order)))
}
