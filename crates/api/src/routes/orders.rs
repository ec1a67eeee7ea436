//! Order ingestion endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use domain::{Customer, Order, Product, ShippingAddress};
use saga::{OutboundMessage, Publisher};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared state of the ingestion service.
pub struct AppState {
    pub publisher: Publisher,
}

impl AppState {
    pub fn new(publisher: Publisher) -> Self {
        Self { publisher }
    }
}

/// Body of `POST /v1/orders`. The order id is assigned by the server.
///
/// Missing fields at any level decode as empty so that validation reports
/// them per field; anything unknown is rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct CreateOrderRequest {
    pub products: Vec<ProductRequest>,
    pub customer: CustomerRequest,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ProductRequest {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct CustomerRequest {
    pub first_name: String,
    pub last_name: String,
    #[serde(rename = "emailAddress")]
    pub email: String,
    pub shipping_address: ShippingAddressRequest,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ShippingAddressRequest {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl CreateOrderRequest {
    /// Builds the order with a fresh order id. Validation is left to the caller.
    pub fn into_order(self) -> Order {
        let products = self
            .products
            .into_iter()
            .map(|p| Product::new(p.product_id, p.quantity))
            .collect();
        let CustomerRequest {
            first_name,
            last_name,
            email,
            shipping_address: address,
        } = self.customer;

        Order::new(
            products,
            Customer {
                first_name,
                last_name,
                email,
                shipping_address: ShippingAddress {
                    street: address.street,
                    city: address.city,
                    state: address.state,
                    postal_code: address.postal_code,
                },
            },
        )
    }
}

#[derive(Debug, Serialize)]
pub struct OrderAcceptedResponse {
    pub message: &'static str,
}

/// POST /v1/orders: validates the order and publishes `OrderReceived`.
#[tracing::instrument(skip_all)]
pub async fn create(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderAcceptedResponse>), ApiError> {
    let Json(request) = payload.inspect_err(|rejection| {
        metrics::counter!("orders_rejected_total", "reason" => "malformed").increment(1);
        tracing::warn!(error = %rejection.body_text(), "malformed order request");
    })?;

    let order = request.into_order();
    if let Err(errors) = order.validate() {
        metrics::counter!("orders_rejected_total", "reason" => "validation").increment(1);
        tracing::warn!(%errors, "failed validating order");
        return Err(errors.into());
    }

    let order_id = order.order_id.clone();
    let event_id = state
        .publisher
        .publish(OutboundMessage::OrderReceived(order).into())
        .await?;

    metrics::counter!("orders_accepted_total").increment(1);
    tracing::info!(%order_id, %event_id, "order accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(OrderAcceptedResponse {
            message: "order accepted",
        }),
    ))
}
