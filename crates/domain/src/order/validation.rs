//! Field-level validation applied once, when an order is ingested.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

use super::Order;

static EMAIL_RX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email pattern is a valid regex")
});

/// Returns true if `email` looks like a deliverable address.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RX.is_match(email)
}

/// Validation failures keyed by field name.
///
/// Only the first failure per field is kept. Serializes as a flat
/// `{field: message}` object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `message` for `field` unless `ok` holds.
    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add(field, message);
        }
    }

    /// Records a failure, keeping an earlier message for the same field.
    pub fn add(&mut self, field: &str, message: &str) {
        self.0
            .entry(field.to_string())
            .or_insert_with(|| message.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the message recorded for `field`, if any.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        write!(f, "{}", parts.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

pub(crate) fn validate(order: &Order) -> Result<(), ValidationErrors> {
    let mut v = ValidationErrors::new();

    v.check(
        !order.products.is_empty(),
        "products",
        "must contain at least 1 product",
    );
    for product in &order.products {
        v.check(
            Uuid::parse_str(product.product_id.as_str()).is_ok(),
            "productId",
            "productId is not valid",
        );
        v.check(
            product.quantity > 0,
            "quantity",
            "quantity must be more than zero",
        );
    }

    let customer = &order.customer;
    v.check(
        is_valid_email(&customer.email),
        "email",
        "invalid customer email address",
    );
    v.check(
        customer.first_name.chars().count() >= 2,
        "firstName",
        "must be at least 2 characters",
    );
    v.check(
        customer.last_name.chars().count() >= 3,
        "lastName",
        "must be at least 3 characters",
    );

    let address = &customer.shipping_address;
    v.check(!address.street.is_empty(), "street", "is required");
    v.check(!address.city.is_empty(), "city", "is required");
    v.check(!address.state.is_empty(), "state", "is required");
    v.check(!address.postal_code.is_empty(), "postalCode", "is required");

    if v.is_empty() { Ok(()) } else { Err(v) }
}
