//! The order carried through every stage of the saga.

mod validation;
mod value_objects;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use validation::{ValidationErrors, is_valid_email};
pub use value_objects::{Customer, Product, ProductId, ShippingAddress};

/// A customer order.
///
/// Orders are immutable once ingested: every downstream event carries the
/// same value, and stages never re-validate what ingestion accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Order {
    pub order_id: String,
    pub products: Vec<Product>,
    pub customer: Customer,
}

impl Order {
    /// Creates an order with a freshly assigned order id.
    pub fn new(products: Vec<Product>, customer: Customer) -> Self {
        Self {
            order_id: Uuid::new_v4().to_string(),
            products,
            customer,
        }
    }

    /// Checks every ingestion rule, collecting one message per failing field.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        validation::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_order() -> Order {
        Order::new(
            vec![Product::new(Uuid::new_v4().to_string(), 2)],
            Customer {
                first_name: "Jane".to_string(),
                last_name: "Doe".to_string(),
                email: "jane@example.com".to_string(),
                shipping_address: ShippingAddress {
                    street: "1 Main St".to_string(),
                    city: "X".to_string(),
                    state: "Y".to_string(),
                    postal_code: "00000".to_string(),
                },
            },
        )
    }

    #[test]
    fn test_new_assigns_unique_order_ids() {
        assert_ne!(valid_order().order_id, valid_order().order_id);
    }

    #[test]
    fn test_valid_order_passes() {
        assert!(valid_order().validate().is_ok());
    }

    #[test]
    fn test_empty_products_rejected() {
        let mut order = valid_order();
        order.products.clear();
        let errors = order.validate().unwrap_err();
        assert_eq!(errors.get("products"), Some("must contain at least 1 product"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_product_rules() {
        let mut order = valid_order();
        order.products = vec![Product::new("SKU-001", 0)];
        let errors = order.validate().unwrap_err();
        assert_eq!(errors.get("productId"), Some("productId is not valid"));
        assert_eq!(errors.get("quantity"), Some("quantity must be more than zero"));
    }

    #[test]
    fn test_customer_rules() {
        let mut order = valid_order();
        order.customer.first_name = "J".to_string();
        order.customer.last_name = "Do".to_string();
        order.customer.email = "not-an-email".to_string();
        let errors = order.validate().unwrap_err();
        assert!(errors.get("firstName").is_some());
        assert!(errors.get("lastName").is_some());
        assert_eq!(errors.get("email"), Some("invalid customer email address"));
    }

    #[test]
    fn test_name_length_boundaries() {
        let mut order = valid_order();
        order.customer.first_name = "Jo".to_string();
        order.customer.last_name = "Doe".to_string();
        assert!(order.validate().is_ok());
    }

    #[test]
    fn test_address_fields_required() {
        let mut order = valid_order();
        order.customer.shipping_address = ShippingAddress::default();
        let errors = order.validate().unwrap_err();
        let fields: Vec<&str> = errors.fields().collect();
        assert_eq!(fields, vec!["city", "postalCode", "state", "street"]);
    }

    #[test]
    fn test_nested_unknown_field_rejected() {
        let order = valid_order();
        let mut json = serde_json::to_value(&order).unwrap();
        json["customer"]["shippingAddress"]["country"] = serde_json::json!("NL");
        assert!(serde_json::from_value::<Order>(json).is_err());
    }
}
