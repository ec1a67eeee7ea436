//! Value objects for the order domain.

use serde::{Deserialize, Serialize};

/// Product identifier. Ingestion requires it to be a UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a new product ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the product ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Product {
    /// The product identifier.
    pub product_id: ProductId,

    /// Quantity ordered. Signed so that a negative amount reaches validation
    /// instead of failing to decode.
    pub quantity: i64,
}

impl Product {
    /// Creates a new order line.
    pub fn new(product_id: impl Into<ProductId>, quantity: i64) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Where the order is shipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

/// The customer placing the order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Customer {
    pub first_name: String,
    pub last_name: String,

    /// Contact address, also the recipient of every notification.
    #[serde(rename = "emailAddress")]
    pub email: String,

    pub shipping_address: ShippingAddress,
}

impl Customer {
    /// Returns "first last", as used in notification greetings.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_id_string_conversion() {
        let id = ProductId::new("SKU-001");
        assert_eq!(id.as_str(), "SKU-001");

        let id2: ProductId = "SKU-002".into();
        assert_eq!(id2.as_str(), "SKU-002");
    }

    #[test]
    fn test_customer_email_uses_email_address_key() {
        let customer = Customer {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: "jane@example.com".to_string(),
            shipping_address: ShippingAddress::default(),
        };
        let json = serde_json::to_value(&customer).unwrap();
        assert_eq!(json["emailAddress"], "jane@example.com");
        assert!(json.get("email").is_none());
        assert_eq!(json["shippingAddress"]["postalCode"], "");
    }

    #[test]
    fn test_full_name() {
        let customer = Customer {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            ..Customer::default()
        };
        assert_eq!(customer.full_name(), "Jane Doe");
    }

    #[test]
    fn test_product_rejects_unknown_fields() {
        let json = r#"{"productId":"p","quantity":1,"price":10}"#;
        assert!(serde_json::from_str::<Product>(json).is_err());
    }
}
