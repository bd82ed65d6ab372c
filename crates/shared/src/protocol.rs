use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{DeliveryPreference, FeatureFlagId, OrderId, OrderStatus, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiSuggestedProduct {
    pub name: String,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AiSuggestedProduct {
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub summary: String,
    pub delivery_preference: DeliveryPreference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    /// JSON-encoded list of [`AiSuggestedProduct`], frozen at creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_suggested_products: Option<String>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Decodes the embedded product snapshot. Malformed payloads are logged and
    /// read as an empty list.
    pub fn suggested_products(&self) -> Vec<AiSuggestedProduct> {
        let Some(raw) = self.ai_suggested_products.as_deref() else {
            return Vec::new();
        };
        if raw.trim().is_empty() {
            return Vec::new();
        }
        match serde_json::from_str::<Vec<AiSuggestedProduct>>(raw) {
            Ok(products) => products,
            Err(err) => {
                warn!(order_id = self.id.0, "ignoring malformed ai product payload: {err}");
                Vec::new()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlag {
    pub id: FeatureFlagId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiSuggestionsRequest {
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSuggestionsResponse {
    pub suggestions: Vec<AiSuggestedProduct>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub summary: String,
    pub delivery_preference: DeliveryPreference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_products: Option<Vec<AiSuggestedProduct>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOrderRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdersResponse {
    pub orders: Vec<Order>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlagsResponse {
    pub flags: BTreeMap<String, bool>,
    #[serde(default)]
    pub details: Vec<FeatureFlag>,
}

/// Server-side filtering and paging accepted by `GET /orders`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub delivery_preference: Option<DeliveryPreference>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl OrderQuery {
    /// Query-string pairs with every unset or blank value left out.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(preference) = self.delivery_preference {
            pairs.push(("delivery_preference", preference.as_str().to_string()));
        }
        if let Some(sort_by) = self.sort_by.as_deref().filter(|v| !v.is_empty()) {
            pairs.push(("sort_by", sort_by.to_string()));
        }
        if let Some(sort_order) = self.sort_order.as_deref().filter(|v| !v.is_empty()) {
            pairs.push(("sort_order", sort_order.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset", offset.to_string()));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn order_with_products(raw: Option<&str>) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId(9),
            user_id: UserId(1),
            summary: "headache and fever relief".to_string(),
            delivery_preference: DeliveryPreference::InStore,
            delivery_address: None,
            postal_code: None,
            ai_suggested_products: raw.map(str::to_string),
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn decodes_order_from_backend_json() {
        let body = r#"{
            "id": 3,
            "user_id": 1,
            "summary": "Need allergy medication",
            "delivery_preference": "CURBSIDE",
            "delivery_address": "12 Elm St",
            "status": "processing",
            "created_at": "2025-01-10T09:30:00.123456Z",
            "updated_at": "2025-01-10T10:00:00Z"
        }"#;
        let order: Order = serde_json::from_str(body).expect("order");
        assert_eq!(order.id, OrderId(3));
        assert_eq!(order.delivery_preference, DeliveryPreference::Curbside);
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.postal_code, None);
    }

    #[test]
    fn reads_embedded_product_snapshot() {
        let order = order_with_products(Some(
            r#"[{"name":"Ibuprofen","quantity":2,"price":5.99,"reason":"pain"}]"#,
        ));
        let products = order.suggested_products();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].price, Decimal::from_str("5.99").expect("decimal"));
        assert_eq!(
            products[0].line_total(),
            Decimal::from_str("11.98").expect("decimal")
        );
    }

    #[test]
    fn malformed_product_snapshot_reads_as_empty() {
        assert!(order_with_products(Some("{not json")).suggested_products().is_empty());
        assert!(order_with_products(None).suggested_products().is_empty());
    }

    #[test]
    fn order_query_omits_unset_values() {
        let query = OrderQuery {
            status: Some(OrderStatus::Pending),
            sort_by: Some(String::new()),
            limit: Some(20),
            ..OrderQuery::default()
        };
        assert_eq!(
            query.to_pairs(),
            vec![("status", "pending".to_string()), ("limit", "20".to_string())]
        );
    }

    #[test]
    fn create_request_skips_absent_optionals() {
        let request = CreateOrderRequest {
            summary: "cold and flu medicine".to_string(),
            delivery_preference: DeliveryPreference::InStore,
            delivery_address: None,
            postal_code: None,
            selected_products: None,
        };
        let value = serde_json::to_value(&request).expect("json");
        assert_eq!(
            value,
            serde_json::json!({
                "summary": "cold and flu medicine",
                "delivery_preference": "IN_STORE"
            })
        );
    }
}
