use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tabled_rust::{ETag, TableEntity};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, TableEntity)]
pub struct Customer {
    pub id: String,
    #[table(rename = "DisplayName")]
    pub name: String,
    #[table(rename = "City")]
    pub city: String,
    pub loyalty_points: Option<i64>,
    #[table(json)]
    pub tags: Vec<String>,
    #[table(etag)]
    pub etag: Option<ETag>,
    #[table(timestamp)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Customer {
    pub fn new(id: impl Into<String>, name: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            city: city.into(),
            loyalty_points: None,
            tags: Vec::new(),
            etag: None,
            updated_at: None,
        }
    }

    /// Mapped fields only; server-assigned fields are ignored.
    pub fn same_fields(&self, other: &Customer) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.city == other.city
            && self.loyalty_points == other.loyalty_points
            && self.tags == other.tags
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: String,
    pub postcode: String,
}

#[derive(Clone, Debug, PartialEq, TableEntity)]
pub struct Order {
    #[table(id)]
    pub order_id: String,
    pub customer_id: String,
    #[table(rename = "City")]
    pub ship_city: String,
    pub total: f64,
    pub placed_at: DateTime<Utc>,
    pub reference: Uuid,
    pub express: bool,
    #[table(json)]
    pub address: Option<ShippingAddress>,
    #[table(skip)]
    pub cached_line_count: u32,
}

impl Order {
    pub fn new(order_id: impl Into<String>, customer_id: impl Into<String>, city: &str) -> Self {
        Self {
            order_id: order_id.into(),
            customer_id: customer_id.into(),
            ship_city: city.to_string(),
            total: 42.5,
            placed_at: Utc
                .with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
                .single()
                .expect("valid date"),
            reference: Uuid::new_v4(),
            express: false,
            address: None,
            cached_line_count: 0,
        }
    }
}
