use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A catalog entry. Booking only reads `duration_minutes` and `price`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub category: String,
    pub duration_minutes: i64,
    pub price: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub duration_minutes: i64,
    pub price: f64,
}
