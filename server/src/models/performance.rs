use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Performance {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub production_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub capacity: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub capacity: i32,
    pub booked: i32,
    pub remaining: i32,
}

impl Availability {
    pub fn new(capacity: i32, booked: i32) -> Self {
        Self {
            capacity,
            booked,
            remaining: (capacity - booked).max(0),
        }
    }
}
