use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum::{Display, EnumString};
use uuid::Uuid;

use super::performance::Performance;

/// Manual override for the booking form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceptionStatus {
    Open,
    #[default]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceptionEndMode {
    Manual,
    PerformanceStart,
    BeforePerformance,
    DayBefore,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceptionConfig {
    pub status: ReceptionStatus,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub end_mode: Option<ReceptionEndMode>,
    /// Offset before the curtain, only read in `BeforePerformance` mode.
    pub end_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketType {
    pub id: Uuid,
    pub production_id: Uuid,
    pub name: String,
    /// Legacy single price, used when the advance or door price is missing.
    pub price: i64,
    pub advance_price: Option<i64>,
    pub door_price: Option<i64>,
}

impl TicketType {
    pub fn advance_unit_price(&self) -> i64 {
        self.advance_price.unwrap_or(self.price)
    }

    pub fn door_unit_price(&self) -> i64 {
        self.door_price.unwrap_or(self.price)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Production {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub title: String,
    pub reception: ReceptionConfig,
    pub ticket_types: Vec<TicketType>,
    pub performances: Vec<Performance>,
}

impl Production {
    pub fn ticket_type(&self, ticket_type_id: Uuid) -> Option<&TicketType> {
        self.ticket_types.iter().find(|t| t.id == ticket_type_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_prices_fall_back_to_legacy_price() {
        let mut ticket_type = TicketType {
            id: Uuid::new_v4(),
            production_id: Uuid::new_v4(),
            name: "General".to_string(),
            price: 3_000,
            advance_price: None,
            door_price: None,
        };
        assert_eq!(ticket_type.advance_unit_price(), 3_000);
        assert_eq!(ticket_type.door_unit_price(), 3_000);

        ticket_type.advance_price = Some(2_800);
        ticket_type.door_price = Some(3_300);
        assert_eq!(ticket_type.advance_unit_price(), 2_800);
        assert_eq!(ticket_type.door_unit_price(), 3_300);
    }
}
