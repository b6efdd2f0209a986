use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckinLogType {
    Checkin,
    Reset,
}

/// Ticket type id to signed count delta.
pub type PaymentBreakdown = BTreeMap<Uuid, i32>;

/// Immutable audit record, written in the same transaction as the reservation it describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinLogEntry {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub reservation_id: Uuid,
    pub log_type: CheckinLogType,
    pub count: i32,
    pub payment_info: Option<PaymentBreakdown>,
    pub created_at: DateTime<Utc>,
}
