use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckinStatus {
    NotCheckedIn,
    PartiallyCheckedIn,
    CheckedIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Unpaid,
    PartiallyPaid,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationSource {
    PreReservation,
    PublicForm,
    SameDay,
}

/// One ticket-type line of a reservation, with the unit price captured at booking time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TicketLine {
    pub ticket_type_id: Uuid,
    pub count: i32,
    pub price: i64,
    pub paid_count: i32,
}

impl TicketLine {
    pub fn new(ticket_type_id: Uuid, count: i32, price: i64) -> Self {
        Self {
            ticket_type_id,
            count,
            price,
            paid_count: 0,
        }
    }

    pub fn subtotal(&self) -> i64 {
        i64::from(self.count).saturating_mul(self.price)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub performance_id: Uuid,
    pub customer: Customer,
    pub status: ReservationStatus,
    pub source: ReservationSource,
    pub checkin_status: CheckinStatus,
    pub checked_in_tickets: i32,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub payment_status: PaymentStatus,
    pub paid_amount: i64,
    pub ticket_lines: Vec<TicketLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Sum of ticket counts over all lines. Always derived, never stored.
    pub fn total_tickets(&self) -> i32 {
        self.ticket_lines
            .iter()
            .fold(0i32, |total, line| total.saturating_add(line.count))
    }

    /// Sum of `count * price` over all lines. Always derived, never stored.
    pub fn total_amount(&self) -> i64 {
        self.ticket_lines
            .iter()
            .map(TicketLine::subtotal)
            .fold(0i64, i64::saturating_add)
    }

    pub fn is_active(&self) -> bool {
        self.status != ReservationStatus::Canceled
    }

    pub fn line_mut(&mut self, ticket_type_id: Uuid) -> Option<&mut TicketLine> {
        self.ticket_lines
            .iter_mut()
            .find(|line| line.ticket_type_id == ticket_type_id)
    }
}

/// Reservation shape returned over the API, carrying the derived totals.
#[derive(Debug, Clone, Serialize)]
pub struct ReservationView {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub total_tickets: i32,
    pub total_amount: i64,
}

impl From<Reservation> for ReservationView {
    fn from(reservation: Reservation) -> Self {
        Self {
            total_tickets: reservation.total_tickets(),
            total_amount: reservation.total_amount(),
            reservation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_strings_match_stored_format() {
        assert_eq!(CheckinStatus::PartiallyCheckedIn.to_string(), "PARTIALLY_CHECKED_IN");
        assert_eq!(
            ReservationSource::from_str("SAME_DAY").unwrap(),
            ReservationSource::SameDay
        );
        assert_eq!(
            serde_json::to_string(&PaymentStatus::PartiallyPaid).unwrap(),
            "\"PARTIALLY_PAID\""
        );
    }

    #[test]
    fn test_total_tickets_saturates() {
        let reservation = Reservation {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            performance_id: Uuid::new_v4(),
            customer: Customer {
                name: "Aoi".to_string(),
                email: None,
                phone: None,
            },
            status: ReservationStatus::Confirmed,
            source: ReservationSource::PreReservation,
            checkin_status: CheckinStatus::NotCheckedIn,
            checked_in_tickets: 0,
            checked_in_at: None,
            payment_status: PaymentStatus::Unpaid,
            paid_amount: 0,
            ticket_lines: vec![
                TicketLine::new(Uuid::new_v4(), i32::MAX, 1),
                TicketLine::new(Uuid::new_v4(), 2, 1),
            ],
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        assert_eq!(reservation.total_tickets(), i32::MAX);
    }

    #[test]
    fn test_line_subtotal_widens_before_multiplying() {
        let line = TicketLine::new(Uuid::new_v4(), 3, 2_500);
        assert_eq!(line.subtotal(), 7_500);
        assert_eq!(line.paid_count, 0);
    }
}
