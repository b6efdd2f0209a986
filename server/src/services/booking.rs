//! Construction of new reservations and status changes on existing ones.
//!
//! The store supplies the performance and its current booked count from
//! inside the transaction that will persist the result.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{
    CheckinStatus, Customer, PaymentStatus, Performance, Production, Reservation,
    ReservationSource, ReservationStatus, TicketLine, TicketType,
};
use crate::services::ledger::refresh_statuses;
use crate::utils::{AppError, AppResult};

/// Requested quantity per ticket type.
pub type TicketCounts = BTreeMap<Uuid, i32>;

const SAME_DAY_GUEST: &str = "Same-day guest";

#[derive(Debug, Clone, Deserialize)]
pub struct NewReservation {
    pub performance_id: Uuid,
    pub customer: Customer,
    pub tickets: TicketCounts,
    pub source: ReservationSource,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SameDayRequest {
    pub performance_id: Uuid,
    pub customer_name: Option<String>,
    pub tickets: TicketCounts,
}

/// Fails with `CapacityExceeded` when `requested` does not fit in what is left.
pub fn ensure_capacity(performance: &Performance, booked: i32, requested: i32) -> AppResult<()> {
    let remaining = performance.capacity.saturating_sub(booked);
    if requested > remaining {
        return Err(AppError::CapacityExceeded {
            requested,
            remaining: remaining.max(0),
        });
    }
    Ok(())
}

/// Lines are emitted in the production's ticket-type order. Zero counts are dropped.
fn build_lines(
    production: &Production,
    tickets: &TicketCounts,
    unit_price: impl Fn(&TicketType) -> i64,
) -> AppResult<Vec<TicketLine>> {
    for (ticket_type_id, count) in tickets {
        if *count < 0 {
            return Err(AppError::ValidationError(format!(
                "ticket count for '{}' must not be negative",
                ticket_type_id
            )));
        }
        if *count > 0 && production.ticket_type(*ticket_type_id).is_none() {
            return Err(AppError::not_found("Ticket type", ticket_type_id));
        }
    }

    let lines: Vec<TicketLine> = production
        .ticket_types
        .iter()
        .filter_map(|ticket_type| {
            tickets
                .get(&ticket_type.id)
                .filter(|count| **count > 0)
                .map(|count| TicketLine::new(ticket_type.id, *count, unit_price(ticket_type)))
        })
        .collect();

    if lines.is_empty() {
        return Err(AppError::ValidationError(
            "at least one ticket is required".to_string(),
        ));
    }
    Ok(lines)
}

/// Total tickets over the lines. A sum past `i32::MAX` cannot fit any
/// performance, so it is reported as over capacity.
fn requested_tickets(
    lines: &[TicketLine],
    performance: &Performance,
    booked: i32,
) -> AppResult<i32> {
    lines
        .iter()
        .try_fold(0i32, |total, line| total.checked_add(line.count))
        .ok_or(AppError::CapacityExceeded {
            requested: i32::MAX,
            remaining: performance.capacity.saturating_sub(booked).max(0),
        })
}

fn check_performance(production: &Production, performance: &Performance) -> AppResult<()> {
    if performance.production_id != production.id {
        return Err(AppError::ValidationError(format!(
            "performance '{}' does not belong to production '{}'",
            performance.id, production.id
        )));
    }
    Ok(())
}

pub fn build_reservation(
    production: &Production,
    performance: &Performance,
    request: &NewReservation,
    booked: i32,
    now: DateTime<Utc>,
) -> AppResult<Reservation> {
    check_performance(production, performance)?;

    let status = match request.source {
        ReservationSource::PublicForm => ReservationStatus::Pending,
        ReservationSource::PreReservation => ReservationStatus::Confirmed,
        ReservationSource::SameDay => {
            return Err(AppError::ValidationError(
                "same-day tickets are issued through the same-day endpoint".to_string(),
            ))
        }
    };

    let name = request.customer.name.trim();
    if name.is_empty() {
        return Err(AppError::ValidationError(
            "customer name is required".to_string(),
        ));
    }

    let ticket_lines = build_lines(production, &request.tickets, TicketType::advance_unit_price)?;
    let requested = requested_tickets(&ticket_lines, performance, booked)?;
    ensure_capacity(performance, booked, requested)?;

    let mut reservation = Reservation {
        id: Uuid::new_v4(),
        organization_id: performance.organization_id,
        performance_id: performance.id,
        customer: Customer {
            name: name.to_string(),
            email: request.customer.email.clone(),
            phone: request.customer.phone.clone(),
        },
        status,
        source: request.source,
        checkin_status: CheckinStatus::NotCheckedIn,
        checked_in_tickets: 0,
        checked_in_at: None,
        payment_status: PaymentStatus::Unpaid,
        paid_amount: 0,
        ticket_lines,
        created_at: now,
        updated_at: now,
    };
    refresh_statuses(&mut reservation, now);
    Ok(reservation)
}

/// A same-day reservation is born checked in and paid at door prices.
pub fn build_same_day_reservation(
    production: &Production,
    performance: &Performance,
    request: &SameDayRequest,
    booked: i32,
    now: DateTime<Utc>,
) -> AppResult<Reservation> {
    check_performance(production, performance)?;

    let mut ticket_lines =
        build_lines(production, &request.tickets, TicketType::door_unit_price)?;
    let total_quantity = requested_tickets(&ticket_lines, performance, booked)?;
    ensure_capacity(performance, booked, total_quantity)?;

    for line in &mut ticket_lines {
        line.paid_count = line.count;
    }
    let total_amount = ticket_lines
        .iter()
        .map(TicketLine::subtotal)
        .fold(0i64, i64::saturating_add);

    let name = request
        .customer_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(SAME_DAY_GUEST);

    Ok(Reservation {
        id: Uuid::new_v4(),
        organization_id: performance.organization_id,
        performance_id: performance.id,
        customer: Customer {
            name: name.to_string(),
            email: None,
            phone: None,
        },
        status: ReservationStatus::Confirmed,
        source: ReservationSource::SameDay,
        checkin_status: CheckinStatus::CheckedIn,
        checked_in_tickets: total_quantity,
        checked_in_at: Some(now),
        payment_status: PaymentStatus::Paid,
        paid_amount: total_amount,
        ticket_lines,
        created_at: now,
        updated_at: now,
    })
}

/// `booked` must exclude this reservation when it is currently canceled,
/// which holds for the non-canceled booked count.
pub fn change_status(
    mut reservation: Reservation,
    status: ReservationStatus,
    performance: &Performance,
    booked: i32,
    now: DateTime<Utc>,
) -> AppResult<Reservation> {
    if !reservation.is_active() && status != ReservationStatus::Canceled {
        ensure_capacity(performance, booked, reservation.total_tickets())?;
    }
    reservation.status = status;
    reservation.updated_at = now;
    Ok(reservation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReceptionConfig;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 18, 0, 0).unwrap()
    }

    fn fixture() -> (Production, Uuid, Uuid) {
        let organization_id = Uuid::new_v4();
        let production_id = Uuid::new_v4();
        let general = Uuid::new_v4();
        let student = Uuid::new_v4();
        let production = Production {
            id: production_id,
            organization_id,
            title: "Uncle Vanya".to_string(),
            reception: ReceptionConfig::default(),
            ticket_types: vec![
                TicketType {
                    id: general,
                    production_id,
                    name: "General".to_string(),
                    price: 3_500,
                    advance_price: Some(3_000),
                    door_price: Some(3_500),
                },
                TicketType {
                    id: student,
                    production_id,
                    name: "Student".to_string(),
                    price: 2_000,
                    advance_price: None,
                    door_price: None,
                },
            ],
            performances: vec![Performance {
                id: Uuid::new_v4(),
                organization_id,
                production_id,
                start_time: now() + chrono::Duration::hours(1),
                capacity: 10,
            }],
        };
        (production, general, student)
    }

    #[test]
    fn test_same_day_reservation_is_settled_at_door_prices() {
        let (production, general, student) = fixture();
        let performance = production.performances[0].clone();
        let request = SameDayRequest {
            performance_id: performance.id,
            customer_name: None,
            tickets: TicketCounts::from([(general, 2), (student, 1)]),
        };

        let reservation =
            build_same_day_reservation(&production, &performance, &request, 5, now()).unwrap();

        assert_eq!(reservation.source, ReservationSource::SameDay);
        assert_eq!(reservation.status, ReservationStatus::Confirmed);
        assert_eq!(reservation.checkin_status, CheckinStatus::CheckedIn);
        assert_eq!(reservation.checked_in_tickets, 3);
        assert_eq!(reservation.checked_in_at, Some(now()));
        assert_eq!(reservation.payment_status, PaymentStatus::Paid);
        assert_eq!(reservation.paid_amount, 2 * 3_500 + 2_000);
        assert_eq!(reservation.paid_amount, reservation.total_amount());
        assert!(reservation
            .ticket_lines
            .iter()
            .all(|line| line.paid_count == line.count));
        assert_eq!(reservation.customer.name, SAME_DAY_GUEST);
    }

    #[test]
    fn test_same_day_rejects_over_capacity() {
        let (production, general, _) = fixture();
        let performance = production.performances[0].clone();
        let request = SameDayRequest {
            performance_id: performance.id,
            customer_name: Some("Walk-in".to_string()),
            tickets: TicketCounts::from([(general, 3)]),
        };

        let err =
            build_same_day_reservation(&production, &performance, &request, 8, now()).unwrap_err();
        assert!(matches!(
            err,
            AppError::CapacityExceeded {
                requested: 3,
                remaining: 2
            }
        ));

        assert!(build_same_day_reservation(&production, &performance, &request, 7, now()).is_ok());
    }

    #[test]
    fn test_same_day_counts_that_overflow_are_over_capacity() {
        let (production, general, student) = fixture();
        let performance = production.performances[0].clone();
        let request = SameDayRequest {
            performance_id: performance.id,
            customer_name: None,
            tickets: TicketCounts::from([(general, i32::MAX), (student, i32::MAX)]),
        };

        let err =
            build_same_day_reservation(&production, &performance, &request, 0, now()).unwrap_err();
        assert!(matches!(
            err,
            AppError::CapacityExceeded {
                requested: i32::MAX,
                remaining: 10
            }
        ));
    }

    #[test]
    fn test_reservation_counts_that_overflow_are_over_capacity() {
        let (production, general, student) = fixture();
        let performance = production.performances[0].clone();
        let request = NewReservation {
            performance_id: performance.id,
            customer: Customer {
                name: "Ren".to_string(),
                email: None,
                phone: None,
            },
            tickets: TicketCounts::from([(general, i32::MAX), (student, 1)]),
            source: ReservationSource::PreReservation,
        };
        assert!(matches!(
            build_reservation(&production, &performance, &request, 3, now()),
            Err(AppError::CapacityExceeded { remaining: 7, .. })
        ));
    }

    #[test]
    fn test_unknown_ticket_type_is_not_found() {
        let (production, _, _) = fixture();
        let performance = production.performances[0].clone();
        let request = SameDayRequest {
            performance_id: performance.id,
            customer_name: None,
            tickets: TicketCounts::from([(Uuid::new_v4(), 1)]),
        };
        let err =
            build_same_day_reservation(&production, &performance, &request, 0, now()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_public_form_reservation_uses_advance_prices() {
        let (production, general, student) = fixture();
        let performance = production.performances[0].clone();
        let request = NewReservation {
            performance_id: performance.id,
            customer: Customer {
                name: "  Mika Sato ".to_string(),
                email: Some("mika@example.com".to_string()),
                phone: None,
            },
            tickets: TicketCounts::from([(general, 1), (student, 0)]),
            source: ReservationSource::PublicForm,
        };

        let reservation = build_reservation(&production, &performance, &request, 0, now()).unwrap();
        assert_eq!(reservation.status, ReservationStatus::Pending);
        assert_eq!(reservation.customer.name, "Mika Sato");
        assert_eq!(reservation.ticket_lines.len(), 1);
        assert_eq!(reservation.total_amount(), 3_000);
        assert_eq!(reservation.payment_status, PaymentStatus::Unpaid);
        assert_eq!(reservation.checkin_status, CheckinStatus::NotCheckedIn);
    }

    #[test]
    fn test_reservation_requires_tickets_and_name() {
        let (production, general, _) = fixture();
        let performance = production.performances[0].clone();
        let mut request = NewReservation {
            performance_id: performance.id,
            customer: Customer {
                name: " ".to_string(),
                email: None,
                phone: None,
            },
            tickets: TicketCounts::from([(general, 1)]),
            source: ReservationSource::PreReservation,
        };
        assert!(matches!(
            build_reservation(&production, &performance, &request, 0, now()),
            Err(AppError::ValidationError(_))
        ));

        request.customer.name = "Ren".to_string();
        request.tickets = TicketCounts::from([(general, 0)]);
        assert!(matches!(
            build_reservation(&production, &performance, &request, 0, now()),
            Err(AppError::ValidationError(_))
        ));

        request.tickets = TicketCounts::from([(general, 1)]);
        request.source = ReservationSource::SameDay;
        assert!(matches!(
            build_reservation(&production, &performance, &request, 0, now()),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn test_reactivating_canceled_reservation_rechecks_capacity() {
        let (production, general, _) = fixture();
        let performance = production.performances[0].clone();
        let request = NewReservation {
            performance_id: performance.id,
            customer: Customer {
                name: "Ren".to_string(),
                email: None,
                phone: None,
            },
            tickets: TicketCounts::from([(general, 4)]),
            source: ReservationSource::PreReservation,
        };
        let reservation = build_reservation(&production, &performance, &request, 0, now()).unwrap();
        let canceled =
            change_status(reservation, ReservationStatus::Canceled, &performance, 4, now())
                .unwrap();
        assert_eq!(canceled.status, ReservationStatus::Canceled);

        let err = change_status(
            canceled.clone(),
            ReservationStatus::Confirmed,
            &performance,
            7,
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::CapacityExceeded { .. }));

        let restored =
            change_status(canceled, ReservationStatus::Confirmed, &performance, 6, now()).unwrap();
        assert_eq!(restored.status, ReservationStatus::Confirmed);
    }
}
