//! Check-in and payment reconciliation for a single reservation.
//!
//! Every function here is pure: the store hands in a freshly loaded
//! [`Reservation`], gets back the updated record plus the audit entry, and
//! persists both in one transaction.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    CheckinLogEntry, CheckinLogType, CheckinStatus, PaymentBreakdown, PaymentStatus, Reservation,
};
use crate::utils::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerCommand {
    AddCheckedInTickets {
        count: i32,
    },
    ResetCheckIn,
    CheckinWithPayment {
        checkin_count: i32,
        payment_amount: i64,
        breakdown: PaymentBreakdown,
    },
    PartialReset {
        checkin_count: i32,
        refund_amount: i64,
        breakdown: PaymentBreakdown,
    },
    RegisterPayment {
        received_amount: i64,
    },
}

impl LedgerCommand {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerCommand::AddCheckedInTickets { .. } => "add_checked_in_tickets",
            LedgerCommand::ResetCheckIn => "reset_check_in",
            LedgerCommand::CheckinWithPayment { .. } => "checkin_with_payment",
            LedgerCommand::PartialReset { .. } => "partial_reset",
            LedgerCommand::RegisterPayment { .. } => "register_payment",
        }
    }

    /// Rejects negative deltas. Direction is carried by the command, not the sign.
    pub fn validate(&self) -> AppResult<()> {
        match self {
            LedgerCommand::AddCheckedInTickets { count } => {
                if *count < 1 {
                    return Err(AppError::ValidationError(
                        "count must be at least 1".to_string(),
                    ));
                }
            }
            LedgerCommand::ResetCheckIn => {}
            LedgerCommand::CheckinWithPayment {
                checkin_count,
                payment_amount,
                breakdown,
            } => {
                non_negative("checkin_count", i64::from(*checkin_count))?;
                non_negative("payment_amount", *payment_amount)?;
                validate_breakdown(breakdown)?;
            }
            LedgerCommand::PartialReset {
                checkin_count,
                refund_amount,
                breakdown,
            } => {
                non_negative("checkin_count", i64::from(*checkin_count))?;
                non_negative("refund_amount", *refund_amount)?;
                validate_breakdown(breakdown)?;
            }
            LedgerCommand::RegisterPayment { received_amount } => {
                non_negative("received_amount", *received_amount)?;
            }
        }
        Ok(())
    }

    fn is_forward(&self) -> bool {
        matches!(
            self,
            LedgerCommand::AddCheckedInTickets { .. }
                | LedgerCommand::CheckinWithPayment { .. }
                | LedgerCommand::RegisterPayment { .. }
        )
    }
}

fn non_negative(field: &str, value: i64) -> AppResult<()> {
    if value < 0 {
        return Err(AppError::ValidationError(format!(
            "{} must not be negative",
            field
        )));
    }
    Ok(())
}

fn validate_breakdown(breakdown: &PaymentBreakdown) -> AppResult<()> {
    for (ticket_type_id, count) in breakdown {
        if *count < 0 {
            return Err(AppError::ValidationError(format!(
                "breakdown count for ticket type '{}' must not be negative",
                ticket_type_id
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct LedgerOutcome {
    pub reservation: Reservation,
    /// `None` only for `RegisterPayment`, which leaves no audit trail.
    pub log: Option<CheckinLogEntry>,
}

/// Zero-ticket reservations are `NotCheckedIn`.
pub fn checkin_status_for(checked_in_tickets: i32, total_tickets: i32) -> CheckinStatus {
    if checked_in_tickets <= 0 {
        CheckinStatus::NotCheckedIn
    } else if checked_in_tickets >= total_tickets {
        CheckinStatus::CheckedIn
    } else {
        CheckinStatus::PartiallyCheckedIn
    }
}

pub fn payment_status_for(paid_amount: i64, total_amount: i64) -> PaymentStatus {
    if paid_amount >= total_amount {
        PaymentStatus::Paid
    } else if paid_amount > 0 {
        PaymentStatus::PartiallyPaid
    } else {
        PaymentStatus::Unpaid
    }
}

/// Recomputes both status enums and `checked_in_at` from the counters.
pub fn refresh_statuses(reservation: &mut Reservation, now: DateTime<Utc>) {
    let total_tickets = reservation.total_tickets();
    let total_amount = reservation.total_amount();

    reservation.checked_in_tickets = reservation.checked_in_tickets.clamp(0, total_tickets.max(0));
    reservation.paid_amount = reservation.paid_amount.max(0);

    reservation.checkin_status = checkin_status_for(reservation.checked_in_tickets, total_tickets);
    reservation.payment_status = payment_status_for(reservation.paid_amount, total_amount);

    if reservation.checked_in_tickets == 0 {
        reservation.checked_in_at = None;
    } else if reservation.checked_in_at.is_none() {
        reservation.checked_in_at = Some(now);
    }
}

fn apply_breakdown(reservation: &mut Reservation, breakdown: &PaymentBreakdown, sign: i32) {
    for (ticket_type_id, count) in breakdown {
        if *count == 0 {
            continue;
        }
        // Unknown ticket types are skipped.
        if let Some(line) = reservation.line_mut(*ticket_type_id) {
            line.paid_count = line
                .paid_count
                .saturating_add(sign * count)
                .clamp(0, line.count.max(0));
        }
    }
}

fn log_entry(
    reservation: &Reservation,
    log_type: CheckinLogType,
    count: i32,
    payment_info: Option<PaymentBreakdown>,
    now: DateTime<Utc>,
) -> CheckinLogEntry {
    CheckinLogEntry {
        id: Uuid::new_v4(),
        organization_id: reservation.organization_id,
        reservation_id: reservation.id,
        log_type,
        count,
        payment_info,
        created_at: now,
    }
}

fn non_empty(breakdown: &PaymentBreakdown) -> Option<PaymentBreakdown> {
    if breakdown.is_empty() {
        None
    } else {
        Some(breakdown.clone())
    }
}

/// Applies one command to a freshly loaded reservation.
pub fn apply(
    mut reservation: Reservation,
    command: &LedgerCommand,
    now: DateTime<Utc>,
) -> AppResult<LedgerOutcome> {
    command.validate()?;

    if command.is_forward() && !reservation.is_active() {
        return Err(AppError::ValidationError(format!(
            "reservation '{}' is canceled",
            reservation.id
        )));
    }

    let total_tickets = reservation.total_tickets();

    let log = match command {
        LedgerCommand::AddCheckedInTickets { count } => {
            reservation.checked_in_tickets = reservation
                .checked_in_tickets
                .saturating_add(*count)
                .min(total_tickets);
            Some(log_entry(
                &reservation,
                CheckinLogType::Checkin,
                *count,
                None,
                now,
            ))
        }
        LedgerCommand::ResetCheckIn => {
            let previous = reservation.checked_in_tickets;
            reservation.checked_in_tickets = 0;
            reservation.paid_amount = 0;
            for line in &mut reservation.ticket_lines {
                line.paid_count = 0;
            }
            Some(log_entry(
                &reservation,
                CheckinLogType::Reset,
                previous,
                None,
                now,
            ))
        }
        LedgerCommand::CheckinWithPayment {
            checkin_count,
            payment_amount,
            breakdown,
        } => {
            reservation.checked_in_tickets = reservation
                .checked_in_tickets
                .saturating_add(*checkin_count)
                .min(total_tickets);
            reservation.paid_amount = reservation.paid_amount.saturating_add(*payment_amount);
            apply_breakdown(&mut reservation, breakdown, 1);
            Some(log_entry(
                &reservation,
                CheckinLogType::Checkin,
                *checkin_count,
                non_empty(breakdown),
                now,
            ))
        }
        LedgerCommand::PartialReset {
            checkin_count,
            refund_amount,
            breakdown,
        } => {
            reservation.checked_in_tickets =
                (reservation.checked_in_tickets - *checkin_count).max(0);
            reservation.paid_amount = (reservation.paid_amount - *refund_amount).max(0);
            apply_breakdown(&mut reservation, breakdown, -1);
            let negated = breakdown
                .iter()
                .map(|(ticket_type_id, count)| (*ticket_type_id, -count))
                .collect::<PaymentBreakdown>();
            Some(log_entry(
                &reservation,
                CheckinLogType::Reset,
                *checkin_count,
                non_empty(&negated),
                now,
            ))
        }
        LedgerCommand::RegisterPayment { received_amount } => {
            reservation.paid_amount = reservation.paid_amount.saturating_add(*received_amount);
            None
        }
    };

    refresh_statuses(&mut reservation, now);
    reservation.updated_at = now;

    Ok(LedgerOutcome { reservation, log })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Customer, ReservationSource, ReservationStatus, TicketLine};
    use chrono::TimeZone;

    fn reservation_with_lines(lines: Vec<TicketLine>) -> Reservation {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let mut reservation = Reservation {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            performance_id: Uuid::new_v4(),
            customer: Customer {
                name: "Aoi Tanaka".to_string(),
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
            ticket_lines: lines,
            created_at: created,
            updated_at: created,
        };
        refresh_statuses(&mut reservation, created);
        reservation
    }

    fn paid_count(reservation: &Reservation, ticket_type_id: Uuid) -> i32 {
        reservation
            .ticket_lines
            .iter()
            .find(|line| line.ticket_type_id == ticket_type_id)
            .map(|line| line.paid_count)
            .unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 18, 30, 0).unwrap()
    }

    fn two_line_reservation() -> (Reservation, Uuid, Uuid) {
        let adult = Uuid::new_v4();
        let student = Uuid::new_v4();
        let reservation = reservation_with_lines(vec![
            TicketLine::new(adult, 2, 3_000),
            TicketLine::new(student, 1, 2_000),
        ]);
        (reservation, adult, student)
    }

    #[test]
    fn test_checkin_status_rule() {
        assert_eq!(checkin_status_for(0, 3), CheckinStatus::NotCheckedIn);
        assert_eq!(checkin_status_for(2, 3), CheckinStatus::PartiallyCheckedIn);
        assert_eq!(checkin_status_for(3, 3), CheckinStatus::CheckedIn);
        assert_eq!(checkin_status_for(0, 0), CheckinStatus::NotCheckedIn);
    }

    #[test]
    fn test_payment_status_rule() {
        assert_eq!(payment_status_for(0, 8_000), PaymentStatus::Unpaid);
        assert_eq!(payment_status_for(3_000, 8_000), PaymentStatus::PartiallyPaid);
        assert_eq!(payment_status_for(8_000, 8_000), PaymentStatus::Paid);
        assert_eq!(payment_status_for(9_000, 8_000), PaymentStatus::Paid);
    }

    #[test]
    fn test_add_checked_in_tickets_clamps_to_total() {
        let mut reservation = reservation_with_lines(vec![TicketLine::new(Uuid::new_v4(), 10, 1_000)]);
        reservation.checked_in_tickets = 8;
        refresh_statuses(&mut reservation, now());

        let outcome = apply(
            reservation,
            &LedgerCommand::AddCheckedInTickets { count: 5 },
            now(),
        )
        .unwrap();

        assert_eq!(outcome.reservation.checked_in_tickets, 10);
        assert_eq!(outcome.reservation.checkin_status, CheckinStatus::CheckedIn);
        let log = outcome.log.unwrap();
        assert_eq!(log.log_type, CheckinLogType::Checkin);
        assert_eq!(log.count, 5);
        assert!(log.payment_info.is_none());
    }

    #[test]
    fn test_first_checkin_sets_timestamp_once() {
        let (reservation, _, _) = two_line_reservation();
        let first = apply(
            reservation,
            &LedgerCommand::AddCheckedInTickets { count: 1 },
            now(),
        )
        .unwrap()
        .reservation;
        assert_eq!(first.checked_in_at, Some(now()));
        assert_eq!(first.checkin_status, CheckinStatus::PartiallyCheckedIn);

        let later = now() + chrono::Duration::minutes(5);
        let second = apply(first, &LedgerCommand::AddCheckedInTickets { count: 1 }, later)
            .unwrap()
            .reservation;
        assert_eq!(second.checked_in_at, Some(now()));
        assert_eq!(second.updated_at, later);
    }

    #[test]
    fn test_add_rejects_non_positive_count() {
        let (reservation, _, _) = two_line_reservation();
        let err = apply(
            reservation,
            &LedgerCommand::AddCheckedInTickets { count: 0 },
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn test_forward_operations_reject_canceled_reservation() {
        let (mut reservation, _, _) = two_line_reservation();
        reservation.status = ReservationStatus::Canceled;
        let err = apply(
            reservation.clone(),
            &LedgerCommand::RegisterPayment {
                received_amount: 100,
            },
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        assert!(apply(reservation, &LedgerCommand::ResetCheckIn, now()).is_ok());
    }

    #[test]
    fn test_reset_discards_checkin_and_payment() {
        let (reservation, adult, student) = two_line_reservation();
        let breakdown = PaymentBreakdown::from([(adult, 2), (student, 1)]);
        let paid = apply(
            reservation,
            &LedgerCommand::CheckinWithPayment {
                checkin_count: 3,
                payment_amount: 8_000,
                breakdown,
            },
            now(),
        )
        .unwrap()
        .reservation;
        assert_eq!(paid.payment_status, PaymentStatus::Paid);

        let outcome = apply(paid, &LedgerCommand::ResetCheckIn, now()).unwrap();
        let reset = outcome.reservation;
        assert_eq!(reset.checked_in_tickets, 0);
        assert_eq!(reset.checkin_status, CheckinStatus::NotCheckedIn);
        assert_eq!(reset.checked_in_at, None);
        assert_eq!(reset.paid_amount, 0);
        assert_eq!(reset.payment_status, PaymentStatus::Unpaid);
        assert!(reset.ticket_lines.iter().all(|line| line.paid_count == 0));

        let log = outcome.log.unwrap();
        assert_eq!(log.log_type, CheckinLogType::Reset);
        assert_eq!(log.count, 3);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let (reservation, adult, _) = two_line_reservation();
        let touched = apply(
            reservation,
            &LedgerCommand::CheckinWithPayment {
                checkin_count: 2,
                payment_amount: 6_000,
                breakdown: PaymentBreakdown::from([(adult, 2)]),
            },
            now(),
        )
        .unwrap()
        .reservation;

        let once = apply(touched, &LedgerCommand::ResetCheckIn, now()).unwrap();
        let twice = apply(once.reservation.clone(), &LedgerCommand::ResetCheckIn, now()).unwrap();

        assert_eq!(once.reservation.checked_in_tickets, twice.reservation.checked_in_tickets);
        assert_eq!(once.reservation.paid_amount, twice.reservation.paid_amount);
        assert_eq!(once.reservation.ticket_lines, twice.reservation.ticket_lines);
        assert_eq!(twice.log.unwrap().count, 0);
    }

    #[test]
    fn test_checkin_with_payment_allows_overpayment_and_skips_unknown_lines() {
        let (reservation, adult, _) = two_line_reservation();
        let stranger = Uuid::new_v4();
        let breakdown = PaymentBreakdown::from([(adult, 1), (stranger, 4)]);

        let outcome = apply(
            reservation,
            &LedgerCommand::CheckinWithPayment {
                checkin_count: 1,
                payment_amount: 10_000,
                breakdown: breakdown.clone(),
            },
            now(),
        )
        .unwrap();

        let updated = outcome.reservation;
        assert_eq!(updated.paid_amount, 10_000);
        assert_eq!(updated.payment_status, PaymentStatus::Paid);
        assert_eq!(paid_count(&updated, adult), 1);
        assert_eq!(outcome.log.unwrap().payment_info, Some(breakdown));
    }

    #[test]
    fn test_payment_only_does_not_stamp_checkin_time() {
        let (reservation, _, _) = two_line_reservation();
        let outcome = apply(
            reservation,
            &LedgerCommand::CheckinWithPayment {
                checkin_count: 0,
                payment_amount: 2_000,
                breakdown: PaymentBreakdown::new(),
            },
            now(),
        )
        .unwrap();
        assert_eq!(outcome.reservation.checked_in_at, None);
        assert_eq!(outcome.reservation.payment_status, PaymentStatus::PartiallyPaid);
        assert!(outcome.log.unwrap().payment_info.is_none());
    }

    #[test]
    fn test_checkin_with_payment_then_partial_reset_round_trips() {
        let (reservation, adult, student) = two_line_reservation();
        let before = apply(
            reservation,
            &LedgerCommand::CheckinWithPayment {
                checkin_count: 1,
                payment_amount: 3_000,
                breakdown: PaymentBreakdown::from([(adult, 1)]),
            },
            now(),
        )
        .unwrap()
        .reservation;

        let breakdown = PaymentBreakdown::from([(adult, 1), (student, 1)]);
        let forward = apply(
            before.clone(),
            &LedgerCommand::CheckinWithPayment {
                checkin_count: 2,
                payment_amount: 5_000,
                breakdown: breakdown.clone(),
            },
            now(),
        )
        .unwrap()
        .reservation;
        assert_eq!(forward.checkin_status, CheckinStatus::CheckedIn);

        let outcome = apply(
            forward,
            &LedgerCommand::PartialReset {
                checkin_count: 2,
                refund_amount: 5_000,
                breakdown,
            },
            now(),
        )
        .unwrap();

        let restored = outcome.reservation;
        assert_eq!(restored.checked_in_tickets, before.checked_in_tickets);
        assert_eq!(restored.paid_amount, before.paid_amount);
        assert_eq!(restored.ticket_lines, before.ticket_lines);
        assert_eq!(restored.checked_in_at, before.checked_in_at);

        let log = outcome.log.unwrap();
        assert_eq!(log.log_type, CheckinLogType::Reset);
        assert_eq!(
            log.payment_info,
            Some(PaymentBreakdown::from([(adult, -1), (student, -1)]))
        );
    }

    #[test]
    fn test_partial_reset_clamps_at_zero() {
        let (reservation, adult, _) = two_line_reservation();
        let checked = apply(
            reservation,
            &LedgerCommand::CheckinWithPayment {
                checkin_count: 1,
                payment_amount: 1_000,
                breakdown: PaymentBreakdown::from([(adult, 1)]),
            },
            now(),
        )
        .unwrap()
        .reservation;

        let reset = apply(
            checked,
            &LedgerCommand::PartialReset {
                checkin_count: 5,
                refund_amount: 9_999,
                breakdown: PaymentBreakdown::from([(adult, 3)]),
            },
            now(),
        )
        .unwrap()
        .reservation;

        assert_eq!(reset.checked_in_tickets, 0);
        assert_eq!(reset.checked_in_at, None);
        assert_eq!(reset.paid_amount, 0);
        assert_eq!(reset.payment_status, PaymentStatus::Unpaid);
        assert!(reset.ticket_lines.iter().all(|line| line.paid_count == 0));
    }

    #[test]
    fn test_partial_reset_keeps_timestamp_while_tickets_remain() {
        let (reservation, _, _) = two_line_reservation();
        let checked = apply(
            reservation,
            &LedgerCommand::AddCheckedInTickets { count: 3 },
            now(),
        )
        .unwrap()
        .reservation;
        let later = now() + chrono::Duration::minutes(10);
        let reset = apply(
            checked,
            &LedgerCommand::PartialReset {
                checkin_count: 1,
                refund_amount: 0,
                breakdown: PaymentBreakdown::new(),
            },
            later,
        )
        .unwrap()
        .reservation;
        assert_eq!(reset.checked_in_tickets, 2);
        assert_eq!(reset.checked_in_at, Some(now()));
        assert_eq!(reset.checkin_status, CheckinStatus::PartiallyCheckedIn);
    }

    #[test]
    fn test_forward_breakdown_caps_paid_count_at_line_count() {
        let (reservation, _, student) = two_line_reservation();
        let updated = apply(
            reservation,
            &LedgerCommand::CheckinWithPayment {
                checkin_count: 0,
                payment_amount: 0,
                breakdown: PaymentBreakdown::from([(student, 4)]),
            },
            now(),
        )
        .unwrap()
        .reservation;
        assert_eq!(paid_count(&updated, student), 1);
    }

    #[test]
    fn test_negative_breakdown_is_rejected() {
        let (reservation, adult, _) = two_line_reservation();
        let err = apply(
            reservation,
            &LedgerCommand::PartialReset {
                checkin_count: 0,
                refund_amount: 0,
                breakdown: PaymentBreakdown::from([(adult, -1)]),
            },
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn test_register_payment_accumulates_without_log() {
        let (reservation, _, _) = two_line_reservation();
        let first = apply(
            reservation,
            &LedgerCommand::RegisterPayment {
                received_amount: 5_000,
            },
            now(),
        )
        .unwrap();
        assert!(first.log.is_none());
        assert_eq!(first.reservation.payment_status, PaymentStatus::PartiallyPaid);

        let second = apply(
            first.reservation,
            &LedgerCommand::RegisterPayment {
                received_amount: 5_000,
            },
            now(),
        )
        .unwrap();
        assert_eq!(second.reservation.paid_amount, 10_000);
        assert_eq!(second.reservation.payment_status, PaymentStatus::Paid);
        assert_eq!(second.reservation.checked_in_tickets, 0);
    }
}
