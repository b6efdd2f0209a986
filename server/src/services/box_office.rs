use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::models::{
    Availability, CheckinLogEntry, PaymentBreakdown, Performance, Production, ReceptionConfig,
    Reservation, ReservationSource, ReservationStatus,
};
use crate::services::booking::{NewReservation, SameDayRequest};
use crate::services::catalog::{
    build_production, validate_reception, NewPerformance, NewProduction,
};
use crate::services::clock::Clock;
use crate::services::ledger::{LedgerCommand, LedgerOutcome};
use crate::services::reception::{EffectiveReceptionStatus, ReceptionEvaluator, ReceptionSnapshot};
use crate::store::TheaterStore;
use crate::utils::{AppError, AppResult};

/// Entry point for every box-office operation. Each call is scoped to one
/// organization.
#[derive(Clone)]
pub struct BoxOffice {
    store: Arc<dyn TheaterStore>,
    clock: Arc<dyn Clock>,
    reception: ReceptionEvaluator,
}

impl BoxOffice {
    pub fn new(
        store: Arc<dyn TheaterStore>,
        clock: Arc<dyn Clock>,
        reception: ReceptionEvaluator,
    ) -> Self {
        Self {
            store,
            clock,
            reception,
        }
    }

    async fn apply(
        &self,
        organization_id: Uuid,
        reservation_id: Uuid,
        command: LedgerCommand,
    ) -> AppResult<LedgerOutcome> {
        command.validate()?;
        let now = self.clock.now();
        let outcome = self
            .store
            .apply_ledger(organization_id, reservation_id, &command, now)
            .await?;

        let reservation = &outcome.reservation;
        info!(
            operation = command.name(),
            %organization_id,
            %reservation_id,
            checked_in_tickets = reservation.checked_in_tickets,
            total_tickets = reservation.total_tickets(),
            paid_amount = reservation.paid_amount,
            checkin_status = %reservation.checkin_status,
            payment_status = %reservation.payment_status,
            "Ledger updated"
        );
        Ok(outcome)
    }

    pub async fn add_checked_in_tickets(
        &self,
        organization_id: Uuid,
        reservation_id: Uuid,
        count: i32,
    ) -> AppResult<LedgerOutcome> {
        self.apply(
            organization_id,
            reservation_id,
            LedgerCommand::AddCheckedInTickets { count },
        )
        .await
    }

    pub async fn reset_check_in(
        &self,
        organization_id: Uuid,
        reservation_id: Uuid,
    ) -> AppResult<LedgerOutcome> {
        self.apply(organization_id, reservation_id, LedgerCommand::ResetCheckIn)
            .await
    }

    pub async fn process_checkin_with_payment(
        &self,
        organization_id: Uuid,
        reservation_id: Uuid,
        checkin_count: i32,
        payment_amount: i64,
        breakdown: PaymentBreakdown,
    ) -> AppResult<LedgerOutcome> {
        self.apply(
            organization_id,
            reservation_id,
            LedgerCommand::CheckinWithPayment {
                checkin_count,
                payment_amount,
                breakdown,
            },
        )
        .await
    }

    pub async fn process_partial_reset(
        &self,
        organization_id: Uuid,
        reservation_id: Uuid,
        checkin_count: i32,
        refund_amount: i64,
        breakdown: PaymentBreakdown,
    ) -> AppResult<LedgerOutcome> {
        self.apply(
            organization_id,
            reservation_id,
            LedgerCommand::PartialReset {
                checkin_count,
                refund_amount,
                breakdown,
            },
        )
        .await
    }

    pub async fn register_payment(
        &self,
        organization_id: Uuid,
        reservation_id: Uuid,
        received_amount: i64,
    ) -> AppResult<Reservation> {
        let outcome = self
            .apply(
                organization_id,
                reservation_id,
                LedgerCommand::RegisterPayment { received_amount },
            )
            .await?;
        Ok(outcome.reservation)
    }

    pub async fn issue_same_day_ticket(
        &self,
        organization_id: Uuid,
        request: SameDayRequest,
    ) -> AppResult<Reservation> {
        let now = self.clock.now();
        let reservation = self
            .store
            .issue_same_day(organization_id, &request, now)
            .await?;
        info!(
            %organization_id,
            reservation_id = %reservation.id,
            performance_id = %reservation.performance_id,
            tickets = reservation.total_tickets(),
            paid_amount = reservation.paid_amount,
            "Same-day ticket issued"
        );
        Ok(reservation)
    }

    /// Public-form bookings are only accepted while both the production and
    /// the chosen performance are open.
    pub async fn create_reservation(
        &self,
        organization_id: Uuid,
        request: NewReservation,
    ) -> AppResult<Reservation> {
        let now = self.clock.now();

        if request.source == ReservationSource::PublicForm {
            let performance = self
                .store
                .performance(organization_id, request.performance_id)
                .await?;
            let production = self
                .store
                .production(organization_id, performance.production_id)
                .await?;

            let status = self.reception.effective_status(&production, now);
            if status != EffectiveReceptionStatus::Open {
                return Err(AppError::ValidationError(format!(
                    "reception for production '{}' is not open",
                    production.id
                )));
            }
            if !self
                .reception
                .performance_open(&production, &performance, now)
            {
                return Err(AppError::ValidationError(format!(
                    "reception for performance '{}' has closed",
                    performance.id
                )));
            }
        }

        let reservation = self
            .store
            .create_reservation(organization_id, &request, now)
            .await?;
        info!(
            %organization_id,
            reservation_id = %reservation.id,
            performance_id = %reservation.performance_id,
            source = %reservation.source,
            tickets = reservation.total_tickets(),
            "Reservation created"
        );
        Ok(reservation)
    }

    pub async fn update_reservation_status(
        &self,
        organization_id: Uuid,
        reservation_id: Uuid,
        status: ReservationStatus,
    ) -> AppResult<Reservation> {
        let now = self.clock.now();
        let reservation = self
            .store
            .update_reservation_status(organization_id, reservation_id, status, now)
            .await?;
        info!(%organization_id, %reservation_id, %status, "Reservation status changed");
        Ok(reservation)
    }

    pub async fn reservation(
        &self,
        organization_id: Uuid,
        reservation_id: Uuid,
    ) -> AppResult<Reservation> {
        self.store.reservation(organization_id, reservation_id).await
    }

    pub async fn checkin_logs(
        &self,
        organization_id: Uuid,
        reservation_id: Uuid,
    ) -> AppResult<Vec<CheckinLogEntry>> {
        self.store.checkin_logs(organization_id, reservation_id).await
    }

    pub async fn availability(
        &self,
        organization_id: Uuid,
        performance_id: Uuid,
    ) -> AppResult<Availability> {
        let performance = self
            .store
            .performance(organization_id, performance_id)
            .await?;
        let booked = self
            .store
            .booked_count(organization_id, performance_id)
            .await?;
        Ok(Availability::new(performance.capacity, booked))
    }

    pub async fn delete_performance(
        &self,
        organization_id: Uuid,
        performance_id: Uuid,
    ) -> AppResult<u64> {
        let removed = self
            .store
            .delete_performance(organization_id, performance_id)
            .await?;
        info!(
            %organization_id,
            %performance_id,
            removed_reservations = removed,
            "Performance deleted"
        );
        Ok(removed)
    }

    pub async fn create_production(
        &self,
        organization_id: Uuid,
        request: NewProduction,
    ) -> AppResult<Production> {
        let production = build_production(organization_id, &request)?;
        self.store.create_production(&production).await?;
        info!(
            %organization_id,
            production_id = %production.id,
            ticket_types = production.ticket_types.len(),
            "Production created"
        );
        Ok(production)
    }

    pub async fn production(
        &self,
        organization_id: Uuid,
        production_id: Uuid,
    ) -> AppResult<Production> {
        self.store.production(organization_id, production_id).await
    }

    pub async fn add_performance(
        &self,
        organization_id: Uuid,
        production_id: Uuid,
        request: NewPerformance,
    ) -> AppResult<Performance> {
        let performance = self
            .store
            .create_performance(organization_id, production_id, &request)
            .await?;
        info!(
            %organization_id,
            %production_id,
            performance_id = %performance.id,
            capacity = performance.capacity,
            "Performance added"
        );
        Ok(performance)
    }

    pub async fn update_reception(
        &self,
        organization_id: Uuid,
        production_id: Uuid,
        reception: ReceptionConfig,
    ) -> AppResult<Production> {
        validate_reception(&reception)?;
        let production = self
            .store
            .update_reception(organization_id, production_id, &reception)
            .await?;
        info!(
            %organization_id,
            %production_id,
            status = %reception.status,
            "Reception settings updated"
        );
        Ok(production)
    }

    pub async fn reception_snapshot(
        &self,
        organization_id: Uuid,
        production_id: Uuid,
    ) -> AppResult<ReceptionSnapshot> {
        let production = self
            .store
            .production(organization_id, production_id)
            .await?;
        Ok(self.reception.snapshot(&production, self.clock.now()))
    }
}
