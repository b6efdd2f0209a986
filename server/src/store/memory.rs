use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    CheckinLogEntry, Performance, Production, ReceptionConfig, Reservation, ReservationStatus,
};
use crate::services::booking::{
    build_reservation, build_same_day_reservation, change_status, NewReservation, SameDayRequest,
};
use crate::services::catalog::{build_performance, NewPerformance};
use crate::services::ledger::{self, LedgerCommand, LedgerOutcome};
use crate::store::TheaterStore;
use crate::utils::{AppError, AppResult};

#[derive(Default)]
struct State {
    /// Productions are kept without their performances; those live in `performances`.
    productions: HashMap<Uuid, Production>,
    performances: HashMap<Uuid, Performance>,
    reservations: HashMap<Uuid, Reservation>,
    logs: Vec<CheckinLogEntry>,
}

impl State {
    fn production(&self, organization_id: Uuid, production_id: Uuid) -> AppResult<Production> {
        let mut production = self
            .productions
            .get(&production_id)
            .filter(|p| p.organization_id == organization_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Production", production_id))?;
        production.performances = self
            .performances
            .values()
            .filter(|p| p.production_id == production_id)
            .cloned()
            .collect();
        production.performances.sort_by_key(|p| p.start_time);
        Ok(production)
    }

    fn performance(&self, organization_id: Uuid, performance_id: Uuid) -> AppResult<Performance> {
        self.performances
            .get(&performance_id)
            .filter(|p| p.organization_id == organization_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Performance", performance_id))
    }

    fn booked_count(&self, performance_id: Uuid) -> i32 {
        self.reservations
            .values()
            .filter(|r| r.performance_id == performance_id && r.is_active())
            .map(Reservation::total_tickets)
            .fold(0i32, i32::saturating_add)
    }

    fn reservation(&self, organization_id: Uuid, reservation_id: Uuid) -> AppResult<Reservation> {
        self.reservations
            .get(&reservation_id)
            .filter(|r| r.organization_id == organization_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Reservation", reservation_id))
    }
}

/// Process-local store. Each mutation runs under one write lock, so a
/// failed operation leaves nothing behind.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a production along with its performances.
    pub async fn insert_production(&self, production: Production) {
        let mut state = self.state.write().await;
        let mut production = production;
        for performance in production.performances.drain(..) {
            state.performances.insert(performance.id, performance);
        }
        state.productions.insert(production.id, production);
    }
}

#[async_trait]
impl TheaterStore for MemoryStore {
    async fn production(
        &self,
        organization_id: Uuid,
        production_id: Uuid,
    ) -> AppResult<Production> {
        self.state
            .read()
            .await
            .production(organization_id, production_id)
    }

    async fn create_production(&self, production: &Production) -> AppResult<()> {
        self.insert_production(production.clone()).await;
        Ok(())
    }

    async fn update_reception(
        &self,
        organization_id: Uuid,
        production_id: Uuid,
        reception: &ReceptionConfig,
    ) -> AppResult<Production> {
        let mut state = self.state.write().await;
        let stored = state
            .productions
            .get_mut(&production_id)
            .filter(|p| p.organization_id == organization_id)
            .ok_or_else(|| AppError::not_found("Production", production_id))?;
        stored.reception = reception.clone();
        state.production(organization_id, production_id)
    }

    async fn performance(
        &self,
        organization_id: Uuid,
        performance_id: Uuid,
    ) -> AppResult<Performance> {
        self.state
            .read()
            .await
            .performance(organization_id, performance_id)
    }

    async fn create_performance(
        &self,
        organization_id: Uuid,
        production_id: Uuid,
        request: &NewPerformance,
    ) -> AppResult<Performance> {
        let mut state = self.state.write().await;
        let production = state.production(organization_id, production_id)?;
        let performance = build_performance(&production, request)?;
        state
            .performances
            .insert(performance.id, performance.clone());
        Ok(performance)
    }

    async fn booked_count(&self, organization_id: Uuid, performance_id: Uuid) -> AppResult<i32> {
        let state = self.state.read().await;
        state.performance(organization_id, performance_id)?;
        Ok(state.booked_count(performance_id))
    }

    async fn reservation(
        &self,
        organization_id: Uuid,
        reservation_id: Uuid,
    ) -> AppResult<Reservation> {
        self.state
            .read()
            .await
            .reservation(organization_id, reservation_id)
    }

    async fn checkin_logs(
        &self,
        organization_id: Uuid,
        reservation_id: Uuid,
    ) -> AppResult<Vec<CheckinLogEntry>> {
        let state = self.state.read().await;
        state.reservation(organization_id, reservation_id)?;
        Ok(state
            .logs
            .iter()
            .filter(|log| log.reservation_id == reservation_id)
            .cloned()
            .collect())
    }

    async fn apply_ledger(
        &self,
        organization_id: Uuid,
        reservation_id: Uuid,
        command: &LedgerCommand,
        now: DateTime<Utc>,
    ) -> AppResult<LedgerOutcome> {
        let mut state = self.state.write().await;
        let current = state.reservation(organization_id, reservation_id)?;
        let outcome = ledger::apply(current, command, now)?;

        state
            .reservations
            .insert(reservation_id, outcome.reservation.clone());
        if let Some(log) = &outcome.log {
            state.logs.push(log.clone());
        }
        Ok(outcome)
    }

    async fn create_reservation(
        &self,
        organization_id: Uuid,
        request: &NewReservation,
        now: DateTime<Utc>,
    ) -> AppResult<Reservation> {
        let mut state = self.state.write().await;
        let performance = state.performance(organization_id, request.performance_id)?;
        let production = state.production(organization_id, performance.production_id)?;
        let booked = state.booked_count(performance.id);

        let reservation = build_reservation(&production, &performance, request, booked, now)?;
        state
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn issue_same_day(
        &self,
        organization_id: Uuid,
        request: &SameDayRequest,
        now: DateTime<Utc>,
    ) -> AppResult<Reservation> {
        let mut state = self.state.write().await;
        let performance = state.performance(organization_id, request.performance_id)?;
        let production = state.production(organization_id, performance.production_id)?;
        let booked = state.booked_count(performance.id);

        let reservation =
            build_same_day_reservation(&production, &performance, request, booked, now)?;
        state
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn update_reservation_status(
        &self,
        organization_id: Uuid,
        reservation_id: Uuid,
        status: ReservationStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Reservation> {
        let mut state = self.state.write().await;
        let current = state.reservation(organization_id, reservation_id)?;
        let performance = state.performance(organization_id, current.performance_id)?;
        let booked = state.booked_count(performance.id);

        let updated = change_status(current, status, &performance, booked, now)?;
        state.reservations.insert(reservation_id, updated.clone());
        Ok(updated)
    }

    async fn delete_performance(
        &self,
        organization_id: Uuid,
        performance_id: Uuid,
    ) -> AppResult<u64> {
        let mut state = self.state.write().await;
        state.performance(organization_id, performance_id)?;

        let active = state
            .reservations
            .values()
            .filter(|r| r.performance_id == performance_id && r.is_active())
            .count();
        if active > 0 {
            return Err(AppError::Conflict(format!(
                "performance '{}' still has {} active reservation(s)",
                performance_id, active
            )));
        }

        let before = state.reservations.len();
        state
            .reservations
            .retain(|_, r| r.performance_id != performance_id);
        state.performances.remove(&performance_id);
        Ok((before - state.reservations.len()) as u64)
    }
}
