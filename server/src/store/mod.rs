//! Persistence for productions, performances, reservations and the check-in audit log.
//!
//! Every mutating call is one atomic unit: the implementation reads the
//! current rows, runs the pure domain function on them, and commits the
//! result together with any audit entry, or commits nothing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    CheckinLogEntry, Performance, Production, ReceptionConfig, Reservation, ReservationStatus,
};
use crate::services::booking::{NewReservation, SameDayRequest};
use crate::services::catalog::NewPerformance;
use crate::services::ledger::{LedgerCommand, LedgerOutcome};
use crate::utils::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait TheaterStore: Send + Sync {
    /// Production with its ticket types and performances.
    async fn production(&self, organization_id: Uuid, production_id: Uuid)
        -> AppResult<Production>;

    /// Persists a new production and its ticket types.
    async fn create_production(&self, production: &Production) -> AppResult<()>;

    /// Replaces the reception settings and returns the updated production.
    async fn update_reception(
        &self,
        organization_id: Uuid,
        production_id: Uuid,
        reception: &ReceptionConfig,
    ) -> AppResult<Production>;

    async fn performance(
        &self,
        organization_id: Uuid,
        performance_id: Uuid,
    ) -> AppResult<Performance>;

    async fn create_performance(
        &self,
        organization_id: Uuid,
        production_id: Uuid,
        request: &NewPerformance,
    ) -> AppResult<Performance>;

    /// Tickets held by non-canceled reservations of the performance.
    async fn booked_count(&self, organization_id: Uuid, performance_id: Uuid) -> AppResult<i32>;

    async fn reservation(
        &self,
        organization_id: Uuid,
        reservation_id: Uuid,
    ) -> AppResult<Reservation>;

    /// Audit entries for a reservation, oldest first.
    async fn checkin_logs(
        &self,
        organization_id: Uuid,
        reservation_id: Uuid,
    ) -> AppResult<Vec<CheckinLogEntry>>;

    async fn apply_ledger(
        &self,
        organization_id: Uuid,
        reservation_id: Uuid,
        command: &LedgerCommand,
        now: DateTime<Utc>,
    ) -> AppResult<LedgerOutcome>;

    async fn create_reservation(
        &self,
        organization_id: Uuid,
        request: &NewReservation,
        now: DateTime<Utc>,
    ) -> AppResult<Reservation>;

    async fn issue_same_day(
        &self,
        organization_id: Uuid,
        request: &SameDayRequest,
        now: DateTime<Utc>,
    ) -> AppResult<Reservation>;

    async fn update_reservation_status(
        &self,
        organization_id: Uuid,
        reservation_id: Uuid,
        status: ReservationStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Reservation>;

    /// Removes a performance with no active reservations. Returns how many
    /// canceled reservations went with it.
    async fn delete_performance(
        &self,
        organization_id: Uuid,
        performance_id: Uuid,
    ) -> AppResult<u64>;
}
