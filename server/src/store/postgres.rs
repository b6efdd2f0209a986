use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::config::Config;
use crate::models::{
    CheckinLogEntry, Customer, PaymentBreakdown, Performance, Production, ReceptionConfig,
    Reservation, ReservationStatus, TicketLine, TicketType,
};
use crate::services::booking::{
    build_reservation, build_same_day_reservation, change_status, NewReservation, SameDayRequest,
};
use crate::services::catalog::{build_performance, NewPerformance};
use crate::services::ledger::{self, LedgerCommand, LedgerOutcome};
use crate::store::TheaterStore;
use crate::utils::{AppError, AppResult};

const RESERVATION_COLUMNS: &str = "id, organization_id, performance_id, customer_name, \
     customer_email, customer_phone, status, source, checkin_status, checked_in_tickets, \
     checked_in_at, payment_status, paid_amount, created_at, updated_at";

const PERFORMANCE_COLUMNS: &str = "id, organization_id, production_id, start_time, capacity";

#[derive(FromRow)]
struct ProductionRow {
    id: Uuid,
    organization_id: Uuid,
    title: String,
    reception_status: String,
    reception_start: Option<DateTime<Utc>>,
    reception_end: Option<DateTime<Utc>>,
    reception_end_mode: Option<String>,
    reception_end_minutes: i64,
}

#[derive(FromRow)]
struct ReservationRow {
    id: Uuid,
    organization_id: Uuid,
    performance_id: Uuid,
    customer_name: String,
    customer_email: Option<String>,
    customer_phone: Option<String>,
    status: String,
    source: String,
    checkin_status: String,
    checked_in_tickets: i32,
    checked_in_at: Option<DateTime<Utc>>,
    payment_status: String,
    paid_amount: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct CheckinLogRow {
    id: Uuid,
    organization_id: Uuid,
    reservation_id: Uuid,
    log_type: String,
    quantity: i32,
    payment_info: Option<Json<PaymentBreakdown>>,
    created_at: DateTime<Utc>,
}

fn parse_column<T: FromStr>(column: &str, value: &str) -> AppResult<T> {
    value.parse().map_err(|_| {
        AppError::InternalServerError(format!("unexpected {} value '{}'", column, value))
    })
}

impl ReservationRow {
    fn into_reservation(self, ticket_lines: Vec<TicketLine>) -> AppResult<Reservation> {
        Ok(Reservation {
            id: self.id,
            organization_id: self.organization_id,
            performance_id: self.performance_id,
            customer: Customer {
                name: self.customer_name,
                email: self.customer_email,
                phone: self.customer_phone,
            },
            status: parse_column("status", &self.status)?,
            source: parse_column("source", &self.source)?,
            checkin_status: parse_column("checkin_status", &self.checkin_status)?,
            checked_in_tickets: self.checked_in_tickets,
            checked_in_at: self.checked_in_at,
            payment_status: parse_column("payment_status", &self.payment_status)?,
            paid_amount: self.paid_amount,
            ticket_lines,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl TryFrom<CheckinLogRow> for CheckinLogEntry {
    type Error = AppError;

    fn try_from(row: CheckinLogRow) -> AppResult<Self> {
        Ok(CheckinLogEntry {
            id: row.id,
            organization_id: row.organization_id,
            reservation_id: row.reservation_id,
            log_type: parse_column("log_type", &row.log_type)?,
            count: row.quantity,
            payment_info: row.payment_info.map(|Json(info)| info),
            created_at: row.created_at,
        })
    }
}

/// Postgres-backed store. Row locks (`FOR UPDATE`) serialize concurrent
/// operations on the same reservation or performance.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &Config) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.database_url)
            .await?;
        tracing::info!("Successfully connected to database");
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!().run(&self.pool).await?;
        tracing::info!("Migrations run successfully");
        Ok(())
    }
}

async fn load_production(
    conn: &mut PgConnection,
    organization_id: Uuid,
    production_id: Uuid,
) -> AppResult<Production> {
    let row = sqlx::query_as::<_, ProductionRow>(
        "SELECT id, organization_id, title, reception_status, reception_start, reception_end, \
         reception_end_mode, reception_end_minutes \
         FROM productions WHERE id = $1 AND organization_id = $2",
    )
    .bind(production_id)
    .bind(organization_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("Production", production_id))?;

    let ticket_types = sqlx::query_as::<_, TicketType>(
        "SELECT id, production_id, name, price, advance_price, door_price \
         FROM ticket_types WHERE production_id = $1 ORDER BY position",
    )
    .bind(production_id)
    .fetch_all(&mut *conn)
    .await?;

    let performances = sqlx::query_as::<_, Performance>(&format!(
        "SELECT {} FROM performances WHERE production_id = $1 ORDER BY start_time",
        PERFORMANCE_COLUMNS
    ))
    .bind(production_id)
    .fetch_all(&mut *conn)
    .await?;

    let end_mode = row
        .reception_end_mode
        .as_deref()
        .map(|mode| parse_column("reception_end_mode", mode))
        .transpose()?;

    Ok(Production {
        id: row.id,
        organization_id: row.organization_id,
        title: row.title,
        reception: ReceptionConfig {
            status: parse_column("reception_status", &row.reception_status)?,
            start: row.reception_start,
            end: row.reception_end,
            end_mode,
            end_minutes: row.reception_end_minutes,
        },
        ticket_types,
        performances,
    })
}

async fn insert_production(conn: &mut PgConnection, production: &Production) -> AppResult<()> {
    let reception = &production.reception;
    sqlx::query(
        "INSERT INTO productions (id, organization_id, title, reception_status, reception_start, \
         reception_end, reception_end_mode, reception_end_minutes) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(production.id)
    .bind(production.organization_id)
    .bind(&production.title)
    .bind(reception.status.to_string())
    .bind(reception.start)
    .bind(reception.end)
    .bind(reception.end_mode.map(|mode| mode.to_string()))
    .bind(reception.end_minutes)
    .execute(&mut *conn)
    .await?;

    for (position, ticket_type) in production.ticket_types.iter().enumerate() {
        sqlx::query(
            "INSERT INTO ticket_types \
             (id, production_id, name, price, advance_price, door_price, position) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(ticket_type.id)
        .bind(production.id)
        .bind(&ticket_type.name)
        .bind(ticket_type.price)
        .bind(ticket_type.advance_price)
        .bind(ticket_type.door_price)
        .bind(position as i32)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn load_performance(
    conn: &mut PgConnection,
    organization_id: Uuid,
    performance_id: Uuid,
    for_update: bool,
) -> AppResult<Performance> {
    let sql = format!(
        "SELECT {} FROM performances WHERE id = $1 AND organization_id = $2{}",
        PERFORMANCE_COLUMNS,
        if for_update { " FOR UPDATE" } else { "" }
    );
    sqlx::query_as::<_, Performance>(&sql)
        .bind(performance_id)
        .bind(organization_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Performance", performance_id))
}

async fn booked_count(conn: &mut PgConnection, performance_id: Uuid) -> AppResult<i32> {
    let booked = sqlx::query_scalar::<_, i32>(
        "SELECT COALESCE(SUM(l.quantity), 0)::INT4 \
         FROM reservation_ticket_lines l \
         JOIN reservations r ON r.id = l.reservation_id \
         WHERE r.performance_id = $1 AND r.status <> 'CANCELED'",
    )
    .bind(performance_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(booked)
}

async fn load_reservation(
    conn: &mut PgConnection,
    organization_id: Uuid,
    reservation_id: Uuid,
    for_update: bool,
) -> AppResult<Reservation> {
    let sql = format!(
        "SELECT {} FROM reservations WHERE id = $1 AND organization_id = $2{}",
        RESERVATION_COLUMNS,
        if for_update { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query_as::<_, ReservationRow>(&sql)
        .bind(reservation_id)
        .bind(organization_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Reservation", reservation_id))?;

    let lines = sqlx::query_as::<_, TicketLine>(
        "SELECT ticket_type_id, quantity AS count, price, paid_count \
         FROM reservation_ticket_lines WHERE reservation_id = $1 ORDER BY position",
    )
    .bind(reservation_id)
    .fetch_all(&mut *conn)
    .await?;

    row.into_reservation(lines)
}

async fn reservation_performance_id(
    conn: &mut PgConnection,
    organization_id: Uuid,
    reservation_id: Uuid,
) -> AppResult<Uuid> {
    sqlx::query_scalar::<_, Uuid>(
        "SELECT performance_id FROM reservations WHERE id = $1 AND organization_id = $2",
    )
    .bind(reservation_id)
    .bind(organization_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("Reservation", reservation_id))
}

async fn insert_reservation(conn: &mut PgConnection, reservation: &Reservation) -> AppResult<()> {
    sqlx::query(&format!(
        "INSERT INTO reservations ({}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        RESERVATION_COLUMNS
    ))
    .bind(reservation.id)
    .bind(reservation.organization_id)
    .bind(reservation.performance_id)
    .bind(&reservation.customer.name)
    .bind(&reservation.customer.email)
    .bind(&reservation.customer.phone)
    .bind(reservation.status.to_string())
    .bind(reservation.source.to_string())
    .bind(reservation.checkin_status.to_string())
    .bind(reservation.checked_in_tickets)
    .bind(reservation.checked_in_at)
    .bind(reservation.payment_status.to_string())
    .bind(reservation.paid_amount)
    .bind(reservation.created_at)
    .bind(reservation.updated_at)
    .execute(&mut *conn)
    .await?;

    for (position, line) in reservation.ticket_lines.iter().enumerate() {
        sqlx::query(
            "INSERT INTO reservation_ticket_lines \
             (reservation_id, ticket_type_id, position, quantity, price, paid_count) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(reservation.id)
        .bind(line.ticket_type_id)
        .bind(position as i32)
        .bind(line.count)
        .bind(line.price)
        .bind(line.paid_count)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn update_reservation(conn: &mut PgConnection, reservation: &Reservation) -> AppResult<()> {
    sqlx::query(
        "UPDATE reservations SET status = $2, checkin_status = $3, checked_in_tickets = $4, \
         checked_in_at = $5, payment_status = $6, paid_amount = $7, updated_at = $8 \
         WHERE id = $1",
    )
    .bind(reservation.id)
    .bind(reservation.status.to_string())
    .bind(reservation.checkin_status.to_string())
    .bind(reservation.checked_in_tickets)
    .bind(reservation.checked_in_at)
    .bind(reservation.payment_status.to_string())
    .bind(reservation.paid_amount)
    .bind(reservation.updated_at)
    .execute(&mut *conn)
    .await?;

    for line in &reservation.ticket_lines {
        sqlx::query(
            "UPDATE reservation_ticket_lines SET paid_count = $3 \
             WHERE reservation_id = $1 AND ticket_type_id = $2",
        )
        .bind(reservation.id)
        .bind(line.ticket_type_id)
        .bind(line.paid_count)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn insert_log(conn: &mut PgConnection, log: &CheckinLogEntry) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO checkin_logs \
         (id, organization_id, reservation_id, log_type, quantity, payment_info, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(log.id)
    .bind(log.organization_id)
    .bind(log.reservation_id)
    .bind(log.log_type.to_string())
    .bind(log.count)
    .bind(log.payment_info.as_ref().map(Json))
    .bind(log.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[async_trait]
impl TheaterStore for PgStore {
    async fn production(
        &self,
        organization_id: Uuid,
        production_id: Uuid,
    ) -> AppResult<Production> {
        let mut conn = self.pool.acquire().await?;
        load_production(&mut conn, organization_id, production_id).await
    }

    async fn create_production(&self, production: &Production) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_production(&mut tx, production).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_reception(
        &self,
        organization_id: Uuid,
        production_id: Uuid,
        reception: &ReceptionConfig,
    ) -> AppResult<Production> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE productions SET reception_status = $3, reception_start = $4, \
             reception_end = $5, reception_end_mode = $6, reception_end_minutes = $7, \
             updated_at = NOW() \
             WHERE id = $1 AND organization_id = $2",
        )
        .bind(production_id)
        .bind(organization_id)
        .bind(reception.status.to_string())
        .bind(reception.start)
        .bind(reception.end)
        .bind(reception.end_mode.map(|mode| mode.to_string()))
        .bind(reception.end_minutes)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if updated == 0 {
            return Err(AppError::not_found("Production", production_id));
        }

        let production = load_production(&mut tx, organization_id, production_id).await?;
        tx.commit().await?;
        Ok(production)
    }

    async fn performance(
        &self,
        organization_id: Uuid,
        performance_id: Uuid,
    ) -> AppResult<Performance> {
        let mut conn = self.pool.acquire().await?;
        load_performance(&mut conn, organization_id, performance_id, false).await
    }

    async fn create_performance(
        &self,
        organization_id: Uuid,
        production_id: Uuid,
        request: &NewPerformance,
    ) -> AppResult<Performance> {
        let mut tx = self.pool.begin().await?;

        let production = load_production(&mut tx, organization_id, production_id).await?;
        let performance = build_performance(&production, request)?;
        sqlx::query(&format!(
            "INSERT INTO performances ({}) VALUES ($1, $2, $3, $4, $5)",
            PERFORMANCE_COLUMNS
        ))
        .bind(performance.id)
        .bind(performance.organization_id)
        .bind(performance.production_id)
        .bind(performance.start_time)
        .bind(performance.capacity)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(performance)
    }

    async fn booked_count(&self, organization_id: Uuid, performance_id: Uuid) -> AppResult<i32> {
        let mut conn = self.pool.acquire().await?;
        load_performance(&mut conn, organization_id, performance_id, false).await?;
        booked_count(&mut conn, performance_id).await
    }

    async fn reservation(
        &self,
        organization_id: Uuid,
        reservation_id: Uuid,
    ) -> AppResult<Reservation> {
        let mut conn = self.pool.acquire().await?;
        load_reservation(&mut conn, organization_id, reservation_id, false).await
    }

    async fn checkin_logs(
        &self,
        organization_id: Uuid,
        reservation_id: Uuid,
    ) -> AppResult<Vec<CheckinLogEntry>> {
        let mut conn = self.pool.acquire().await?;
        load_reservation(&mut conn, organization_id, reservation_id, false).await?;

        sqlx::query_as::<_, CheckinLogRow>(
            "SELECT id, organization_id, reservation_id, log_type, quantity, payment_info, \
             created_at FROM checkin_logs \
             WHERE reservation_id = $1 AND organization_id = $2 ORDER BY created_at, id",
        )
        .bind(reservation_id)
        .bind(organization_id)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(CheckinLogEntry::try_from)
        .collect()
    }

    async fn apply_ledger(
        &self,
        organization_id: Uuid,
        reservation_id: Uuid,
        command: &LedgerCommand,
        now: DateTime<Utc>,
    ) -> AppResult<LedgerOutcome> {
        let mut tx = self.pool.begin().await?;

        let current = load_reservation(&mut tx, organization_id, reservation_id, true).await?;
        let outcome = ledger::apply(current, command, now)?;

        update_reservation(&mut tx, &outcome.reservation).await?;
        if let Some(log) = &outcome.log {
            insert_log(&mut tx, log).await?;
        }

        tx.commit().await?;
        Ok(outcome)
    }

    async fn create_reservation(
        &self,
        organization_id: Uuid,
        request: &NewReservation,
        now: DateTime<Utc>,
    ) -> AppResult<Reservation> {
        let mut tx = self.pool.begin().await?;

        let performance =
            load_performance(&mut tx, organization_id, request.performance_id, true).await?;
        let production =
            load_production(&mut tx, organization_id, performance.production_id).await?;
        let booked = booked_count(&mut tx, performance.id).await?;

        let reservation = build_reservation(&production, &performance, request, booked, now)?;
        insert_reservation(&mut tx, &reservation).await?;

        tx.commit().await?;
        Ok(reservation)
    }

    async fn issue_same_day(
        &self,
        organization_id: Uuid,
        request: &SameDayRequest,
        now: DateTime<Utc>,
    ) -> AppResult<Reservation> {
        let mut tx = self.pool.begin().await?;

        let performance =
            load_performance(&mut tx, organization_id, request.performance_id, true).await?;
        let production =
            load_production(&mut tx, organization_id, performance.production_id).await?;
        let booked = booked_count(&mut tx, performance.id).await?;

        let reservation =
            build_same_day_reservation(&production, &performance, request, booked, now)?;
        insert_reservation(&mut tx, &reservation).await?;

        tx.commit().await?;
        Ok(reservation)
    }

    async fn update_reservation_status(
        &self,
        organization_id: Uuid,
        reservation_id: Uuid,
        status: ReservationStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Reservation> {
        let mut tx = self.pool.begin().await?;

        // Performance before reservation, the same order delete_performance locks in.
        let performance_id =
            reservation_performance_id(&mut tx, organization_id, reservation_id).await?;
        let performance =
            load_performance(&mut tx, organization_id, performance_id, true).await?;
        let current = load_reservation(&mut tx, organization_id, reservation_id, true).await?;
        let booked = booked_count(&mut tx, performance.id).await?;

        let updated = change_status(current, status, &performance, booked, now)?;
        update_reservation(&mut tx, &updated).await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_performance(
        &self,
        organization_id: Uuid,
        performance_id: Uuid,
    ) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;

        load_performance(&mut tx, organization_id, performance_id, true).await?;
        let active = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM reservations WHERE performance_id = $1 AND status <> 'CANCELED'",
        )
        .bind(performance_id)
        .fetch_one(&mut *tx)
        .await?;
        if active > 0 {
            return Err(AppError::Conflict(format!(
                "performance '{}' still has {} active reservation(s)",
                performance_id, active
            )));
        }

        let removed = sqlx::query("DELETE FROM reservations WHERE performance_id = $1")
            .bind(performance_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM performances WHERE id = $1")
            .bind(performance_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(removed)
    }
}
