use axum::extract::{Path, State};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CheckinLogEntry, PaymentBreakdown, ReservationView};
use crate::services::ledger::LedgerOutcome;
use crate::state::AppState;
use crate::utils::response::success;
use crate::utils::{AppJson, AppResult};

#[derive(Debug, Deserialize)]
pub struct CheckinRequest {
    pub count: i32,
}

#[derive(Debug, Deserialize)]
pub struct CheckinWithPaymentRequest {
    pub checkin_count: i32,
    pub payment_amount: i64,
    #[serde(default)]
    pub payment_breakdown: PaymentBreakdown,
}

#[derive(Debug, Deserialize)]
pub struct PartialResetRequest {
    pub checkin_count: i32,
    pub refund_amount: i64,
    #[serde(default)]
    pub refund_breakdown: PaymentBreakdown,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub received_amount: i64,
}

#[derive(Debug, Serialize)]
pub struct LedgerResponse {
    pub reservation: ReservationView,
    pub log: Option<CheckinLogEntry>,
}

impl From<LedgerOutcome> for LedgerResponse {
    fn from(outcome: LedgerOutcome) -> Self {
        Self {
            reservation: outcome.reservation.into(),
            log: outcome.log,
        }
    }
}

pub async fn add_checked_in_tickets(
    State(state): State<AppState>,
    Path((organization_id, reservation_id)): Path<(Uuid, Uuid)>,
    AppJson(body): AppJson<CheckinRequest>,
) -> AppResult<Response> {
    let outcome = state
        .box_office
        .add_checked_in_tickets(organization_id, reservation_id, body.count)
        .await?;
    Ok(success(LedgerResponse::from(outcome), "Checked in"))
}

pub async fn reset_check_in(
    State(state): State<AppState>,
    Path((organization_id, reservation_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Response> {
    let outcome = state
        .box_office
        .reset_check_in(organization_id, reservation_id)
        .await?;
    Ok(success(LedgerResponse::from(outcome), "Check-in reset"))
}

pub async fn checkin_with_payment(
    State(state): State<AppState>,
    Path((organization_id, reservation_id)): Path<(Uuid, Uuid)>,
    AppJson(body): AppJson<CheckinWithPaymentRequest>,
) -> AppResult<Response> {
    let outcome = state
        .box_office
        .process_checkin_with_payment(
            organization_id,
            reservation_id,
            body.checkin_count,
            body.payment_amount,
            body.payment_breakdown,
        )
        .await?;
    Ok(success(
        LedgerResponse::from(outcome),
        "Checked in with payment",
    ))
}

pub async fn partial_reset(
    State(state): State<AppState>,
    Path((organization_id, reservation_id)): Path<(Uuid, Uuid)>,
    AppJson(body): AppJson<PartialResetRequest>,
) -> AppResult<Response> {
    let outcome = state
        .box_office
        .process_partial_reset(
            organization_id,
            reservation_id,
            body.checkin_count,
            body.refund_amount,
            body.refund_breakdown,
        )
        .await?;
    Ok(success(LedgerResponse::from(outcome), "Partially reset"))
}

pub async fn register_payment(
    State(state): State<AppState>,
    Path((organization_id, reservation_id)): Path<(Uuid, Uuid)>,
    AppJson(body): AppJson<PaymentRequest>,
) -> AppResult<Response> {
    let reservation = state
        .box_office
        .register_payment(organization_id, reservation_id, body.received_amount)
        .await?;
    Ok(success(ReservationView::from(reservation), "Payment registered"))
}
