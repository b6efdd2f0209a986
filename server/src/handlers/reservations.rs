use axum::extract::{Path, State};
use axum::response::Response;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{ReservationStatus, ReservationView};
use crate::state::AppState;
use crate::utils::response::success;
use crate::utils::{AppJson, AppResult};

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: ReservationStatus,
}

pub async fn get_reservation(
    State(state): State<AppState>,
    Path((organization_id, reservation_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Response> {
    let reservation = state
        .box_office
        .reservation(organization_id, reservation_id)
        .await?;
    Ok(success(ReservationView::from(reservation), "Reservation found"))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path((organization_id, reservation_id)): Path<(Uuid, Uuid)>,
    AppJson(body): AppJson<StatusRequest>,
) -> AppResult<Response> {
    let reservation = state
        .box_office
        .update_reservation_status(organization_id, reservation_id, body.status)
        .await?;
    Ok(success(ReservationView::from(reservation), "Status updated"))
}

pub async fn list_checkin_logs(
    State(state): State<AppState>,
    Path((organization_id, reservation_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Response> {
    let logs = state
        .box_office
        .checkin_logs(organization_id, reservation_id)
        .await?;
    let message = format!("{} log entries", logs.len());
    Ok(success(logs, message))
}
