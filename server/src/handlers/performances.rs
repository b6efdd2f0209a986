use axum::extract::{Path, State};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Customer, ReservationSource, ReservationView};
use crate::services::booking::{NewReservation, SameDayRequest, TicketCounts};
use crate::state::AppState;
use crate::utils::response::{created, success};
use crate::utils::{AppJson, AppResult};

fn public_form() -> ReservationSource {
    ReservationSource::PublicForm
}

#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    pub customer: Customer,
    pub tickets: TicketCounts,
    #[serde(default = "public_form")]
    pub source: ReservationSource,
}

#[derive(Debug, Deserialize)]
pub struct SameDayTicketRequest {
    pub customer_name: Option<String>,
    pub tickets: TicketCounts,
}

#[derive(Debug, Serialize)]
struct DeletedPerformance {
    performance_id: Uuid,
    removed_reservations: u64,
}

pub async fn availability(
    State(state): State<AppState>,
    Path((organization_id, performance_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Response> {
    let availability = state
        .box_office
        .availability(organization_id, performance_id)
        .await?;
    Ok(success(availability, "Availability computed"))
}

pub async fn create_reservation(
    State(state): State<AppState>,
    Path((organization_id, performance_id)): Path<(Uuid, Uuid)>,
    AppJson(body): AppJson<CreateReservationRequest>,
) -> AppResult<Response> {
    let request = NewReservation {
        performance_id,
        customer: body.customer,
        tickets: body.tickets,
        source: body.source,
    };
    let reservation = state
        .box_office
        .create_reservation(organization_id, request)
        .await?;
    Ok(created(ReservationView::from(reservation), "Reservation created"))
}

pub async fn issue_same_day_ticket(
    State(state): State<AppState>,
    Path((organization_id, performance_id)): Path<(Uuid, Uuid)>,
    AppJson(body): AppJson<SameDayTicketRequest>,
) -> AppResult<Response> {
    let request = SameDayRequest {
        performance_id,
        customer_name: body.customer_name,
        tickets: body.tickets,
    };
    let reservation = state
        .box_office
        .issue_same_day_ticket(organization_id, request)
        .await?;
    Ok(created(ReservationView::from(reservation), "Same-day ticket issued"))
}

pub async fn delete_performance(
    State(state): State<AppState>,
    Path((organization_id, performance_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Response> {
    let removed_reservations = state
        .box_office
        .delete_performance(organization_id, performance_id)
        .await?;
    Ok(success(
        DeletedPerformance {
            performance_id,
            removed_reservations,
        },
        "Performance deleted",
    ))
}
