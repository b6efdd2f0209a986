use axum::extract::{Path, State};
use axum::response::Response;
use uuid::Uuid;

use crate::models::ReceptionConfig;
use crate::services::catalog::{NewPerformance, NewProduction};
use crate::state::AppState;
use crate::utils::response::{created, success};
use crate::utils::{AppJson, AppResult};

pub async fn create_production(
    State(state): State<AppState>,
    Path(organization_id): Path<Uuid>,
    AppJson(body): AppJson<NewProduction>,
) -> AppResult<Response> {
    let production = state
        .box_office
        .create_production(organization_id, body)
        .await?;
    Ok(created(production, "Production created"))
}

pub async fn get_production(
    State(state): State<AppState>,
    Path((organization_id, production_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Response> {
    let production = state
        .box_office
        .production(organization_id, production_id)
        .await?;
    Ok(success(production, "Production found"))
}

pub async fn add_performance(
    State(state): State<AppState>,
    Path((organization_id, production_id)): Path<(Uuid, Uuid)>,
    AppJson(body): AppJson<NewPerformance>,
) -> AppResult<Response> {
    let performance = state
        .box_office
        .add_performance(organization_id, production_id, body)
        .await?;
    Ok(created(performance, "Performance added"))
}

pub async fn reception_status(
    State(state): State<AppState>,
    Path((organization_id, production_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Response> {
    let snapshot = state
        .box_office
        .reception_snapshot(organization_id, production_id)
        .await?;
    Ok(success(snapshot, "Reception status computed"))
}

/// Replaces the production's reception settings; omitted fields take their defaults.
pub async fn update_reception(
    State(state): State<AppState>,
    Path((organization_id, production_id)): Path<(Uuid, Uuid)>,
    AppJson(body): AppJson<ReceptionConfig>,
) -> AppResult<Response> {
    let production = state
        .box_office
        .update_reception(organization_id, production_id, body)
        .await?;
    Ok(success(production, "Reception settings updated"))
}
