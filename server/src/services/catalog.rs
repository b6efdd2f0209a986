//! Productions, their ticket types and performances, and the reception settings
//! the box office manages by hand.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{Performance, Production, ReceptionConfig, TicketType};
use crate::utils::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize)]
pub struct NewTicketType {
    pub name: String,
    pub price: i64,
    #[serde(default)]
    pub advance_price: Option<i64>,
    #[serde(default)]
    pub door_price: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduction {
    pub title: String,
    #[serde(default)]
    pub reception: ReceptionConfig,
    #[serde(default)]
    pub ticket_types: Vec<NewTicketType>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPerformance {
    pub start_time: DateTime<Utc>,
    pub capacity: i32,
}

fn required(field: &str, value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::ValidationError(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn non_negative_price(field: &str, value: i64) -> AppResult<()> {
    if value < 0 {
        return Err(AppError::ValidationError(format!(
            "{} must not be negative",
            field
        )));
    }
    Ok(())
}

pub fn validate_reception(reception: &ReceptionConfig) -> AppResult<()> {
    if reception.end_minutes < 0 {
        return Err(AppError::ValidationError(
            "reception end_minutes must not be negative".to_string(),
        ));
    }
    if let (Some(start), Some(end)) = (reception.start, reception.end) {
        if end < start {
            return Err(AppError::ValidationError(
                "reception end must not precede its start".to_string(),
            ));
        }
    }
    Ok(())
}

/// New production with fresh ids for it and its ticket types, in request order.
pub fn build_production(organization_id: Uuid, request: &NewProduction) -> AppResult<Production> {
    let title = required("title", &request.title)?;
    validate_reception(&request.reception)?;

    let production_id = Uuid::new_v4();
    let ticket_types = request
        .ticket_types
        .iter()
        .map(|ticket_type| {
            let name = required("ticket type name", &ticket_type.name)?;
            non_negative_price("price", ticket_type.price)?;
            if let Some(advance) = ticket_type.advance_price {
                non_negative_price("advance_price", advance)?;
            }
            if let Some(door) = ticket_type.door_price {
                non_negative_price("door_price", door)?;
            }
            Ok(TicketType {
                id: Uuid::new_v4(),
                production_id,
                name,
                price: ticket_type.price,
                advance_price: ticket_type.advance_price,
                door_price: ticket_type.door_price,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok(Production {
        id: production_id,
        organization_id,
        title,
        reception: request.reception.clone(),
        ticket_types,
        performances: Vec::new(),
    })
}

pub fn build_performance(
    production: &Production,
    request: &NewPerformance,
) -> AppResult<Performance> {
    if request.capacity < 0 {
        return Err(AppError::ValidationError(
            "capacity must not be negative".to_string(),
        ));
    }
    Ok(Performance {
        id: Uuid::new_v4(),
        organization_id: production.organization_id,
        production_id: production.id,
        start_time: request.start_time,
        capacity: request.capacity,
    })
}
