use axum::extract::FromRequest;

use crate::utils::AppError;

/// `Json` whose rejection is an `AppError`, so malformed bodies answer with the
/// usual error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
