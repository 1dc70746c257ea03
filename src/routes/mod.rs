pub mod participants;
pub mod trips;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::error;
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/trips", trips::router())
        .nest("/participants", participants::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Logs a failed store call along with the trip it was made for.
pub(crate) fn log_trip_failure(trip_id: Uuid) -> impl Fn(&AppError) {
    move |err| {
        if let AppError::Database(source) = err {
            error!(trip_id = %trip_id, error = %source, "storage call failed");
        }
    }
}

pub(crate) fn log_participant_failure(participant_id: Uuid) -> impl Fn(&AppError) {
    move |err| {
        if let AppError::Database(source) = err {
            error!(participant_id = %participant_id, error = %source, "storage call failed");
        }
    }
}
