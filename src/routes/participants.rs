use axum::{extract::State, http::StatusCode, routing::patch, Router};
use tracing::info;

use crate::{error::AppError, extract::ParticipantId, state::AppState};

use super::log_participant_failure;

pub fn router() -> Router<AppState> {
    Router::new().route("/:participant_id/confirm", patch(confirm_participant))
}

async fn confirm_participant(
    State(state): State<AppState>,
    ParticipantId(id): ParticipantId,
) -> Result<StatusCode, AppError> {
    let participant = state
        .store
        .get_participant(id)
        .await
        .inspect_err(log_participant_failure(id))?
        .ok_or(AppError::NotFound("participant"))?;
    if participant.is_confirmed {
        return Err(AppError::AlreadyConfirmed);
    }

    // A concurrent confirm may win between the read and this write.
    let confirmed = state
        .store
        .confirm_participant(id)
        .await
        .inspect_err(log_participant_failure(id))?;
    if !confirmed {
        return Err(AppError::AlreadyConfirmed);
    }

    info!(participant_id = %id, trip_id = %participant.trip_id, "participant confirmed");
    Ok(StatusCode::NO_CONTENT)
}
