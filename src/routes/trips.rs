use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    error::AppError,
    extract::{JsonBody, TripId},
    models::{
        activity::{
            group_by_day, ActivitiesResponse, CreateActivityRequest, CreateActivityResponse,
        },
        link::{CreateLinkRequest, CreateLinkResponse, LinksResponse},
        participant::{InviteParticipantRequest, ParticipantsResponse},
        trip::{CreateTripRequest, CreateTripResponse, TripDetailsResponse, UpdateTripRequest},
    },
    services::store::{NewActivity, NewLink, NewTrip, TripUpdate},
    state::AppState,
};

use super::log_trip_failure;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_trip))
        .route("/:trip_id", get(get_trip).put(update_trip))
        .route("/:trip_id/confirm", get(confirm_trip))
        .route(
            "/:trip_id/activities",
            get(trip_activities).post(create_activity),
        )
        .route("/:trip_id/invites", post(invite_participant))
        .route("/:trip_id/links", get(trip_links).post(create_link))
        .route("/:trip_id/participants", get(trip_participants))
}

async fn create_trip(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CreateTripRequest>,
) -> Result<(StatusCode, Json<CreateTripResponse>), AppError> {
    body.validate()?;

    let trip_id = state
        .store
        .create_trip(NewTrip {
            destination: body.destination.trim().to_string(),
            owner_name: body.owner_name.trim().to_string(),
            owner_email: body.owner_email.into(),
            starts_at: body.starts_at,
            ends_at: body.ends_at,
            emails_to_invite: body.emails_to_invite.into_iter().map(String::from).collect(),
        })
        .await
        .inspect_err(|err| {
            if let AppError::Database(source) = err {
                error!(error = %source, "storage call failed while creating trip");
            }
        })?;
    info!(trip_id = %trip_id, "trip created");

    let mailer = state.mailer.clone();
    tokio::spawn(async move {
        if let Err(err) = mailer.send_trip_owner_confirmation(trip_id).await {
            error!(trip_id = %trip_id, error = %err, "failed to send owner confirmation email");
        }
    });

    Ok((StatusCode::CREATED, Json(CreateTripResponse { trip_id })))
}

async fn get_trip(
    State(state): State<AppState>,
    TripId(id): TripId,
) -> Result<Json<TripDetailsResponse>, AppError> {
    let trip = state
        .store
        .get_trip(id)
        .await
        .inspect_err(log_trip_failure(id))?
        .ok_or(AppError::NotFound("trip"))?;
    Ok(Json(TripDetailsResponse { trip: trip.into() }))
}

async fn update_trip(
    State(state): State<AppState>,
    TripId(id): TripId,
    JsonBody(body): JsonBody<UpdateTripRequest>,
) -> Result<StatusCode, AppError> {
    body.validate()?;

    state
        .store
        .update_trip(
            id,
            TripUpdate {
                destination: body.destination.trim().to_string(),
                starts_at: body.starts_at,
                ends_at: body.ends_at,
            },
        )
        .await
        .inspect_err(log_trip_failure(id))?
        .ok_or(AppError::NotFound("trip"))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn confirm_trip(
    State(state): State<AppState>,
    TripId(id): TripId,
) -> Result<StatusCode, AppError> {
    state
        .store
        .confirm_trip(id)
        .await
        .inspect_err(log_trip_failure(id))?
        .ok_or(AppError::NotFound("trip"))?;
    info!(trip_id = %id, "trip confirmed");
    Ok(StatusCode::NO_CONTENT)
}

async fn trip_activities(
    State(state): State<AppState>,
    TripId(id): TripId,
) -> Result<Json<ActivitiesResponse>, AppError> {
    let activities = state
        .store
        .get_trip_activities(id)
        .await
        .inspect_err(log_trip_failure(id))?;
    Ok(Json(ActivitiesResponse {
        activities: group_by_day(activities),
    }))
}

async fn create_activity(
    State(state): State<AppState>,
    TripId(id): TripId,
    JsonBody(body): JsonBody<CreateActivityRequest>,
) -> Result<(StatusCode, Json<CreateActivityResponse>), AppError> {
    ensure_trip_exists(&state, id).await?;
    body.validate()?;

    let activity_id = state
        .store
        .create_activity(NewActivity {
            trip_id: id,
            title: body.title.trim().to_string(),
            occurs_at: body.occurs_at,
        })
        .await
        .inspect_err(log_trip_failure(id))?;
    Ok((StatusCode::CREATED, Json(CreateActivityResponse { activity_id })))
}

async fn invite_participant(
    State(state): State<AppState>,
    TripId(id): TripId,
    JsonBody(body): JsonBody<InviteParticipantRequest>,
) -> Result<StatusCode, AppError> {
    let participant_id = state
        .store
        .invite_participant(id, body.email.as_str())
        .await
        .inspect_err(log_trip_failure(id))?;
    info!(trip_id = %id, participant_id = %participant_id, "participant invited");

    if state.config.notify_invitees {
        let mailer = state.mailer.clone();
        tokio::spawn(async move {
            if let Err(err) = mailer.send_participant_confirmation(participant_id, id).await {
                error!(
                    trip_id = %id,
                    participant_id = %participant_id,
                    error = %err,
                    "failed to send participant confirmation email"
                );
            }
        });
    }

    Ok(StatusCode::CREATED)
}

async fn trip_links(
    State(state): State<AppState>,
    TripId(id): TripId,
) -> Result<Json<LinksResponse>, AppError> {
    let links = state
        .store
        .get_trip_links(id)
        .await
        .inspect_err(log_trip_failure(id))?;
    Ok(Json(LinksResponse {
        links: links.into_iter().map(Into::into).collect(),
    }))
}

async fn create_link(
    State(state): State<AppState>,
    TripId(id): TripId,
    JsonBody(body): JsonBody<CreateLinkRequest>,
) -> Result<(StatusCode, Json<CreateLinkResponse>), AppError> {
    body.validate()?;

    let link_id = state
        .store
        .create_trip_link(NewLink {
            trip_id: id,
            title: body.title.trim().to_string(),
            url: body.url.trim().to_string(),
        })
        .await
        .inspect_err(log_trip_failure(id))?;
    Ok((StatusCode::CREATED, Json(CreateLinkResponse { link_id })))
}

async fn trip_participants(
    State(state): State<AppState>,
    TripId(id): TripId,
) -> Result<Json<ParticipantsResponse>, AppError> {
    let participants = state
        .store
        .get_participants(id)
        .await
        .inspect_err(log_trip_failure(id))?;
    Ok(Json(ParticipantsResponse {
        participants: participants.into_iter().map(Into::into).collect(),
    }))
}

async fn ensure_trip_exists(state: &AppState, id: Uuid) -> Result<(), AppError> {
    let trip = state
        .store
        .get_trip(id)
        .await
        .inspect_err(log_trip_failure(id))?;
    match trip {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound("trip")),
    }
}
