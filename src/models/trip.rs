use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{error::AppError, models::email::Email};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trip {
    pub id: Uuid,
    pub destination: String,
    pub owner_email: String,
    pub owner_name: String,
    pub is_confirmed: bool,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// Start and end are not checked against each other; a trip ending before it
/// starts is stored as given.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTripRequest {
    pub destination: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub emails_to_invite: Vec<Email>,
    pub owner_name: String,
    pub owner_email: Email,
}

impl CreateTripRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require("destination", &self.destination)?;
        require("owner_name", &self.owner_name)
    }
}

#[derive(Debug, Serialize)]
pub struct CreateTripResponse {
    pub trip_id: Uuid,
}

/// Only the schedule fields are updatable; the confirmation flag is owned by
/// the confirm endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTripRequest {
    pub destination: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl UpdateTripRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require("destination", &self.destination)
    }
}

#[derive(Debug, Serialize)]
pub struct TripDetails {
    pub id: Uuid,
    pub destination: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_confirmed: bool,
}

impl From<Trip> for TripDetails {
    fn from(trip: Trip) -> Self {
        Self {
            id: trip.id,
            destination: trip.destination,
            starts_at: trip.starts_at,
            ends_at: trip.ends_at,
            is_confirmed: trip.is_confirmed,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TripDetailsResponse {
    pub trip: TripDetails,
}

pub(crate) fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(())
}
