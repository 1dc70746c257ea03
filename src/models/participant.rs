use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::email::Email;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Participant {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub is_confirmed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InviteParticipantRequest {
    pub email: Email,
}

#[derive(Debug, Serialize)]
pub struct ParticipantSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub is_confirmed: bool,
}

impl From<Participant> for ParticipantSummary {
    fn from(participant: Participant) -> Self {
        // Names are not collected anywhere yet, so the listing never exposes one.
        Self {
            id: participant.id,
            name: None,
            email: participant.email,
            is_confirmed: participant.is_confirmed,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ParticipantsResponse {
    pub participants: Vec<ParticipantSummary>,
}
