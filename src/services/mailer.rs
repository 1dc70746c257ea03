use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::{
    address::AddressError,
    message::{header::ContentType, Mailbox},
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::{
    config::AppConfig, error::AppError, models::trip::Trip, services::store::TripStore,
};

const SUBJECT: &str = "Confirm your trip!";

const CONFIRMATION_TEMPLATE: &str = "Hello, {name}

Your trip to {destination} starting on {starts_at} needs to be confirmed.
Click the button below to confirm.
";

#[derive(Debug, Error)]
pub enum MailError {
    #[error("failed to load trip {trip_id} for confirmation email: {source}")]
    TripLookup { trip_id: Uuid, source: AppError },
    #[error("trip {0} does not exist")]
    TripMissing(Uuid),
    #[error("failed to load participant {participant_id} for confirmation email: {source}")]
    ParticipantLookup {
        participant_id: Uuid,
        source: AppError,
    },
    #[error("participant {0} does not exist")]
    ParticipantMissing(Uuid),
    #[error("invalid {field} address {address:?}: {source}")]
    Address {
        field: &'static str,
        address: String,
        source: AddressError,
    },
    #[error("failed to build confirmation email: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("failed to send confirmation email: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_trip_owner_confirmation(&self, trip_id: Uuid) -> Result<(), MailError>;
    async fn send_participant_confirmation(
        &self,
        participant_id: Uuid,
        trip_id: Uuid,
    ) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    store: Arc<dyn TripStore>,
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &AppConfig, store: Arc<dyn TripStore>) -> Self {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
            .port(config.smtp_port)
            .build();
        Self {
            store,
            transport,
            from: config.mail_from.clone(),
        }
    }

    async fn load_trip(&self, trip_id: Uuid) -> Result<Trip, MailError> {
        self.store
            .get_trip(trip_id)
            .await
            .map_err(|source| MailError::TripLookup { trip_id, source })?
            .ok_or(MailError::TripMissing(trip_id))
    }

    async fn deliver(&self, to: Mailbox, body: String) -> Result<(), MailError> {
        let from = parse_mailbox("from", &self.from, None)?;
        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;
        self.transport.send(message).await?;
        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_trip_owner_confirmation(&self, trip_id: Uuid) -> Result<(), MailError> {
        let trip = self.load_trip(trip_id).await?;
        let to = parse_mailbox("to", &trip.owner_email, Some(&trip.owner_name))?;
        let body = render_template(
            CONFIRMATION_TEMPLATE,
            &trip.owner_name,
            &trip.destination,
            trip.starts_at,
        );
        self.deliver(to, body).await?;
        info!(trip_id = %trip_id, "owner confirmation email sent");
        Ok(())
    }

    async fn send_participant_confirmation(
        &self,
        participant_id: Uuid,
        trip_id: Uuid,
    ) -> Result<(), MailError> {
        let participant = self
            .store
            .get_participant(participant_id)
            .await
            .map_err(|source| MailError::ParticipantLookup {
                participant_id,
                source,
            })?
            .ok_or(MailError::ParticipantMissing(participant_id))?;
        let to = parse_mailbox("to", &participant.email, participant.name.as_deref())?;

        let trip = self.load_trip(trip_id).await?;
        let body = render_template(
            CONFIRMATION_TEMPLATE,
            participant.name.as_deref().unwrap_or("Guest"),
            &trip.destination,
            trip.starts_at,
        );
        self.deliver(to, body).await?;
        info!(
            trip_id = %trip_id,
            participant_id = %participant_id,
            "participant confirmation email sent"
        );
        Ok(())
    }
}

fn parse_mailbox(
    field: &'static str,
    address: &str,
    name: Option<&str>,
) -> Result<Mailbox, MailError> {
    let parsed = address.parse::<Address>().map_err(|source| MailError::Address {
        field,
        address: address.to_string(),
        source,
    })?;
    Ok(Mailbox::new(name.map(str::to_string), parsed))
}

fn render_template(
    template: &str,
    name: &str,
    destination: &str,
    starts_at: DateTime<Utc>,
) -> String {
    template
        .replace("{name}", name)
        .replace("{destination}", destination)
        .replace("{starts_at}", &starts_at.format("%Y-%m-%d").to_string())
}
