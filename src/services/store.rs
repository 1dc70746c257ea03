use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{activity::Activity, link::Link, participant::Participant, trip::Trip},
};

#[derive(Debug, Clone)]
pub struct NewTrip {
    pub destination: String,
    pub owner_name: String,
    pub owner_email: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub emails_to_invite: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TripUpdate {
    pub destination: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub trip_id: Uuid,
    pub title: String,
    pub occurs_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLink {
    pub trip_id: Uuid,
    pub title: String,
    pub url: String,
}

/// Persistence for trips and the rows hanging off them.
///
/// Lookups return `Ok(None)` for missing rows; errors are reserved for the
/// backing store failing.
#[async_trait]
pub trait TripStore: Send + Sync {
    /// Inserts the trip together with an unconfirmed participant per invitee.
    async fn create_trip(&self, trip: NewTrip) -> Result<Uuid, AppError>;
    async fn get_trip(&self, id: Uuid) -> Result<Option<Trip>, AppError>;
    /// Rewrites the schedule of an existing trip, leaving `is_confirmed` as stored.
    async fn update_trip(&self, id: Uuid, update: TripUpdate) -> Result<Option<Trip>, AppError>;
    async fn confirm_trip(&self, id: Uuid) -> Result<Option<Trip>, AppError>;

    async fn get_participant(&self, id: Uuid) -> Result<Option<Participant>, AppError>;
    /// Returns `false` when the participant was already confirmed (or is gone).
    async fn confirm_participant(&self, id: Uuid) -> Result<bool, AppError>;
    async fn invite_participant(&self, trip_id: Uuid, email: &str) -> Result<Uuid, AppError>;
    async fn get_participants(&self, trip_id: Uuid) -> Result<Vec<Participant>, AppError>;

    async fn get_trip_activities(&self, trip_id: Uuid) -> Result<Vec<Activity>, AppError>;
    async fn create_activity(&self, activity: NewActivity) -> Result<Uuid, AppError>;

    async fn get_trip_links(&self, trip_id: Uuid) -> Result<Vec<Link>, AppError>;
    async fn create_trip_link(&self, link: NewLink) -> Result<Uuid, AppError>;
}

const SELECT_TRIP: &str = r#"SELECT id, destination, owner_email, owner_name, is_confirmed,
    starts_at, ends_at FROM trips WHERE id = ?"#;

#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TripStore for SqliteStore {
    async fn create_trip(&self, trip: NewTrip) -> Result<Uuid, AppError> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO trips
               (id, destination, owner_email, owner_name, is_confirmed, starts_at, ends_at)
               VALUES (?, ?, ?, ?, 0, ?, ?)"#,
        )
        .bind(id)
        .bind(&trip.destination)
        .bind(&trip.owner_email)
        .bind(&trip.owner_name)
        .bind(trip.starts_at)
        .bind(trip.ends_at)
        .execute(&mut *tx)
        .await?;

        for email in &trip.emails_to_invite {
            sqlx::query(
                "INSERT INTO participants (id, trip_id, email, is_confirmed) VALUES (?, ?, ?, 0)",
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(email)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    async fn get_trip(&self, id: Uuid) -> Result<Option<Trip>, AppError> {
        let trip = sqlx::query_as::<_, Trip>(SELECT_TRIP)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(trip)
    }

    async fn update_trip(&self, id: Uuid, update: TripUpdate) -> Result<Option<Trip>, AppError> {
        let mut tx = self.pool.begin().await?;
        let Some(mut trip) = sqlx::query_as::<_, Trip>(SELECT_TRIP)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        sqlx::query("UPDATE trips SET destination = ?, starts_at = ?, ends_at = ? WHERE id = ?")
            .bind(&update.destination)
            .bind(update.starts_at)
            .bind(update.ends_at)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        trip.destination = update.destination;
        trip.starts_at = update.starts_at;
        trip.ends_at = update.ends_at;
        Ok(Some(trip))
    }

    async fn confirm_trip(&self, id: Uuid) -> Result<Option<Trip>, AppError> {
        let mut tx = self.pool.begin().await?;
        let Some(mut trip) = sqlx::query_as::<_, Trip>(SELECT_TRIP)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        sqlx::query("UPDATE trips SET is_confirmed = 1 WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        trip.is_confirmed = true;
        Ok(Some(trip))
    }

    async fn get_participant(&self, id: Uuid) -> Result<Option<Participant>, AppError> {
        let participant = sqlx::query_as::<_, Participant>(
            "SELECT id, trip_id, email, name, is_confirmed FROM participants WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(participant)
    }

    async fn confirm_participant(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE participants SET is_confirmed = 1 WHERE id = ? AND is_confirmed = 0",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn invite_participant(&self, trip_id: Uuid, email: &str) -> Result<Uuid, AppError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO participants (id, trip_id, email, is_confirmed) VALUES (?, ?, ?, 0)",
        )
        .bind(id)
        .bind(trip_id)
        .bind(email)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn get_participants(&self, trip_id: Uuid) -> Result<Vec<Participant>, AppError> {
        let participants = sqlx::query_as::<_, Participant>(
            r#"SELECT id, trip_id, email, name, is_confirmed FROM participants
               WHERE trip_id = ? ORDER BY rowid"#,
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(participants)
    }

    async fn get_trip_activities(&self, trip_id: Uuid) -> Result<Vec<Activity>, AppError> {
        let activities = sqlx::query_as::<_, Activity>(
            r#"SELECT id, trip_id, title, occurs_at FROM activities
               WHERE trip_id = ? ORDER BY occurs_at, rowid"#,
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(activities)
    }

    async fn create_activity(&self, activity: NewActivity) -> Result<Uuid, AppError> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO activities (id, trip_id, title, occurs_at) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(activity.trip_id)
            .bind(&activity.title)
            .bind(activity.occurs_at)
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    async fn get_trip_links(&self, trip_id: Uuid) -> Result<Vec<Link>, AppError> {
        let links = sqlx::query_as::<_, Link>(
            "SELECT id, trip_id, title, url FROM links WHERE trip_id = ? ORDER BY rowid",
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(links)
    }

    async fn create_trip_link(&self, link: NewLink) -> Result<Uuid, AppError> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO links (id, trip_id, title, url) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(link.trip_id)
            .bind(&link.title)
            .bind(&link.url)
            .execute(&self.pool)
            .await?;
        Ok(id)
    }
}
