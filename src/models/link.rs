use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use url::Url;
use uuid::Uuid;

use crate::{error::AppError, models::trip::require};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Link {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLinkRequest {
    pub title: String,
    pub url: String,
}

impl CreateLinkRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require("title", &self.title)?;
        require("url", &self.url)?;
        Url::parse(self.url.trim())
            .map_err(|err| AppError::Validation(format!("url is invalid: {err}")))?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct CreateLinkResponse {
    pub link_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct LinkSummary {
    pub id: Uuid,
    pub title: String,
    pub url: String,
}

impl From<Link> for LinkSummary {
    fn from(link: Link) -> Self {
        Self {
            id: link.id,
            title: link.title,
            url: link.url,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LinksResponse {
    pub links: Vec<LinkSummary>,
}
