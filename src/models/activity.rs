use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{error::AppError, models::trip::require};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Activity {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub title: String,
    pub occurs_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateActivityRequest {
    pub title: String,
    pub occurs_at: DateTime<Utc>,
}

impl CreateActivityRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require("title", &self.title)
    }
}

#[derive(Debug, Serialize)]
pub struct CreateActivityResponse {
    pub activity_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityItem {
    pub id: Uuid,
    pub title: String,
    pub occurs_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityDay {
    pub date: NaiveDate,
    pub activities: Vec<ActivityItem>,
}

#[derive(Debug, Serialize)]
pub struct ActivitiesResponse {
    pub activities: Vec<ActivityDay>,
}

/// Buckets activities by UTC calendar day. Days come out in date order; inside
/// a day the input order is kept.
pub fn group_by_day(activities: Vec<Activity>) -> Vec<ActivityDay> {
    let mut days: BTreeMap<NaiveDate, Vec<ActivityItem>> = BTreeMap::new();
    for activity in activities {
        days.entry(activity.occurs_at.date_naive())
            .or_default()
            .push(ActivityItem {
                id: activity.id,
                title: activity.title,
                occurs_at: activity.occurs_at,
            });
    }

    days.into_iter()
        .map(|(date, activities)| ActivityDay { date, activities })
        .collect()
}
