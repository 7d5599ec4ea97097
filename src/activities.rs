use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        activity::{Activity, DaySchedule},
        trip::Trip,
    },
};

#[derive(Debug, Deserialize)]
pub struct ActivityInput {
    pub title: String,
    pub occurs_at: DateTime<Utc>,
}

pub async fn create_activity(
    db: &DbPool,
    trip: &Trip,
    input: ActivityInput,
) -> Result<Activity, AppError> {
    let title = validate_title(&input.title)?;
    validate_occurs_within(trip, input.occurs_at)?;

    let activity = Activity {
        id: Uuid::new_v4().to_string(),
        trip_id: trip.id.clone(),
        title,
        occurs_at: input.occurs_at,
    };
    sqlx::query("INSERT INTO activities (id, trip_id, title, occurs_at) VALUES (?, ?, ?, ?)")
        .bind(&activity.id)
        .bind(&activity.trip_id)
        .bind(&activity.title)
        .bind(activity.occurs_at)
        .execute(db)
        .await?;
    Ok(activity)
}

/// The trip's agenda: one entry per day of the trip's span, ascending, each
/// carrying the activities that fall on that day.
pub async fn list_activities(db: &DbPool, trip: &Trip) -> Result<Vec<DaySchedule>, AppError> {
    let activities = sqlx::query_as::<_, Activity>(
        "SELECT id, trip_id, title, occurs_at FROM activities \
         WHERE trip_id = ? ORDER BY occurs_at ASC",
    )
    .bind(&trip.id)
    .fetch_all(db)
    .await?;

    let span_days = (trip.ends_at.date_naive() - trip.starts_at.date_naive()).num_days();
    let mut schedule = Vec::with_capacity(span_days as usize + 1);
    for offset in 0..=span_days {
        let date = trip.starts_at + Duration::days(offset);
        let day = date.date_naive();
        schedule.push(DaySchedule {
            date,
            activities: activities
                .iter()
                .filter(|activity| activity.occurs_at.date_naive() == day)
                .cloned()
                .collect(),
        });
    }
    Ok(schedule)
}

pub async fn update_activity(
    db: &DbPool,
    trip: &Trip,
    activity_id: &str,
    input: ActivityInput,
) -> Result<Activity, AppError> {
    let activity = fetch_activity(db, trip, activity_id).await?;
    let title = validate_title(&input.title)?;
    validate_occurs_within(trip, input.occurs_at)?;

    sqlx::query("UPDATE activities SET title = ?, occurs_at = ? WHERE id = ?")
        .bind(&title)
        .bind(input.occurs_at)
        .bind(activity_id)
        .execute(db)
        .await?;

    Ok(Activity {
        title,
        occurs_at: input.occurs_at,
        ..activity
    })
}

pub async fn delete_activity(db: &DbPool, trip: &Trip, activity_id: &str) -> Result<(), AppError> {
    fetch_activity(db, trip, activity_id).await?;
    sqlx::query("DELETE FROM activities WHERE id = ?")
        .bind(activity_id)
        .execute(db)
        .await?;
    Ok(())
}

async fn fetch_activity(db: &DbPool, trip: &Trip, activity_id: &str) -> Result<Activity, AppError> {
    let activity = sqlx::query_as::<_, Activity>(
        "SELECT id, trip_id, title, occurs_at FROM activities WHERE id = ?",
    )
    .bind(activity_id)
    .fetch_optional(db)
    .await?;
    match activity {
        Some(activity) if activity.trip_id == trip.id => Ok(activity),
        _ => Err(AppError::NotFound("activity not found".to_string())),
    }
}

fn validate_title(title: &str) -> Result<String, AppError> {
    let title = title.trim();
    if title.chars().count() < 4 {
        return Err(AppError::BadRequest(
            "title must be at least 4 characters".to_string(),
        ));
    }
    Ok(title.to_string())
}

fn validate_occurs_within(trip: &Trip, occurs_at: DateTime<Utc>) -> Result<(), AppError> {
    if occurs_at < trip.starts_at || occurs_at > trip.ends_at {
        return Err(AppError::BadRequest("invalid activity date".to_string()));
    }
    Ok(())
}
