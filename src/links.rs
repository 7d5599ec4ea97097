use serde::Deserialize;
use url::Url;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{link::Link, trip::Trip},
};

#[derive(Debug, Deserialize)]
pub struct LinkInput {
    pub title: String,
    pub url: String,
}

pub async fn create_link(db: &DbPool, trip: &Trip, input: LinkInput) -> Result<Link, AppError> {
    let (title, url) = validate_link(&input)?;
    let link = Link {
        id: Uuid::new_v4().to_string(),
        trip_id: trip.id.clone(),
        title,
        url,
    };
    sqlx::query("INSERT INTO links (id, trip_id, title, url) VALUES (?, ?, ?, ?)")
        .bind(&link.id)
        .bind(&link.trip_id)
        .bind(&link.title)
        .bind(&link.url)
        .execute(db)
        .await?;
    Ok(link)
}

pub async fn list_links(db: &DbPool, trip_id: &str) -> Result<Vec<Link>, AppError> {
    let links = sqlx::query_as::<_, Link>(
        "SELECT id, trip_id, title, url FROM links WHERE trip_id = ? ORDER BY title",
    )
    .bind(trip_id)
    .fetch_all(db)
    .await?;
    Ok(links)
}

pub async fn update_link(
    db: &DbPool,
    trip: &Trip,
    link_id: &str,
    input: LinkInput,
) -> Result<Link, AppError> {
    let link = fetch_link(db, trip, link_id).await?;
    let (title, url) = validate_link(&input)?;

    sqlx::query("UPDATE links SET title = ?, url = ? WHERE id = ?")
        .bind(&title)
        .bind(&url)
        .bind(link_id)
        .execute(db)
        .await?;

    Ok(Link { title, url, ..link })
}

pub async fn delete_link(db: &DbPool, trip: &Trip, link_id: &str) -> Result<(), AppError> {
    fetch_link(db, trip, link_id).await?;
    sqlx::query("DELETE FROM links WHERE id = ?")
        .bind(link_id)
        .execute(db)
        .await?;
    Ok(())
}

async fn fetch_link(db: &DbPool, trip: &Trip, link_id: &str) -> Result<Link, AppError> {
    let link = sqlx::query_as::<_, Link>("SELECT id, trip_id, title, url FROM links WHERE id = ?")
        .bind(link_id)
        .fetch_optional(db)
        .await?;
    match link {
        Some(link) if link.trip_id == trip.id => Ok(link),
        _ => Err(AppError::NotFound("link not found".to_string())),
    }
}

fn validate_link(input: &LinkInput) -> Result<(String, String), AppError> {
    let title = input.title.trim();
    if title.chars().count() < 4 {
        return Err(AppError::BadRequest(
            "title must be at least 4 characters".to_string(),
        ));
    }
    let url = Url::parse(input.url.trim())
        .map_err(|_| AppError::BadRequest("invalid link url".to_string()))?;
    Ok((title.to_string(), url.to_string()))
}
