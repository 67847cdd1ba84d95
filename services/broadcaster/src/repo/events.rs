use crate::repo::EventRow;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

pub async fn fetch_latest_events(pool: &PgPool, limit: i64) -> Result<Vec<EventRow>, sqlx::Error> {
    sqlx::query_as::<_, EventRow>(
        r#"SELECT e.id, a.plate AS entity_id, e.traffic_light_id AS checkpoint_id, e.occurred_at
           FROM ambulance_events e
           JOIN ambulances a ON a.id = e.ambulance_id
           ORDER BY e.occurred_at DESC, e.id DESC
           LIMIT $1"#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn fetch_events_since(
    pool: &PgPool,
    after: DateTime<Utc>,
) -> Result<Vec<EventRow>, sqlx::Error> {
    sqlx::query_as::<_, EventRow>(
        r#"SELECT e.id, a.plate AS entity_id, e.traffic_light_id AS checkpoint_id, e.occurred_at
           FROM ambulance_events e
           JOIN ambulances a ON a.id = e.ambulance_id
           WHERE e.occurred_at > $1
           ORDER BY e.occurred_at DESC, e.id DESC"#,
    )
    .bind(after)
    .fetch_all(pool)
    .await
}

/// Record an ambulance passing a traffic light, creating the ambulance on
/// first sight. Returns the new event id.
pub async fn insert_event(
    pool: &PgPool,
    plate: &str,
    traffic_light_id: &str,
    occurred_at: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    let ambulance_id: i64 = sqlx::query_scalar(
        r#"INSERT INTO ambulances (plate) VALUES ($1)
           ON CONFLICT (plate) DO UPDATE SET plate = EXCLUDED.plate
           RETURNING id"#,
    )
    .bind(plate)
    .fetch_one(pool)
    .await?;

    sqlx::query_scalar(
        r#"INSERT INTO ambulance_events (ambulance_id, traffic_light_id, occurred_at)
           VALUES ($1, $2, $3)
           RETURNING id"#,
    )
    .bind(ambulance_id)
    .bind(traffic_light_id)
    .bind(occurred_at)
    .fetch_one(pool)
    .await
}
