use super::DbPool;
use super::models::Activity;
use uuid::Uuid;

/// Append one entry to a user's activity log.
///
/// Activity logging is best-effort: callers treat failures as non-fatal
/// and log them rather than failing the triggering request.
pub async fn log_activity(
    pool: &DbPool,
    user_id: Uuid,
    action: &str,
    description: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO activities (user_id, action, description)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(user_id)
    .bind(action)
    .bind(description)
    .execute(pool)
    .await?;

    Ok(())
}

/// A user's recent activity, newest first
pub async fn list_activities(pool: &DbPool, user_id: Uuid) -> anyhow::Result<Vec<Activity>> {
    let activities = sqlx::query_as::<_, Activity>(
        r#"
        SELECT id, user_id, action, description, created_at
        FROM activities
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT 200
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(activities)
}
