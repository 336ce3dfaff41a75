use super::DbPool;
use super::models::StoredFile;
use uuid::Uuid;

/// Record a newly uploaded file
pub async fn create_file(
    pool: &DbPool,
    owner_id: Uuid,
    name: &str,
    stored_name: &str,
    size_bytes: i64,
    mime_type: &str,
) -> anyhow::Result<StoredFile> {
    let file = sqlx::query_as::<_, StoredFile>(
        r#"
        INSERT INTO files (owner_id, name, stored_name, size_bytes, mime_type)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, owner_id, name, stored_name, size_bytes, mime_type, uploaded_at
        "#,
    )
    .bind(owner_id)
    .bind(name)
    .bind(stored_name)
    .bind(size_bytes)
    .bind(mime_type)
    .fetch_one(pool)
    .await?;

    Ok(file)
}

/// List a user's files, newest first (the registry snapshot order)
pub async fn list_files_for_user(pool: &DbPool, owner_id: Uuid) -> anyhow::Result<Vec<StoredFile>> {
    let files = sqlx::query_as::<_, StoredFile>(
        r#"
        SELECT id, owner_id, name, stored_name, size_bytes, mime_type, uploaded_at
        FROM files
        WHERE owner_id = $1
        ORDER BY uploaded_at DESC
        "#,
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    Ok(files)
}

/// Get one file, enforcing ownership
pub async fn get_file_for_user(
    pool: &DbPool,
    id: Uuid,
    owner_id: Uuid,
) -> anyhow::Result<Option<StoredFile>> {
    let file = sqlx::query_as::<_, StoredFile>(
        r#"
        SELECT id, owner_id, name, stored_name, size_bytes, mime_type, uploaded_at
        FROM files
        WHERE id = $1 AND owner_id = $2
        "#,
    )
    .bind(id)
    .bind(owner_id)
    .fetch_optional(pool)
    .await?;

    Ok(file)
}

/// Remove a file's metadata row, enforcing ownership. Returns the deleted
/// row so the caller can also remove the disk object.
pub async fn delete_file_for_user(
    pool: &DbPool,
    id: Uuid,
    owner_id: Uuid,
) -> anyhow::Result<Option<StoredFile>> {
    let file = sqlx::query_as::<_, StoredFile>(
        r#"
        DELETE FROM files
        WHERE id = $1 AND owner_id = $2
        RETURNING id, owner_id, name, stored_name, size_bytes, mime_type, uploaded_at
        "#,
    )
    .bind(id)
    .bind(owner_id)
    .fetch_optional(pool)
    .await?;

    Ok(file)
}

/// Total bytes stored by one user
pub async fn storage_used(pool: &DbPool, owner_id: Uuid) -> anyhow::Result<i64> {
    // Cast to BIGINT to avoid NUMERIC type mismatch
    let total: (Option<i64>,) = sqlx::query_as(
        "SELECT CAST(COALESCE(SUM(size_bytes), 0) AS BIGINT) FROM files WHERE owner_id = $1",
    )
    .bind(owner_id)
    .fetch_one(pool)
    .await?;

    Ok(total.0.unwrap_or(0))
}
