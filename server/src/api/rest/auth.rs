//! Authentication routes
//!
//! Handles user registration, login, and password reset.

use crate::api::AppState;
use crate::auth;
use crate::db::{activities, users};
use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::error::AppError;

// ============================================================================
// ROUTES
// ============================================================================

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/forgotpassword", post(forgot_password))
        .route("/api/resetpassword/:token", post(reset_password))
}

// ============================================================================
// TYPES
// ============================================================================

#[derive(Deserialize)]
struct RegisterRequest {
    username: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    message: String,
    token: String,
    username: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Deserialize)]
struct ForgotPasswordRequest {
    email: String,
}

#[derive(Deserialize)]
struct ResetPasswordRequest {
    password: String,
}

// ============================================================================
// HANDLERS
// ============================================================================

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let username = req.username.trim();
    let email = req.email.trim();

    if username.is_empty() || email.is_empty() {
        return Err(AppError::BadRequest(
            "Username and email are required.".into(),
        ));
    }
    if !email.contains('@') {
        return Err(AppError::BadRequest("Invalid email address.".into()));
    }
    if req.password.len() < 6 {
        return Err(AppError::BadRequest(
            "Password must be 6 or more characters.".into(),
        ));
    }

    if users::credentials_taken(&state.db, username, email).await? {
        return Err(AppError::Conflict(
            "Username or email already registered.".into(),
        ));
    }

    let password_hash = auth::hash_password(&req.password)?;
    let user = users::create_user(&state.db, username, email, &password_hash).await?;

    if let Err(e) = activities::log_activity(&state.db, user.id, "register", "Account created").await
    {
        tracing::warn!("could not log activity: {}", e);
    }

    tracing::info!("registered user {}", user.id);

    Ok(Json(MessageResponse {
        message: "User registered successfully.".into(),
    }))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    // Accept either identifier; email wins when both are present.
    let user = if !req.email.trim().is_empty() {
        users::get_user_by_email(&state.db, req.email.trim()).await?
    } else if !req.username.trim().is_empty() {
        users::get_user_by_username(&state.db, req.username.trim()).await?
    } else {
        return Err(AppError::BadRequest(
            "Username or email is required.".into(),
        ));
    };

    let user = match user {
        Some(u) => u,
        None => {
            tracing::warn!("login attempt for unknown account");
            return Err(AppError::Unauthorized("Invalid credentials".into()));
        }
    };

    match auth::verify_password(&req.password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("invalid password for user {}", user.id);
            return Err(AppError::Unauthorized("Invalid credentials".into()));
        }
        Err(e) => {
            tracing::error!("password verification error: {}", e);
            return Err(AppError::Internal("Authentication error".into()));
        }
    }

    let token = auth::create_token(&state.config.jwt_secret, user.id)?;

    if let Err(e) = activities::log_activity(&state.db, user.id, "login", "Logged in").await {
        tracing::warn!("could not log activity: {}", e);
    }

    tracing::info!("login successful for user {}", user.id);

    Ok(Json(LoginResponse {
        message: "Logged in successfully.".into(),
        token,
        username: user.username,
    }))
}

/// Request a password reset email.
///
/// Always returns the same message to prevent email enumeration. The token
/// itself is never stored; only its BLAKE3 hash is.
async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    // Generate a secure random token (32 hex characters)
    let token_bytes: [u8; 16] = rand::random();
    let token = hex::encode(token_bytes);
    let token_hash = blake3::hash(token.as_bytes()).to_hex().to_string();

    if let Some(user) = users::get_user_by_email(&state.db, req.email.trim()).await? {
        let expires_at = chrono::Utc::now() + chrono::Duration::hours(1);

        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user.id)
        .bind(&token_hash)
        .bind(expires_at)
        .execute(&state.db)
        .await?;

        let reset_link = format!("{}/resetpassword/{}", state.config.public_url, token);
        match &state.mailer {
            Some(mailer) => {
                let text = format!(
                    "Hello {},\n\nTo reset your {} password, open this link within one hour:\n{}\n\nIf you did not request a reset, you can ignore this mail.",
                    user.username, state.config.server_name, reset_link
                );
                let html = format!(
                    "<p>Hello {},</p><p>To reset your {} password, open this link within one hour:</p><p><a href=\"{}\">{}</a></p><p>If you did not request a reset, you can ignore this mail.</p>",
                    user.username, state.config.server_name, reset_link, reset_link
                );
                if let Err(e) = mailer.send(&user.email, "Password Reset Request", &text, &html).await {
                    tracing::error!("could not send reset mail to user {}: {}", user.id, e);
                }
            }
            None => {
                // No SMTP relay configured; operators can hand the token over manually.
                tracing::info!("password reset token for user {}: {}", user.id, token);
            }
        }
    }

    Ok(Json(MessageResponse {
        message: "If this email exists, a reset link has been sent.".into(),
    }))
}

/// Reset password using a valid token
async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    if req.password.len() < 6 {
        return Err(AppError::BadRequest(
            "Password must be 6 or more characters.".into(),
        ));
    }

    let token_hash = blake3::hash(token.as_bytes()).to_hex().to_string();

    let token_record = sqlx::query_as::<_, (uuid::Uuid, uuid::Uuid)>(
        r#"
        SELECT id, user_id FROM password_reset_tokens
        WHERE token_hash = $1
          AND expires_at > NOW()
          AND used_at IS NULL
        "#,
    )
    .bind(&token_hash)
    .fetch_optional(&state.db)
    .await?;

    let (token_id, user_id) = match token_record {
        Some(r) => r,
        None => {
            tracing::warn!("invalid or expired password reset token");
            return Err(AppError::BadRequest("Invalid or expired reset token".into()));
        }
    };

    let password_hash = auth::hash_password(&req.password)?;
    users::update_password(&state.db, user_id, &password_hash).await?;

    // Mark token as used
    sqlx::query("UPDATE password_reset_tokens SET used_at = NOW() WHERE id = $1")
        .bind(token_id)
        .execute(&state.db)
        .await
        .ok();

    if let Err(e) =
        activities::log_activity(&state.db, user_id, "password_reset", "Password was reset").await
    {
        tracing::warn!("could not log activity: {}", e);
    }

    tracing::info!("password reset successful for user {}", user_id);

    Ok(Json(MessageResponse {
        message: "Password has been reset successfully.".into(),
    }))
}
