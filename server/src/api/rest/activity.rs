//! Activity log and issue reporting routes

use crate::api::AppState;
use crate::db::activities;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::error::{extract_user_id, AppError};

// ============================================================================
// ROUTES
// ============================================================================

pub fn activity_routes() -> Router<AppState> {
    Router::new()
        .route("/api/user/activities", get(list_activities))
        .route("/api/report-issue", post(report_issue))
}

// ============================================================================
// TYPES
// ============================================================================

#[derive(Serialize)]
struct ActivityResponse {
    timestamp: String,
    action: String,
    description: String,
}

#[derive(Serialize)]
struct ActivityListResponse {
    activities: Vec<ActivityResponse>,
}

#[derive(Deserialize)]
struct ReportIssueRequest {
    subject: String,
    description: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

// ============================================================================
// HANDLERS
// ============================================================================

async fn list_activities(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Result<Json<ActivityListResponse>, AppError> {
    let user_id = extract_user_id(&state, &headers)?;

    let entries = activities::list_activities(&state.db, user_id).await?;
    let activities = entries
        .into_iter()
        .map(|a| ActivityResponse {
            timestamp: a.created_at.to_rfc3339(),
            action: a.action,
            description: a.description,
        })
        .collect();

    Ok(Json(ActivityListResponse { activities }))
}

/// Forward a user-filed issue report to the operator's mailbox.
async fn report_issue(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Json(req): Json<ReportIssueRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let user_id = extract_user_id(&state, &headers)?;

    let subject = req.subject.trim();
    let description = req.description.trim();
    if subject.is_empty() || description.is_empty() {
        return Err(AppError::BadRequest(
            "Please fill in both subject and description.".into(),
        ));
    }

    match (&state.mailer, &state.config.admin_email) {
        (Some(mailer), Some(admin)) => {
            let text = format!("Issue report from user {}:\n\n{}", user_id, description);
            let html = format!(
                "<p>Issue report from user {}:</p><p>{}</p>",
                user_id, description
            );
            let mail_subject = format!("[{}] {}", state.config.server_name, subject);
            if let Err(e) = mailer.send(admin, &mail_subject, &text, &html).await {
                tracing::error!("could not forward issue report: {}", e);
                return Err(AppError::Internal("Could not deliver the report".into()));
            }
        }
        _ => {
            // Without mail, the report still lands in the server log.
            tracing::warn!(
                "issue report from user {}: {} - {}",
                user_id,
                subject,
                description
            );
        }
    }

    if let Err(e) = activities::log_activity(
        &state.db,
        user_id,
        "report_issue",
        &format!("Reported issue \"{}\"", subject),
    )
    .await
    {
        tracing::warn!("could not log activity: {}", e);
    }

    Ok(Json(MessageResponse {
        message: "Issue reported. Thank you!".into(),
    }))
}
