use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::filter::FileRecord;

/// Hung requests must not pin the client in a loading state forever.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{0}")]
    Auth(String),
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("{0}")]
    Validation(String),
}

pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

// --- Auth types ---

#[derive(Debug, Serialize)]
struct RegisterRequest {
    username: String,
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginRequest {
    username: String,
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
struct ForgotPasswordRequest {
    email: String,
}

#[derive(Debug, Serialize)]
struct ResetPasswordRequest {
    password: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    message: String,
}

#[derive(Debug, Deserialize)]
pub struct Profile {
    pub username: String,
    pub email: String,
}

// --- File types ---

#[derive(Debug, Deserialize)]
struct FileListResponse {
    files: Vec<FileRecord>,
}

#[derive(Debug, Deserialize)]
struct StorageUsageResponse {
    total_storage_used: u64,
}

// --- Activity types ---

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct ActivityListResponse {
    activities: Vec<ActivityEntry>,
}

#[derive(Debug, Serialize)]
struct ReportIssueRequest {
    subject: String,
    description: String,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, ApiError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?,
        })
    }

    fn bearer(&self, req: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, ApiError> {
        match &self.token {
            Some(token) => Ok(req.bearer_auth(token)),
            None => Err(ApiError::Auth("Not logged in. Run: stash login".into())),
        }
    }

    /// Check response status; on error, read the body for a detail message.
    /// A 401/403 anywhere becomes `ApiError::Auth` so the command layer can
    /// clear stored credentials.
    async fn ensure_ok(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = match resp.json::<MessageResponse>().await {
            Ok(body) => body.message,
            Err(_) => format!("request failed with status {}", status),
        };
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Auth(message));
        }
        Err(ApiError::Server {
            status: status.as_u16(),
            message,
        })
    }

    // --- Account ---

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<String, ApiError> {
        let resp = self
            .client
            .post(format!("{}/api/register", self.base_url))
            .json(&RegisterRequest {
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;
        let body: MessageResponse = Self::ensure_ok(resp).await?.json().await?;
        Ok(body.message)
    }

    pub async fn login(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<LoginResponse, ApiError> {
        let resp = self
            .client
            .post(format!("{}/api/login", self.base_url))
            .json(&LoginRequest {
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;
        Ok(Self::ensure_ok(resp).await?.json().await?)
    }

    pub async fn forgot_password(&self, email: &str) -> Result<String, ApiError> {
        let resp = self
            .client
            .post(format!("{}/api/forgotpassword", self.base_url))
            .json(&ForgotPasswordRequest {
                email: email.to_string(),
            })
            .send()
            .await?;
        let body: MessageResponse = Self::ensure_ok(resp).await?.json().await?;
        Ok(body.message)
    }

    pub async fn reset_password(&self, token: &str, password: &str) -> Result<String, ApiError> {
        let resp = self
            .client
            .post(format!("{}/api/resetpassword/{}", self.base_url, token))
            .json(&ResetPasswordRequest {
                password: password.to_string(),
            })
            .send()
            .await?;
        let body: MessageResponse = Self::ensure_ok(resp).await?.json().await?;
        Ok(body.message)
    }

    pub async fn profile(&self) -> Result<Profile, ApiError> {
        let req = self.client.get(format!("{}/api/profile", self.base_url));
        let resp = self.bearer(req)?.send().await?;
        Ok(Self::ensure_ok(resp).await?.json().await?)
    }

    // --- Files ---

    pub async fn list_files(&self) -> Result<Vec<FileRecord>, ApiError> {
        let req = self.client.get(format!("{}/api/user/files", self.base_url));
        let resp = self.bearer(req)?.send().await?;
        let list: FileListResponse = Self::ensure_ok(resp).await?.json().await?;
        Ok(list.files)
    }

    pub async fn upload_file(&self, path: &Path) -> Result<(), ApiError> {
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::Validation(format!("cannot read {}: {}", path.display(), e)))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| ApiError::Validation(format!("{} has no file name", path.display())))?;
        let mime = mime_guess::from_path(path).first_or_octet_stream();

        let part = reqwest::multipart::Part::bytes(content)
            .file_name(file_name)
            .mime_str(mime.as_ref())
            .map_err(ApiError::Network)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let req = self
            .client
            .post(format!("{}/api/upload", self.base_url))
            .multipart(form);
        let resp = self.bearer(req)?.send().await?;
        Self::ensure_ok(resp).await?;
        Ok(())
    }

    pub async fn restore(&self, id: &str) -> Result<Vec<u8>, ApiError> {
        let req = self
            .client
            .get(format!("{}/api/restore/{}", self.base_url, id));
        let resp = self.bearer(req)?.send().await?;
        Ok(Self::ensure_ok(resp).await?.bytes().await?.to_vec())
    }

    pub async fn delete_file(&self, id: &str) -> Result<String, ApiError> {
        let req = self
            .client
            .delete(format!("{}/api/delete/{}", self.base_url, id));
        let resp = self.bearer(req)?.send().await?;
        let body: MessageResponse = Self::ensure_ok(resp).await?.json().await?;
        Ok(body.message)
    }

    pub async fn storage_usage(&self) -> Result<u64, ApiError> {
        let req = self
            .client
            .get(format!("{}/api/user/storage-usage", self.base_url));
        let resp = self.bearer(req)?.send().await?;
        let usage: StorageUsageResponse = Self::ensure_ok(resp).await?.json().await?;
        Ok(usage.total_storage_used)
    }

    // --- Activity ---

    pub async fn activities(&self) -> Result<Vec<ActivityEntry>, ApiError> {
        let req = self
            .client
            .get(format!("{}/api/user/activities", self.base_url));
        let resp = self.bearer(req)?.send().await?;
        let list: ActivityListResponse = Self::ensure_ok(resp).await?.json().await?;
        Ok(list.activities)
    }

    pub async fn report_issue(&self, subject: &str, description: &str) -> Result<String, ApiError> {
        let req = self
            .client
            .post(format!("{}/api/report-issue", self.base_url))
            .json(&ReportIssueRequest {
                subject: subject.to_string(),
                description: description.to_string(),
            });
        let resp = self.bearer(req)?.send().await?;
        let body: MessageResponse = Self::ensure_ok(resp).await?.json().await?;
        Ok(body.message)
    }
}
