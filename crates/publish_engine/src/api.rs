//! Mapping of service calls to status codes and JSON bodies. Route wiring is
//! left to the embedding server.
use publish_core::{JobId, Session};
use serde::Serialize;
use serde_json::{json, Value};

use crate::orchestrator::PublishError;
use crate::service::{PublicationService, PublishQuery, PublishRequest};

pub const JOB_NOT_FOUND: &str = "Error: job not found.";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(#[from] serde_json::Error),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error("{0}")]
    NotFound(String),
}

impl ApiError {
    pub fn http_status(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Publish(err) => err.http_status(),
            ApiError::NotFound(_) => 404,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: impl Serialize) -> Self {
        match serde_json::to_value(body) {
            Ok(body) => Self { status: 200, body },
            Err(err) => Self::error(500, err.to_string()),
        }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "message": message.into() }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl From<ApiError> for ApiResponse {
    fn from(err: ApiError) -> Self {
        ApiResponse::error(err.http_status(), err.to_string())
    }
}

/// `GET status?jobId=<id>`
pub fn job_status(service: &PublicationService, job_id: &str) -> ApiResponse {
    match service.job_status(&JobId::from(job_id)) {
        Some(job) => ApiResponse::ok(job),
        None => ApiError::NotFound(JOB_NOT_FOUND.to_string()).into(),
    }
}

/// `POST publish?websiteId&storageId&hostingId` with a JSON body
/// `{ files, publication, assets }`.
pub async fn publish(
    service: &PublicationService,
    session: &Session,
    query: &PublishQuery,
    body: &str,
) -> ApiResponse {
    match try_publish(service, session, query, body).await {
        Ok(response) => response,
        Err(err) => err.into(),
    }
}

async fn try_publish(
    service: &PublicationService,
    session: &Session,
    query: &PublishQuery,
    body: &str,
) -> Result<ApiResponse, ApiError> {
    let request: PublishRequest = serde_json::from_str(body)?;
    let response = service.publish(session, query, request).await?;
    Ok(ApiResponse::ok(response))
}
