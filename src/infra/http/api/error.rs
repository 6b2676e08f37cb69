use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use likefeed_api_types::{ApiErrorBody, ApiErrorMessage};

use crate::application::error::{AppError, ErrorReport};
use crate::application::repos::RepoError;
use crate::cache::{CacheError, ToggleError};
use crate::domain::error::DomainError;
use crate::infra::error::InfraError;

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const UNAUTHENTICATED: &str = "unauthenticated";
    pub const PERMISSION_DENIED: &str = "permission_denied";
    pub const NOT_FOUND: &str = "not_found";
    pub const TEMPORARILY_UNAVAILABLE: &str = "temporarily_unavailable";
    pub const INTERNAL: &str = "internal";
}

const SOURCE: &str = "infra::http::api";

/// The toggle may have landed even though the caller saw a failure.
const TOGGLE_UNCERTAIN_HINT: &str = "like toggle was interrupted; reload the post before retrying";

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    report: Option<ErrorReport>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
            report: None,
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn unauthenticated() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHENTICATED,
            "Viewer identity required",
            Some("send the caller id in the `user-id` header".to_string()),
        )
    }

    pub fn permission_denied(hint: impl Into<String>) -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            codes::PERMISSION_DENIED,
            "Permission denied",
            Some(hint.into()),
        )
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn unavailable(hint: Option<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::TEMPORARILY_UNAVAILABLE,
            "Service temporarily unavailable",
            hint,
        )
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::INTERNAL,
            "Internal server error",
            None,
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    fn with_report(mut self, error: &AppError) -> Self {
        self.report = Some(ErrorReport::from_error(SOURCE, self.status, error));
        self
    }
}

fn repo_to_api(err: &RepoError) -> ApiError {
    match err {
        RepoError::NotFound => ApiError::not_found("Resource not found"),
        RepoError::Duplicate { constraint } => {
            ApiError::bad_request("Duplicate record", Some(constraint.clone()))
        }
        RepoError::InvalidInput { message } => {
            ApiError::bad_request("Invalid input", Some(message.clone()))
        }
        RepoError::Timeout => ApiError::unavailable(Some("database timeout".to_string())),
        RepoError::Persistence(_) => ApiError::internal(),
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let api = match &err {
            AppError::Domain(DomainError::NotFound { entity }) => ApiError::new(
                StatusCode::NOT_FOUND,
                codes::NOT_FOUND,
                "Resource not found",
                Some(format!("{entity} not found")),
            ),
            AppError::Domain(DomainError::Validation { message }) => {
                ApiError::bad_request("Request could not be processed", Some(message.clone()))
            }
            AppError::Domain(DomainError::Permission { message }) => {
                ApiError::permission_denied(message.clone())
            }
            AppError::Repo(repo) => repo_to_api(repo),
            AppError::Cache(cache) if cache.is_retryable() => ApiError::unavailable(None),
            AppError::Cache(_) => ApiError::internal(),
            AppError::Toggle(
                ToggleError::Partial { .. }
                | ToggleError::Cache(CacheError::Timeout {
                    op: "toggle_flag", ..
                }),
            ) => ApiError::unavailable(Some(TOGGLE_UNCERTAIN_HINT.to_string())),
            AppError::Toggle(toggle)
                if toggle
                    .cache_error()
                    .is_some_and(|cache| cache.is_retryable()) =>
            {
                ApiError::unavailable(None)
            }
            AppError::Toggle(_) => ApiError::internal(),
            AppError::Infra(InfraError::Database { .. }) => ApiError::unavailable(None),
            AppError::Infra(_) | AppError::Unexpected(_) => ApiError::internal(),
        };
        api.with_report(&err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = self.report.unwrap_or_else(|| {
            ErrorReport::from_message(
                SOURCE,
                self.status,
                format!(
                    "{}: {}",
                    self.code,
                    self.hint.as_deref().unwrap_or(self.message)
                ),
            )
        });
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        report.attach(&mut response);
        response
    }
}
