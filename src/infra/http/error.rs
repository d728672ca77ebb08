use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use folio_api_types::{ApiErrorBody, ApiErrorMessage};

use crate::application::error::{AppError, ErrorReport};
use crate::application::repos::RepoError;
use crate::domain::error::DomainError;
use crate::infra::error::InfraError;

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const NOT_FOUND: &str = "not_found";
    pub const VALIDATION: &str = "validation_error";
    pub const HIERARCHY: &str = "invalid_hierarchy";
    pub const URI_CONFLICT: &str = "uri_conflict";
    pub const DUPLICATE: &str = "duplicate";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const REPO: &str = "repo_error";
    pub const INTERNAL: &str = "internal_error";
}

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

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

fn code_for(err: &AppError) -> &'static str {
    match err {
        AppError::Domain(DomainError::NotFound { .. })
        | AppError::Repo(RepoError::NotFound)
        | AppError::NotFound => codes::NOT_FOUND,
        AppError::Domain(DomainError::ParentCycle { .. })
        | AppError::Domain(DomainError::DepthExceeded { .. }) => codes::HIERARCHY,
        AppError::Domain(DomainError::Validation { .. })
        | AppError::Repo(RepoError::InvalidInput { .. })
        | AppError::Validation(_) => codes::VALIDATION,
        AppError::UriConflict { .. } => codes::URI_CONFLICT,
        AppError::Repo(RepoError::Duplicate { .. }) => codes::DUPLICATE,
        AppError::Repo(RepoError::Timeout) | AppError::Infra(InfraError::Database { .. }) => {
            codes::DB_TIMEOUT
        }
        AppError::Repo(_) => codes::REPO,
        AppError::Infra(_)
        | AppError::Domain(DomainError::Invariant { .. })
        | AppError::Unexpected(_) => codes::INTERNAL,
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let status = err.status_code();
        // Client errors carry their own message as a hint; server errors stay opaque.
        let hint = status.is_client_error().then(|| err.to_string());
        Self {
            status,
            code: code_for(&err),
            message: err.presentation_message(),
            hint,
            report: Some(ErrorReport::from_error("infra::http", status, &err)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = self.report.unwrap_or_else(|| {
            ErrorReport::from_message(
                "infra::http",
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_expose_hint() {
        let err = ApiError::from(AppError::validation("title must not be empty"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), codes::VALIDATION);
        assert_eq!(
            err.hint.as_deref(),
            Some("validation failed: title must not be empty")
        );
    }

    #[test]
    fn server_errors_hide_details() {
        let err = ApiError::from(AppError::from(RepoError::from_persistence("disk on fire")));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), codes::REPO);
        assert!(err.hint.is_none());

        let response = err.into_response();
        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert_eq!(report.messages[0], "persistence error: disk on fire");
    }
}
