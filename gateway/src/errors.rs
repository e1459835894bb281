use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use compliance_ledger::Error as LedgerError;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("invalid input")]
    Validation(Vec<String>),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors
                    .iter()
                    .map(move |error| format!("{}: {}", field, error.code))
            })
            .collect();
        ApiError::Validation(messages)
    }
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::Ledger(LedgerError::Validation(_)) => "VALIDATION_ERROR",
            ApiError::Ledger(LedgerError::Conflict(_)) => "CONFLICT",
            ApiError::Ledger(LedgerError::NotFound(_)) => "NOT_FOUND",
            ApiError::Ledger(_) => "ERROR",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Internal(_) => "ERROR",
        }
    }

    fn message(&self) -> String {
        match self {
            // Surface the business-rule message, not the variant prefix
            ApiError::Ledger(LedgerError::Validation(message))
            | ApiError::Ledger(LedgerError::Conflict(message))
            | ApiError::Ledger(LedgerError::NotFound(message)) => message.clone(),
            ApiError::Validation(_) => "invalid input".to_string(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Ledger(LedgerError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Ledger(LedgerError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Ledger(LedgerError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = json!({
            "code": self.code(),
            "message": self.message(),
        });

        if let ApiError::Validation(errors) = self {
            body["errors"] = json!(errors);
        }

        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(LedgerError::validation("bad")).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(LedgerError::conflict("no")).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(LedgerError::not_found("gone")).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(LedgerError::Storage("disk".to_string())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_conflict_message_is_surfaced_verbatim() {
        let error = ApiError::from(LedgerError::conflict("cannot bank negative balance"));
        assert_eq!(error.code(), "CONFLICT");
        assert_eq!(error.message(), "cannot bank negative balance");
    }
}
