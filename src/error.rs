use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::types::{CandidateId, ErrorBody};

/// Result type for election service operations
pub type ElectionResult<T> = Result<T, ElectionError>;

/// Errors produced by the election service
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ElectionError {
    #[error("This voter has already voted in this election")]
    DuplicateVote,

    #[error("Unknown candidate: {0}")]
    UnknownCandidate(CandidateId),

    #[error("Invalid voter token: {0}")]
    InvalidToken(&'static str),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ElectionError {
    pub fn code(&self) -> &'static str {
        match self {
            ElectionError::DuplicateVote => "DUPLICATE_VOTE",
            ElectionError::UnknownCandidate(_) => "UNKNOWN_CANDIDATE",
            ElectionError::InvalidToken(_) => "INVALID_TOKEN",
            ElectionError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            ElectionError::InvalidSnapshot(_) => "INVALID_SNAPSHOT",
            ElectionError::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ElectionError::DuplicateVote => StatusCode::BAD_REQUEST,
            ElectionError::UnknownCandidate(_) => StatusCode::NOT_FOUND,
            ElectionError::InvalidToken(_) => StatusCode::UNPROCESSABLE_ENTITY,
            // Kept off 400, which clients read as "already voted"
            ElectionError::MalformedPayload(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ElectionError::InvalidSnapshot(_) => StatusCode::BAD_REQUEST,
            ElectionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ElectionError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code().to_string(),
            msg: self.to_string(),
        };

        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ElectionError::DuplicateVote.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ElectionError::UnknownCandidate("x".to_string()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ElectionError::InvalidToken("empty").status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_into_response_uses_status() {
        let response = ElectionError::DuplicateVote.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
