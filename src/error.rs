//! Request-level failures and their HTTP rendering.

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::users::repo::StoreError;

/// Per-field validation messages, keyed by input field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn has(&self, field: &str) -> bool {
        !self.get(field).is_empty()
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Unauthenticated(String),
    #[error("This action is unauthorized.")]
    Forbidden,
    #[error("Not found.")]
    NotFound,
    #[error("The given data was invalid.")]
    Validation(FieldErrors),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => {
                let mut errors = FieldErrors::default();
                errors.add("email", "The email has already been taken.");
                Self::Validation(errors)
            }
            StoreError::Database(e) => Self::Internal(e.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, json!({ "message": msg })),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                json!({ "message": self.to_string() }),
            ),
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                json!({ "message": self.to_string() }),
            ),
            Self::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "message": self.to_string(), "errors": errors }),
            ),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "message": msg })),
            Self::Internal(e) => {
                error!(error = ?e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": "Server Error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
