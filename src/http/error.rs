//! JSON error responses.
//!
//! Every failed request is answered with
//! `{"error": {"id": "<error id>", "message": "<message>"}}`. Server-side
//! failures are logged with their cause; the client only sees the fixed
//! message for the id.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::environment::EnvError;
use crate::templates::TemplateRenderError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request body is not valid JSON: {0}")]
    BadRequest(String),

    #[error("request body does not match the schema: {0}")]
    RequestBodyInvalid(String),

    #[error("invalid authentication credentials")]
    Unauthenticated,

    #[error("client address is not whitelisted for the user")]
    UnauthorizedIp,

    #[error("user may not access the path")]
    UnauthorizedPath,

    #[error("too many failed authentication attempts")]
    RateLimited,

    #[error("endpoint not found")]
    NotFound,

    #[error("method not allowed for the endpoint")]
    MethodNotAllowed,

    #[error(transparent)]
    Environment(#[from] EnvError),

    #[error(transparent)]
    Template(#[from] TemplateRenderError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn id(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad-request",
            ApiError::RequestBodyInvalid(_) => "request-body-invalid",
            ApiError::Unauthenticated => "unauthenticated",
            ApiError::UnauthorizedIp => "unauthorized-ip",
            ApiError::UnauthorizedPath => "unauthorized-path",
            ApiError::RateLimited => "auth-rate-limited",
            ApiError::NotFound => "not-found",
            ApiError::MethodNotAllowed => "method-not-allowed",
            ApiError::Environment(err) => err.id(),
            ApiError::Template(_) => "template-rendering-error",
            ApiError::Internal(_) => "internal-server-error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::RequestBodyInvalid(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::UnauthorizedIp | ApiError::UnauthorizedPath => StatusCode::FORBIDDEN,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Environment(_) | ApiError::Template(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The message shown to clients.
    pub fn message(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => {
                "Your request is invalid. For POST requests, check if the request body contains valid JSON"
            }
            ApiError::RequestBodyInvalid(_) => "Your request body doesn't match the configured schema",
            ApiError::Unauthenticated => "Invalid authentication credentials provided",
            ApiError::UnauthorizedIp => "You are not authorized to access the server from this IP",
            ApiError::UnauthorizedPath => "You are not authorized to access this path on the server",
            ApiError::RateLimited => {
                "Rate limited because of too many false auth attempts from this ip"
            }
            ApiError::NotFound => {
                "The requested URL was not found on the server. If you entered the URL manually please check your spelling and try again."
            }
            ApiError::MethodNotAllowed => "The HTTP request method cannot be used on this endpoint",
            ApiError::Environment(EnvError::Syntax { .. }) => {
                "The YAML syntax in an env file could not be parsed"
            }
            ApiError::Environment(EnvError::Format { .. }) => {
                "An env file was provided in an invalid format"
            }
            ApiError::Environment(EnvError::Reference { .. }) => {
                "A reference in an env file could not be resolved"
            }
            ApiError::Template(_) => "An error occured while trying to render the template",
            ApiError::Internal(_) => "An internal server error occured",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    id: &'static str,
    message: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(id = self.id(), error = %self, "Request failed");
        } else {
            tracing::debug!(id = self.id(), error = %self, "Request rejected");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                id: self.id(),
                message: self.message(),
            },
        };
        (status, Json(body)).into_response()
    }
}
