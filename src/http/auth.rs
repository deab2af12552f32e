//! Access control middleware.
//! Authenticates the bearer token and authorizes client IP and path.
//! Path patterns see the percent-decoded request path.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::PathRejection, ConnectInfo, Path, State},
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::error::ApiError;
use crate::http::request::{client_ip, ClientIp};
use crate::http::server::ServerContext;
use crate::observability::metrics;
use crate::security::{bearer_token, AuthDecision};

/// Id of the user an authorized request belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

pub async fn access_control_middleware(
    State(ctx): State<Arc<ServerContext>>,
    endpoint: Result<Path<String>, PathRejection>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(peer) = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
    else {
        return ApiError::Internal("peer address unavailable".into()).into_response();
    };

    let ip = client_ip(req.headers(), peer, ctx.config().server.reverse_proxy_count);
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(bearer_token);
    let path = match endpoint {
        Ok(Path(endpoint)) => format!("/configs/{endpoint}"),
        Err(rejection) => {
            tracing::debug!(%rejection, "Undecodable request path, matching it raw");
            req.uri().path().to_string()
        }
    };

    let decision = ctx.access().authorize(token, ip, &path);
    metrics::record_auth_decision(decision.outcome());
    if let Some(event) = decision.audit_event(ip, &path) {
        event.emit();
    }

    let error = match decision {
        AuthDecision::Allowed { user } => {
            tracing::debug!(%ip, %user, path = %path, "Request authorized");
            req.extensions_mut().insert(ClientIp(ip));
            req.extensions_mut().insert(AuthenticatedUser(user));
            return next.run(req).await;
        }
        AuthDecision::RateLimited => ApiError::RateLimited,
        AuthDecision::Unauthenticated | AuthDecision::UnauthorizedIp { user: None } => {
            ApiError::Unauthenticated
        }
        AuthDecision::UnauthorizedIp { .. } => ApiError::UnauthorizedIp,
        AuthDecision::UnauthorizedPath { .. } => ApiError::UnauthorizedPath,
    };
    error.into_response()
}
