//! The `/configs/{*path}` handler.
//!
//! # Data Flow
//! ```text
//! authorized request (auth.rs)
//!     → normalised endpoint exists?           404 not-found
//!     → resolve environment (blocking pool)   500 env-*-error
//!     → method in request.methods?            405 method-not-allowed
//!     → POST: parse + validate body           400 bad-request / request-body-invalid
//!     → render template or serve file         500 template-rendering-error
//!     → response.status + response.headers
//!     → audit config-loaded / secrets-loaded
//! ```

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Extension, Path, State},
    http::{HeaderName, HeaderValue, Method, Request, StatusCode},
    response::Response,
};
use serde_json::Value as Json;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::environment::{
    compile_schema, endpoint_exists, normalize_endpoint, EnvError, ResolvedEnvironment,
};
use crate::http::auth::AuthenticatedUser;
use crate::http::error::ApiError;
use crate::http::request::ClientIp;
use crate::http::server::ServerContext;
use crate::observability::{metrics, AuditEvent, AuditEventType};

pub async fn serve_config(
    State(ctx): State<Arc<ServerContext>>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(path): Path<String>,
    method: Method,
    body: Bytes,
) -> Result<Response, ApiError> {
    // `path` is percent-decoded; every later step uses the normalised form.
    let path = normalize_endpoint(&path).ok_or(ApiError::NotFound)?;
    if !endpoint_exists(ctx.config_dir(), &path) {
        return Err(ApiError::NotFound);
    }
    let request_path = format!("/configs/{path}");

    let (environment, secrets) = resolve_environment(&ctx, &path).await?;
    if !environment.allows_method(method.as_str()) {
        return Err(ApiError::MethodNotAllowed);
    }

    let ResolvedEnvironment {
        request,
        template,
        response: response_section,
    } = environment;

    let mut context = template.context;
    if method == Method::POST {
        let payload: Json =
            serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;
        if !request.schema.is_empty() {
            validate_body(&ctx, &path, Json::Object(request.schema), &payload)?;
        }
        match payload {
            Json::Object(fields) => context.extend(fields),
            other => {
                return Err(ApiError::BadRequest(format!(
                    "expected a JSON object, got {other}"
                )))
            }
        }
    }

    let mut response = if template.enabled {
        let renderer = ctx.renderer().clone();
        let name = path.clone();
        let options = template.rendering_options;
        let text = tokio::task::spawn_blocking(move || {
            renderer.render(&name, &Json::Object(context), &options)
        })
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
        // Rendered output carries only the headers of the environment.
        Response::new(Body::from(text))
    } else {
        serve_file(ctx.config_dir().join(&path)).await
    };

    *response.status_mut() = StatusCode::from_u16(response_section.status)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    for (name, value) in &response_section.headers {
        let name = HeaderName::try_from(name.as_str())
            .map_err(|e| ApiError::Internal(format!("invalid header name {name}: {e}")))?;
        let value = HeaderValue::try_from(value.as_str())
            .map_err(|e| ApiError::Internal(format!("invalid value for header {name}: {e}")))?;
        response.headers_mut().insert(name, value);
    }

    AuditEvent::new(AuditEventType::ConfigLoaded, ip, &request_path)
        .with_user(user.as_str())
        .emit();
    if !secrets.is_empty() {
        metrics::record_secrets_served(secrets.len());
        AuditEvent::new(AuditEventType::SecretsLoaded, ip, &request_path)
            .with_user(user.as_str())
            .with_secrets(secrets)
            .emit();
    }

    Ok(response)
}

/// Resolves the environment on the blocking pool and strips its secrets.
async fn resolve_environment(
    ctx: &ServerContext,
    path: &str,
) -> Result<(ResolvedEnvironment, BTreeSet<String>), ApiError> {
    let resolver = ctx.resolver().clone();
    let endpoint = path.to_string();
    tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        let mut environment = resolver.resolve(&endpoint)?;
        let secrets = environment.serialize_secrets();
        let resolved = environment
            .into_resolved()
            .map_err(|reason| EnvError::Format {
                path: resolver.config_dir().join(&endpoint),
                reason,
            })?;
        Ok((resolved, secrets))
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?
}

fn validate_body(
    ctx: &ServerContext,
    path: &str,
    schema: Json,
    payload: &Json,
) -> Result<(), ApiError> {
    let validator = compile_schema(&schema).map_err(|reason| EnvError::Format {
        path: ctx.config_dir().join(path),
        reason,
    })?;
    let errors: Vec<String> = validator
        .iter_errors(payload)
        .map(|err| err.to_string())
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::RequestBodyInvalid(errors.join("; ")))
    }
}

/// Serves an endpoint that is not a template, content type guessed from
/// the file name.
async fn serve_file(file: PathBuf) -> Response {
    let response = ServeFile::new(file)
        .oneshot(Request::new(Body::empty()))
        .await
        .unwrap_or_else(|never| match never {});
    response.map(Body::new)
}
