//! Request authentication and authorization layers.
//!
//! `authenticate` attaches an [`Identity`] to the request from its bearer
//! token; `authorize` asks the [`bastion_rbac::Authorizer`] whether that
//! identity may call the matched route. Both run as route layers so the
//! matched route template is available as the resource path.
use crate::api::error::{ApiError, api_authorize_error, api_forbidden, api_unauthorized};
use crate::app::AppState;
use crate::auth::token::extract_bearer;
use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use bastion_rbac::{Identity, ResourceDescriptor};

pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(request.headers()).ok_or_else(|| api_unauthorized("token is empty"))?;
    let identity = state.tokens.verify(token).map_err(|err| {
        tracing::debug!(error = %err, "bearer token rejected");
        api_unauthorized("invalid token")
    })?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Resource path for authorization: the route template when matched, else the raw path.
pub fn resource_for(request: &Request) -> ResourceDescriptor {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    ResourceDescriptor::new(path, request.method().as_str())
}

pub async fn authorize(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let resource = resource_for(&request);
    let identity = request.extensions().get::<Identity>().cloned();
    let verdict = state
        .authorizer
        .authorize(identity.as_ref(), &resource)
        .await
        .map_err(|err| api_authorize_error(&err))?;
    if !verdict.allowed {
        tracing::info!(
            role = identity.as_ref().map(|identity| identity.role.as_str()).unwrap_or_default(),
            path = %resource.path,
            method = %resource.method,
            "request denied"
        );
        return Err(api_forbidden("insufficient permissions"));
    }
    tracing::debug!(
        path = %resource.path,
        method = %resource.method,
        reason = verdict.reason.as_str(),
        "request allowed"
    );
    Ok(next.run(request).await)
}
