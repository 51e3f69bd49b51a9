//! Social provider routes of the login handoff.
//!
//! Browser-facing routes answer with 307 redirects and send failures to the
//! error page; launcher-facing routes answer with a JSON status.

use axum::{
    extract::{Path, Query, State},
    response::{Json, Redirect},
};
use handoff_core::{NormalizedProfile, ProviderInfo, StatusReport};
use std::sync::Arc;

use crate::api::helpers::{CallbackQuery, ChallengeQuery, ForwardQuery, TokenQuery};
use crate::error::{ApiError, RedirectError};
use crate::request_context::{RequestContext, RequestDomain};
use crate::state::AppState;

/// List the social providers of the challenge's application
pub async fn list_providers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChallengeQuery>,
) -> Result<Json<Vec<ProviderInfo>>, ApiError> {
    let providers = state.controller.providers(query.challenge()?).await?;
    Ok(Json(providers))
}

/// Send the browser to the provider's authorization page
pub async fn forward(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<ForwardQuery>,
    RequestDomain(domain): RequestDomain,
) -> Result<Redirect, RedirectError> {
    let url = state
        .controller
        .forward(&query.login_challenge, &name, &domain, query.is_launcher())
        .await?;

    Ok(Redirect::temporary(&url))
}

/// Provider redirect back after the user authorized us
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<CallbackQuery>,
    RequestDomain(domain): RequestDomain,
    RequestContext(context): RequestContext,
) -> Result<Redirect, RedirectError> {
    let url = state
        .controller
        .callback(
            &query.state,
            &name,
            query.code.as_deref(),
            query.error.as_deref(),
            &domain,
            &context,
        )
        .await?;

    Ok(Redirect::temporary(&url))
}

/// User confirmed the launcher login in the browser
pub async fn confirm(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChallengeQuery>,
    RequestContext(context): RequestContext,
) -> Result<Json<StatusReport>, ApiError> {
    let report = state
        .controller
        .confirm(query.challenge()?, &context)
        .await?;
    Ok(Json(report))
}

/// Launcher poll
pub async fn check(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<ChallengeQuery>,
) -> Result<Json<StatusReport>, ApiError> {
    let report = state
        .controller
        .check(query.challenge()?, &name)
        .await?;
    Ok(Json(report))
}

pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChallengeQuery>,
) -> Result<Json<StatusReport>, ApiError> {
    let report = state.controller.cancel(query.challenge()?).await?;
    Ok(Json(report))
}

/// Launcher follows the success URL here to finish the login
pub async fn complete_auth(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChallengeQuery>,
    RequestContext(context): RequestContext,
) -> Result<Redirect, RedirectError> {
    let url = state
        .controller
        .complete_auth(query.challenge()?, &context)
        .await?;

    Ok(Redirect::temporary(&url))
}

/// Profile behind a link token, without credential material
pub async fn profile(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<NormalizedProfile>, ApiError> {
    if query.token.is_empty() {
        return Err(ApiError::InvalidRequest("missing token".to_string()));
    }

    let profile = state.controller.profile(&query.token).await?;
    Ok(Json(profile))
}
