//! API-key authentication extractor
//!
//! Handlers take an `AuthOrg` argument to require a valid `X-API-Key`
//! header. The key must match an active organization exactly; a missing
//! header is 401, as is an unknown or deactivated key.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chatdock_common::db::models::Organization;
use chatdock_common::db::Repository;
use chatdock_common::errors::AppError;

use crate::AppState;

/// The authenticated organization for a request
#[derive(Clone, Debug)]
pub struct AuthOrg(pub Organization);

impl FromRequestParts<AppState> for AuthOrg {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_name = state.config.auth.api_key_header.as_str();

        let api_key = parts
            .headers
            .get(header_name)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthenticated)?;

        let repo = Repository::new(state.db.clone());
        let organization = repo.authenticate_by_api_key(api_key).await?;

        Ok(AuthOrg(organization))
    }
}
