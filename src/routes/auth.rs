use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use crate::errors::AppError;

/// Owner id resolved from the request's bearer credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerId(pub String);

/// Maps a bearer token to the owner it authenticates.
#[async_trait]
pub trait OwnerResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Option<OwnerId>;
}

/// Fixed token table, loaded from `AUTH_TOKENS`.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenResolver {
    tokens: HashMap<String, String>,
}

impl StaticTokenResolver {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl OwnerResolver for StaticTokenResolver {
    async fn resolve(&self, token: &str) -> Option<OwnerId> {
        self.tokens.get(token).cloned().map(OwnerId)
    }
}

/// Rejects requests without a known bearer token and stores the resolved
/// [`OwnerId`] in the request extensions.
pub async fn require_owner(
    State(resolver): State<Arc<dyn OwnerResolver>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    let owner = resolver.resolve(token).await.ok_or_else(|| {
        debug!("Rejected unknown bearer token");
        AppError::Unauthorized
    })?;

    req.extensions_mut().insert(owner);
    Ok(next.run(req).await)
}
