use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;
use derive_more::{Deref, Display, From};

use crate::handler::{Error, ErrorKind};
use crate::service::features::{FeatureFlag, FeatureStore};

/// Identifier of the caller, inserted by an upstream authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deref, Display, From)]
pub struct AuthenticatedUser(String);

impl AuthenticatedUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> OptionalFromRequestParts<S> for AuthenticatedUser
where
    S: Sync + Send,
{
    type Rejection = Error<'static>;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned())
    }
}

/// Feature flag view bound to the current caller.
///
/// Inserted into every request by
/// [`attach_features`](crate::middleware::attach_features).
#[derive(Debug, Clone)]
#[must_use]
pub struct FeatureContext {
    store: FeatureStore,
    user_id: Option<String>,
}

impl FeatureContext {
    pub fn new(store: FeatureStore, user_id: Option<String>) -> Self {
        Self { store, user_id }
    }

    /// Returns the caller's identifier, if any.
    #[inline]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Decides whether `name` is on for the caller.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.store.is_enabled(name, self.user_id())
    }

    /// Returns every flag, sorted by name.
    pub fn get_all(&self) -> Vec<FeatureFlag> {
        self.store.get_all()
    }

    /// Returns the names of every flag on for the caller.
    pub fn enabled(&self) -> Vec<String> {
        self.store.enabled_names(self.user_id())
    }
}

impl<S> FromRequestParts<S> for FeatureContext
where
    S: Sync + Send,
{
    type Rejection = Error<'static>;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or_else(|| {
            ErrorKind::InternalServerError
                .with_message("Feature flags are not available for this route")
                .with_context("feature context missing from request extensions")
        })
    }
}
