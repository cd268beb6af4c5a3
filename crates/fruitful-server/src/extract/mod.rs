//! Request extractors.
//!
//! - [`FeatureContext`] - feature flags bound to the current caller
//! - [`AuthenticatedUser`] - caller identity set by an upstream layer

mod feature_context;

pub use crate::extract::feature_context::{AuthenticatedUser, FeatureContext};
