use anyhow::Result;
use async_trait::async_trait;

use super::models::{FixtureResult, FixtureSearch};

/// Read-only source of fixtures. Implemented by the HTTP client and by test fakes.
#[async_trait]
pub trait FixtureProvider: Send + Sync {
    /// Search fixtures matching the given parameters.
    async fn search_fixtures(&self, search: &FixtureSearch) -> Result<Vec<FixtureResult>>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
