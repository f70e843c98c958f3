pub mod client;
pub mod models;
pub mod provider;

pub use client::FootballApiClient;
pub use models::{FixtureResult, FixtureSearch};
pub use provider::FixtureProvider;
