pub mod matches;
pub mod season;
pub mod subscriptions;

pub use matches::{CreateMatchRequest, MatchService, PollingConfig};
pub use subscriptions::{CreateSubscriptionRequest, DeleteSubscriptionRequest, SubscriptionService};
