pub mod client;
pub mod sweep;

pub use client::WebhookClient;
pub use sweep::{start_notifier, NotifierService};
