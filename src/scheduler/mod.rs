//! Match result acquisition: periodic fixture polling and the hand-off of its
//! single outcome to storage.

pub mod handoff;
pub mod poller;
pub mod registry;

pub use handoff::ResultHandoff;
pub use poller::{FixturePoller, PollOutcome};
pub use registry::{RegistryError, TaskKey, TaskRegistry};
