//! Persisted snapshot of the in-progress online session.
//!
//! Exactly one snapshot exists per installation. It is the only source of truth
//! for "is a session currently open", which is what lets the next process
//! detect and reconcile a session whose owner was killed.

mod store;
mod types;

pub use store::StateStore;
pub use types::SessionState;
