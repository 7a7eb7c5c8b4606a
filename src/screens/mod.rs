//! Screen state behind the tool surface
//!
//! Each screen owns what it acquired on entry and gives it back on exit.
//! Failures end up as text in the screen's labels, never as panics.

pub mod datastore;
pub mod networking;
pub mod notifications;
pub mod sensors;

pub use networking::NetworkingScreen;
pub use sensors::SensorsScreen;

/// Placeholder shown for values that are not set yet
pub const UNSET: &str = "null";
