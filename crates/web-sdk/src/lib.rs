//! Remote analytics plumbing for the quiz funnel: step tracking beacons,
//! funnel statistics and the admin reset.
//!
//! # Modules
//!
//! - [`events`] — Wire types for the tracking and reset endpoints
//! - [`tracker`] — Event sink posting `StepEntered` events in the background
//! - [`stats`] — Statistics client, also a `StatsSource` for the dashboard
//! - [`reset`] — Session clear plus remote purge

pub mod events;
pub mod reset;
pub mod stats;
pub mod tracker;

pub use events::{ResetRequest, TrackPayload};
pub use reset::ResetClient;
pub use stats::StatsClient;
pub use tracker::StepTracker;
