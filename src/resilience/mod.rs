//! Resilience helpers.
//!
//! # Design Decisions
//! - Reloads are never retried automatically; a failed reload leaves the
//!   previous configuration in force until the next file change
//! - Only the change-notification subscription is retried, with jittered
//!   exponential backoff and a bounded number of attempts

pub mod backoff;

pub use backoff::Backoff;
