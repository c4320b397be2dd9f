//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Outgoing response:
//!     → headers.rs (nosniff, frame denial, referrer policy)
//!     → cors.rs (origin checks, exposed renewal header)
//! ```
//!
//! # Design Decisions
//! - Both are tower-http layers applied once around the whole router
//! - Authentication lives in `crate::auth`, not here

pub mod cors;
pub mod headers;

pub use cors::cors_layer;
