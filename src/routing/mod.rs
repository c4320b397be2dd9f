//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route declaration (builder API, or TOML/JSON + registry.rs)
//!     → tree.rs (RouteGroup / RouteLeaf)
//!     → compiler.rs (depth-first walk, path join, duplicate check)
//!     → Vec<CompiledBinding>
//!     → router.rs (register on axum, one dispatcher per binding)
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Literal segments only; placeholders are opaque and matched by axum
//! - Deterministic: same tree always yields the same bindings in the same order
//! - A duplicate (method, path) pair fails startup

pub mod compiler;
pub mod registry;
pub mod router;
pub mod tree;

pub use compiler::{compile, normalize_path, CompiledBinding};
pub use registry::Registry;
pub use router::into_router;
pub use tree::{HttpMethod, RouteGroup, RouteLeaf, RouteNode};
