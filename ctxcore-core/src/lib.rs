//! ContextCore - Core Data Types
//!
//! Pure data structures with no I/O. All other crates depend on this one.
//! Mirrors the message/artifact/plan data model of the agent context
//! management core: messages carry pointer references instead of raw
//! payloads once offloaded, artifacts live in a scope-partitioned store,
//! and a `ContextPlan` is the unit of output from the planner.

mod config;
mod error;
mod message;
mod plan;
mod scope;
mod store_model;
mod tokens;

pub use config::*;
pub use error::*;
pub use message::*;
pub use plan::*;
pub use scope::*;
pub use store_model::*;
pub use tokens::*;
