//! ContextCore - Run Orchestrator
//!
//! Wires the store, offloader, compressor, context planner/renderer, and
//! cache planner into the single per-turn pipeline (§4.9), plus the
//! external interfaces and tool surfaces the orchestrator depends on (§6).

mod interfaces;
mod kv_tools;
mod memory_fetch;
mod prefetch;
mod turn;

pub use interfaces::*;
pub use kv_tools::*;
pub use memory_fetch::*;
pub use prefetch::*;
pub use turn::*;
