//! ContextCore - LLM Transport
//!
//! Defines the transport boundary the run orchestrator calls through
//! (§6 "LLM transport (consumed)") along with the retry/backoff and
//! circuit-breaker logic that wraps it (§4.9 step 8). No concrete
//! provider wire format lives here.

mod circuit_breaker;
mod mock;
mod retry;
mod transport;

pub use circuit_breaker::*;
pub use mock::*;
pub use retry::*;
pub use transport::*;
