//! Context Planner (§4.5) and Retrieval Renderer (§4.6).

mod planner;
mod renderer;

pub use planner::*;
pub use renderer::*;
