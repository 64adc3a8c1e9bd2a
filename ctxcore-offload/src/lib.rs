//! ContextCore - Content Offloader
//!
//! Policy layer above the artifact store: decides when content is too big
//! to keep in-band, writes it out, and hands back a pointer. `expand`
//! undoes that for callers that need the real content back.

mod expand;
mod offloader;

pub use expand::*;
pub use offloader::*;
