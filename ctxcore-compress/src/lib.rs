//! Message Compressor (§4.4) and Token Governor (§4.8).

mod budget;
mod compressor;
mod governor;
mod middle_omit;
mod role_pass;
mod safe_truncate;
mod stage0;

pub use budget::*;
pub use compressor::*;
pub use governor::*;
pub use middle_omit::*;
pub use role_pass::*;
pub use safe_truncate::*;
pub use stage0::*;
