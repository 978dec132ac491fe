//! The `logger` module is a thin wrapper over `tracing-subscriber`.
//! See `bin/logger_demo.rs` for a binary demonstrating a filter reload.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
