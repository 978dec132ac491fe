mod backoff;
mod connector_ws;
mod error;
mod port;
mod registry;
mod session;

pub use backoff::*;
pub use connector_ws::*;
pub use error::*;
pub use port::*;
pub use registry::*;
pub use session::*;
