mod client;
mod envelope;
mod error;
mod port;
mod transport_reqwest;

pub use client::*;
pub use envelope::*;
pub use error::*;
pub use port::*;
pub use transport_reqwest::*;
