mod auth;
mod connection;
mod love_spark;
mod message;
mod notification;
mod presence;
pub mod routes;
mod user;

pub use auth::*;
pub use connection::*;
pub use love_spark::*;
pub use message::*;
pub use notification::*;
pub use presence::*;
pub use user::*;

use serde::Deserialize;

/// Acknowledgement returned by endpoints without a payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SuccessResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}
