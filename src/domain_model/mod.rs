mod event;
mod id;
mod message;
mod presence;
mod token;
mod user;

pub use event::*;
pub use id::*;
pub use message::*;
pub use presence::*;
pub use token::*;
pub use user::*;
