use super::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "soullink", about = "SoulLink client core")]
pub struct Cli {
    #[arg(long, global = true)]
    pub settings: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect the realtime session and log inbound events until Ctrl-C.
    Listen,
    /// Request a verification code for a phone number.
    Login {
        #[arg(long)]
        phone: String,
    },
    /// Verify a code and store the issued tokens.
    Verify {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        code: String,
    },
    /// Log out and clear stored tokens.
    Logout,
    /// Publish our own presence status.
    Presence {
        #[arg(long, default_value = "online")]
        status: String,
    },
}
