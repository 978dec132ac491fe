//! Settings are read from a TOML file (see `settings/dev.toml`) and may be
//! overridden key by key through `SOULLINK__SECTION__KEY` environment variables.
//! See `bin/settings_demo.rs` for a binary that loads and prints them.

mod cli;
pub use clap::{Parser, Subcommand};
pub use cli::*;

mod settings;
pub use settings::*;
