#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::uninlined_format_args)]
// Token counts cast to f32 in classifier scoring
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod gateway;
pub mod memory;
pub(crate) mod utils;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Display name the bot answers to until a user renames it.
pub const DEFAULT_BOT_NAME: &str = "Wicked";
