//! appctl library
//!
//! Asset pipeline and server supervision behind the `appctl` binary.

pub mod assets;
pub mod cli;
pub mod config;
pub mod error;
pub mod logs;
pub mod process;
pub mod supervisor;
pub mod utils;

pub use cli::{parse_args, Cli, Options};
pub use config::Config;
pub use error::{AppError, AppResult};
