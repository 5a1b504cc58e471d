//! Entry points of the `repoctl` subcommands.
//!
//! Every command takes the [`Runtime`](crate::runtime::Runtime) and a resolved
//! [`Config`]; results go to stdout, warnings and errors to stderr.

pub mod config;
mod filter;
mod list;
mod mutate;
mod output;
mod services;
mod state;
mod status;

pub use config::{Config, ConfigFile, Overrides, default_config_path};
pub use filter::filter;
pub use list::{ListOptions, list};
pub use mutate::{add, remove, reset, update};
pub use output::Printer;
pub use services::build_http_client;
pub use status::status;
