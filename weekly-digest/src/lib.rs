pub mod cli;
pub mod ghost;
pub mod load_config;
pub mod server;

pub use cli::{run, Cli, Commands};
