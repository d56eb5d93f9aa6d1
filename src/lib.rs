pub mod cli;
pub mod load_config;
pub mod synth;

pub use cli::{run, Cli, Commands};
