use std::io::Write as _;

use anyhow::Result;
use chrono::{Local, SecondsFormat};
use env_logger::{Builder, Env, WriteStyle};
use log::LevelFilter;

/// Environment variable with `env_logger` filters applied on top of the defaults.
pub const LOG_FILTER_VARIABLE: &str = "CHAIN_NODE_LOG";

const WORKSPACE_CRATES: [&str; 9] = [
    "binary_utils",
    "block_log",
    "chain_controller",
    "database",
    "features",
    "fork_database",
    "helper_functions",
    "transition_functions",
    "types",
];

pub fn initialize_logger(module_path: &str, always_write_style: bool) -> Result<()> {
    let mut builder = logger_builder(module_path);

    if always_write_style {
        builder.write_style(WriteStyle::Always);
    }

    builder.try_init()?;

    Ok(())
}

fn logger_builder(module_path: &str) -> Builder {
    let mut builder = Builder::new();

    builder.filter_level(LevelFilter::Off);

    for module in WORKSPACE_CRATES.into_iter().chain([module_path]) {
        builder.filter_module(module, LevelFilter::Info);
    }

    builder.parse_env(Env::new().filter(LOG_FILTER_VARIABLE));

    builder.format(|formatter, record| {
        writeln!(
            formatter,
            "[{} {:<5} {}] {}",
            Local::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            record.level(),
            record.target(),
            record.args(),
        )
    });

    builder
}
