use core::fmt::Display;
use std::path::PathBuf;

use anyhow::Result;
use clap::{error::ErrorKind, CommandFactory as _, Error as ClapError, Parser};
use features::Feature;
use log::warn;
use types::config::Config as ChainConfig;

use crate::{
    chain_node_config::ChainNodeConfig, commands::ChainNodeCommand, consts::APPLICATION_NAME,
};

/// Runs a chain with locally held producer keys and inspects its block log
#[derive(Parser)]
#[clap(display_name = APPLICATION_NAME, verbatim_doc_comment, version)]
pub struct ChainNodeArgs {
    /// Directory to store irreversible blocks in.
    /// Blocks are kept in memory if omitted.
    #[clap(long, value_name = "DIRECTORY")]
    data_dir: Option<PathBuf>,

    /// Load chain configuration from YAML_FILE instead of using the devnet preset
    #[clap(long, value_name = "YAML_FILE")]
    configuration_file: Option<PathBuf>,

    /// List of optional runtime features to enable
    #[clap(long, value_delimiter = ',')]
    features: Vec<Feature>,

    #[clap(subcommand)]
    command: ChainNodeCommand,
}

impl ChainNodeArgs {
    pub fn try_into_config(self) -> Result<ChainNodeConfig> {
        let Self {
            data_dir,
            configuration_file,
            features,
            command,
        } = self;

        let chain_config = match configuration_file {
            Some(path) => {
                let bytes = fs_err::read(path)?;
                serde_yaml::from_slice(bytes.as_slice())?
            }
            None => ChainConfig::devnet(),
        };

        if data_dir.is_none() && matches!(command, ChainNodeCommand::Info) {
            warn!("--data-dir not specified; the block log will be empty");
        }

        Ok(ChainNodeConfig {
            chain_config,
            data_dir,
            features,
            command,
        })
    }

    pub fn clap_error(message: impl Display) -> ClapError {
        Self::command().error(ErrorKind::ValueValidation, message)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use tempfile::NamedTempFile;
    use test_case::test_case;
    use types::config::GenerationFailurePolicy;

    use crate::consts::{DEFAULT_BLOCK_COUNT, DEFAULT_GENESIS_TIME};

    use super::*;

    #[test]
    fn run_command_defaults() -> Result<()> {
        let config = try_config_from_args(["run"])?;

        assert_eq!(config.chain_config, ChainConfig::devnet());
        assert_eq!(config.data_dir, None);
        assert_eq!(config.features, []);
        assert_eq!(
            config.command,
            ChainNodeCommand::Run {
                producers: vec!["alice".to_owned(), "bob".to_owned(), "carol".to_owned()],
                genesis_time: DEFAULT_GENESIS_TIME,
                blocks: DEFAULT_BLOCK_COUNT,
                memo: vec![],
            },
        );

        Ok(())
    }

    #[test]
    fn run_command_options() -> Result<()> {
        let config = try_config_from_args([
            "--data-dir",
            "chain",
            "--features",
            "DebugBlockProducer,TrustOwnBlockSignatures",
            "run",
            "--producers",
            "dave,erin",
            "--blocks",
            "3",
            "--memo",
            "first",
            "--memo",
            "second",
        ])?;

        assert_eq!(config.data_dir, Some(PathBuf::from("chain")));
        assert_eq!(
            config.features,
            [Feature::DebugBlockProducer, Feature::TrustOwnBlockSignatures],
        );
        assert_eq!(
            config.command,
            ChainNodeCommand::Run {
                producers: vec!["dave".to_owned(), "erin".to_owned()],
                genesis_time: DEFAULT_GENESIS_TIME,
                blocks: 3,
                memo: vec!["first".to_owned(), "second".to_owned()],
            },
        );

        Ok(())
    }

    #[test]
    fn configuration_file_overrides_preset() -> Result<()> {
        let mut file = NamedTempFile::new()?;

        writeln!(file, "CONFIG_NAME: local")?;
        writeln!(file, "MAX_UNDO_HISTORY: 50")?;
        writeln!(file, "GENERATION_FAILURE_POLICY: abort_block")?;

        let path = file.path().to_str().expect("temporary file path is valid UTF-8");
        let config = try_config_from_args(["--configuration-file", path, "info"])?;

        assert_eq!(config.chain_config.config_name, "local");
        assert_eq!(config.chain_config.max_undo_history, 50);
        assert_eq!(config.chain_config.block_interval_seconds, 3);
        assert_eq!(
            config.chain_config.generation_failure_policy,
            GenerationFailurePolicy::AbortBlock,
        );

        Ok(())
    }

    #[test_case(&[]; "subcommand is required")]
    #[test_case(&["run", "--blocks", "many"]; "block count must be a number")]
    #[test_case(&["--features", "FlyToTheMoon", "run"]; "features must exist")]
    fn invalid_arguments_are_rejected(arguments: &[&str]) {
        assert!(try_config_from_args(arguments.iter().copied()).is_err());
    }

    fn try_config_from_args<'a>(
        arguments: impl IntoIterator<Item = &'a str>,
    ) -> Result<ChainNodeConfig> {
        ChainNodeArgs::try_parse_from(core::iter::once(APPLICATION_NAME).chain(arguments))?
            .try_into_config()
    }
}
