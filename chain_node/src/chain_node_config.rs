use std::path::PathBuf;

use features::Feature;
use itertools::Itertools as _;
use log::info;
use types::config::Config as ChainConfig;

use crate::commands::ChainNodeCommand;

#[cfg_attr(test, derive(Debug))]
pub struct ChainNodeConfig {
    pub chain_config: ChainConfig,
    pub data_dir: Option<PathBuf>,
    pub features: Vec<Feature>,
    pub command: ChainNodeCommand,
}

impl ChainNodeConfig {
    pub fn report(&self) {
        let Self {
            chain_config,
            data_dir,
            features,
            ..
        } = self;

        info!("configuration: {}", chain_config.config_name);
        info!("block interval: {} seconds", chain_config.block_interval_seconds);
        info!("maximum undo history: {} blocks", chain_config.max_undo_history);

        match data_dir {
            Some(data_dir) => info!("data directory: {data_dir:?}"),
            None => info!("data directory: none (blocks are kept in memory)"),
        }

        if !features.is_empty() {
            info!("enabled features: [{}]", features.iter().format(", "));
        }
    }
}
