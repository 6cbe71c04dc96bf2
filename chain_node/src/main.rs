use std::{path::Path, process::ExitCode, sync::Arc};

use anyhow::Result;
use block_log::BlockLog;
use chain_controller::{Controller, GenesisInitializer, SharedController};
use clap::{Error as ClapError, Parser as _};
use features::Feature;
use log::{debug, error, info, warn};
use types::{
    config::Config as ChainConfig,
    keys::SecretKey,
    primitives::{AccountName, UnixSeconds},
};

use crate::{
    chain_node_args::ChainNodeArgs, chain_node_config::ChainNodeConfig,
    commands::ChainNodeCommand, producer::LocalProducer,
};

mod chain_node_args;
mod chain_node_config;
mod commands;
mod consts;
mod memo;
mod producer;

fn main() -> ExitCode {
    if let Err(error) = try_main() {
        error.downcast_ref().map(ClapError::exit);
        error!("{error:?}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn try_main() -> Result<()> {
    binary_utils::initialize_logger(module_path!(), false)?;

    let config = ChainNodeArgs::try_parse()?
        .try_into_config()
        .map_err(ChainNodeArgs::clap_error)?;

    config.report();

    let ChainNodeConfig {
        chain_config,
        data_dir,
        features,
        command,
    } = config;

    Feature::enable_all(features);

    let block_log = match &data_dir {
        Some(directory) => BlockLog::persistent(directory)?,
        None => BlockLog::in_memory()?,
    };

    match command {
        ChainNodeCommand::Run {
            producers,
            genesis_time,
            blocks,
            memo,
        } => run(chain_config, block_log, &producers, genesis_time, blocks, memo),
        ChainNodeCommand::Info => show_info(&block_log, data_dir.as_deref()),
    }
}

fn run(
    chain_config: ChainConfig,
    block_log: BlockLog,
    producers: &[String],
    genesis_time: UnixSeconds,
    blocks: u64,
    memos: Vec<String>,
) -> Result<()> {
    let secret_keys = producers
        .iter()
        .map(|name| (AccountName::from(name.as_str()), SecretKey::from_phrase(name)))
        .collect::<Vec<_>>();

    let initializer = GenesisInitializer::new(
        genesis_time,
        secret_keys
            .iter()
            .map(|(name, secret_key)| (name.clone(), secret_key.to_public_key())),
    );

    let mut controller = Controller::new(
        Arc::new(chain_config),
        block_log,
        memo::handlers(),
        &memo::install(initializer),
    )?;

    controller.on_applied_block(|block| {
        debug!("applied block {:?}", block.id());
        Ok(())
    });

    info!(
        "starting at block {} (last irreversible block: {})",
        controller.head_block_num(),
        controller.last_irreversible_block_num(),
    );

    let controller = SharedController::from(controller);
    let producer = LocalProducer::new(controller.clone(), secret_keys);
    let mut memos = memos.into_iter();

    for _ in 0..blocks {
        if let Some(text) = memos.next() {
            if let Err(error) = producer.post_memo(&text) {
                warn!("memo rejected: {error:?}");
            }
        }

        producer.produce_block()?;
    }

    let remaining_memos = memos.len();

    if remaining_memos > 0 {
        warn!("{remaining_memos} memos were not posted because no blocks were left");
    }

    let controller = controller.read();

    info!(
        "finished at block {} {:?} (last irreversible block: {}, participation: {}.{:02}%)",
        controller.head_block_num(),
        controller.head_block_id(),
        controller.last_irreversible_block_num(),
        controller.producer_participation_rate() / 100,
        controller.producer_participation_rate() % 100,
    );

    Ok(())
}

fn show_info(block_log: &BlockLog, data_dir: Option<&Path>) -> Result<()> {
    info!("block log: {data_dir:?}");

    match block_log.read_head()? {
        Some(block) => info!(
            "head: block {} {:?} produced by {} at {} with {} transactions",
            block.block_number(),
            block.id(),
            block.producer,
            block.timestamp,
            block.transactions.len(),
        ),
        None => info!("block log is empty"),
    }

    Ok(())
}
