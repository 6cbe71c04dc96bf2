//! Append-only log of irreversible blocks.
//!
//! Blocks are stored in SQLite keyed by block number, compressed with Snappy.
//! The log has no gaps: a block can only be appended directly after the current head.

use std::path::Path;

use anyhow::{ensure, Result};
use log::debug;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension as _};
use snap::raw::{Decoder, Encoder};
use thiserror::Error;
use types::{
    containers::SignedBlock,
    primitives::{BlockId, BlockNumber},
};

const DB_FILE: &str = "block_log.sqlite";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS blocks (
        block_number INTEGER PRIMARY KEY,
        block_id     BLOB    NOT NULL UNIQUE,
        block        BLOB    NOT NULL
    )
";

#[derive(Debug, Error)]
pub enum Error {
    #[error("block appended out of order (expected: {expected}, actual: {actual})")]
    BlockOutOfOrder {
        expected: BlockNumber,
        actual: BlockNumber,
    },
}

// `Connection` is not `Sync`. The mutex lets the log be shared by readers of the chain.
pub struct BlockLog {
    connection: Mutex<Connection>,
}

impl BlockLog {
    pub fn persistent(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref();

        fs_err::create_dir_all(directory)?;

        let connection = Connection::open(directory.join(DB_FILE))?;
        connection.pragma_update(None, "journal_mode", "WAL")?;

        Self::initialize(connection)
    }

    pub fn in_memory() -> Result<Self> {
        let connection = Connection::open_in_memory()?;

        // See the last paragraph of <https://www.sqlite.org/pragma.html#pragma_journal_mode>.
        connection.pragma_update(None, "journal_mode", "MEMORY")?;

        Self::initialize(connection)
    }

    fn initialize(connection: Connection) -> Result<Self> {
        connection.execute_batch(SCHEMA)?;

        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub fn append(&self, block: &SignedBlock) -> Result<()> {
        let connection = self.connection.lock();

        let expected = Self::query_head_block_number(&connection)? + 1;
        let actual = block.block_number();

        ensure!(expected == actual, Error::BlockOutOfOrder { expected, actual });

        connection.execute(
            "INSERT INTO blocks (block_number, block_id, block) VALUES (?1, ?2, ?3)",
            params![actual, block.id().as_h256().as_bytes(), encode(block)?],
        )?;

        debug!("block {actual} appended to block log");

        Ok(())
    }

    /// Returns 0 if the log is empty.
    pub fn head_block_number(&self) -> Result<BlockNumber> {
        Self::query_head_block_number(&self.connection.lock())
    }

    pub fn read_head(&self) -> Result<Option<SignedBlock>> {
        self.query_block("SELECT block FROM blocks ORDER BY block_number DESC LIMIT 1", [])
    }

    pub fn read_block_by_number(&self, block_number: BlockNumber) -> Result<Option<SignedBlock>> {
        self.query_block(
            "SELECT block FROM blocks WHERE block_number = ?1",
            [block_number],
        )
    }

    pub fn read_block_by_id(&self, block_id: BlockId) -> Result<Option<SignedBlock>> {
        self.query_block(
            "SELECT block FROM blocks WHERE block_id = ?1",
            [block_id.as_h256().as_bytes()],
        )
    }

    pub fn contains_block(&self, block_id: BlockId) -> Result<bool> {
        self.connection
            .lock()
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM blocks WHERE block_id = ?1)",
                [block_id.as_h256().as_bytes()],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    fn query_head_block_number(connection: &Connection) -> Result<BlockNumber> {
        connection
            .query_row(
                "SELECT COALESCE(MAX(block_number), 0) FROM blocks",
                [],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    fn query_block(
        &self,
        sql: &str,
        parameters: impl rusqlite::Params,
    ) -> Result<Option<SignedBlock>> {
        self.connection
            .lock()
            .query_row(sql, parameters, |row| row.get::<_, Vec<u8>>(0))
            .optional()?
            .map(|bytes| decode(&bytes))
            .transpose()
    }
}

fn encode(block: &SignedBlock) -> Result<Vec<u8>> {
    let bytes = bincode::serialize(block)?;
    Encoder::new().compress_vec(&bytes).map_err(Into::into)
}

fn decode(compressed: &[u8]) -> Result<SignedBlock> {
    let bytes = Decoder::new().decompress_vec(compressed)?;
    bincode::deserialize(&bytes).map_err(Into::into)
}
