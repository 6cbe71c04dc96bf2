use std::sync::Arc;

use anyhow::Result;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use types::{
    containers::{SignedBlock, SignedTransaction},
    keys::SecretKey,
    nonstandard::SkipFlags,
    primitives::{AccountName, BlockNumber, UnixSeconds},
};

use crate::controller::Controller;

/// Handle to a [`Controller`] that can be shared between threads.
///
/// Mutations hold the write lock for their whole duration, so readers never observe a block or a
/// fork switch that is only partially applied.
#[derive(Clone)]
pub struct SharedController(Arc<RwLock<Controller>>);

impl From<Controller> for SharedController {
    fn from(controller: Controller) -> Self {
        Self(Arc::new(RwLock::new(controller)))
    }
}

impl SharedController {
    pub fn read(&self) -> RwLockReadGuard<'_, Controller> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Controller> {
        self.0.write()
    }

    pub fn push_block(&self, block: Arc<SignedBlock>, skip: SkipFlags) -> Result<bool> {
        self.write().push_block(block, skip)
    }

    pub fn push_transaction(&self, transaction: SignedTransaction, skip: SkipFlags) -> Result<()> {
        self.write().push_transaction(transaction, skip)
    }

    pub fn generate_block(
        &self,
        when: UnixSeconds,
        producer: &AccountName,
        secret_key: &SecretKey,
        skip: SkipFlags,
    ) -> Result<Arc<SignedBlock>> {
        self.write()
            .generate_block(when, producer, secret_key, skip)
    }

    #[must_use]
    pub fn head_block_num(&self) -> BlockNumber {
        self.read().head_block_num()
    }

    #[must_use]
    pub fn last_irreversible_block_num(&self) -> BlockNumber {
        self.read().last_irreversible_block_num()
    }
}
