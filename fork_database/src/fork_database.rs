use core::iter;
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use anyhow::{ensure, Result};
use log::debug;
use types::{
    containers::SignedBlock,
    primitives::{BlockId, BlockNumber},
};

use crate::{error::Error, misc::ChainLink};

/// Two branches leading from a common ancestor, newest blocks first.
///
/// Neither branch contains the common ancestor.
#[derive(Debug)]
pub struct Branches {
    pub first: Vec<ChainLink>,
    pub second: Vec<ChainLink>,
    pub common_ancestor: BlockId,
}

#[derive(Default)]
pub struct ForkDatabase {
    links: HashMap<BlockId, ChainLink>,
    ids_by_number: BTreeMap<BlockNumber, BTreeSet<BlockId>>,
    head: Option<BlockId>,
    // Parent of the roots of the tree when the anchor block itself is not in the index.
    root_parent: Option<BlockId>,
}

impl ForkDatabase {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Replaces the contents of the index with a single anchor block.
    pub fn start_block(&mut self, block: Arc<SignedBlock>) {
        self.reset();

        let link = ChainLink::from(block);
        self.head = Some(link.block_id);
        self.insert(link);
    }

    /// Adds a block to the index and returns the head, which may or may not be the new block.
    ///
    /// Pushing a block that is already known changes nothing.
    pub fn push_block(&mut self, block: Arc<SignedBlock>) -> Result<ChainLink> {
        let link = ChainLink::from(block);

        if !self.links.contains_key(&link.block_id) {
            let previous = link.previous();

            if self.links.is_empty() {
                self.root_parent = Some(previous);
            }

            ensure!(
                self.links.contains_key(&previous) || self.root_parent == Some(previous),
                Error::UnlinkableBlock {
                    block_id: link.block_id,
                    previous,
                },
            );

            if self.head().is_none_or(|head| link.rank_cmp(head).is_gt()) {
                self.head = Some(link.block_id);
            }

            self.insert(link);
        }

        self.head().cloned().ok_or_else(|| Error::Empty.into())
    }

    #[must_use]
    pub fn head(&self) -> Option<&ChainLink> {
        self.links.get(&self.head?)
    }

    /// Moves the head to `block_id`.
    ///
    /// Setting the head to the parent of the roots leaves the index without a head.
    pub fn set_head(&mut self, block_id: BlockId) -> Result<()> {
        if self.links.contains_key(&block_id) {
            self.head = Some(block_id);
        } else {
            ensure!(
                self.root_parent == Some(block_id),
                Error::UnknownBlock { block_id },
            );

            self.head = None;
        }

        Ok(())
    }

    /// Removes the head and moves the head to its parent.
    pub fn pop_block(&mut self) -> Result<ChainLink> {
        let head_id = self.head.ok_or(Error::Empty)?;
        let head = self.unlink(head_id).ok_or(Error::Empty)?;
        let previous = head.previous();

        self.head = self.links.contains_key(&previous).then_some(previous);

        Ok(head)
    }

    #[must_use]
    pub fn is_known_block(&self, block_id: BlockId) -> bool {
        self.links.contains_key(&block_id)
    }

    #[must_use]
    pub fn fetch_block(&self, block_id: BlockId) -> Option<&ChainLink> {
        self.links.get(&block_id)
    }

    pub fn fetch_blocks_by_number(
        &self,
        block_number: BlockNumber,
    ) -> impl Iterator<Item = &ChainLink> {
        self.ids_by_number
            .get(&block_number)
            .into_iter()
            .flatten()
            .filter_map(|block_id| self.links.get(block_id))
    }

    #[must_use]
    pub fn fetch_block_on_main_branch_by_number(
        &self,
        block_number: BlockNumber,
    ) -> Option<&ChainLink> {
        self.ancestors(self.head?)
            .find(|link| link.block_number() <= block_number)
            .filter(|link| link.block_number() == block_number)
    }

    /// Walks back from both blocks to their common ancestor.
    ///
    /// Fails if the blocks are not in the same tree. The ancestor may be the parent of the roots.
    pub fn fetch_branch_from(&self, first: BlockId, second: BlockId) -> Result<Branches> {
        let mut first_cursor = self.cursor(first)?;
        let mut second_cursor = self.cursor(second)?;
        let mut first_branch = vec![];
        let mut second_branch = vec![];

        while first_cursor.block_number() > second_cursor.block_number() {
            let link = self.fetch(first_cursor)?;
            first_cursor = self.cursor(link.previous())?;
            first_branch.push(link.clone());
        }

        while second_cursor.block_number() > first_cursor.block_number() {
            let link = self.fetch(second_cursor)?;
            second_cursor = self.cursor(link.previous())?;
            second_branch.push(link.clone());
        }

        while first_cursor != second_cursor {
            let first_link = self.fetch(first_cursor)?;
            let second_link = self.fetch(second_cursor)?;

            first_cursor = self.cursor(first_link.previous())?;
            second_cursor = self.cursor(second_link.previous())?;

            first_branch.push(first_link.clone());
            second_branch.push(second_link.clone());
        }

        Ok(Branches {
            first: first_branch,
            second: second_branch,
            common_ancestor: first_cursor,
        })
    }

    /// Removes a block and all of its descendants.
    ///
    /// If the head is removed, the best remaining block becomes the head.
    /// Returns the IDs of removed blocks, parents before children.
    pub fn remove(&mut self, block_id: BlockId) -> Vec<BlockId> {
        let mut removed = vec![];
        let mut queue = vec![block_id];

        while let Some(block_id) = queue.pop() {
            if self.unlink(block_id).is_none() {
                continue;
            }

            queue.extend(self.children(block_id));
            removed.push(block_id);
        }

        if self.head.is_some_and(|head| removed.contains(&head)) {
            self.head = self
                .links
                .values()
                .max_by(|left, right| left.rank_cmp(right))
                .map(|link| link.block_id);
        }

        removed
    }

    /// Makes `anchor_id` the root of the tree.
    ///
    /// Removes blocks older than the anchor and every block that does not descend from it.
    pub fn prune(&mut self, anchor_id: BlockId) -> Result<()> {
        ensure!(
            self.links.contains_key(&anchor_id),
            Error::UnknownBlock {
                block_id: anchor_id,
            },
        );

        let anchor_number = anchor_id.block_number();

        let older = self
            .ids_by_number
            .range(..anchor_number)
            .flat_map(|(_, block_ids)| block_ids)
            .copied()
            .collect::<Vec<_>>();

        let siblings = self
            .fetch_blocks_by_number(anchor_number)
            .map(|link| link.block_id)
            .filter(|block_id| *block_id != anchor_id)
            .collect::<Vec<_>>();

        for block_id in &older {
            self.unlink(*block_id);
        }

        let mut orphaned = 0;

        for block_id in siblings {
            orphaned += self.remove(block_id).len();
        }

        self.root_parent = None;

        if !older.is_empty() || orphaned > 0 {
            debug!(
                "pruned fork database to block {anchor_number} \
                 (older blocks: {}, orphaned blocks: {orphaned})",
                older.len(),
            );
        }

        Ok(())
    }

    fn ancestors(&self, block_id: BlockId) -> impl Iterator<Item = &ChainLink> {
        iter::successors(self.links.get(&block_id), |link| {
            self.links.get(&link.previous())
        })
    }

    fn children(&self, block_id: BlockId) -> Vec<BlockId> {
        self.fetch_blocks_by_number(block_id.block_number() + 1)
            .filter(|link| link.previous() == block_id)
            .map(|link| link.block_id)
            .collect()
    }

    fn cursor(&self, block_id: BlockId) -> Result<BlockId> {
        ensure!(
            self.links.contains_key(&block_id) || self.root_parent == Some(block_id),
            Error::UnknownBlock { block_id },
        );

        Ok(block_id)
    }

    fn fetch(&self, block_id: BlockId) -> Result<&ChainLink> {
        self.links
            .get(&block_id)
            .ok_or_else(|| Error::UnknownBlock { block_id }.into())
    }

    fn insert(&mut self, link: ChainLink) {
        self.ids_by_number
            .entry(link.block_number())
            .or_default()
            .insert(link.block_id);

        self.links.insert(link.block_id, link);
    }

    fn unlink(&mut self, block_id: BlockId) -> Option<ChainLink> {
        let link = self.links.remove(&block_id)?;
        let block_number = link.block_number();

        if let Some(block_ids) = self.ids_by_number.get_mut(&block_number) {
            block_ids.remove(&block_id);

            if block_ids.is_empty() {
                self.ids_by_number.remove(&block_number);
            }
        }

        Some(link)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;
    use types::{containers::BlockHeader, primitives::H256};

    use super::*;

    fn block(previous: BlockId, salt: u8) -> Arc<SignedBlock> {
        Arc::new(SignedBlock {
            header: BlockHeader {
                previous,
                timestamp: 3 * u64::from(previous.block_number() + 1),
                transaction_merkle_root: H256::repeat_byte(salt),
                producer: "alice".into(),
            },
            ..SignedBlock::default()
        })
    }

    // Builds a chain of `length` blocks on top of `previous`, oldest first.
    fn chain(previous: BlockId, length: usize, salt: u8) -> Vec<Arc<SignedBlock>> {
        iter::successors(Some(block(previous, salt)), |parent| {
            Some(block(parent.id(), salt))
        })
        .take(length)
        .collect()
    }

    fn push_all(fork_database: &mut ForkDatabase, blocks: &[Arc<SignedBlock>]) -> Result<()> {
        for block in blocks {
            fork_database.push_block(Arc::clone(block))?;
        }

        Ok(())
    }

    fn head_id(fork_database: &ForkDatabase) -> Option<BlockId> {
        fork_database.head().map(|link| link.block_id)
    }

    #[test]
    fn longer_chain_becomes_head() -> Result<()> {
        let mut fork_database = ForkDatabase::new();
        let main = chain(BlockId::zero(), 3, 1);
        let fork = chain(main[0].id(), 3, 2);

        push_all(&mut fork_database, &main)?;
        assert_eq!(head_id(&fork_database), Some(main[2].id()));

        fork_database.push_block(Arc::clone(&fork[0]))?;
        fork_database.push_block(Arc::clone(&fork[1]))?;
        assert_eq!(head_id(&fork_database), Some(main[2].id().min(fork[1].id())));

        fork_database.push_block(Arc::clone(&fork[2]))?;
        assert_eq!(head_id(&fork_database), Some(fork[2].id()));

        Ok(())
    }

    #[test]
    fn equal_height_is_decided_by_lower_id_regardless_of_order() -> Result<()> {
        let first = block(BlockId::zero(), 1);
        let second = block(BlockId::zero(), 2);
        let lower = first.id().min(second.id());

        for blocks in [[&first, &second], [&second, &first]] {
            let mut fork_database = ForkDatabase::new();

            for block in blocks {
                fork_database.push_block(Arc::clone(block))?;
            }

            assert_eq!(head_id(&fork_database), Some(lower));
        }

        Ok(())
    }

    #[test]
    fn unlinkable_block_is_rejected() -> Result<()> {
        let mut fork_database = ForkDatabase::new();
        let main = chain(BlockId::zero(), 3, 1);

        fork_database.push_block(Arc::clone(&main[0]))?;

        let error = fork_database
            .push_block(Arc::clone(&main[2]))
            .expect_err("block 3 should not link to block 1");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::UnlinkableBlock { .. }),
        ));
        assert!(!fork_database.is_known_block(main[2].id()));

        Ok(())
    }

    #[test]
    fn pushing_known_block_changes_nothing() -> Result<()> {
        let mut fork_database = ForkDatabase::new();
        let main = chain(BlockId::zero(), 2, 1);
        let fork = chain(BlockId::zero(), 1, 2);

        push_all(&mut fork_database, &main)?;
        push_all(&mut fork_database, &fork)?;
        fork_database.set_head(fork[0].id())?;

        let head = fork_database.push_block(Arc::clone(&main[1]))?;

        assert_eq!(head.block_id, fork[0].id());
        assert_eq!(fork_database.len(), 3);

        Ok(())
    }

    #[test]
    fn head_can_be_set_to_parent_of_roots() -> Result<()> {
        let mut fork_database = ForkDatabase::new();
        let main = chain(BlockId::zero(), 1, 1);

        push_all(&mut fork_database, &main)?;
        fork_database.set_head(BlockId::zero())?;

        assert_eq!(head_id(&fork_database), None);
        assert!(fork_database.set_head(main[0].header.previous).is_ok());
        assert!(fork_database
            .set_head(BlockId::new(H256::repeat_byte(1), 5))
            .is_err());

        Ok(())
    }

    #[test]
    fn fetch_branch_from_stops_at_common_ancestor() -> Result<()> {
        let mut fork_database = ForkDatabase::new();
        let main = chain(BlockId::zero(), 4, 1);
        let fork = chain(main[1].id(), 1, 2);

        push_all(&mut fork_database, &main)?;
        push_all(&mut fork_database, &fork)?;

        let branches = fork_database.fetch_branch_from(main[3].id(), fork[0].id())?;

        let ids = |links: &[ChainLink]| links.iter().map(|link| link.block_id).collect::<Vec<_>>();

        assert_eq!(ids(&branches.first), [main[3].id(), main[2].id()]);
        assert_eq!(ids(&branches.second), [fork[0].id()]);
        assert_eq!(branches.common_ancestor, main[1].id());

        Ok(())
    }

    #[test]
    fn fetch_branch_from_handles_forks_at_genesis() -> Result<()> {
        let mut fork_database = ForkDatabase::new();
        let main = chain(BlockId::zero(), 2, 1);
        let fork = chain(BlockId::zero(), 1, 2);

        push_all(&mut fork_database, &main)?;
        push_all(&mut fork_database, &fork)?;

        let branches = fork_database.fetch_branch_from(fork[0].id(), main[1].id())?;

        assert_eq!(branches.first.len(), 1);
        assert_eq!(branches.second.len(), 2);
        assert_eq!(branches.common_ancestor, BlockId::zero());

        Ok(())
    }

    #[test]
    fn remove_takes_descendants_and_moves_head() -> Result<()> {
        let mut fork_database = ForkDatabase::new();
        let main = chain(BlockId::zero(), 2, 1);
        let fork = chain(main[0].id(), 3, 2);

        push_all(&mut fork_database, &main)?;
        push_all(&mut fork_database, &fork)?;
        assert_eq!(head_id(&fork_database), Some(fork[2].id()));

        let removed = fork_database.remove(fork[0].id());

        assert_eq!(removed, fork.iter().map(|block| block.id()).collect::<Vec<_>>());
        assert_eq!(head_id(&fork_database), Some(main[1].id()));
        assert_eq!(fork_database.len(), 2);

        Ok(())
    }

    #[test]
    fn pop_block_removes_head_and_moves_head_to_parent() -> Result<()> {
        let mut fork_database = ForkDatabase::new();
        let main = chain(BlockId::zero(), 2, 1);

        push_all(&mut fork_database, &main)?;

        assert_eq!(fork_database.pop_block()?.block_id, main[1].id());
        assert_eq!(head_id(&fork_database), Some(main[0].id()));
        assert!(!fork_database.is_known_block(main[1].id()));
        assert_eq!(fork_database.pop_block()?.block_id, main[0].id());
        assert_eq!(head_id(&fork_database), None);
        assert!(fork_database.pop_block().is_err());

        // Popped blocks can be pushed again.
        push_all(&mut fork_database, &main)?;

        assert_eq!(head_id(&fork_database), Some(main[1].id()));

        Ok(())
    }

    #[test_case(0 => None)]
    #[test_case(1 => Some(0))]
    #[test_case(3 => Some(2))]
    #[test_case(5 => None)]
    fn main_branch_lookup_by_number(block_number: BlockNumber) -> Option<usize> {
        let mut fork_database = ForkDatabase::new();
        let main = chain(BlockId::zero(), 4, 1);
        let fork = chain(main[0].id(), 2, 2);

        push_all(&mut fork_database, &main).expect("main chain links to genesis");
        push_all(&mut fork_database, &fork).expect("fork links to block 1");

        let link = fork_database.fetch_block_on_main_branch_by_number(block_number)?;

        main.iter().position(|block| block.id() == link.block_id)
    }

    #[test]
    fn prune_keeps_only_descendants_of_anchor() -> Result<()> {
        let mut fork_database = ForkDatabase::new();
        let main = chain(BlockId::zero(), 4, 1);
        let dead_fork = chain(main[0].id(), 3, 2);
        let live_fork = chain(main[1].id(), 1, 3);

        push_all(&mut fork_database, &main)?;
        push_all(&mut fork_database, &dead_fork)?;
        push_all(&mut fork_database, &live_fork)?;

        fork_database.prune(main[1].id())?;

        assert!(!fork_database.is_known_block(main[0].id()));
        assert!(dead_fork
            .iter()
            .all(|block| !fork_database.is_known_block(block.id())));
        assert!(fork_database.is_known_block(live_fork[0].id()));
        assert_eq!(fork_database.len(), 4);
        assert_eq!(head_id(&fork_database), Some(main[3].id()));

        // The parent of the old roots is no longer accepted.
        assert!(fork_database.push_block(block(BlockId::zero(), 9)).is_err());

        Ok(())
    }
}
