//! Versioned object store.
//!
//! [`Database`] holds a single state value together with a stack of undo states.
//! Starting an undo session snapshots the state and increments the revision.
//! A session ends in one of three ways:
//! - Undoing restores the snapshot.
//! - Squashing merges the changes into the enclosing session.
//! - Pushing keeps the snapshot on the stack so the changes can be undone later.
//!
//! Undo states with revisions up to a committed revision are discarded and can no longer be undone.
//!
//! Snapshots are plain clones of the state, so the state should be made of persistent data
//! structures (like the ones in `im`) to keep sessions cheap.

use core::ops::{Deref, DerefMut};
use std::collections::VecDeque;

use anyhow::{ensure, Result};
use log::debug;
use thiserror::Error;

pub type Revision = u64;

#[derive(Debug, Error)]
pub enum Error {
    #[error("there are no undo states to undo")]
    NothingToUndo,
    #[error("there are no undo states to squash")]
    NothingToSquash,
    #[error("revision cannot be changed while undo states exist (undo_depth: {undo_depth})")]
    UndoStatesExist { undo_depth: usize },
}

struct UndoState<S> {
    previous_state: S,
    revision: Revision,
}

pub struct Database<S> {
    state: S,
    undo_stack: VecDeque<UndoState<S>>,
    revision: Revision,
}

impl<S: Clone + Default> Default for Database<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S: Clone> Database<S> {
    #[must_use]
    pub const fn new(state: S) -> Self {
        Self {
            state,
            undo_stack: VecDeque::new(),
            revision: 0,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    #[must_use]
    pub const fn revision(&self) -> Revision {
        self.revision
    }

    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn set_revision(&mut self, revision: Revision) -> Result<()> {
        ensure!(
            self.undo_stack.is_empty(),
            Error::UndoStatesExist {
                undo_depth: self.undo_stack.len(),
            },
        );

        self.revision = revision;

        Ok(())
    }

    pub fn start_undo_session(&mut self) -> UndoSession<'_, S> {
        self.revision += 1;

        self.undo_stack.push_back(UndoState {
            previous_state: self.state.clone(),
            revision: self.revision,
        });

        UndoSession {
            revision: self.revision,
            database: self,
            apply: true,
        }
    }

    /// Restores the state from before the most recent undo session.
    pub fn undo(&mut self) -> Result<()> {
        ensure!(self.undo_top(), Error::NothingToUndo);
        Ok(())
    }

    /// Merges the most recent undo session into the one before it.
    ///
    /// If there is no session before it, its changes can no longer be undone.
    pub fn squash(&mut self) -> Result<()> {
        ensure!(self.squash_top(), Error::NothingToSquash);
        Ok(())
    }

    pub fn undo_all(&mut self) {
        while self.undo_top() {}
    }

    /// Discards undo states with revisions up to and including `revision`.
    pub fn commit(&mut self, revision: Revision) {
        let mut committed = 0;

        while self
            .undo_stack
            .front()
            .is_some_and(|undo_state| undo_state.revision <= revision)
        {
            self.undo_stack.pop_front();
            committed += 1;
        }

        if committed > 0 {
            debug!("committed {committed} undo states up to revision {revision}");
        }
    }

    fn undo_top(&mut self) -> bool {
        let Some(undo_state) = self.undo_stack.pop_back() else {
            return false;
        };

        self.state = undo_state.previous_state;
        self.revision -= 1;

        true
    }

    fn squash_top(&mut self) -> bool {
        if self.undo_stack.pop_back().is_none() {
            return false;
        }

        self.revision -= 1;

        true
    }

    fn top_revision(&self) -> Option<Revision> {
        self.undo_stack.back().map(|undo_state| undo_state.revision)
    }
}

/// Undo session that is undone when dropped unless it is pushed or squashed.
#[must_use]
pub struct UndoSession<'database, S: Clone> {
    database: &'database mut Database<S>,
    revision: Revision,
    apply: bool,
}

impl<S: Clone> Drop for UndoSession<'_, S> {
    fn drop(&mut self) {
        if self.apply && self.is_on_top() {
            self.database.undo_top();
        }
    }
}

impl<S: Clone> Deref for UndoSession<'_, S> {
    type Target = Database<S>;

    fn deref(&self) -> &Self::Target {
        self.database
    }
}

impl<S: Clone> DerefMut for UndoSession<'_, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.database
    }
}

impl<S: Clone> UndoSession<'_, S> {
    #[must_use]
    pub const fn session_revision(&self) -> Revision {
        self.revision
    }

    /// Leaves the changes in place and the undo state on the stack.
    pub fn push(mut self) {
        self.apply = false;
    }

    pub fn squash(mut self) {
        self.apply = false;

        if self.is_on_top() {
            self.database.squash_top();
        }
    }

    fn is_on_top(&self) -> bool {
        self.database.top_revision() == Some(self.revision)
    }
}
