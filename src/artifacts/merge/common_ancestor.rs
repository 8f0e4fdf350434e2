//! Best common ancestor of two commits
//!
//! Phase one walks both histories at once, newest commit first, tagging every
//! commit with the side(s) it was reached from. A commit reached from both sides
//! is a common ancestor, and everything below it is marked stale so the walk
//! does not report its ancestors too.
//!
//! Phase two drops redundant candidates: a common ancestor that is itself an
//! ancestor of another common ancestor is never the best one. In criss-cross
//! histories several best ancestors remain; the newest one is returned.

use crate::artifacts::objects::commit::SlimCommit;
use crate::artifacts::objects::object_id::ObjectId;
use bitflags::bitflags;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::fmt;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash)]
    struct VisitState: u8 {
        const NONE = 0b00;
        const VISITED_FROM_SOURCE = 0b01;
        const VISITED_FROM_TARGET = 0b10;
        const VISITED_FROM_BOTH = Self::VISITED_FROM_SOURCE.bits() | Self::VISITED_FROM_TARGET.bits();
        const STALE = 0b100;
        const RESULT = 0b1000;
    }
}

impl fmt::Debug for VisitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut flags = Vec::new();
        if self.contains(VisitState::VISITED_FROM_SOURCE) {
            flags.push("SOURCE");
        }
        if self.contains(VisitState::VISITED_FROM_TARGET) {
            flags.push("TARGET");
        }
        if self.contains(VisitState::STALE) {
            flags.push("STALE");
        }
        if self.contains(VisitState::RESULT) {
            flags.push("RESULT");
        }
        if flags.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", flags.join("|"))
        }
    }
}

/// Finds common ancestors through a commit loader
///
/// The loader returns the parents and timestamp of a commit, so the finder
/// works the same over any object store.
pub struct CommonAncestorFinder<L>
where
    L: Fn(&ObjectId) -> anyhow::Result<SlimCommit>,
{
    commit_loader: L,
}

impl<L> CommonAncestorFinder<L>
where
    L: Fn(&ObjectId) -> anyhow::Result<SlimCommit>,
{
    pub fn new(commit_loader: L) -> Self {
        CommonAncestorFinder { commit_loader }
    }

    fn find_common_ancestors(
        &self,
        source_id: &ObjectId,
        target_ids: &HashSet<ObjectId>,
    ) -> anyhow::Result<HashMap<ObjectId, VisitState>> {
        if target_ids.contains(source_id) {
            return Ok(HashMap::from([(*source_id, VisitState::RESULT)]));
        }

        let mut states = HashMap::<ObjectId, VisitState>::new();
        let mut queue = BinaryHeap::new();

        let source = (self.commit_loader)(source_id)?;
        states.insert(source.oid, VisitState::VISITED_FROM_SOURCE);
        queue.push(source);

        for target_id in target_ids {
            states.insert(*target_id, VisitState::VISITED_FROM_TARGET);
            queue.push((self.commit_loader)(target_id)?);
        }

        while let Some(commit) = queue.pop() {
            let state = states.get(&commit.oid).copied().unwrap_or(VisitState::NONE);
            tracing::trace!(commit = %commit.oid, ?state, "visiting commit");

            if state.contains(VisitState::STALE) {
                continue;
            }

            let is_common = state.contains(VisitState::VISITED_FROM_BOTH);
            if is_common {
                states.insert(commit.oid, state | VisitState::RESULT);
            }

            for parent_id in &commit.parents {
                let parent_state = states.get(parent_id).copied().unwrap_or(VisitState::NONE);

                let mut new_state = parent_state | state;
                if is_common {
                    new_state |= VisitState::STALE;
                }

                if !parent_state.contains(state) || (is_common && !parent_state.contains(VisitState::STALE)) {
                    states.insert(*parent_id, new_state);
                    queue.push((self.commit_loader)(parent_id)?);
                }
            }
        }

        Ok(states
            .into_iter()
            .filter(|(_, state)| !state.contains(VisitState::STALE) && state.contains(VisitState::RESULT))
            .collect())
    }

    /// All best common ancestors of `source_id` and `target_id`, newest first
    pub fn find_best_common_ancestors(&self, source_id: &ObjectId, target_id: &ObjectId) -> anyhow::Result<Vec<ObjectId>> {
        let common = self
            .find_common_ancestors(source_id, &HashSet::from([*target_id]))?
            .into_keys()
            .collect::<HashSet<_>>();

        let mut redundant = HashSet::<ObjectId>::new();
        for candidate in &common {
            if redundant.contains(candidate) {
                continue;
            }

            let others = common
                .iter()
                .filter(|other| *other != candidate && !redundant.contains(*other))
                .copied()
                .collect::<HashSet<_>>();
            if others.is_empty() {
                continue;
            }
            let states = self.find_common_ancestors(candidate, &others)?;

            if states
                .get(candidate)
                .is_some_and(|state| state.contains(VisitState::VISITED_FROM_TARGET))
            {
                redundant.insert(*candidate);
            }
            for other in others {
                if states
                    .get(&other)
                    .is_some_and(|state| state.contains(VisitState::VISITED_FROM_SOURCE))
                {
                    redundant.insert(other);
                }
            }
        }

        let mut best = common
            .into_iter()
            .filter(|candidate| !redundant.contains(candidate))
            .map(|candidate| (self.commit_loader)(&candidate))
            .collect::<anyhow::Result<Vec<_>>>()?;
        best.sort_by(|a, b| b.cmp(a));

        tracing::debug!(
            source = %source_id,
            target = %target_id,
            best = ?best.iter().map(|commit| commit.oid.to_short_oid()).collect::<Vec<_>>(),
            "found best common ancestors"
        );

        Ok(best.into_iter().map(|commit| commit.oid).collect())
    }

    /// The newest best common ancestor, if the histories share one
    pub fn find_best_common_ancestor(&self, source_id: &ObjectId, target_id: &ObjectId) -> anyhow::Result<Option<ObjectId>> {
        Ok(self
            .find_best_common_ancestors(source_id, target_id)?
            .into_iter()
            .next())
    }

    /// Whether `ancestor_id` is reachable from `commit_id` through parent links
    ///
    /// A commit counts as its own ancestor.
    pub fn is_ancestor(&self, ancestor_id: &ObjectId, commit_id: &ObjectId) -> anyhow::Result<bool> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([*commit_id]);

        while let Some(current) = queue.pop_front() {
            if current == *ancestor_id {
                return Ok(true);
            }
            if !visited.insert(current) {
                continue;
            }
            queue.extend((self.commit_loader)(&current)?.parents);
        }

        Ok(false)
    }
}
