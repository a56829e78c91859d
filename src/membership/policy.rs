//! Selection Policies
//!
//! Decide which members to remove when a removal request asks for more nodes
//! than it names explicitly.

use rand::seq::SliceRandom;
use serde::Deserialize;
use std::sync::Arc;

use super::types::{MemberDescriptor, NodeId};

/// Picks up to `count` nodes out of `candidates`.
///
/// Returning fewer than `count` is valid when there are not enough candidates.
pub trait SelectionPolicy: Send + Sync {
    fn select(&self, candidates: &[MemberDescriptor], count: usize) -> Vec<NodeId>;

    fn name(&self) -> &'static str;
}

/// Uniformly random choice.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSelection;

impl SelectionPolicy for RandomSelection {
    fn select(&self, candidates: &[MemberDescriptor], count: usize) -> Vec<NodeId> {
        let mut rng = rand::thread_rng();
        candidates
            .choose_multiple(&mut rng, count)
            .map(|member| member.id.clone())
            .collect()
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

/// Earliest admitted first.
#[derive(Debug, Default, Clone, Copy)]
pub struct OldestFirst;

impl SelectionPolicy for OldestFirst {
    fn select(&self, candidates: &[MemberDescriptor], count: usize) -> Vec<NodeId> {
        let mut ordered: Vec<&MemberDescriptor> = candidates.iter().collect();
        ordered.sort_by_key(|member| member.admitted_seq);
        ordered
            .into_iter()
            .take(count)
            .map(|member| member.id.clone())
            .collect()
    }

    fn name(&self) -> &'static str {
        "oldest_first"
    }
}

/// Fewest served requests first, earliest admitted on ties.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeastLoaded;

impl SelectionPolicy for LeastLoaded {
    fn select(&self, candidates: &[MemberDescriptor], count: usize) -> Vec<NodeId> {
        let mut ordered: Vec<&MemberDescriptor> = candidates.iter().collect();
        ordered.sort_by_key(|member| (member.served, member.admitted_seq));
        ordered
            .into_iter()
            .take(count)
            .map(|member| member.id.clone())
            .collect()
    }

    fn name(&self) -> &'static str {
        "least_loaded"
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    Random,
    OldestFirst,
    LeastLoaded,
}

impl PolicyKind {
    pub fn build(self) -> Arc<dyn SelectionPolicy> {
        match self {
            PolicyKind::Random => Arc::new(RandomSelection),
            PolicyKind::OldestFirst => Arc::new(OldestFirst),
            PolicyKind::LeastLoaded => Arc::new(LeastLoaded),
        }
    }
}
