use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use super::load::LoadTracker;
use super::policy::SelectionPolicy;
use super::types::{
    AddOutcome, Member, MemberDescriptor, NodeFailure, NodeId, NodeState, RemoveOutcome, now_ms,
};
use crate::error::BalancerError;
use crate::provisioner::NodeProvisioner;
use crate::ring::HashRing;

const MAX_NAME_ATTEMPTS: usize = 16;
/// Reported when a failure happens before any name was chosen.
const UNNAMED_NODE: &str = "unnamed";

/// Ring, live members and in-flight nodes. Only ever touched through
/// `MembershipManager::state`, so the ring and the member map change together.
#[derive(Debug)]
struct ClusterState {
    ring: HashRing,
    members: HashMap<NodeId, Member>,
    /// Nodes that are reserved, provisioning, or being torn down.
    in_flight: HashMap<NodeId, NodeState>,
    next_seq: u64,
}

impl ClusterState {
    fn is_taken(&self, name: &NodeId) -> bool {
        self.members.contains_key(name) || self.in_flight.contains_key(name)
    }

    fn evict(&mut self, name: &NodeId, next: NodeState) -> Option<Member> {
        let member = self.members.remove(name)?;
        self.ring.remove(name);
        self.in_flight.insert(name.clone(), next);
        Some(member)
    }

    fn provisioning_count(&self) -> usize {
        self.in_flight
            .values()
            .filter(|state| matches!(state, NodeState::Requested | NodeState::Provisioning))
            .count()
    }
}

/// Authoritative owner of the live node set and the hash ring.
///
/// Every read and write of the (ring, members) pair goes through one `RwLock`:
/// lookups share it, mutations take it exclusively. External calls to the
/// provisioner are always made with the lock released.
pub struct MembershipManager {
    state: RwLock<ClusterState>,
    provisioner: Arc<dyn NodeProvisioner>,
    policy: Arc<dyn SelectionPolicy>,
    load: Arc<LoadTracker>,
    provision_timeout: Duration,
}

impl MembershipManager {
    pub fn new(
        ring: HashRing,
        provisioner: Arc<dyn NodeProvisioner>,
        policy: Arc<dyn SelectionPolicy>,
        provision_timeout: Duration,
    ) -> Arc<Self> {
        tracing::info!(
            "Membership manager ready (slots={}, virtual_nodes={}, removal_policy={})",
            ring.ring_size(),
            ring.virtual_nodes(),
            policy.name()
        );

        Arc::new(Self {
            state: RwLock::new(ClusterState {
                ring,
                members: HashMap::new(),
                in_flight: HashMap::new(),
                next_seq: 0,
            }),
            provisioner,
            policy,
            load: Arc::new(LoadTracker::new()),
            provision_timeout,
        })
    }

    pub fn load(&self) -> &Arc<LoadTracker> {
        &self.load
    }

    /// Counts one served request for `name` if it is still a member.
    ///
    /// A forward that completes after its node was removed is not counted, so a
    /// retired node never reappears in the load table.
    pub async fn record_served(&self, name: &NodeId) -> bool {
        let state = self.state.read().await;
        if !state.members.contains_key(name) {
            tracing::debug!("Not counting a request served by departed node {}", name);
            return false;
        }
        self.load.record(name);
        true
    }

    /// Provisions `count` nodes, using `preferred` names first and generated names for the rest.
    ///
    /// Shape errors are returned before anything changes. A provisioning failure stops
    /// the batch; nodes admitted earlier in the batch stay admitted and are listed in
    /// the outcome next to the failure.
    pub async fn add_nodes(
        &self,
        count: usize,
        preferred: Vec<String>,
    ) -> Result<AddOutcome, BalancerError> {
        validate_batch(count, &preferred)?;

        let preferred: Vec<NodeId> = preferred.into_iter().map(NodeId).collect();
        let mut seen = HashSet::new();
        for name in &preferred {
            if !seen.insert(name.clone()) {
                return Err(BalancerError::DuplicateNode(name.clone()));
            }
        }

        {
            let state = self.state.read().await;
            if let Some(taken) = preferred.iter().find(|name| state.is_taken(name)) {
                return Err(BalancerError::DuplicateNode(taken.clone()));
            }

            let nodes_after = state.ring.len() + state.provisioning_count() + count;
            let needed = nodes_after as u64 * state.ring.virtual_nodes() as u64;
            if needed > state.ring.ring_size() as u64 {
                return Err(BalancerError::InvalidRequest(format!(
                    "{} nodes do not fit on a ring of {} slots",
                    nodes_after,
                    state.ring.ring_size()
                )));
            }
        }

        let mut outcome = AddOutcome::default();

        for i in 0..count {
            let reserved = match preferred.get(i) {
                Some(name) => self.reserve(name.clone()).await,
                None => self.reserve_generated().await,
            };

            let name = match reserved {
                Ok(name) => name,
                Err(e) => {
                    let node = e
                        .node()
                        .cloned()
                        .or_else(|| preferred.get(i).cloned())
                        .unwrap_or_else(|| NodeId::from(UNNAMED_NODE));
                    tracing::error!("Aborting add batch, no name reserved for {}: {}", node, e);
                    outcome.failure = Some(NodeFailure {
                        node,
                        error: e.to_string(),
                    });
                    return Ok(outcome);
                }
            };

            match self.provision_and_admit(&name).await {
                Ok(member) => outcome.added.push(member),
                Err(e) => {
                    tracing::error!("Aborting add batch at {}: {}", name, e);
                    outcome.failure = Some(NodeFailure {
                        node: name,
                        error: e.to_string(),
                    });
                    return Ok(outcome);
                }
            }
        }

        Ok(outcome)
    }

    /// Removes up to `count` nodes: named members first, then picks from the rest
    /// using the configured selection policy.
    ///
    /// Selected nodes leave the ring before they are deprovisioned. A deprovisioning
    /// failure is reported for that node only and does not stop the others.
    pub async fn remove_nodes(
        &self,
        count: usize,
        preferred: Vec<String>,
    ) -> Result<RemoveOutcome, BalancerError> {
        validate_batch(count, &preferred)?;

        let evicted: Vec<Member> = {
            let mut state = self.state.write().await;

            let mut targets: Vec<NodeId> = Vec::new();
            for name in preferred.into_iter().map(NodeId) {
                if state.members.contains_key(&name) && !targets.contains(&name) {
                    targets.push(name);
                }
            }

            if targets.len() < count {
                let candidates: Vec<MemberDescriptor> = state
                    .members
                    .values()
                    .filter(|member| !targets.contains(&member.id))
                    .map(|member| self.describe(member))
                    .collect();
                targets.extend(self.policy.select(&candidates, count - targets.len()));
            }

            targets
                .iter()
                .filter_map(|name| state.evict(name, NodeState::Removing))
                .collect()
        };

        let mut outcome = RemoveOutcome::default();
        for member in evicted {
            tracing::info!("Removed {} ({}) from the ring", member.id, member.address);
            if let Err(error) = self.retire(&member.id).await {
                outcome.failures.push(NodeFailure {
                    node: member.id.clone(),
                    error,
                });
            }
            outcome.removed.push(member.id);
        }

        Ok(outcome)
    }

    /// Members in admission order.
    pub async fn list_members(&self) -> Vec<MemberDescriptor> {
        let state = self.state.read().await;
        let mut members: Vec<MemberDescriptor> =
            state.members.values().map(|m| self.describe(m)).collect();
        members.sort_by_key(|member| member.admitted_seq);
        members
    }

    pub async fn members_snapshot(&self) -> Vec<Member> {
        let state = self.state.read().await;
        let mut members: Vec<Member> = state.members.values().cloned().collect();
        members.sort_by_key(|member| member.admitted_seq);
        members
    }

    /// Owner of `key`, cloned so callers do not hold the lock while forwarding.
    pub async fn resolve(&self, key: &str) -> Option<Member> {
        let state = self.state.read().await;
        let owner = state.ring.resolve(key)?;
        state.members.get(owner).cloned()
    }

    pub async fn node_state(&self, name: &NodeId) -> NodeState {
        let state = self.state.read().await;
        if state.members.contains_key(name) {
            return NodeState::Live;
        }
        state
            .in_flight
            .get(name)
            .copied()
            .unwrap_or(NodeState::Gone)
    }

    /// Registers a node that is already running, without calling the provisioner.
    pub async fn adopt(&self, name: NodeId, address: String) -> Result<Member, BalancerError> {
        let mut state = self.state.write().await;
        if state.is_taken(&name) {
            return Err(BalancerError::DuplicateNode(name));
        }
        let member = self.admit(&mut state, name, address)?;
        tracing::info!("Adopted existing backend {} at {}", member.id, member.address);
        Ok(member)
    }

    /// Takes a node the failure detector gave up on off the ring.
    ///
    /// Returns `None` when the node was no longer a member, e.g. because an explicit
    /// removal got there first.
    pub async fn evict_failed(&self, name: &NodeId) -> Option<Member> {
        let mut state = self.state.write().await;
        let member = state.evict(name, NodeState::Failed)?;
        tracing::warn!("Evicted failed node {} ({})", member.id, member.address);
        Some(member)
    }

    /// Best-effort deprovisioning of an evicted node, after which it is `Gone`.
    pub async fn retire(&self, name: &NodeId) -> Result<(), String> {
        let result = self.deprovision_with_timeout(name).await;
        if let Err(e) = &result {
            tracing::warn!("Deprovisioning {} failed: {}", name, e);
        }

        self.state.write().await.in_flight.remove(name);
        self.load.forget(name);
        result
    }

    /// Provisions one node under a fresh generated name and admits it.
    pub async fn provision_replacement(&self) -> Result<Member, BalancerError> {
        let name = self.reserve_generated().await?;
        self.provision_and_admit(&name).await
    }

    /// Copy of the ring for inspection.
    pub async fn ring_snapshot(&self) -> HashRing {
        self.state.read().await.ring.clone()
    }

    /// Whether the ring holds exactly the live members, each with `K` slots.
    pub async fn is_consistent(&self) -> bool {
        let state = self.state.read().await;
        let members: HashSet<NodeId> = state.members.keys().cloned().collect();
        let k = state.ring.virtual_nodes() as usize;

        state.ring.nodes() == members
            && members
                .iter()
                .all(|name| state.ring.slots_of(name).len() == k)
            && state.ring.occupied_slots().len() == members.len() * k
    }

    fn describe(&self, member: &Member) -> MemberDescriptor {
        MemberDescriptor {
            id: member.id.clone(),
            address: member.address.clone(),
            admitted_seq: member.admitted_seq,
            admitted_at: member.admitted_at,
            served: self.load.served(&member.id),
        }
    }

    async fn reserve(&self, name: NodeId) -> Result<NodeId, BalancerError> {
        let mut state = self.state.write().await;
        if state.is_taken(&name) {
            return Err(BalancerError::DuplicateNode(name));
        }
        state.in_flight.insert(name.clone(), NodeState::Requested);
        Ok(name)
    }

    async fn reserve_generated(&self) -> Result<NodeId, BalancerError> {
        let mut last = NodeId::from(UNNAMED_NODE);
        for _ in 0..MAX_NAME_ATTEMPTS {
            match self.reserve(NodeId::generate()).await {
                Ok(name) => return Ok(name),
                Err(BalancerError::DuplicateNode(name)) => {
                    tracing::debug!("Generated name {} already in use, retrying", name);
                    last = name;
                }
                Err(e) => return Err(e),
            }
        }
        Err(BalancerError::ProvisioningFailed {
            node: last,
            reason: format!("no unused name after {} attempts", MAX_NAME_ATTEMPTS),
        })
    }

    async fn provision_and_admit(&self, name: &NodeId) -> Result<Member, BalancerError> {
        self.state
            .write()
            .await
            .in_flight
            .insert(name.clone(), NodeState::Provisioning);

        let address = match self.provision_with_timeout(name).await {
            Ok(address) => address,
            Err(e) => {
                self.state.write().await.in_flight.remove(name);
                return Err(e);
            }
        };

        let admitted = {
            let mut state = self.state.write().await;
            state.in_flight.remove(name);
            self.admit(&mut state, name.clone(), address)
        };

        match admitted {
            Ok(member) => {
                tracing::info!("Admitted {} at {}", member.id, member.address);
                Ok(member)
            }
            Err(e) => {
                // Provisioned but could not be placed; do not leak the backend.
                if let Err(cleanup) = self.deprovision_with_timeout(name).await {
                    tracing::warn!("Cleanup of unplaced node {} failed: {}", name, cleanup);
                }
                Err(BalancerError::ProvisioningFailed {
                    node: name.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Puts `name` on the ring with a fresh load count. Called with the write lock held.
    fn admit(
        &self,
        state: &mut ClusterState,
        name: NodeId,
        address: String,
    ) -> Result<Member, BalancerError> {
        state.ring.insert(&name)?;
        self.load.forget(&name);

        let member = Member {
            id: name.clone(),
            address,
            admitted_seq: state.next_seq,
            admitted_at: now_ms(),
        };
        state.next_seq += 1;
        state.members.insert(name, member.clone());
        Ok(member)
    }

    async fn provision_with_timeout(&self, name: &NodeId) -> Result<String, BalancerError> {
        match tokio::time::timeout(self.provision_timeout, self.provisioner.provision(name)).await
        {
            Ok(Ok(address)) => Ok(address),
            Ok(Err(e)) => Err(BalancerError::ProvisioningFailed {
                node: name.clone(),
                reason: e.to_string(),
            }),
            Err(_) => Err(BalancerError::ProvisioningFailed {
                node: name.clone(),
                reason: format!("timed out after {:?}", self.provision_timeout),
            }),
        }
    }

    async fn deprovision_with_timeout(&self, name: &NodeId) -> Result<(), String> {
        match tokio::time::timeout(self.provision_timeout, self.provisioner.deprovision(name))
            .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("timed out after {:?}", self.provision_timeout)),
        }
    }
}

fn validate_batch(count: usize, preferred: &[String]) -> Result<(), BalancerError> {
    if count == 0 {
        return Err(BalancerError::InvalidRequest(
            "'n' must be a positive integer".to_string(),
        ));
    }
    if preferred.len() > count {
        return Err(BalancerError::InvalidRequest(
            "length of hostname list exceeds 'n'".to_string(),
        ));
    }
    if let Some(bad) = preferred.iter().find(|name| !is_valid_hostname(name)) {
        return Err(BalancerError::InvalidRequest(format!(
            "invalid hostname '{}'",
            bad
        )));
    }
    Ok(())
}

fn is_valid_hostname(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
