//! In-memory stand-ins for the provisioner, prober and backend used by unit tests.

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::detector::{Liveness, LivenessProber};
use crate::membership::policy::{RandomSelection, SelectionPolicy};
use crate::membership::service::MembershipManager;
use crate::membership::types::NodeId;
use crate::provisioner::NodeProvisioner;
use crate::ring::HashRing;
use crate::router::BackendClient;

pub const TEST_SLOTS: u32 = 512;
pub const TEST_VIRTUAL_NODES: u32 = 9;

pub fn address_of(name: &str) -> String {
    format!("fake://{}", name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionEvent {
    /// `members` is the live membership at the moment the provisioner was called.
    Provision { name: NodeId, members: Vec<NodeId> },
    Deprovision { name: NodeId },
}

#[derive(Default)]
pub struct FakeProvisioner {
    pub events: Mutex<Vec<ProvisionEvent>>,
    pub failing: Mutex<HashSet<String>>,
    pub fail_all: Mutex<bool>,
    pub failing_deprovision: Mutex<HashSet<String>>,
    pub delay: Mutex<Option<Duration>>,
    observed: Mutex<Option<Arc<MembershipManager>>>,
}

impl FakeProvisioner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Records the membership seen at every provision call.
    pub fn observe(&self, manager: Arc<MembershipManager>) {
        *self.observed.lock().unwrap() = Some(manager);
    }

    pub fn fail(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    pub fn set_fail_all(&self, fail: bool) {
        *self.fail_all.lock().unwrap() = fail;
    }

    pub fn fail_deprovision(&self, name: &str) {
        self.failing_deprovision
            .lock()
            .unwrap()
            .insert(name.to_string());
    }

    pub fn events(&self) -> Vec<ProvisionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn deprovisioned(&self) -> Vec<NodeId> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ProvisionEvent::Deprovision { name } => Some(name),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl NodeProvisioner for FakeProvisioner {
    async fn provision(&self, name: &NodeId) -> Result<String> {
        let observed = self.observed.lock().unwrap().clone();
        let members = match observed {
            Some(manager) => manager
                .members_snapshot()
                .await
                .into_iter()
                .map(|member| member.id)
                .collect(),
            None => Vec::new(),
        };
        self.events.lock().unwrap().push(ProvisionEvent::Provision {
            name: name.clone(),
            members,
        });

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.fail_all.lock().unwrap() || self.failing.lock().unwrap().contains(name.as_str())
        {
            bail!("container engine refused {}", name);
        }
        Ok(address_of(name.as_str()))
    }

    async fn deprovision(&self, name: &NodeId) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(ProvisionEvent::Deprovision { name: name.clone() });

        if self
            .failing_deprovision
            .lock()
            .unwrap()
            .contains(name.as_str())
        {
            bail!("container {} not found", name);
        }
        Ok(())
    }
}

/// Answers probes from a list of dead and hanging addresses.
#[derive(Default)]
pub struct FakeProber {
    pub dead: Mutex<HashSet<String>>,
    pub hanging: Mutex<HashSet<String>>,
}

impl FakeProber {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn kill(&self, name: &str) {
        self.dead.lock().unwrap().insert(address_of(name));
    }

    pub fn revive(&self, name: &str) {
        self.dead.lock().unwrap().remove(&address_of(name));
    }

    pub fn hang(&self, name: &str) {
        self.hanging.lock().unwrap().insert(address_of(name));
    }
}

#[async_trait]
impl LivenessProber for FakeProber {
    async fn probe(&self, address: &str, _timeout: Duration) -> Liveness {
        let hanging = self.hanging.lock().unwrap().contains(address);
        if hanging {
            std::future::pending::<()>().await;
        }
        if self.dead.lock().unwrap().contains(address) {
            Liveness::Dead
        } else {
            Liveness::Alive
        }
    }
}

/// Echoes the key and the address that served it.
#[derive(Default)]
pub struct FakeBackend {
    pub down: Mutex<HashSet<String>>,
    pub hanging: Mutex<HashSet<String>>,
    /// Addresses forwarded to, in call order.
    pub calls: Mutex<Vec<String>>,
    pub delay: Mutex<Option<Duration>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn take_down(&self, name: &str) {
        self.down.lock().unwrap().insert(address_of(name));
    }

    pub fn hang(&self, name: &str) {
        self.hanging.lock().unwrap().insert(address_of(name));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackendClient for FakeBackend {
    async fn forward(&self, address: &str, key: &str, _timeout: Duration) -> Result<Value> {
        self.calls.lock().unwrap().push(address.to_string());
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let hanging = self.hanging.lock().unwrap().contains(address);
        if hanging {
            std::future::pending::<()>().await;
        }
        if self.down.lock().unwrap().contains(address) {
            bail!("connection refused");
        }
        Ok(json!({ "message": format!("Key '{}' was handled by {}", key, address) }))
    }
}

pub fn manager_with(
    provisioner: Arc<FakeProvisioner>,
    policy: Arc<dyn SelectionPolicy>,
) -> Arc<MembershipManager> {
    let ring = HashRing::new(TEST_SLOTS, TEST_VIRTUAL_NODES).unwrap();
    MembershipManager::new(ring, provisioner, policy, Duration::from_millis(500))
}

pub fn manager(provisioner: Arc<FakeProvisioner>) -> Arc<MembershipManager> {
    manager_with(provisioner, Arc::new(RandomSelection))
}

/// Manager already holding `names`, admitted in order.
pub async fn manager_with_nodes(
    provisioner: Arc<FakeProvisioner>,
    names: &[&str],
) -> Arc<MembershipManager> {
    let manager = manager(provisioner);
    for name in names {
        manager
            .adopt(NodeId::from(*name), address_of(name))
            .await
            .unwrap();
    }
    manager
}
