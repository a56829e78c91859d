use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

use super::probe::{Liveness, LivenessProber};
use crate::membership::service::MembershipManager;
use crate::membership::types::{Member, NodeId};

/// Lower bound for the cycle interval; `tokio::time::interval` rejects zero.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// What one detection cycle did.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Members probed this cycle.
    pub probed: usize,
    /// Nodes evicted this cycle.
    pub failed: Vec<NodeId>,
    /// Replacements admitted this cycle, including retries from earlier cycles.
    pub replaced: Vec<Member>,
    /// Replacements still owed after this cycle.
    pub outstanding: usize,
}

pub struct FailureDetector {
    membership: Arc<MembershipManager>,
    prober: Arc<dyn LivenessProber>,
    interval: Duration,
    probe_timeout: Duration,
    failure_threshold: u32,
    /// Consecutive missed probes per node.
    missed: DashMap<NodeId, u32>,
    /// Replacements requested but not yet admitted.
    outstanding: AtomicUsize,
}

/// Running detector task.
///
/// Dropping the handle detaches the task, which then runs until the runtime shuts
/// down. Call `stop` to end it.
pub struct DetectorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DetectorHandle {
    /// Stops scheduling further cycles and waits for the one in progress to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!("Failure detector task ended abnormally: {}", e);
        }
    }
}

impl FailureDetector {
    pub fn new(
        membership: Arc<MembershipManager>,
        prober: Arc<dyn LivenessProber>,
        interval: Duration,
        probe_timeout: Duration,
        failure_threshold: u32,
    ) -> Arc<Self> {
        Arc::new(Self {
            membership,
            prober,
            interval: interval.max(MIN_INTERVAL),
            probe_timeout,
            failure_threshold: failure_threshold.max(1),
            missed: DashMap::new(),
            outstanding: AtomicUsize::new(0),
        })
    }

    /// Spawns the periodic loop. Shutdown is only observed between cycles.
    pub fn start(self: Arc<Self>) -> DetectorHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        tracing::info!(
            "Starting failure detector (interval={:?}, probe_timeout={:?}, threshold={})",
            self.interval,
            self.probe_timeout,
            self.failure_threshold
        );

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut detached = false;

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    changed = shutdown_rx.changed(), if !detached => {
                        if changed.is_ok() {
                            break;
                        }
                        tracing::debug!("Detector handle dropped, running detached");
                        detached = true;
                        continue;
                    }
                }

                let report = self.run_cycle().await;
                if !report.failed.is_empty() || report.outstanding > 0 {
                    tracing::info!(
                        "Detection cycle: probed={} failed={:?} replaced={} outstanding={}",
                        report.probed,
                        report.failed,
                        report.replaced.len(),
                        report.outstanding
                    );
                }
            }

            tracing::info!("Failure detector stopped");
        });

        DetectorHandle { shutdown, task }
    }

    pub fn outstanding_replacements(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn missed_probes(&self, node: &NodeId) -> u32 {
        self.missed.get(node).map(|count| *count).unwrap_or(0)
    }

    /// Runs one full probe/evict/replace cycle.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        self.retry_replacements(&mut report).await;

        let members = self.membership.members_snapshot().await;
        report.probed = members.len();
        self.missed
            .retain(|node, _| members.iter().any(|member| &member.id == node));

        let mut failed = Vec::new();
        for (member, liveness) in self.probe_all(members).await {
            match liveness {
                Liveness::Alive => {
                    self.missed.remove(&member.id);
                }
                Liveness::Dead => {
                    let misses = {
                        let mut count = self.missed.entry(member.id.clone()).or_insert(0);
                        *count += 1;
                        *count
                    };
                    tracing::warn!(
                        "Node {} missed a heartbeat ({}/{})",
                        member.id,
                        misses,
                        self.failure_threshold
                    );
                    if misses >= self.failure_threshold {
                        failed.push(member.id);
                    }
                }
            }
        }

        for node in failed {
            self.missed.remove(&node);
            if self.replace(&node, &mut report).await {
                report.failed.push(node);
            }
        }

        report.outstanding = self.outstanding_replacements();
        report
    }

    async fn probe_all(&self, members: Vec<Member>) -> Vec<(Member, Liveness)> {
        let mut probes = JoinSet::new();

        for member in members {
            let prober = self.prober.clone();
            let timeout = self.probe_timeout;
            probes.spawn(async move {
                let liveness =
                    match tokio::time::timeout(timeout, prober.probe(&member.address, timeout))
                        .await
                    {
                        Ok(liveness) => liveness,
                        Err(_) => Liveness::Dead,
                    };
                (member, liveness)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => tracing::error!("Probe task failed: {}", e),
            }
        }
        results
    }

    /// Evicts `node`, deprovisions it and asks for one replacement.
    /// Returns `false` if the node had already left the membership.
    async fn replace(&self, node: &NodeId, report: &mut CycleReport) -> bool {
        if self.membership.evict_failed(node).await.is_none() {
            tracing::debug!("Node {} already left the membership", node);
            return false;
        }

        // Best effort: the node is already off the ring.
        let _ = self.membership.retire(node).await;

        self.outstanding.fetch_add(1, Ordering::SeqCst);
        match self.membership.provision_replacement().await {
            Ok(member) => {
                self.outstanding.fetch_sub(1, Ordering::SeqCst);
                tracing::info!("Spawned replacement {} for {}", member.id, node);
                report.replaced.push(member);
            }
            Err(e) => {
                tracing::warn!("Failed to spawn replacement for {}: {}", node, e);
            }
        }
        true
    }

    async fn retry_replacements(&self, report: &mut CycleReport) {
        let owed = self.outstanding_replacements();
        for _ in 0..owed {
            match self.membership.provision_replacement().await {
                Ok(member) => {
                    self.outstanding.fetch_sub(1, Ordering::SeqCst);
                    tracing::info!("Spawned overdue replacement {}", member.id);
                    report.replaced.push(member);
                }
                Err(e) => {
                    tracing::warn!("Replacement retry failed, will try again: {}", e);
                    break;
                }
            }
        }
    }
}
