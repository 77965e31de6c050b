use std::{collections::BTreeMap, sync::Arc};

use chrono::Utc;
use fleet_types::{ActionKind, ClusterState, HistoricalMetric, LastAction, Market, ScalingConfig, ScalingNotification};

use crate::collaborators::{ClusterRegistry, ComputeProvider, Notifier};
use crate::decision::{self, InProgressEvidence};
use crate::drainer::{DrainCandidate, Drainer};
use crate::metrics_source::MetricsSourceAdapter;
use crate::provisioner::Provisioner;
use crate::state::{DistributedLock, StateStore};
use crate::util::{Error, now_epoch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    LockContended,
    Noop,
    ScaledUp,
    ScaledDown,
}

/// The control-loop driver: on each tick, acquires the lock, runs
/// the Decision Engine, dispatches to the Provisioner or Drainer, updates
/// state, and emits a notification.
pub struct Reconciler {
    config: ScalingConfig,
    holder_id: String,
    lock: DistributedLock,
    store: StateStore,
    metrics_source: MetricsSourceAdapter,
    provider: Arc<dyn ComputeProvider>,
    registry: Arc<ClusterRegistry>,
    provisioner: Provisioner,
    drainer: Drainer,
    notifier: Notifier,
}

impl Reconciler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ScalingConfig,
        lock: DistributedLock,
        store: StateStore,
        metrics_source: MetricsSourceAdapter,
        provider: Arc<dyn ComputeProvider>,
        registry: Arc<ClusterRegistry>,
        provisioner: Provisioner,
        drainer: Drainer,
        notifier: Notifier,
    ) -> Self {
        Self {
            holder_id: format!("{}-{}", config.cluster_id, uuid::Uuid::new_v4()),
            config,
            lock,
            store,
            metrics_source,
            provider,
            registry,
            provisioner,
            drainer,
            notifier,
        }
    }

    pub async fn tick(&self) -> Result<TickOutcome, Error> {
        let now = Utc::now();
        let now_secs = now.timestamp();

        let Some(_guard) = self
            .lock
            .try_acquire(&self.config.cluster_id, &self.holder_id, now_secs, self.config.lock_ttl_secs)
            .await?
        else {
            tracing::info!(cluster_id = %self.config.cluster_id, "lock contended, skipping tick");
            return Ok(TickOutcome::LockContended);
        };

        let outcome = self.reconcile_under_lock(now_secs).await;

        // The lock is released whether or not reconciliation succeeded.
        // Lock *expiry* recovery only matters when release itself cannot
        // happen (process death), not when we're still alive to clean up.
        if let Err(e) = self.lock.release(&self.config.cluster_id, &self.holder_id).await {
            tracing::warn!(error = %e, "failed to release lock");
        }

        outcome
    }

    async fn reconcile_under_lock(&self, now_secs: i64) -> Result<TickOutcome, Error> {
        let before = chrono::DateTime::<Utc>::from_timestamp(now_secs, 0).unwrap_or_else(Utc::now);

        let mut state = match self.store.get_state(&self.config.cluster_id).await? {
            Some(s) => s,
            None => ClusterState::new(&self.config.cluster_id, self.config.min_workers),
        };

        let recovered_from_expiry = state
            .lock
            .as_ref()
            .is_some_and(|l| l.expires_at < now_secs);

        let inventory = self.provider.list_instances(&self.config.cluster_id).await?;
        let observed_count = inventory.len() as u32;
        if observed_count != state.desired_worker_count {
            tracing::info!(
                cluster_id = %self.config.cluster_id,
                desired = state.desired_worker_count,
                observed = observed_count,
                "self-healing desired_worker_count against provider inventory"
            );
            state.desired_worker_count = observed_count;
        }
        let before_count = state.desired_worker_count;

        let sample = match self
            .metrics_source
            .sample(
                std::time::Duration::from_secs(self.config.metrics_query_deadline_secs),
                now_secs,
                self.config.enable_custom_metrics,
            )
            .await
        {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(cluster_id = %self.config.cluster_id, error = %e, "metrics unavailable, aborting tick without state mutation");
                return Err(e);
            }
        };

        state.push_history(sample.to_history_entry(), self.config.history_size);

        let forecast_history = if self.config.enable_predictive {
            self.store.query_historical(&self.config.cluster_id).await?
        } else {
            Vec::new()
        };

        let ready_nodes = self.registry.list_tagged_nodes(&self.config.cluster_id).await?.len() as u32;
        let evidence = InProgressEvidence {
            stuck_instances: recovered_from_expiry && observed_count != ready_nodes,
        };

        let intent = decision::decide(
            &self.config,
            &state,
            &sample,
            &state.metric_history,
            &forecast_history,
            before,
            evidence,
        );

        let mut outcome = TickOutcome::Noop;
        let mut zone_breakdown: BTreeMap<String, u32> = BTreeMap::new();
        let mut market_breakdown: BTreeMap<String, u32> = BTreeMap::new();

        match intent.action {
            ActionKind::Up => {
                let result = self.provisioner.add(intent.magnitude, intent.urgency).await?;
                let newly_joined = result.joined.len() as u32;
                state.desired_worker_count += newly_joined;
                if newly_joined > 0 {
                    state.cooldown_up_until = now_secs + self.config.cooldown_up_secs;
                    state.last_action = LastAction {
                        kind: ActionKind::Up,
                        at: now_secs,
                        reason: intent.reason.to_string(),
                    };
                    outcome = TickOutcome::ScaledUp;
                }
            }
            ActionKind::Down => {
                let mut candidates = Vec::with_capacity(inventory.len());
                for w in &inventory {
                    let signal = self.registry.drain_signal_for_node(&w.instance_id).await?;
                    candidates.push(DrainCandidate {
                        instance_id: w.instance_id.clone(),
                        zone: w.zone.clone(),
                        non_system_pod_count: signal.non_system_pod_count,
                        hosts_unready_singleton: signal.hosts_unready_singleton,
                        violates_disruption_budget: signal.violates_disruption_budget,
                        idle_since: w.join_time.unwrap_or(w.launch_time),
                    });
                }
                let victims = crate::drainer::select_victims(&candidates, intent.magnitude);
                let drain_outcomes = self.drainer.remove(&victims).await?;
                let terminated = drain_outcomes
                    .iter()
                    .filter(|o| matches!(o, crate::drainer::DrainOutcome::Terminated { .. }))
                    .count() as u32;
                if terminated > 0 {
                    state.desired_worker_count = state.desired_worker_count.saturating_sub(terminated);
                    state.cooldown_down_until = now_secs + self.config.cooldown_down_secs;
                    state.last_action = LastAction {
                        kind: ActionKind::Down,
                        at: now_secs,
                        reason: intent.reason.to_string(),
                    };
                    outcome = TickOutcome::ScaledDown;
                } else if drain_outcomes
                    .iter()
                    .any(|o| matches!(o, crate::drainer::DrainOutcome::Aborted { .. }))
                {
                    state.last_action = LastAction {
                        kind: ActionKind::Noop,
                        at: now_secs,
                        reason: "DRAIN_TIMEOUT".to_string(),
                    };
                }
            }
            ActionKind::Noop => {
                state.last_action = LastAction {
                    kind: ActionKind::Noop,
                    at: now_secs,
                    reason: intent.reason.to_string(),
                };
            }
        }

        for instance in self.provider.list_instances(&self.config.cluster_id).await? {
            *zone_breakdown.entry(instance.zone).or_insert(0) += 1;
            let key = match instance.market {
                Market::Spot => "spot",
                Market::OnDemand => "on_demand",
            };
            *market_breakdown.entry(key.to_string()).or_insert(0) += 1;
        }

        self.store.put_state(&state).await?;
        self.store.append_audit_event(&self.config.cluster_id, &state).await?;
        self.store
            .append_historical(&HistoricalMetric {
                timestamp: before,
                cluster_id: self.config.cluster_id.clone(),
                hour_of_day: chrono::Timelike::hour(&before) as u8,
                day_of_week: chrono::Datelike::weekday(&before).num_days_from_monday() as u8,
                cpu_pct: sample.cpu_pct,
                pending_pods: sample.pending_pods,
                ttl: now_secs + 30 * 24 * 3600,
            })
            .await?;

        let duration_ms = (Utc::now().timestamp_millis() - before.timestamp_millis()).max(0) as u64;
        self.notifier
            .notify(&ScalingNotification::new(
                intent.action,
                intent.magnitude,
                intent.reason,
                before_count,
                state.desired_worker_count,
                zone_breakdown,
                market_breakdown,
                duration_ms,
            ))
            .await;

        Ok(outcome)
    }
}

pub fn new_holder_id(cluster_id: &str) -> String {
    format!("{}-{}-{}", cluster_id, uuid::Uuid::new_v4(), now_epoch())
}
