//! Prometheus metrics for a simulation run

use prometheus::{Gauge, GaugeVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use worldgame_common::{AllocationPlan, ChallengeState, Decision};
use worldgame_ledger::LedgerState;

/// Engine metrics, registered in a run-owned [`Registry`]
pub struct EngineMetrics {
    pub day: IntGauge,
    pub resource_utilization: GaugeVec,
    pub active_needs: IntGauge,
    pub plans_committed: IntCounter,
    pub plan_objective: Gauge,
    pub plan_confidence: Gauge,
    pub capacity_adjustments: IntCounter,
    pub proposals_created: IntCounter,
    pub decisions: IntCounterVec,
    pub challenges_detected: IntCounter,
    pub challenges_resolved: IntCounterVec,
}

impl EngineMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            day: IntGauge::new("worldgame_day", "Current simulated day")?,
            resource_utilization: GaugeVec::new(
                Opts::new("worldgame_resource_utilization", "Allocated share of resource capacity"),
                &["resource"],
            )?,
            active_needs: IntGauge::new("worldgame_active_needs", "Needs still awaiting fulfilment")?,
            plans_committed: IntCounter::new(
                "worldgame_plans_committed_total",
                "Allocation plans written to the ledger",
            )?,
            plan_objective: Gauge::new(
                "worldgame_plan_objective",
                "Weighted objective of the last committed plan",
            )?,
            plan_confidence: Gauge::new(
                "worldgame_plan_confidence",
                "Confidence of the last committed plan",
            )?,
            capacity_adjustments: IntCounter::new(
                "worldgame_capacity_adjustments_total",
                "Resources scaled down during commits",
            )?,
            proposals_created: IntCounter::new(
                "worldgame_proposals_created_total",
                "Governance proposals opened",
            )?,
            decisions: IntCounterVec::new(
                Opts::new("worldgame_decisions_total", "Finalized proposals by outcome"),
                &["outcome"],
            )?,
            challenges_detected: IntCounter::new(
                "worldgame_challenges_detected_total",
                "Challenges detected",
            )?,
            challenges_resolved: IntCounterVec::new(
                Opts::new("worldgame_challenges_resolved_total", "Closed challenges by outcome"),
                &["outcome"],
            )?,
        })
    }

    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.day.clone()))?;
        registry.register(Box::new(self.resource_utilization.clone()))?;
        registry.register(Box::new(self.active_needs.clone()))?;
        registry.register(Box::new(self.plans_committed.clone()))?;
        registry.register(Box::new(self.plan_objective.clone()))?;
        registry.register(Box::new(self.plan_confidence.clone()))?;
        registry.register(Box::new(self.capacity_adjustments.clone()))?;
        registry.register(Box::new(self.proposals_created.clone()))?;
        registry.register(Box::new(self.decisions.clone()))?;
        registry.register(Box::new(self.challenges_detected.clone()))?;
        registry.register(Box::new(self.challenges_resolved.clone()))?;
        Ok(())
    }

    /// Refresh gauges from a ledger view
    pub fn observe_ledger(&self, state: &LedgerState) {
        self.day.set(i64::from(state.day));
        for resource in state.resources.iter() {
            self.resource_utilization
                .with_label_values(&[resource.id.as_str()])
                .set(resource.utilization());
        }
        self.active_needs.set(state.registry.active_needs().count() as i64);
    }

    pub fn observe_commit(&self, plan: &AllocationPlan, adjustments: usize) {
        self.plans_committed.inc();
        self.plan_objective.set(plan.scores.objective);
        self.plan_confidence.set(plan.confidence);
        self.capacity_adjustments.inc_by(adjustments as u64);
    }

    pub fn observe_decision(&self, decision: &Decision) {
        let outcome = if decision.is_approved() { "approved" } else { "rejected" };
        self.decisions.with_label_values(&[outcome]).inc();
    }

    pub fn observe_resolution(&self, outcome: ChallengeState) {
        let label = match outcome {
            ChallengeState::ResolvedSuccess => "success",
            ChallengeState::ResolvedFailure => "failure",
            ChallengeState::Expired => "expired",
            _ => return,
        };
        self.challenges_resolved.with_label_values(&[label]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Encoder;
    use worldgame_common::{Resource, ResourceCategory};
    use worldgame_ledger::{Ledger, LedgerConfig};

    #[test]
    fn test_register_and_export() {
        let registry = Registry::new();
        let metrics = EngineMetrics::new().unwrap();
        metrics.register(&registry).unwrap();

        let ledger = Ledger::new(LedgerConfig::default());
        ledger
            .register_resource(Resource::new("river", ResourceCategory::Water, 100.0))
            .unwrap();
        ledger.read(|s| metrics.observe_ledger(s));
        metrics.proposals_created.inc();

        let mut buffer = Vec::new();
        prometheus::TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("worldgame_resource_utilization{resource=\"river\"} 0"));
        assert!(text.contains("worldgame_proposals_created_total 1"));
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        let metrics = EngineMetrics::new().unwrap();
        metrics.register(&registry).unwrap();
        assert!(metrics.register(&registry).is_err());
    }
}
