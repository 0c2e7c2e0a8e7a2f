//! # World Game Ledger
//!
//! Single authoritative store for every entity of a simulation run.
//!
//! ## Components
//!
//! - **ResourceLedger**: capacities, regeneration and per-need allocations
//! - **DemandRegistry**: needs and communities, indexed by region
//! - **NetworkTopology**: trust-weighted community graph
//! - **History**: append-only audit trail
//!
//! ## Atomic Commit
//!
//! [`Ledger::commit_allocation`] validates every reference in a plan, then
//! applies the whole plan under one write guard:
//!
//! ```text
//! 1. clear prior allocations of every need the plan covers
//! 2. write plan quantities (negative / non-finite → 0)
//! 3. scale any over-committed resource by available / requested
//! 4. recompute fulfilment and satisfaction of every touched need
//! ```
//!
//! Readers never observe a partially applied plan.

pub mod history;
pub mod registry;
pub mod resources;
pub mod topology;

pub use history::{History, HistoryEntry, HistoryEvent};
pub use registry::DemandRegistry;
pub use resources::ResourceLedger;
pub use topology::{NetworkTopology, TrustLink};

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use worldgame_common::{
    AllocationPlan, Community, CommunityId, Day, EntityKind, LedgerError, Need, NeedId, NeedStatus,
    PlanId, Resource, ResourceCategory, ResourceId, ALLOCATION_EPSILON,
};

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Regeneration ceiling as a multiple of registered capacity
    pub regeneration_ceiling_factor: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            regeneration_ceiling_factor: 2.0,
        }
    }
}

/// Everything the ledger owns, guarded as one unit
#[derive(Debug, Clone)]
pub struct LedgerState {
    pub resources: ResourceLedger,
    pub registry: DemandRegistry,
    pub topology: NetworkTopology,
    pub day: Day,
}

/// A resource whose commit exceeded capacity and was scaled down
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityAdjustment {
    pub resource: ResourceId,
    pub requested: f64,
    pub available: f64,
    /// Factor applied to every allocation on the resource
    pub scale: f64,
}

impl CapacityAdjustment {
    pub fn to_error(&self) -> LedgerError {
        LedgerError::InsufficientResource {
            resource_id: self.resource.clone(),
            requested: self.requested,
            available: self.available,
        }
    }
}

/// Outcome of a successful commit
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReport {
    pub plan: PlanId,
    /// Quantity written before any down-scaling
    pub written: f64,
    pub needs_touched: usize,
    pub adjustments: Vec<CapacityAdjustment>,
}

/// Serializable copy of the ledger for audit and replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub day: Day,
    pub resources: Vec<Resource>,
    pub needs: Vec<Need>,
    pub communities: Vec<Community>,
    pub links: Vec<TrustLink>,
}

/// Authoritative ledger facade
pub struct Ledger {
    config: LedgerConfig,
    state: RwLock<LedgerState>,
    history: History,
}

impl Ledger {
    pub fn new(config: LedgerConfig) -> Self {
        let state = LedgerState {
            resources: ResourceLedger::new(config.regeneration_ceiling_factor),
            registry: DemandRegistry::new(),
            topology: NetworkTopology::new(),
            day: 0,
        };
        Self {
            config,
            state: RwLock::new(state),
            history: History::new(),
        }
    }

    /// Rebuild a ledger from a snapshot, checking every cross-reference
    pub fn from_snapshot(config: LedgerConfig, snapshot: LedgerSnapshot) -> Result<Self, LedgerError> {
        let ledger = Self::new(config);
        for community in snapshot.communities {
            ledger.register_community(community)?;
        }
        for need in snapshot.needs {
            ledger.register_need(need)?;
        }
        for resource in snapshot.resources {
            ledger.register_resource(resource)?;
        }
        for link in snapshot.links {
            ledger.connect(&link.a, &link.b, link.trust)?;
        }

        {
            let mut state = ledger.state.write();
            state.day = snapshot.day;
            let mut referenced = BTreeSet::new();
            for resource in state.resources.iter() {
                for need in resource.allocations.keys() {
                    state.registry.need(need)?;
                    referenced.insert(need.clone());
                }
            }
            recompute_fulfilment(&mut state, &referenced);
        }
        Ok(ledger)
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn register_resource(&self, resource: Resource) -> Result<(), LedgerError> {
        self.state.write().resources.register(resource)
    }

    pub fn register_need(&self, need: Need) -> Result<(), LedgerError> {
        self.state.write().registry.register_need(need)
    }

    /// Register a community and add it to the topology
    pub fn register_community(&self, community: Community) -> Result<(), LedgerError> {
        let mut state = self.state.write();
        let (id, region) = (community.id.clone(), community.region.clone());
        state.registry.register_community(community)?;
        state.topology.add_node(id, region);
        Ok(())
    }

    pub fn connect(&self, a: &CommunityId, b: &CommunityId, trust: f64) -> Result<(), LedgerError> {
        self.state.write().topology.connect(a, b, trust)
    }

    /// Run a closure against a consistent view of the ledger
    pub fn read<R>(&self, f: impl FnOnce(&LedgerState) -> R) -> R {
        f(&self.state.read())
    }

    pub fn day(&self) -> Day {
        self.state.read().day
    }

    pub fn set_day(&self, day: Day) {
        self.state.write().day = day;
    }

    pub fn resource(&self, id: &ResourceId) -> Result<Resource, LedgerError> {
        self.state.read().resources.get(id).cloned()
    }

    pub fn need(&self, id: &NeedId) -> Result<Need, LedgerError> {
        self.state.read().registry.need(id).cloned()
    }

    pub fn community(&self, id: &CommunityId) -> Result<Community, LedgerError> {
        self.state.read().registry.community(id).cloned()
    }

    pub fn utilization(&self, id: &ResourceId) -> Result<f64, LedgerError> {
        self.state.read().resources.utilization(id)
    }

    pub fn apply_daily_regeneration(&self) {
        self.state.write().resources.apply_daily_regeneration();
    }

    /// Apply a plan atomically
    #[instrument(skip(self, plan), fields(plan = %plan.id))]
    pub fn commit_allocation(&self, plan: &AllocationPlan) -> Result<CommitReport, LedgerError> {
        let mut state = self.state.write();

        // Reject before writing anything
        check_plan(&state, plan)?;

        let covered: BTreeSet<NeedId> = plan
            .covered_needs
            .iter()
            .chain(plan.quantities.keys())
            .filter(|id| state.registry.need(id).map(|n| n.is_active()).unwrap_or(false))
            .cloned()
            .collect();

        let mut touched_resources = BTreeSet::new();
        for resource in state.resources.iter_mut() {
            let before = resource.allocations.len();
            resource.allocations.retain(|need, _| !covered.contains(need));
            if resource.allocations.len() != before {
                touched_resources.insert(resource.id.clone());
            }
        }

        let mut written = 0.0;
        for (need, per_resource) in &plan.quantities {
            if !covered.contains(need) {
                debug!(need = %need, "Skipping quantities for retired need");
                continue;
            }
            for (resource_id, quantity) in per_resource {
                let quantity = if quantity.is_finite() { quantity.max(0.0) } else { 0.0 };
                if quantity <= ALLOCATION_EPSILON {
                    continue;
                }
                let resource = state.resources.get_mut(resource_id)?;
                *resource.allocations.entry(need.clone()).or_insert(0.0) += quantity;
                touched_resources.insert(resource_id.clone());
                written += quantity;
            }
        }

        let mut adjustments = Vec::new();
        let mut touched_needs = covered;
        for resource_id in &touched_resources {
            let resource = state.resources.get_mut(resource_id)?;
            let requested = resource.allocated_total();
            let available = resource.total_available.max(0.0);
            if requested > available {
                // Shrink slightly past the exact ratio so rounding cannot overshoot
                let scale = (available / requested) * (1.0 - 1e-12);
                for quantity in resource.allocations.values_mut() {
                    *quantity *= scale;
                }
                let adjustment = CapacityAdjustment {
                    resource: resource_id.clone(),
                    requested,
                    available,
                    scale,
                };
                warn!(
                    resource = %resource_id,
                    requested,
                    available,
                    "{}; scaled competing allocations",
                    adjustment.to_error()
                );
                touched_needs.extend(resource.allocations.keys().cloned());
                adjustments.push(adjustment);
            }
            resource.prune_allocations();
        }

        recompute_fulfilment(&mut state, &touched_needs);
        let day = state.day;
        drop(state);

        info!(
            written,
            needs = touched_needs.len(),
            adjustments = adjustments.len(),
            "Committed allocation plan"
        );
        self.history.record(
            day,
            HistoryEvent::PlanCommitted {
                plan: plan.id,
                kind: plan.kind.clone(),
                strategy: plan.strategy,
                scores: plan.scores,
                confidence: plan.confidence,
                fallback: plan.fallback,
                adjustments: adjustments.clone(),
            },
        );

        Ok(CommitReport {
            plan: plan.id,
            written,
            needs_touched: touched_needs.len(),
            adjustments,
        })
    }

    /// Check that every need and resource a plan names exists
    ///
    /// Records are never removed, so a plan that passes stays committable.
    pub fn validate_plan(&self, plan: &AllocationPlan) -> Result<(), LedgerError> {
        check_plan(&self.state.read(), plan)
    }

    /// Drop every allocation held by a need; returns the released quantity
    pub fn release_need(&self, id: &NeedId) -> Result<f64, LedgerError> {
        let mut state = self.state.write();
        let released = release_allocations(&mut state, id)?;
        debug!(need = %id, released, "Released need allocations");
        Ok(released)
    }

    /// Close a need with a final status and free its allocations
    pub fn retire_need(&self, id: &NeedId, status: NeedStatus) -> Result<(), LedgerError> {
        let mut state = self.state.write();
        let need = state.registry.need_mut(id)?;
        if !need.is_active() {
            return Ok(());
        }
        need.status = status;
        let satisfaction = need.satisfaction;
        release_allocations(&mut state, id)?;
        let day = state.day;
        drop(state);

        self.history.record(
            day,
            HistoryEvent::NeedRetired {
                need: id.clone(),
                status,
                satisfaction,
            },
        );
        Ok(())
    }

    /// Retire satisfied needs and needs whose deadline passed unmet
    #[instrument(skip(self))]
    pub fn retire_needs(&self, day: Day) -> Vec<(NeedId, NeedStatus)> {
        let due: Vec<(NeedId, NeedStatus)> = self.read(|state| {
            state
                .registry
                .active_needs()
                .filter_map(|need| {
                    if need.satisfaction >= 1.0 {
                        Some((need.id.clone(), NeedStatus::Satisfied))
                    } else if need.deadline.map(|d| d < day).unwrap_or(false) {
                        Some((need.id.clone(), NeedStatus::Failed))
                    } else {
                        None
                    }
                })
                .collect()
        });

        for (id, status) in &due {
            if let Err(e) = self.retire_need(id, *status) {
                warn!(need = %id, error = %e, "Failed to retire need");
            }
        }
        if !due.is_empty() {
            info!(retired = due.len(), "Retired needs");
        }
        due
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let state = self.state.read();
        LedgerSnapshot {
            day: state.day,
            resources: state.resources.iter().cloned().collect(),
            needs: state.registry.needs().cloned().collect(),
            communities: state.registry.communities().cloned().collect(),
            links: state.topology.links(),
        }
    }
}

fn release_allocations(state: &mut LedgerState, id: &NeedId) -> Result<f64, LedgerError> {
    let need = state.registry.need(id)?;
    let active = need.is_active();
    let mut released = 0.0;
    for resource in state.resources.iter_mut() {
        if let Some(quantity) = resource.allocations.remove(id) {
            released += quantity;
        }
    }
    if active {
        recompute_fulfilment(state, &BTreeSet::from([id.clone()]));
    }
    Ok(released)
}

fn check_plan(state: &LedgerState, plan: &AllocationPlan) -> Result<(), LedgerError> {
    for need in plan.covered_needs.iter().chain(plan.quantities.keys()) {
        state.registry.need(need)?;
    }
    for per_resource in plan.quantities.values() {
        for resource in per_resource.keys() {
            state.resources.get(resource)?;
        }
    }
    Ok(())
}

/// Recompute fulfilled quantities and satisfaction for active needs in `needs`
fn recompute_fulfilment(state: &mut LedgerState, needs: &BTreeSet<NeedId>) {
    let mut fulfilled: BTreeMap<&NeedId, BTreeMap<ResourceCategory, f64>> =
        needs.iter().map(|id| (id, BTreeMap::new())).collect();

    for resource in state.resources.iter() {
        for (need, quantity) in &resource.allocations {
            if let Some(per_category) = fulfilled.get_mut(need) {
                *per_category.entry(resource.category).or_insert(0.0) += quantity;
            }
        }
    }

    for (id, per_category) in fulfilled {
        match state.registry.need_mut(id) {
            Ok(need) if need.is_active() => need.set_fulfilled(per_category),
            Ok(_) => {}
            Err(_) => warn!(need = %id, kind = %EntityKind::Need, "Allocation references unknown need"),
        }
    }
}
