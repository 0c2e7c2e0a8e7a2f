//! Append-only audit history
//!
//! Every plan commit, decision, challenge transition and need retirement is
//! recorded with a time-ordered event id and a wall-clock stamp. The stamps
//! are for audit only; nothing in allocation or governance reads them.

use std::io::Write;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use worldgame_common::{
    ChallengeId, ChallengeResolution, ChallengeState, ChallengeType, Day, Decision, NeedId,
    NeedStatus, PlanId, PlanKind, PlanScores, ProposalId, StrategyKind,
};

use crate::CapacityAdjustment;

/// Recorded engine event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HistoryEvent {
    PlanCommitted {
        plan: PlanId,
        kind: PlanKind,
        strategy: StrategyKind,
        scores: PlanScores,
        confidence: f64,
        fallback: bool,
        /// Capacity overruns scaled down during the commit
        adjustments: Vec<CapacityAdjustment>,
    },
    ProposalCreated {
        proposal: ProposalId,
        title: String,
        eligible_voters: usize,
        deadline: Day,
    },
    DecisionRecorded(Decision),
    ChallengeDetected {
        challenge: ChallengeId,
        challenge_type: ChallengeType,
        severity: f64,
        coordination_complexity: f64,
    },
    ChallengeTransition {
        challenge: ChallengeId,
        from: ChallengeState,
        to: ChallengeState,
    },
    ChallengeResolved(ChallengeResolution),
    NeedRetired {
        need: NeedId,
        status: NeedStatus,
        satisfaction: f64,
    },
}

/// One history line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub day: Day,
    #[serde(flatten)]
    pub event: HistoryEvent,
}

#[derive(Debug, Default)]
pub struct History {
    entries: RwLock<Vec<HistoryEntry>>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, day: Day, event: HistoryEvent) {
        self.entries.write().push(HistoryEntry {
            id: Uuid::now_v7(),
            recorded_at: Utc::now(),
            day,
            event,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.read().clone()
    }

    /// Entries matching a predicate, in recording order
    pub fn filter<F>(&self, predicate: F) -> Vec<HistoryEntry>
    where
        F: Fn(&HistoryEvent) -> bool,
    {
        self.entries
            .read()
            .iter()
            .filter(|entry| predicate(&entry.event))
            .cloned()
            .collect()
    }

    /// All recorded decisions
    pub fn decisions(&self) -> Vec<Decision> {
        self.entries
            .read()
            .iter()
            .filter_map(|entry| match &entry.event {
                HistoryEvent::DecisionRecorded(decision) => Some(decision.clone()),
                _ => None,
            })
            .collect()
    }

    /// All recorded challenge resolutions
    pub fn resolutions(&self) -> Vec<ChallengeResolution> {
        self.entries
            .read()
            .iter()
            .filter_map(|entry| match &entry.event {
                HistoryEvent::ChallengeResolved(resolution) => Some(resolution.clone()),
                _ => None,
            })
            .collect()
    }

    /// Write one JSON object per line
    pub fn write_json_lines<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        for entry in self.entries.read().iter() {
            serde_json::to_writer(&mut writer, entry)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()
    }
}
