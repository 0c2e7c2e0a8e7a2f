//! Challenge schedules, supplied or generated from a seed

use std::collections::BTreeMap;

use rand::seq::{index, SliceRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;
use worldgame_common::rng::{derive_seed, seeded_rng};
use worldgame_common::{ChallengeType, Day, RegionId, ResourceCategory};

use crate::ScheduleConfig;

/// Stream id of the schedule generator within a run seed
const SCHEDULE_STREAM: u64 = 0x5CED;

/// Everything needed to detect a challenge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeSpec {
    pub challenge_type: ChallengeType,
    pub severity: f64,
    pub affected_regions: Vec<RegionId>,
    /// Days until the challenge turns critical
    pub time_sensitivity: u32,
    /// Overrides the type's requirement template when present
    #[serde(default)]
    pub required_resources: Option<BTreeMap<ResourceCategory, f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledChallenge {
    pub day: Day,
    #[serde(flatten)]
    pub spec: ChallengeSpec,
}

/// Challenges to detect over a run, ordered by day
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChallengeSchedule {
    entries: Vec<ScheduledChallenge>,
}

impl ChallengeSchedule {
    pub fn new(mut entries: Vec<ScheduledChallenge>) -> Self {
        entries.sort_by_key(|e| e.day);
        Self { entries }
    }

    /// Generate 3-5 challenges spread over `[margin, days − margin)`
    ///
    /// Types and their severity / duration ranges:
    ///
    /// | Type | Severity | Days |
    /// |---|---|---|
    /// | Pandemic | 0.6-0.9 | 60-120 |
    /// | ClimateCrisis | 0.5-0.8 | 30-90 |
    /// | ResourceScarcity | 0.4-0.7 | 45-150 |
    pub fn generate(seed: u64, days: u32, regions: &[RegionId], config: &ScheduleConfig) -> Self {
        let mut rng = seeded_rng(derive_seed(seed, SCHEDULE_STREAM));

        let start = config.margin_days;
        let end = days.saturating_sub(config.margin_days);
        if end <= start || regions.is_empty() {
            info!(seed, days, "Run too short for a generated challenge schedule");
            return Self::default();
        }

        let window = (end - start) as usize;
        let lo = config.min_challenges.min(config.max_challenges);
        let count = rng.gen_range(lo..=config.max_challenges.max(lo)).min(window);
        let mut picked: Vec<u32> = index::sample(&mut rng, window, count)
            .into_iter()
            .map(|offset| start + offset as u32)
            .collect();
        picked.sort_unstable();

        let entries = picked
            .into_iter()
            .map(|day| {
                let (challenge_type, severity, time_sensitivity) = match rng.gen_range(0..3) {
                    0 => (ChallengeType::Pandemic, rng.gen_range(0.6..0.9), rng.gen_range(60..=120)),
                    1 => (ChallengeType::ClimateCrisis, rng.gen_range(0.5..0.8), rng.gen_range(30..=90)),
                    _ => (ChallengeType::ResourceScarcity, rng.gen_range(0.4..0.7), rng.gen_range(45..=150)),
                };
                let lo = config.min_regions.min(config.max_regions).max(1);
                let wanted = rng.gen_range(lo..=config.max_regions.max(lo)).min(regions.len());
                let mut affected: Vec<RegionId> = regions.choose_multiple(&mut rng, wanted).cloned().collect();
                affected.sort();

                ScheduledChallenge {
                    day,
                    spec: ChallengeSpec {
                        challenge_type,
                        severity,
                        affected_regions: affected,
                        time_sensitivity,
                        required_resources: None,
                    },
                }
            })
            .collect::<Vec<_>>();

        info!(seed, challenges = entries.len(), "Generated challenge schedule");
        Self { entries }
    }

    /// Challenges scheduled for `day`
    pub fn due_on(&self, day: Day) -> impl Iterator<Item = &ScheduledChallenge> {
        self.entries.iter().filter(move |e| e.day == day)
    }

    pub fn entries(&self) -> &[ScheduledChallenge] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
