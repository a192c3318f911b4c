#![deny(warnings)]

//! Achievement rules for the calculator.
//!
//! The rule table and [`evaluate`] are pure functions of [`UserStats`].
//! [`AchievementTracker`] owns the mutable counters and unlock flags; the
//! caller decides what to do with the ids it reports as newly unlocked
//! (notify, log, persist).

mod tracker;

pub use tracker::{
    AchievementTracker, PendingAchievement, ProgressSummary, SavedAchievement, SavedProgress,
};

use cod_core::UserStats;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum AchievementError {
    #[error("unknown achievement id: {0}")]
    Unknown(String),
}

/// Fixed achievement identifiers, in display order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementId {
    FirstCalculation,
    ScenarioExplorer,
    HighStakesAnalyst,
    TimeMaster,
    CostAwarenessExpert,
    OptimizationGuru,
    MarginMaster,
    GrowthVisionary,
}

impl AchievementId {
    pub const ALL: [AchievementId; 8] = [
        AchievementId::FirstCalculation,
        AchievementId::ScenarioExplorer,
        AchievementId::HighStakesAnalyst,
        AchievementId::TimeMaster,
        AchievementId::CostAwarenessExpert,
        AchievementId::OptimizationGuru,
        AchievementId::MarginMaster,
        AchievementId::GrowthVisionary,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AchievementId::FirstCalculation => "first_calculation",
            AchievementId::ScenarioExplorer => "scenario_explorer",
            AchievementId::HighStakesAnalyst => "high_stakes_analyst",
            AchievementId::TimeMaster => "time_master",
            AchievementId::CostAwarenessExpert => "cost_awareness_expert",
            AchievementId::OptimizationGuru => "optimization_guru",
            AchievementId::MarginMaster => "margin_master",
            AchievementId::GrowthVisionary => "growth_visionary",
        }
    }

    /// Display metadata, passed through to notifications untouched.
    pub fn meta(self) -> AchievementMeta {
        let (title, description, icon, color) = match self {
            AchievementId::FirstCalculation => (
                "Strategic Thinker",
                "Completed your first cost analysis",
                "🎯",
                "blue-primary",
            ),
            AchievementId::ScenarioExplorer => (
                "Scenario Explorer",
                "Tested different revenue scenarios",
                "🔍",
                "blue-light",
            ),
            AchievementId::HighStakesAnalyst => (
                "High Stakes Analyst",
                "Analyzed enterprise-scale scenarios (€5M+)",
                "💼",
                "green-primary",
            ),
            AchievementId::TimeMaster => (
                "Time Value Master",
                "Explored impact of extended delays",
                "⏰",
                "blue-dark",
            ),
            AchievementId::CostAwarenessExpert => (
                "Cost Awareness Expert",
                "Discovered costs exceeding €1M",
                "💰",
                "orange-warning",
            ),
            AchievementId::OptimizationGuru => (
                "Optimization Guru",
                "Explored multiple parameter combinations",
                "⚡",
                "green-primary",
            ),
            AchievementId::MarginMaster => (
                "Margin Master",
                "Analyzed high-margin scenarios (20%+)",
                "📈",
                "blue-primary",
            ),
            AchievementId::GrowthVisionary => (
                "Growth Visionary",
                "Explored aggressive growth scenarios (25%+)",
                "🚀",
                "blue-light",
            ),
        };
        AchievementMeta {
            id: self,
            title,
            description,
            icon,
            color,
        }
    }

    /// Unlock condition from the rule table.
    pub fn requirement(self) -> Requirement {
        use Requirement::AtLeast;
        match self {
            AchievementId::FirstCalculation => AtLeast(Stat::CalculationsCompleted, 1.0),
            AchievementId::ScenarioExplorer => AtLeast(Stat::RevenueChanges, 3.0),
            AchievementId::HighStakesAnalyst => AtLeast(Stat::MaxRevenueTested, 5_000_000.0),
            AchievementId::TimeMaster => AtLeast(Stat::MaxDelayTested, 12.0),
            AchievementId::CostAwarenessExpert => AtLeast(Stat::MaxCostDiscovered, 1_000_000.0),
            AchievementId::OptimizationGuru => Requirement::TotalChangesAtLeast(15),
            AchievementId::MarginMaster => AtLeast(Stat::MaxMarginTested, 20.0),
            AchievementId::GrowthVisionary => AtLeast(Stat::MaxGrowthTested, 25.0),
        }
    }
}

impl fmt::Display for AchievementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AchievementId {
    type Err = AchievementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AchievementId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| AchievementError::Unknown(s.to_string()))
    }
}

/// Human-facing metadata for one achievement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct AchievementMeta {
    pub id: AchievementId,
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
}

/// Notification payload emitted once per unlock.
pub type AchievementUnlocked = AchievementMeta;

/// A single counter or running maximum in [`UserStats`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stat {
    CalculationsCompleted,
    RevenueChanges,
    MaxRevenueTested,
    MaxDelayTested,
    MaxCostDiscovered,
    MaxMarginTested,
    MaxGrowthTested,
}

impl Stat {
    pub fn read(self, stats: &UserStats) -> f64 {
        match self {
            Stat::CalculationsCompleted => stats.calculations_completed as f64,
            Stat::RevenueChanges => stats.revenue_changes as f64,
            Stat::MaxRevenueTested => stats.max_revenue_tested,
            Stat::MaxDelayTested => stats.max_delay_tested,
            Stat::MaxCostDiscovered => stats.max_cost_discovered,
            Stat::MaxMarginTested => stats.max_margin_tested,
            Stat::MaxGrowthTested => stats.max_growth_tested,
        }
    }
}

/// Inclusive threshold predicate over [`UserStats`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Requirement {
    AtLeast(Stat, f64),
    /// Sum of the four slider change counters.
    TotalChangesAtLeast(u64),
}

impl Requirement {
    pub fn current(&self, stats: &UserStats) -> f64 {
        match self {
            Requirement::AtLeast(stat, _) => stat.read(stats),
            Requirement::TotalChangesAtLeast(_) => stats.total_changes() as f64,
        }
    }

    pub fn threshold(&self) -> f64 {
        match self {
            Requirement::AtLeast(_, t) => *t,
            Requirement::TotalChangesAtLeast(t) => *t as f64,
        }
    }

    pub fn is_met(&self, stats: &UserStats) -> bool {
        self.current(stats) >= self.threshold()
    }

    /// Partial progress in `[0, 1]`.
    pub fn progress(&self, stats: &UserStats) -> f64 {
        (self.current(stats) / self.threshold()).clamp(0.0, 1.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementStatus {
    pub unlocked: bool,
}

/// Unlock flag per achievement. Flags only ever go from locked to unlocked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AchievementState {
    statuses: BTreeMap<AchievementId, AchievementStatus>,
}

impl Default for AchievementState {
    fn default() -> Self {
        Self {
            statuses: AchievementId::ALL
                .into_iter()
                .map(|id| (id, AchievementStatus::default()))
                .collect(),
        }
    }
}

impl AchievementState {
    pub fn is_unlocked(&self, id: AchievementId) -> bool {
        self.statuses.get(&id).is_some_and(|s| s.unlocked)
    }

    /// Mark `id` unlocked; returns whether this call made the transition.
    pub fn unlock(&mut self, id: AchievementId) -> bool {
        let status = self.statuses.entry(id).or_default();
        let was_locked = !status.unlocked;
        status.unlocked = true;
        was_locked
    }

    pub fn iter(&self) -> impl Iterator<Item = (AchievementId, AchievementStatus)> + '_ {
        self.statuses.iter().map(|(id, s)| (*id, *s))
    }

    pub fn unlocked(&self) -> impl Iterator<Item = AchievementId> + '_ {
        self.iter().filter(|(_, s)| s.unlocked).map(|(id, _)| id)
    }

    pub fn unlocked_count(&self) -> usize {
        self.unlocked().count()
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    /// Unlock every locked achievement whose requirement now holds.
    ///
    /// Returns the ids that transitioned, in display order.
    pub fn absorb(&mut self, stats: &UserStats) -> Vec<AchievementId> {
        let mut newly = Vec::new();
        for id in AchievementId::ALL {
            if !self.is_unlocked(id) && id.requirement().is_met(stats) {
                self.unlock(id);
                newly.push(id);
            }
        }
        newly
    }
}

/// Pure evaluation of the rule table against a stats snapshot.
pub fn evaluate(stats: &UserStats) -> AchievementState {
    let mut state = AchievementState::default();
    state.absorb(stats);
    state
}

/// Progress towards `id`; 1 once the requirement is met.
pub fn progress(id: AchievementId, stats: &UserStats) -> f64 {
    id.requirement().progress(stats)
}
