use crate::{AchievementId, AchievementState};
use cod_core::{CalculatorInput, CostResult, Parameter, UserStats};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Persisted achievement progress.
///
/// Loading tolerates foreign shapes: unknown achievement ids and stat
/// fields are dropped, missing ones keep their defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SavedProgress {
    pub achievements: BTreeMap<String, SavedAchievement>,
    pub user_stats: UserStats,
    /// Epoch milliseconds of the last save.
    pub last_updated: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SavedAchievement {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub unlocked: bool,
}

/// Overall completion, for progress displays.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub unlocked: usize,
    pub total: usize,
    /// Unlocked share in percent.
    pub percentage: f64,
    pub user_stats: UserStats,
    pub session_duration_ms: i64,
}

/// A locked achievement and how close it is.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PendingAchievement {
    pub id: AchievementId,
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub progress: f64,
}

/// Owns the usage counters and unlock flags for one user.
#[derive(Clone, Debug, PartialEq)]
pub struct AchievementTracker {
    stats: UserStats,
    state: AchievementState,
}

impl AchievementTracker {
    pub fn new(session_start: i64) -> Self {
        Self {
            stats: UserStats::new(session_start),
            state: AchievementState::default(),
        }
    }

    /// Rebuild from a saved snapshot.
    pub fn from_saved(saved: SavedProgress) -> Self {
        let mut state = AchievementState::default();
        for (key, entry) in &saved.achievements {
            match key.parse::<AchievementId>() {
                Ok(id) if entry.unlocked => {
                    state.unlock(id);
                }
                Ok(_) => {}
                Err(e) => debug!(%e, "ignoring saved achievement"),
            }
        }
        Self {
            stats: saved.user_stats,
            state,
        }
    }

    pub fn stats(&self) -> &UserStats {
        &self.stats
    }

    pub fn state(&self) -> &AchievementState {
        &self.state
    }

    /// A slider moved to `value`.
    pub fn record_change(&mut self, parameter: Parameter, value: f64) -> Vec<AchievementId> {
        let s = &mut self.stats;
        match parameter {
            Parameter::Revenue => {
                s.revenue_changes += 1;
                raise(&mut s.max_revenue_tested, value);
            }
            Parameter::Margin => {
                s.margin_changes += 1;
                raise(&mut s.max_margin_tested, value);
            }
            Parameter::Growth => {
                s.growth_changes += 1;
                raise(&mut s.max_growth_tested, value);
            }
            Parameter::Delay => {
                s.delay_changes += 1;
                raise(&mut s.max_delay_tested, value);
            }
        }
        s.total_interactions += 1;
        self.state.absorb(&self.stats)
    }

    /// A calculation completed for `input`.
    pub fn record_calculation(
        &mut self,
        input: &CalculatorInput,
        result: &CostResult,
    ) -> Vec<AchievementId> {
        let s = &mut self.stats;
        s.calculations_completed += 1;
        raise(&mut s.max_revenue_tested, input.revenue);
        raise(&mut s.max_margin_tested, input.margin_percent);
        raise(&mut s.max_growth_tested, input.growth_percent);
        raise(&mut s.max_delay_tested, f64::from(input.delay_months));
        raise(&mut s.max_cost_discovered, result.total_cost);
        s.total_interactions += 1;
        self.state.absorb(&self.stats)
    }

    /// Zero every counter, lock everything, restart the session clock.
    pub fn reset(&mut self, now_ms: i64) {
        self.stats = UserStats::new(now_ms);
        self.state = AchievementState::default();
        info!("achievement progress reset");
    }

    pub fn to_saved(&self, now_ms: i64) -> SavedProgress {
        let achievements = self
            .state
            .iter()
            .map(|(id, status)| {
                let meta = id.meta();
                (
                    id.as_str().to_string(),
                    SavedAchievement {
                        id: id.as_str().to_string(),
                        title: meta.title.to_string(),
                        description: meta.description.to_string(),
                        icon: meta.icon.to_string(),
                        unlocked: status.unlocked,
                    },
                )
            })
            .collect();
        SavedProgress {
            achievements,
            user_stats: self.stats.clone(),
            last_updated: now_ms,
        }
    }

    pub fn summary(&self, now_ms: i64) -> ProgressSummary {
        let unlocked = self.state.unlocked_count();
        let total = self.state.len();
        ProgressSummary {
            unlocked,
            total,
            percentage: unlocked as f64 / total as f64 * 100.0,
            user_stats: self.stats.clone(),
            session_duration_ms: now_ms - self.stats.session_start,
        }
    }

    /// Locked achievements with their partial progress, in display order.
    pub fn pending(&self) -> Vec<PendingAchievement> {
        AchievementId::ALL
            .into_iter()
            .filter(|id| !self.state.is_unlocked(*id))
            .map(|id| {
                let meta = id.meta();
                PendingAchievement {
                    id,
                    title: meta.title,
                    description: meta.description,
                    icon: meta.icon,
                    progress: id.requirement().progress(&self.stats),
                }
            })
            .collect()
    }
}

fn raise(max: &mut f64, value: f64) {
    if value > *max {
        *max = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(revenue: f64, margin: f64, growth: f64, delay: u32) -> CalculatorInput {
        CalculatorInput {
            revenue,
            margin_percent: margin,
            growth_percent: growth,
            delay_months: delay,
        }
    }

    fn result(total: f64) -> CostResult {
        CostResult {
            monthly_profit: 0.0,
            direct_loss: total,
            opportunity_cost: 0.0,
            total_cost: total,
        }
    }

    #[test]
    fn top_of_every_ladder_unlocks_five_in_one_calculation() {
        let mut t = AchievementTracker::new(0);
        let newly = t.record_calculation(&input(10_000_000.0, 25.0, 50.0, 24), &result(500.0));
        assert_eq!(
            newly,
            vec![
                AchievementId::FirstCalculation,
                AchievementId::HighStakesAnalyst,
                AchievementId::TimeMaster,
                AchievementId::MarginMaster,
                AchievementId::GrowthVisionary,
            ]
        );
        assert_eq!(t.stats().max_revenue_tested, 10_000_000.0);
        assert_eq!(t.stats().max_margin_tested, 25.0);
        assert_eq!(t.stats().max_growth_tested, 50.0);
        assert_eq!(t.stats().max_delay_tested, 24.0);
        assert_eq!(t.stats().total_interactions, 1);
    }

    #[test]
    fn maxima_never_decrease() {
        let mut t = AchievementTracker::new(0);
        t.record_change(Parameter::Revenue, 5_000_000.0);
        t.record_change(Parameter::Revenue, 100_000.0);
        assert_eq!(t.stats().max_revenue_tested, 5_000_000.0);
        assert_eq!(t.stats().revenue_changes, 2);
        t.record_calculation(&input(100_000.0, 1.0, 2.0, 1), &result(1_000.0));
        t.record_calculation(&input(100_000.0, 1.0, 2.0, 1), &result(10.0));
        assert_eq!(t.stats().max_cost_discovered, 1_000.0);
        assert_eq!(t.stats().max_revenue_tested, 5_000_000.0);
    }

    #[test]
    fn third_revenue_change_unlocks_explorer_once() {
        let mut t = AchievementTracker::new(0);
        assert!(t.record_change(Parameter::Revenue, 1.0).is_empty());
        assert!(t.record_change(Parameter::Revenue, 1.0).is_empty());
        assert_eq!(
            t.record_change(Parameter::Revenue, 1.0),
            vec![AchievementId::ScenarioExplorer]
        );
        assert!(t.record_change(Parameter::Revenue, 1.0).is_empty());
    }

    #[test]
    fn fifteen_mixed_changes_unlock_guru() {
        let mut t = AchievementTracker::new(0);
        let mut unlocked = Vec::new();
        for i in 0..15 {
            let p = cod_core::Parameter::ALL[i % 4];
            unlocked.extend(t.record_change(p, 0.0));
        }
        assert!(unlocked.contains(&AchievementId::OptimizationGuru));
        assert_eq!(t.stats().total_changes(), 15);
    }

    #[test]
    fn reset_zeroes_everything_but_session_start() {
        let mut t = AchievementTracker::new(10);
        t.record_calculation(&input(10_000_000.0, 25.0, 50.0, 24), &result(2e6));
        assert!(t.state().unlocked_count() > 0);
        t.reset(99);
        assert_eq!(t.state().unlocked_count(), 0);
        assert_eq!(t.stats(), &UserStats::new(99));
    }

    #[test]
    fn saved_progress_round_trips_unlocks_and_stats() {
        let mut t = AchievementTracker::new(5);
        t.record_calculation(&input(1e6, 10.0, 10.0, 6), &result(771_561.0));
        let saved = t.to_saved(1_000);
        assert_eq!(saved.last_updated, 1_000);
        assert_eq!(saved.achievements.len(), 8);
        assert!(saved.achievements["first_calculation"].unlocked);

        let json = serde_json::to_string(&saved).unwrap();
        assert!(json.contains("\"userStats\""));
        assert!(json.contains("\"lastUpdated\":1000"));
        let back = AchievementTracker::from_saved(serde_json::from_str(&json).unwrap());
        assert_eq!(back, t);
    }

    #[test]
    fn loading_ignores_unknown_ids_and_partial_entries() {
        let json = r#"{
            "achievements": {
                "board_ready": {"unlocked": true},
                "time_master": {"unlocked": true, "color": "var(--blue-dark)"},
                "margin_master": {}
            },
            "userStats": {"delay_changes": 2}
        }"#;
        let saved: SavedProgress = serde_json::from_str(json).unwrap();
        let t = AchievementTracker::from_saved(saved);
        assert!(t.state().is_unlocked(AchievementId::TimeMaster));
        assert!(!t.state().is_unlocked(AchievementId::MarginMaster));
        assert_eq!(t.state().unlocked_count(), 1);
        assert_eq!(t.stats().delay_changes, 2);
    }

    #[test]
    fn summary_and_pending() {
        let mut t = AchievementTracker::new(1_000);
        t.record_change(Parameter::Delay, 12.0);
        let s = t.summary(61_000);
        assert_eq!(s.unlocked, 1);
        assert_eq!(s.total, 8);
        assert_eq!(s.percentage, 12.5);
        assert_eq!(s.session_duration_ms, 60_000);

        let pending = t.pending();
        assert_eq!(pending.len(), 7);
        assert!(pending.iter().all(|p| p.id != AchievementId::TimeMaster));
        let guru = pending
            .iter()
            .find(|p| p.id == AchievementId::OptimizationGuru)
            .unwrap();
        assert_eq!(guru.progress, 1.0 / 15.0);
    }
}
