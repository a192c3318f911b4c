#![deny(warnings)]

//! Headless calculator session.
//!
//! A [`Calculator`] owns the slider positions, the achievement tracker, the
//! analytics session and the key-value store, and threads the store through
//! every event. Storage failures are logged by the persistence helpers and
//! the session carries on in memory.

mod config;

pub use config::RuntimeConfig;

use analytics::{AnalyticsExport, AnalyticsSession, InteractionKind, SessionSummary};
use chrono::{DateTime, Utc};
use cod_achievements::{
    AchievementId, AchievementTracker, AchievementUnlocked, PendingAchievement, ProgressSummary,
    SavedProgress,
};
use cod_core::{CalculatorInput, CostResult, Parameter, SliderPositions, ValidationError};
use cod_econ::{
    build_export, compute_cost, impact_level, insights, render_report, scenario_spread,
    ExportReport, ImpactLevel, Insight, ReportKind, ScenarioSpread,
};
use persistence::{load_json, save_json, KeyValueStore, KEY_ACHIEVEMENTS};
use serde_json::json;
use thiserror::Error;
use std::collections::VecDeque;
use tracing::{debug, info};

/// Results kept for the scenario spread.
pub const RESULT_HISTORY: usize = 50;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of one calculation, with the achievements it unlocked.
#[derive(Clone, Debug, PartialEq)]
pub struct Update {
    pub positions: SliderPositions,
    pub input: CalculatorInput,
    pub result: CostResult,
    /// Newly unlocked achievements in display order; each is reported once.
    pub unlocked: Vec<AchievementUnlocked>,
}

pub struct Calculator<S: KeyValueStore> {
    config: RuntimeConfig,
    positions: SliderPositions,
    input: CalculatorInput,
    tracker: AchievementTracker,
    analytics: AnalyticsSession,
    history: VecDeque<CostResult>,
    store: S,
}

impl<S: KeyValueStore> Calculator<S> {
    /// Open a session: restore saved progress and record `session_start`.
    pub fn new(
        config: RuntimeConfig,
        mut store: S,
        now: DateTime<Utc>,
    ) -> Result<Self, RuntimeError> {
        let positions = config.positions;
        let input = positions.to_input()?;
        let now_ms = now.timestamp_millis();

        let tracker = match load_json::<SavedProgress, _>(&store, KEY_ACHIEVEMENTS) {
            Some(saved) => {
                let tracker = AchievementTracker::from_saved(saved);
                info!(
                    unlocked = tracker.state().unlocked_count(),
                    "restored achievement progress"
                );
                tracker
            }
            None => AchievementTracker::new(now_ms),
        };

        let seed = config.session_seed.unwrap_or_else(rand::random);
        let mut analytics = AnalyticsSession::start(now_ms, seed);
        analytics.track_interaction(&mut store, InteractionKind::SessionStart, None, now_ms);

        Ok(Self {
            config,
            positions,
            input,
            tracker,
            analytics,
            history: VecDeque::with_capacity(RESULT_HISTORY),
            store,
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn positions(&self) -> SliderPositions {
        self.positions
    }

    pub fn input(&self) -> &CalculatorInput {
        &self.input
    }

    pub fn tracker(&self) -> &AchievementTracker {
        &self.tracker
    }

    pub fn analytics(&self) -> &AnalyticsSession {
        &self.analytics
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Move a slider and recalculate. Off-ladder indices change nothing.
    pub fn set_position(
        &mut self,
        parameter: Parameter,
        index: usize,
        now: DateTime<Utc>,
    ) -> Result<Update, RuntimeError> {
        let mut positions = self.positions;
        positions.set(parameter, index)?;
        let input = positions.to_input()?;
        self.positions = positions;
        self.input = input;

        let value = input.value(parameter);
        let newly = self.tracker.record_change(parameter, value);
        self.analytics.track_interaction(
            &mut self.store,
            InteractionKind::slider_change(parameter),
            Some(json!(value)),
            now.timestamp_millis(),
        );
        Ok(self.calculate(newly, now))
    }

    /// Compute the cost for the current positions and record it.
    pub fn recalculate(&mut self, now: DateTime<Utc>) -> Update {
        self.calculate(Vec::new(), now)
    }

    fn calculate(&mut self, mut newly: Vec<AchievementId>, now: DateTime<Utc>) -> Update {
        let now_ms = now.timestamp_millis();
        let result = compute_cost(&self.input);
        debug!(
            total_cost = result.total_cost,
            opportunity_cost = result.opportunity_cost,
            "recalculated"
        );

        newly.extend(self.tracker.record_calculation(&self.input, &result));
        self.analytics.track_interaction(
            &mut self.store,
            InteractionKind::CalculationCompleted,
            Some(json!(result.total_cost)),
            now_ms,
        );
        self.history.push_back(result);
        while self.history.len() > RESULT_HISTORY {
            self.history.pop_front();
        }

        // change and calculation unlocks interleave in display order
        newly.sort();
        let unlocked = newly
            .into_iter()
            .map(|id| self.announce(id, now_ms))
            .collect();
        self.persist(now_ms);

        Update {
            positions: self.positions,
            input: self.input,
            result,
            unlocked,
        }
    }

    fn announce(&mut self, id: AchievementId, now_ms: i64) -> AchievementUnlocked {
        let meta = id.meta();
        info!(achievement = id.as_str(), title = meta.title, "achievement unlocked");
        self.analytics.track_interaction(
            &mut self.store,
            InteractionKind::AchievementUnlocked,
            Some(json!(id.as_str())),
            now_ms,
        );
        meta
    }

    fn persist(&mut self, now_ms: i64) {
        let saved = self.tracker.to_saved(now_ms);
        save_json(&mut self.store, KEY_ACHIEVEMENTS, &saved);
    }

    /// Export document for the current inputs. Does not count as a calculation.
    pub fn export(&mut self, now: DateTime<Utc>) -> ExportReport {
        let result = compute_cost(&self.input);
        let report = build_export(&self.input, &result, self.config.currency_style, now);
        self.analytics.track_interaction(
            &mut self.store,
            InteractionKind::ExportResults,
            Some(json!(result.total_cost)),
            now.timestamp_millis(),
        );
        report
    }

    /// Markdown document of `kind` for the current inputs. Logged like an export.
    pub fn report(&mut self, kind: ReportKind, now: DateTime<Utc>) -> String {
        let result = compute_cost(&self.input);
        let doc = render_report(kind, &self.input, &result, self.config.currency_style, now);
        self.analytics.track_interaction(
            &mut self.store,
            InteractionKind::ExportResults,
            Some(json!({ "report": kind.as_str(), "totalCost": result.total_cost })),
            now.timestamp_millis(),
        );
        doc
    }

    /// Lock everything, zero the counters and overwrite the saved progress.
    ///
    /// The fresh snapshot is written rather than only removed so a store
    /// that refuses removal cannot bring the old unlocks back.
    pub fn reset_achievements(&mut self, now: DateTime<Utc>) {
        let now_ms = now.timestamp_millis();
        self.tracker.reset(now_ms);
        self.persist(now_ms);
        self.analytics.track_interaction(
            &mut self.store,
            InteractionKind::AchievementsReset,
            None,
            now_ms,
        );
    }

    /// Persist progress and append the session summary.
    pub fn end_session(&mut self, now: DateTime<Utc>) -> SessionSummary {
        let now_ms = now.timestamp_millis();
        self.persist(now_ms);
        self.analytics.end_session(&mut self.store, now_ms)
    }

    pub fn progress(&self, now: DateTime<Utc>) -> ProgressSummary {
        self.tracker.summary(now.timestamp_millis())
    }

    pub fn pending(&self) -> Vec<PendingAchievement> {
        self.tracker.pending()
    }

    pub fn insights(&self) -> Vec<Insight> {
        insights(&self.input)
    }

    pub fn impact(&self) -> ImpactLevel {
        impact_level(compute_cost(&self.input).total_cost)
    }

    /// Spread over the results computed this session; needs three.
    pub fn scenario_spread(&self) -> Option<ScenarioSpread> {
        let results: Vec<CostResult> = self.history.iter().copied().collect();
        scenario_spread(&results)
    }

    pub fn analytics_export(&self, now: DateTime<Utc>) -> AnalyticsExport {
        self.analytics.export(&self.store, now.timestamp_millis())
    }

    pub fn clear_analytics(&mut self) {
        self.analytics.clear(&mut self.store);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics::UsagePattern;
    use chrono::TimeZone;
    use cod_core::UserStats;
    use cod_econ::CurrencyStyle;
    use persistence::{
        FileStore, MemoryStore, StoreError, KEY_SESSION_SUMMARIES, KEY_USAGE_PATTERNS,
    };
    use std::io;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_760_000_000 + secs, 0).unwrap()
    }

    fn seeded() -> RuntimeConfig {
        RuntimeConfig {
            session_seed: Some(1),
            ..RuntimeConfig::default()
        }
    }

    fn ids(update: &Update) -> Vec<AchievementId> {
        update.unlocked.iter().map(|m| m.id).collect()
    }

    fn logged_kinds(store: &MemoryStore) -> Vec<String> {
        load_json::<Vec<UsagePattern>, _>(store, KEY_USAGE_PATTERNS)
            .unwrap_or_default()
            .into_iter()
            .map(|p| p.kind)
            .collect()
    }

    struct BrokenStore;

    /// Accepts writes but refuses every removal.
    struct StickyStore(MemoryStore);

    impl KeyValueStore for StickyStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.0.get(key)
        }
        fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
            self.0.set(key, value)
        }
        fn remove(&mut self, _key: &str) -> Result<(), StoreError> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only").into())
        }
    }

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied").into())
        }
        fn set(&mut self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(io::Error::new(io::ErrorKind::Other, "quota exceeded").into())
        }
        fn remove(&mut self, _key: &str) -> Result<(), StoreError> {
            Err(io::Error::new(io::ErrorKind::Other, "denied").into())
        }
    }

    #[test]
    fn first_calculation_unlocks_and_persists() {
        let mut calc = Calculator::new(seeded(), MemoryStore::new(), at(0)).unwrap();
        let update = calc.recalculate(at(1));
        assert_eq!(update.input.revenue, 1_000_000.0);
        assert_eq!(update.input.margin_percent, 5.0);
        assert_eq!(update.result.monthly_profit, 50_000.0);
        assert_eq!(ids(&update), vec![AchievementId::FirstCalculation]);
        assert_eq!(update.unlocked[0].title, "Strategic Thinker");

        let saved: SavedProgress = load_json(calc.store(), KEY_ACHIEVEMENTS).unwrap();
        assert!(saved.achievements["first_calculation"].unlocked);
        assert_eq!(saved.user_stats.calculations_completed, 1);

        assert!(calc.recalculate(at(2)).unlocked.is_empty());
        assert_eq!(
            logged_kinds(calc.store()),
            vec![
                "session_start",
                "calculation_completed",
                "achievement_unlocked",
                "calculation_completed"
            ]
        );
    }

    #[test]
    fn enterprise_scenario_unlocks_six_at_once() {
        let config = RuntimeConfig {
            positions: SliderPositions {
                revenue: 4,
                margin: 4,
                growth: 5,
                delay: 4,
            },
            ..seeded()
        };
        let mut calc = Calculator::new(config, MemoryStore::new(), at(0)).unwrap();
        let update = calc.recalculate(at(1));
        assert_eq!(
            ids(&update),
            vec![
                AchievementId::FirstCalculation,
                AchievementId::HighStakesAnalyst,
                AchievementId::TimeMaster,
                AchievementId::CostAwarenessExpert,
                AchievementId::MarginMaster,
                AchievementId::GrowthVisionary,
            ]
        );
        assert_eq!(calc.impact(), ImpactLevel::High);
        assert_eq!(calc.insights().len(), 3);
        assert_eq!(calc.analytics().data().achievements, 6);
        assert_eq!(calc.pending().len(), 2);
    }

    #[test]
    fn slider_changes_count_toward_unlocks() {
        let mut calc = Calculator::new(seeded(), MemoryStore::new(), at(0)).unwrap();
        let mut per_move = Vec::new();
        for (i, index) in [0, 3, 1].into_iter().enumerate() {
            let update = calc
                .set_position(Parameter::Revenue, index, at(i as i64))
                .unwrap();
            per_move.push(ids(&update));
        }
        // 5M on the second move also costs over 1M; third revenue change on the last
        assert_eq!(
            per_move,
            vec![
                vec![AchievementId::FirstCalculation],
                vec![
                    AchievementId::HighStakesAnalyst,
                    AchievementId::CostAwarenessExpert
                ],
                vec![AchievementId::ScenarioExplorer],
            ]
        );
        assert_eq!(calc.positions().revenue, 1);
        assert_eq!(calc.input().revenue, 500_000.0);
        let stats = calc.tracker().stats();
        assert_eq!(stats.revenue_changes, 3);
        assert_eq!(stats.calculations_completed, 3);
        assert_eq!(stats.max_revenue_tested, 5_000_000.0);
        assert!(calc.scenario_spread().is_some());
    }

    #[test]
    fn off_ladder_index_changes_nothing() {
        let mut calc = Calculator::new(seeded(), MemoryStore::new(), at(0)).unwrap();
        let err = calc.set_position(Parameter::Growth, 6, at(1)).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Validation(ValidationError::IndexOutOfRange {
                parameter: Parameter::Growth,
                index: 6,
                len: 6
            })
        ));
        assert_eq!(calc.positions(), SliderPositions::default());
        assert_eq!(calc.tracker().stats().total_interactions, 0);
        assert_eq!(calc.analytics().data().interactions, 1);
    }

    #[test]
    fn invalid_config_positions_are_rejected() {
        let config = RuntimeConfig {
            positions: SliderPositions {
                delay: 5,
                ..SliderPositions::default()
            },
            ..seeded()
        };
        assert!(matches!(
            Calculator::new(config, MemoryStore::new(), at(0)),
            Err(RuntimeError::Validation(_))
        ));
    }

    #[test]
    fn corrupt_saved_progress_starts_fresh() {
        let mut store = MemoryStore::new();
        store.set(KEY_ACHIEVEMENTS, "{oops").unwrap();
        let calc = Calculator::new(seeded(), store, at(5)).unwrap();
        assert_eq!(calc.tracker().state().unlocked_count(), 0);
        assert_eq!(calc.tracker().stats().session_start, at(5).timestamp_millis());
    }

    #[test]
    fn progress_survives_reopen_through_files() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut calc = Calculator::new(seeded(), FileStore::new(dir.path()), at(0)).unwrap();
            calc.set_position(Parameter::Delay, 3, at(1)).unwrap();
            calc.end_session(at(60));
        }
        let mut calc = Calculator::new(seeded(), FileStore::new(dir.path()), at(100)).unwrap();
        let state = calc.tracker().state();
        assert!(state.is_unlocked(AchievementId::FirstCalculation));
        assert!(state.is_unlocked(AchievementId::TimeMaster));
        assert_eq!(calc.tracker().stats().delay_changes, 1);
        assert_eq!(calc.tracker().stats().session_start, at(0).timestamp_millis());
        assert!(calc.recalculate(at(101)).unlocked.is_empty());

        let summaries: Vec<SessionSummary> =
            load_json(calc.store(), KEY_SESSION_SUMMARIES).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].duration, 60_000);
        assert_eq!(summaries[0].calculations, 1);
    }

    #[test]
    fn reset_locks_everything_and_overwrites_saved_progress() {
        let mut calc = Calculator::new(seeded(), MemoryStore::new(), at(0)).unwrap();
        calc.set_position(Parameter::Growth, 4, at(1)).unwrap();
        assert_eq!(calc.progress(at(2)).unlocked, 2);

        calc.reset_achievements(at(10));
        let progress = calc.progress(at(10));
        assert_eq!(progress.unlocked, 0);
        assert_eq!(progress.total, 8);
        assert_eq!(progress.session_duration_ms, 0);
        assert_eq!(progress.user_stats.growth_changes, 0);
        let saved: SavedProgress = load_json(calc.store(), KEY_ACHIEVEMENTS).unwrap();
        assert!(saved.achievements.values().all(|a| !a.unlocked));
        assert_eq!(saved.user_stats, UserStats::new(at(10).timestamp_millis()));
        assert_eq!(
            logged_kinds(calc.store()).last().map(String::as_str),
            Some("achievements_reset")
        );

        let again = calc.recalculate(at(11));
        assert_eq!(
            ids(&again),
            vec![AchievementId::FirstCalculation, AchievementId::GrowthVisionary]
        );
    }

    #[test]
    fn reset_survives_reopen_when_removal_fails() {
        let mut calc = Calculator::new(seeded(), StickyStore(MemoryStore::new()), at(0)).unwrap();
        calc.recalculate(at(1));
        calc.reset_achievements(at(2));
        assert_eq!(calc.progress(at(2)).unlocked, 0);

        let reopened = Calculator::new(seeded(), calc.into_store(), at(3)).unwrap();
        assert_eq!(reopened.tracker().state().unlocked_count(), 0);
        assert_eq!(reopened.tracker().stats().calculations_completed, 0);
    }

    #[test]
    fn change_and_calculation_unlocks_share_display_order() {
        let mut calc = Calculator::new(seeded(), MemoryStore::new(), at(0)).unwrap();
        // growth_visionary comes from the change, first_calculation from the calculation
        let update = calc.set_position(Parameter::Growth, 4, at(1)).unwrap();
        assert_eq!(
            ids(&update),
            vec![AchievementId::FirstCalculation, AchievementId::GrowthVisionary]
        );
        let titles: Vec<_> = update.unlocked.iter().map(|m| m.title).collect();
        assert_eq!(titles, vec!["Strategic Thinker", "Growth Visionary"]);
    }

    #[test]
    fn export_uses_configured_style_without_counting() {
        let config = RuntimeConfig {
            currency_style: CurrencyStyle::Grouped,
            ..seeded()
        };
        let mut calc = Calculator::new(config, MemoryStore::new(), at(0)).unwrap();
        let report = calc.export(Utc.with_ymd_and_hms(2026, 10, 17, 8, 0, 0).unwrap());
        assert_eq!(report.timestamp, "2026-10-17T08:00:00.000Z");
        assert_eq!(report.inputs.monthly_revenue, "1.000.000\u{a0}€");
        assert_eq!(report.inputs.profit_margin, "5%");
        assert_eq!(report.inputs.delay_period, "6 months");
        assert_eq!(calc.tracker().stats().calculations_completed, 0);
        assert_eq!(
            logged_kinds(calc.store()),
            vec!["session_start", "export_results"]
        );
    }

    #[test]
    fn reports_render_and_are_logged_as_exports() {
        let mut calc = Calculator::new(seeded(), MemoryStore::new(), at(0)).unwrap();
        let doc = calc.report(ReportKind::Summary, at(1));
        // defaults: 1M, 5%, 10%, 6 months
        assert!(doc.contains("Delaying this 6-month project costs €386K"));
        assert!(doc.contains("- Break-even period: 8 months"));
        assert_eq!(calc.tracker().stats().calculations_completed, 0);

        let stored: Vec<UsagePattern> = load_json(calc.store(), KEY_USAGE_PATTERNS).unwrap();
        let last = stored.last().unwrap();
        assert_eq!(last.kind, "export_results");
        assert_eq!(last.data.as_ref().unwrap()["report"], "summary");
    }

    #[test]
    fn spread_needs_three_calculations() {
        let mut calc = Calculator::new(seeded(), MemoryStore::new(), at(0)).unwrap();
        calc.recalculate(at(1));
        calc.set_position(Parameter::Delay, 0, at(2)).unwrap();
        assert!(calc.scenario_spread().is_none());
        calc.set_position(Parameter::Delay, 4, at(3)).unwrap();
        let spread = calc.scenario_spread().unwrap();
        assert!(spread.conservative < spread.median);
        assert!(spread.median < spread.aggressive);
    }

    #[test]
    fn broken_store_keeps_session_in_memory() {
        let mut calc = Calculator::new(seeded(), BrokenStore, at(0)).unwrap();
        let update = calc.set_position(Parameter::Growth, 4, at(1)).unwrap();
        assert_eq!(
            ids(&update),
            vec![AchievementId::FirstCalculation, AchievementId::GrowthVisionary]
        );
        assert_eq!(calc.progress(at(2)).unlocked, 2);
        assert_eq!(calc.analytics_export(at(3)).patterns.total_interactions, 0);
        let summary = calc.end_session(at(4));
        assert_eq!(summary.interactions, 5);
    }

    #[test]
    fn clearing_analytics_keeps_achievements() {
        let mut calc = Calculator::new(seeded(), MemoryStore::new(), at(0)).unwrap();
        calc.recalculate(at(1));
        calc.clear_analytics();
        assert!(calc.store().get(KEY_USAGE_PATTERNS).unwrap().is_none());
        assert!(calc.store().get(KEY_ACHIEVEMENTS).unwrap().is_some());
        assert_eq!(calc.analytics().data().interactions, 0);
    }
}
