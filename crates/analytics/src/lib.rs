#![deny(warnings)]

//! Privacy-preserving local analytics for calculator sessions.
//!
//! Nothing leaves the machine: interactions are counted in memory and an
//! anonymized copy is appended to a bounded log in the key-value store.
//! Session aggregates are written when a session ends.

mod perf;
mod report;

pub use perf::{FpsMeter, MemorySample, PerformanceMetrics};
pub use report::{usage_report, HourCount, TypeCount, UsageReport};

use cod_core::Parameter;
use persistence::{
    append_bounded, load_json, remove_key, KeyValueStore, KEY_SESSION_SUMMARIES,
    KEY_USAGE_PATTERNS, SESSION_SUMMARIES_CAP, USAGE_PATTERNS_CAP,
};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use tracing::{debug, info};

/// How many interactions the in-memory window keeps.
pub const INTERACTION_WINDOW: usize = 100;

/// Fields stripped from interaction payloads before they are stored.
const IDENTIFYING_FIELDS: [&str; 3] = ["userAgent", "pageUrl", "referrer"];

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// What the user did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    SessionStart,
    RevenueChange,
    MarginChange,
    GrowthChange,
    DelayChange,
    CalculationCompleted,
    ExportResults,
    AchievementUnlocked,
    AchievementsReset,
}

impl InteractionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InteractionKind::SessionStart => "session_start",
            InteractionKind::RevenueChange => "revenue_change",
            InteractionKind::MarginChange => "margin_change",
            InteractionKind::GrowthChange => "growth_change",
            InteractionKind::DelayChange => "delay_change",
            InteractionKind::CalculationCompleted => "calculation_completed",
            InteractionKind::ExportResults => "export_results",
            InteractionKind::AchievementUnlocked => "achievement_unlocked",
            InteractionKind::AchievementsReset => "achievements_reset",
        }
    }

    /// The change event for a slider.
    pub fn slider_change(parameter: Parameter) -> Self {
        match parameter {
            Parameter::Revenue => InteractionKind::RevenueChange,
            Parameter::Margin => InteractionKind::MarginChange,
            Parameter::Growth => InteractionKind::GrowthChange,
            Parameter::Delay => InteractionKind::DelayChange,
        }
    }
}

/// Counters for the running session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub session_id: String,
    /// Epoch milliseconds.
    pub start_time: i64,
    pub interactions: u64,
    pub calculations: u64,
    pub achievements: u64,
    pub max_cost_discovered: f64,
}

/// One entry of the in-memory interaction window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    #[serde(rename = "type")]
    pub kind: InteractionKind,
    pub data: Option<Value>,
    pub timestamp: i64,
    /// Milliseconds since session start.
    pub session_time: i64,
    pub sequence_number: u64,
}

/// Anonymized interaction as persisted under `usage_patterns`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsagePattern {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: i64,
    pub session_id: String,
    pub session_time: i64,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Per-session aggregate persisted under `session_summaries`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    /// Milliseconds.
    pub duration: i64,
    pub interactions: u64,
    pub calculations: u64,
    pub achievements: u64,
    pub max_cost_discovered: f64,
    pub performance_metrics: PerformanceMetrics,
    pub end_time: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementMetrics {
    /// Whole seconds.
    pub session_duration: i64,
    pub interactions: u64,
    pub calculations: u64,
    pub achievements: u64,
    /// Milliseconds, rounded.
    pub avg_time_per_interaction: i64,
    pub engagement_score: u32,
}

/// Everything the session knows, for a user-initiated download.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsExport {
    pub session: SessionData,
    pub interactions: Vec<Interaction>,
    pub performance: PerformanceMetrics,
    pub engagement: EngagementMetrics,
    pub patterns: UsageReport,
    pub exported_at: i64,
}

/// Generate a session id: base-36 start time followed by 9 random base-36 characters.
pub fn generate_session_id<R: Rng>(now_ms: i64, rng: &mut R) -> String {
    let mut id = to_base36(now_ms.max(0) as u64);
    for _ in 0..9 {
        id.push(BASE36[rng.gen_range(0..BASE36.len())] as char);
    }
    id
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

/// Drop identifying fields from an object payload; other payloads pass through.
pub fn anonymize(data: Option<&Value>) -> Option<Value> {
    let mut value = data?.clone();
    if let Value::Object(map) = &mut value {
        for field in IDENTIFYING_FIELDS {
            map.remove(field);
        }
    }
    Some(value)
}

/// Analytics for one calculator session.
#[derive(Clone, Debug)]
pub struct AnalyticsSession {
    data: SessionData,
    window: VecDeque<Interaction>,
    performance: PerformanceMetrics,
    fps: FpsMeter,
}

impl AnalyticsSession {
    /// Start a session at `now_ms`; `seed` drives the random part of the id.
    pub fn start(now_ms: i64, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let session_id = generate_session_id(now_ms, &mut rng);
        info!(%session_id, "analytics session started");
        Self {
            data: SessionData {
                session_id,
                start_time: now_ms,
                interactions: 0,
                calculations: 0,
                achievements: 0,
                max_cost_discovered: 0.0,
            },
            window: VecDeque::with_capacity(INTERACTION_WINDOW),
            performance: PerformanceMetrics::default(),
            fps: FpsMeter::new(now_ms as f64),
        }
    }

    pub fn data(&self) -> &SessionData {
        &self.data
    }

    pub fn session_id(&self) -> &str {
        &self.data.session_id
    }

    /// Most recent interactions, oldest first.
    pub fn interactions(&self) -> impl Iterator<Item = &Interaction> {
        self.window.iter()
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance
    }

    /// Record an interaction and append its anonymized copy to the store.
    ///
    /// Returns the interaction's sequence number.
    pub fn track_interaction<S: KeyValueStore + ?Sized>(
        &mut self,
        store: &mut S,
        kind: InteractionKind,
        data: Option<Value>,
        now_ms: i64,
    ) -> u64 {
        self.data.interactions += 1;
        let interaction = Interaction {
            kind,
            data,
            timestamp: now_ms,
            session_time: now_ms - self.data.start_time,
            sequence_number: self.data.interactions,
        };

        let pattern = UsagePattern {
            kind: kind.as_str().to_string(),
            timestamp: interaction.timestamp,
            session_id: self.data.session_id.clone(),
            session_time: interaction.session_time,
            data: anonymize(interaction.data.as_ref()),
        };
        append_bounded(store, KEY_USAGE_PATTERNS, pattern, USAGE_PATTERNS_CAP);

        self.update_metrics(kind, interaction.data.as_ref());
        let seq = interaction.sequence_number;
        self.window.push_back(interaction);
        while self.window.len() > INTERACTION_WINDOW {
            self.window.pop_front();
        }
        debug!(kind = kind.as_str(), seq, "interaction tracked");
        seq
    }

    fn update_metrics(&mut self, kind: InteractionKind, data: Option<&Value>) {
        match kind {
            InteractionKind::CalculationCompleted => {
                self.data.calculations += 1;
                if let Some(cost) = data.and_then(Value::as_f64) {
                    if cost > self.data.max_cost_discovered {
                        self.data.max_cost_discovered = cost;
                    }
                }
            }
            InteractionKind::AchievementUnlocked => self.data.achievements += 1,
            _ => {}
        }
    }

    /// Feed one rendered frame at `now_ms`.
    pub fn record_frame(&mut self, now_ms: f64) {
        if self.fps.frame(now_ms).is_some() {
            self.performance.average_fps = self.fps.average();
        }
    }

    pub fn record_memory(&mut self, sample: MemorySample) {
        self.performance.memory = Some(sample);
    }

    /// Close the session and append its summary to the store.
    pub fn end_session<S: KeyValueStore + ?Sized>(
        &self,
        store: &mut S,
        now_ms: i64,
    ) -> SessionSummary {
        let summary = SessionSummary {
            session_id: self.data.session_id.clone(),
            duration: now_ms - self.data.start_time,
            interactions: self.data.interactions,
            calculations: self.data.calculations,
            achievements: self.data.achievements,
            max_cost_discovered: self.data.max_cost_discovered,
            performance_metrics: self.performance.clone(),
            end_time: now_ms,
        };
        append_bounded(store, KEY_SESSION_SUMMARIES, summary.clone(), SESSION_SUMMARIES_CAP);
        info!(
            session_id = %summary.session_id,
            duration_ms = summary.duration,
            interactions = summary.interactions,
            "analytics session ended"
        );
        summary
    }

    /// Score in `[0, 100]` rewarding time spent, interactions, calculations and unlocks.
    pub fn engagement_score(&self, now_ms: i64) -> u32 {
        let minutes = (now_ms - self.data.start_time) as f64 / 60_000.0;
        let score = (minutes * 2.0).min(30.0)
            + (self.data.interactions as f64).min(25.0)
            + (self.data.calculations as f64 * 5.0).min(25.0)
            + (self.data.achievements as f64 * 10.0).min(20.0);
        score.round().max(0.0) as u32
    }

    pub fn engagement_metrics(&self, now_ms: i64) -> EngagementMetrics {
        let duration = now_ms - self.data.start_time;
        let avg = if self.data.interactions > 0 {
            duration as f64 / self.data.interactions as f64
        } else {
            0.0
        };
        EngagementMetrics {
            session_duration: (duration as f64 / 1000.0).round() as i64,
            interactions: self.data.interactions,
            calculations: self.data.calculations,
            achievements: self.data.achievements,
            avg_time_per_interaction: avg.round() as i64,
            engagement_score: self.engagement_score(now_ms),
        }
    }

    /// Report over the stored usage log; unreadable logs report as empty.
    pub fn usage_report<S: KeyValueStore + ?Sized>(&self, store: &S) -> UsageReport {
        let patterns: Vec<UsagePattern> = load_json(store, KEY_USAGE_PATTERNS).unwrap_or_default();
        usage_report(&patterns)
    }

    pub fn export<S: KeyValueStore + ?Sized>(&self, store: &S, now_ms: i64) -> AnalyticsExport {
        AnalyticsExport {
            session: self.data.clone(),
            interactions: self.window.iter().cloned().collect(),
            performance: self.performance.clone(),
            engagement: self.engagement_metrics(now_ms),
            patterns: self.usage_report(store),
            exported_at: now_ms,
        }
    }

    /// Forget stored analytics and zero this session's counters.
    pub fn clear<S: KeyValueStore + ?Sized>(&mut self, store: &mut S) {
        remove_key(store, KEY_USAGE_PATTERNS);
        remove_key(store, KEY_SESSION_SUMMARIES);
        self.data.interactions = 0;
        self.data.calculations = 0;
        self.data.achievements = 0;
        self.data.max_cost_discovered = 0.0;
        self.window.clear();
        info!("analytics data cleared");
    }
}
