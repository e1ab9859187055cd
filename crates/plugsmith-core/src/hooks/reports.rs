//! Derived views over the hook event log.

use super::bus::HookBus;
use super::types::{HookEvent, HookKind};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use tracing::{debug, info};
use uuid::Uuid;

/// Events considered by the recent-activity view
const RECENT_ACTIVITY_WINDOW: usize = 50;
/// Errors listed in the error timeline
const ERROR_TIMELINE_WINDOW: usize = 20;
/// Upper bound on configured event retention (100 years)
const MAX_RETENTION_HOURS: u64 = 876_000;

/// Duration statistics for one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    /// Mean seconds
    pub avg_duration: f64,
    /// Fastest run
    pub min_duration: f64,
    /// Slowest run
    pub max_duration: f64,
    /// Samples in the window
    pub total_runs: usize,
    /// Sum of the samples
    pub total_time: f64,
}

impl PerformanceStats {
    fn from_samples(samples: &VecDeque<f64>) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let total_time: f64 = samples.iter().sum();
        Some(Self {
            avg_duration: total_time / samples.len() as f64,
            min_duration: samples.iter().copied().fold(f64::INFINITY, f64::min),
            max_duration: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            total_runs: samples.len(),
            total_time,
        })
    }
}

/// Failed agent runs per agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSummary {
    /// Failures per agent
    pub error_counts: BTreeMap<String, usize>,
    /// Sum of all failures
    pub total_errors: usize,
    /// Agent with the most failures
    pub most_errors: Option<(String, usize)>,
}

/// One row of a chronological timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// When it happened
    pub timestamp: DateTime<Utc>,
    /// Event kind
    #[serde(rename = "type")]
    pub kind: HookKind,
    /// Agent
    pub agent: String,
    /// Tool, if any
    pub tool: Option<String>,
    /// Outcome
    pub success: bool,
    /// Elapsed seconds, if known
    pub duration_secs: Option<f64>,
    /// Error text, if any
    pub error: Option<String>,
}

impl From<&HookEvent> for TimelineEntry {
    fn from(e: &HookEvent) -> Self {
        Self {
            timestamp: e.timestamp,
            kind: e.kind,
            agent: e.agent_name.clone(),
            tool: e.tool_name.clone(),
            success: e.success,
            duration_secs: e.duration_secs,
            error: e.error.clone(),
        }
    }
}

/// Activity of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Session id
    pub session_id: Uuid,
    /// Seconds between the first and last event
    pub total_duration_secs: f64,
    /// Distinct agents, sorted
    pub agents_used: Vec<String>,
    /// Distinct tools, sorted
    pub tools_used: Vec<String>,
    /// Number of events
    pub total_events: usize,
    /// Number of failed events
    pub errors: usize,
    /// Share of successful events, 0 to 100
    pub success_rate: f64,
    /// Events in order
    pub timeline: Vec<TimelineEntry>,
}

/// Classification of one health check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    /// Within limits
    Healthy,
    /// Needs attention
    Degraded,
    /// Needs immediate attention
    Unhealthy,
    /// Not enough data
    Unknown,
}

impl HealthLevel {
    /// Wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthLevel::Healthy => "healthy",
            HealthLevel::Degraded => "degraded",
            HealthLevel::Unhealthy => "unhealthy",
            HealthLevel::Unknown => "unknown",
        }
    }
}

/// Result of a single health check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Classification
    pub status: HealthLevel,
    /// Explanation
    pub message: String,
}

impl HealthCheck {
    fn new(status: HealthLevel, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Run totals shared by several reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTotals {
    /// Agent runs observed
    pub total_runs: usize,
    /// Failed agent runs
    pub total_errors: usize,
    /// Share of successful runs, 100 when nothing ran
    pub success_rate: f64,
    /// Classification of `success_rate`
    pub status: HealthLevel,
}

/// Composite system health
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Rolled-up classification
    pub overall_status: HealthLevel,
    /// Share of healthy checks, 0 to 100
    pub health_score: f64,
    /// Individual checks by name
    pub checks: BTreeMap<String, HealthCheck>,
    /// Agents with performance data
    pub total_agents: usize,
    /// Run totals
    pub totals: RunTotals,
    /// Follow-ups for non-healthy checks
    pub recommendations: Vec<String>,
}

/// An agent whose average run time is above the slow threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bottleneck {
    /// Agent name
    pub agent: String,
    /// Mean seconds
    pub avg_duration: f64,
    /// Issue tag
    pub issue: String,
}

/// Counts over the most recent events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentActivity {
    /// Events per kind
    pub event_types: BTreeMap<HookKind, usize>,
    /// Events in the window
    pub total_events: usize,
}

/// Performance overview across agents and tools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Run totals
    pub overall_health: RunTotals,
    /// Stats per agent
    pub agent_performance: BTreeMap<String, PerformanceStats>,
    /// Stats per `agent:tool`
    pub tool_performance: BTreeMap<String, PerformanceStats>,
    /// Failures per agent
    pub error_summary: ErrorSummary,
    /// Slow agents
    pub bottlenecks: Vec<Bottleneck>,
    /// Recent event mix
    pub recent_activity: RecentActivity,
    /// Follow-ups
    pub recommendations: Vec<String>,
}

/// Trend of the error log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorTrend {
    /// No failed events
    Healthy,
    /// A handful of failures
    Stable,
    /// More than five failures
    Warning,
    /// More than twenty failures
    Critical,
}

/// Breakdown of failed events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorAnalysis {
    /// Failed events
    pub total_errors: usize,
    /// Occurrences per lower-cased error text
    pub error_patterns: BTreeMap<String, usize>,
    /// Failed events per agent
    pub agent_errors: BTreeMap<String, usize>,
    /// Failed events per tool
    pub tool_errors: BTreeMap<String, usize>,
    /// Most frequent error text
    pub most_common_issue: Option<(String, usize)>,
    /// Agent with the most failed events
    pub most_problematic_agent: Option<(String, usize)>,
    /// Tool with the most failed events
    pub most_problematic_tool: Option<(String, usize)>,
    /// Most recent failures, newest first
    pub timeline: Vec<TimelineEntry>,
    /// Follow-ups
    pub recommendations: Vec<String>,
    /// Overall trend
    pub status: ErrorTrend,
}

/// Outcome class of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOutcome {
    /// Above 90% success
    Completed,
    /// Above 70% success
    Partial,
    /// Anything lower
    Failed,
}

/// Speed class of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPace {
    /// Under a minute
    Fast,
    /// Under three minutes
    Normal,
    /// Three minutes or more
    Slow,
}

/// Assessment of a session report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAnalysis {
    /// Outcome class
    pub status: SessionOutcome,
    /// Speed class
    pub duration_assessment: SessionPace,
    /// Follow-ups
    pub recommendations: Vec<String>,
}

impl SessionAnalysis {
    fn of(report: &SessionReport) -> Self {
        let status = if report.success_rate > 90.0 {
            SessionOutcome::Completed
        } else if report.success_rate > 70.0 {
            SessionOutcome::Partial
        } else {
            SessionOutcome::Failed
        };
        let duration_assessment = if report.total_duration_secs < 60.0 {
            SessionPace::Fast
        } else if report.total_duration_secs < 180.0 {
            SessionPace::Normal
        } else {
            SessionPace::Slow
        };

        let mut recommendations = Vec::new();
        if report.success_rate < 90.0 {
            recommendations.push("Review and address failed operations".to_string());
        }
        if report.total_duration_secs > 180.0 {
            recommendations.push("Consider optimizing for faster execution".to_string());
        }

        Self {
            status,
            duration_assessment,
            recommendations,
        }
    }
}

/// Session report with its assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    /// Raw report
    #[serde(flatten)]
    pub report: SessionReport,
    /// Assessment
    pub analysis: SessionAnalysis,
}

fn top_entry(counts: &BTreeMap<String, usize>) -> Option<(String, usize)> {
    counts
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(k, v)| (k.clone(), *v))
}

fn stats_of(series: &HashMap<String, VecDeque<f64>>) -> BTreeMap<String, PerformanceStats> {
    series
        .iter()
        .filter_map(|(k, samples)| PerformanceStats::from_samples(samples).map(|s| (k.clone(), s)))
        .collect()
}

fn percent(part: usize, whole: usize) -> f64 {
    part as f64 / whole as f64 * 100.0
}

impl HookBus {
    /// Snapshot of the event log
    #[must_use]
    pub fn events(&self) -> Vec<HookEvent> {
        self.read_state().events.clone()
    }

    /// Number of logged events
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.read_state().events.len()
    }

    /// Duration stats per agent
    #[must_use]
    pub fn performance_summary(&self) -> BTreeMap<String, PerformanceStats> {
        stats_of(&self.read_state().agent_durations)
    }

    /// Duration stats per `agent:tool`
    #[must_use]
    pub fn tool_performance_summary(&self) -> BTreeMap<String, PerformanceStats> {
        stats_of(&self.read_state().tool_durations)
    }

    /// Failed agent runs per agent
    #[must_use]
    pub fn error_summary(&self) -> ErrorSummary {
        let error_counts: BTreeMap<String, usize> = self
            .read_state()
            .error_counts
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        ErrorSummary {
            total_errors: error_counts.values().sum(),
            most_errors: top_entry(&error_counts),
            error_counts,
        }
    }

    fn run_totals(&self) -> RunTotals {
        let total_runs: usize = self.read_state().agent_runs.values().sum();
        let total_errors = self.error_summary().total_errors;
        let success_rate = if total_runs > 0 {
            percent(total_runs.saturating_sub(total_errors), total_runs)
        } else {
            100.0
        };
        let status = if success_rate > 95.0 {
            HealthLevel::Healthy
        } else if success_rate > 80.0 {
            HealthLevel::Degraded
        } else {
            HealthLevel::Unhealthy
        };
        RunTotals {
            total_runs,
            total_errors,
            success_rate,
            status,
        }
    }

    /// Events of one session in chronological order, or `None` without any
    #[must_use]
    pub fn session_report(&self, session_id: Uuid) -> Option<SessionReport> {
        let state = self.read_state();
        let events: Vec<&HookEvent> = state
            .events
            .iter()
            .filter(|e| e.session_id == Some(session_id))
            .collect();

        let start = events.iter().map(|e| e.timestamp).min()?;
        let end = events.iter().map(|e| e.timestamp).max()?;

        let agents_used: BTreeSet<&str> = events.iter().map(|e| e.agent_name.as_str()).collect();
        let tools_used: BTreeSet<&str> = events
            .iter()
            .filter_map(|e| e.tool_name.as_deref())
            .collect();
        let errors = events.iter().filter(|e| !e.success).count();

        Some(SessionReport {
            session_id,
            total_duration_secs: (end - start).num_milliseconds() as f64 / 1000.0,
            agents_used: agents_used.into_iter().map(str::to_string).collect(),
            tools_used: tools_used.into_iter().map(str::to_string).collect(),
            total_events: events.len(),
            errors,
            success_rate: percent(events.len() - errors, events.len()),
            timeline: events.iter().map(|e| TimelineEntry::from(*e)).collect(),
        })
    }

    /// Session report with its assessment
    #[must_use]
    pub fn session_metrics(&self, session_id: Uuid) -> Option<SessionMetrics> {
        let report = self.session_report(session_id)?;
        let analysis = SessionAnalysis::of(&report);
        info!(session_id = %session_id, success_rate = report.success_rate, "Session metrics computed");
        Some(SessionMetrics { report, analysis })
    }

    /// Breakdown of every failed event
    #[must_use]
    pub fn error_analysis(&self) -> ErrorAnalysis {
        let state = self.read_state();
        let failed: Vec<&HookEvent> = state.events.iter().filter(|e| !e.success).collect();

        let mut error_patterns = BTreeMap::new();
        let mut agent_errors = BTreeMap::new();
        let mut tool_errors = BTreeMap::new();
        for event in &failed {
            if let Some(error) = &event.error {
                *error_patterns.entry(error.to_lowercase()).or_insert(0) += 1;
            }
            *agent_errors.entry(event.agent_name.clone()).or_insert(0) += 1;
            if let Some(tool) = &event.tool_name {
                *tool_errors.entry(tool.clone()).or_insert(0) += 1;
            }
        }

        let most_common_issue = top_entry(&error_patterns);
        let most_problematic_agent = top_entry(&agent_errors);
        let most_problematic_tool = top_entry(&tool_errors);

        let mut timeline: Vec<TimelineEntry> = failed
            .iter()
            .skip(failed.len().saturating_sub(ERROR_TIMELINE_WINDOW))
            .map(|e| TimelineEntry::from(*e))
            .collect();
        timeline.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let mut recommendations = Vec::new();
        if let Some((pattern, _)) = &most_common_issue {
            recommendations.push(format!("Address most common error pattern: {}", pattern));
        }
        if let Some((agent, _)) = &most_problematic_agent {
            recommendations.push(format!("Review and fix issues in {} agent", agent));
        }
        if let Some((tool, _)) = &most_problematic_tool {
            recommendations.push(format!("Investigate problems with {} tool", tool));
        }
        if failed.is_empty() {
            recommendations.push("System is running without errors".to_string());
        }

        let status = match failed.len() {
            0 => ErrorTrend::Healthy,
            n if n > 20 => ErrorTrend::Critical,
            n if n > 5 => ErrorTrend::Warning,
            _ => ErrorTrend::Stable,
        };

        debug!(total_errors = failed.len(), "Error analysis computed");
        ErrorAnalysis {
            total_errors: failed.len(),
            error_patterns,
            agent_errors,
            tool_errors,
            most_common_issue,
            most_problematic_agent,
            most_problematic_tool,
            timeline,
            recommendations,
            status,
        }
    }

    /// Performance overview with bottlenecks and recent activity
    #[must_use]
    pub fn performance_metrics(&self) -> PerformanceMetrics {
        let agent_performance = self.performance_summary();
        let tool_performance = self.tool_performance_summary();
        let error_summary = self.error_summary();
        let overall_health = self.run_totals();

        let bottlenecks: Vec<Bottleneck> = agent_performance
            .iter()
            .filter(|(_, stats)| stats.avg_duration > self.config.slow_agent_secs)
            .map(|(agent, stats)| Bottleneck {
                agent: agent.clone(),
                avg_duration: stats.avg_duration,
                issue: "slow_execution".to_string(),
            })
            .collect();

        let recent_activity = {
            let state = self.read_state();
            let recent = &state.events[state.events.len().saturating_sub(RECENT_ACTIVITY_WINDOW)..];
            let mut event_types = BTreeMap::new();
            for event in recent {
                *event_types.entry(event.kind).or_insert(0) += 1;
            }
            RecentActivity {
                event_types,
                total_events: recent.len(),
            }
        };

        let mut recommendations = Vec::new();
        if !bottlenecks.is_empty() {
            recommendations
                .push("Consider optimizing slow agents or increasing system resources".to_string());
        }
        if error_summary.total_errors > 10 {
            recommendations.push("Review error logs and fix recurring issues".to_string());
        }
        if agent_performance.is_empty() {
            recommendations
                .push("No performance data available - run some operations first".to_string());
        }
        if recommendations.is_empty() {
            recommendations.push("System is performing well".to_string());
        }

        info!(status = overall_health.status.as_str(), "Performance metrics computed");
        PerformanceMetrics {
            overall_health,
            agent_performance,
            tool_performance,
            error_summary,
            bottlenecks,
            recent_activity,
            recommendations,
        }
    }

    /// Composite health of agents, error rate, resources and security
    #[must_use]
    pub fn health_status(&self) -> HealthStatus {
        let performance = self.performance_summary();
        let totals = self.run_totals();

        let mut checks = BTreeMap::new();
        checks.insert(
            "agent_performance".to_string(),
            self.check_agent_performance(&performance),
        );
        checks.insert(
            "error_rate".to_string(),
            Self::check_error_rate(totals.total_runs, totals.total_errors),
        );
        checks.insert(
            "system_resources".to_string(),
            HealthCheck::new(HealthLevel::Healthy, "System resources appear adequate"),
        );
        checks.insert("security_status".to_string(), self.check_security_status());

        let healthy = checks
            .values()
            .filter(|c| c.status == HealthLevel::Healthy)
            .count();
        let health_score = percent(healthy, checks.len());
        let overall_status = if health_score >= 80.0 {
            HealthLevel::Healthy
        } else if health_score >= 60.0 {
            HealthLevel::Degraded
        } else {
            HealthLevel::Unhealthy
        };

        let mut recommendations: Vec<String> = checks
            .iter()
            .filter(|(_, c)| c.status != HealthLevel::Healthy)
            .map(|(name, c)| format!("Address {}: {}", name, c.message))
            .collect();
        match overall_status {
            HealthLevel::Unhealthy => {
                recommendations.push("System requires immediate attention".to_string())
            }
            HealthLevel::Degraded => {
                recommendations.push("Monitor system closely and address issues".to_string())
            }
            _ => {}
        }

        info!(
            status = overall_status.as_str(),
            score = health_score,
            "Health status checked"
        );
        HealthStatus {
            overall_status,
            health_score,
            checks,
            total_agents: performance.len(),
            totals,
            recommendations,
        }
    }

    fn check_agent_performance(&self, performance: &BTreeMap<String, PerformanceStats>) -> HealthCheck {
        if performance.is_empty() {
            return HealthCheck::new(HealthLevel::Unknown, "No performance data available");
        }
        let slow: Vec<&str> = performance
            .iter()
            .filter(|(_, s)| s.avg_duration > self.config.slow_agent_secs)
            .map(|(name, _)| name.as_str())
            .collect();
        if slow.is_empty() {
            HealthCheck::new(HealthLevel::Healthy, "All agents performing well")
        } else {
            HealthCheck::new(
                HealthLevel::Degraded,
                format!("Slow agents detected: {}", slow.join(", ")),
            )
        }
    }

    fn check_error_rate(total_runs: usize, total_errors: usize) -> HealthCheck {
        if total_runs == 0 {
            return HealthCheck::new(HealthLevel::Unknown, "No operations recorded");
        }
        let rate = percent(total_errors, total_runs);
        if rate < 5.0 {
            HealthCheck::new(HealthLevel::Healthy, format!("Low error rate: {:.1}%", rate))
        } else if rate < 20.0 {
            HealthCheck::new(HealthLevel::Degraded, format!("Moderate error rate: {:.1}%", rate))
        } else {
            HealthCheck::new(HealthLevel::Unhealthy, format!("High error rate: {:.1}%", rate))
        }
    }

    fn check_security_status(&self) -> HealthCheck {
        let state = self.read_state();
        let checks: Vec<&HookEvent> = state
            .events
            .iter()
            .filter(|e| e.kind == HookKind::SecurityCheck)
            .collect();
        if checks.is_empty() {
            return HealthCheck::new(HealthLevel::Unknown, "No security checks performed");
        }
        let failed = checks.iter().filter(|e| !e.success).count();
        let rate = percent(failed, checks.len());
        if failed == 0 {
            HealthCheck::new(HealthLevel::Healthy, "No security violations detected")
        } else if rate < 10.0 {
            HealthCheck::new(
                HealthLevel::Degraded,
                format!("Some security violations: {:.1}%", rate),
            )
        } else {
            HealthCheck::new(
                HealthLevel::Unhealthy,
                format!("High security violation rate: {:.1}%", rate),
            )
        }
    }

    /// Drop events older than `max_age`; returns how many were removed.
    ///
    /// An age reaching past the earliest representable time removes nothing.
    pub fn prune_events(&self, max_age: Duration) -> usize {
        let Some(cutoff) = Utc::now().checked_sub_signed(max_age) else {
            debug!("Event max age out of range, nothing pruned");
            return 0;
        };
        let mut state = self.write_state();
        let before = state.events.len();
        state.events.retain(|e| e.timestamp > cutoff);
        let removed = before - state.events.len();
        if removed > 0 {
            info!(removed, "Cleared old hook events");
        }
        removed
    }

    /// Drop events older than the configured retention
    pub fn prune_expired(&self) -> usize {
        let hours = self.config.event_max_age_hours.min(MAX_RETENTION_HOURS);
        self.prune_events(Duration::hours(hours as i64))
    }
}
