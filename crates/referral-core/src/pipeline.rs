use crate::cache::ProcessedCache;
use crate::config::Config;
use crate::error::{ReferralError, Result};
use crate::grouper::{group_by_referral, ReferralGroup};
use crate::matcher::{match_clients, UnknownClientPolicy};
use crate::records::{AppointmentRecord, ClientRecord, MatchedClient, ReferralRecord, TableKind};
use crate::render::{Artifact, Notification, NotificationRenderer};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Validating,
    Matching,
    Filtering,
    Grouping,
    Rendering,
    Committing,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Idle => "idle",
            Stage::Validating => "validating",
            Stage::Matching => "matching",
            Stage::Filtering => "filtering",
            Stage::Grouping => "grouping",
            Stage::Rendering => "rendering",
            Stage::Committing => "committing",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// PipelineObserver
// ---------------------------------------------------------------------------

/// Progress port for a run. Implementations decide where the narrative goes.
pub trait PipelineObserver {
    fn stage(&mut self, stage: Stage, detail: &str);
}

/// Forwards stage transitions to `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver {
    run_id: String,
}

impl TracingObserver {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }
}

impl PipelineObserver for TracingObserver {
    fn stage(&mut self, stage: Stage, detail: &str) {
        match stage {
            Stage::Failed => tracing::error!(run = %self.run_id, %stage, "{detail}"),
            _ => tracing::info!(run = %self.run_id, %stage, "{detail}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs / report
// ---------------------------------------------------------------------------

/// The three tables for a run. `None` means the table was never supplied.
#[derive(Debug, Clone, Default)]
pub struct PipelineInputs {
    pub clients: Option<Vec<ClientRecord>>,
    pub referrals: Option<Vec<ReferralRecord>>,
    pub appointments: Option<Vec<AppointmentRecord>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedGroup {
    pub referral_source: String,
    pub recipient: String,
    pub clients: usize,
    pub artifact: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub procedure_code: String,
    pub matched_count: usize,
    pub new_count: usize,
    pub skipped_appointments: Vec<String>,
    pub excluded_count: usize,
    pub cache_degraded: bool,
    pub dry_run: bool,
    /// Clients that would be or were notified, in match order.
    pub new_clients: Vec<MatchedClient>,
    pub rendered_groups: Vec<RenderedGroup>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Settings a run needs beyond its inputs.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub procedure_code: String,
    pub excluded_sources: Vec<String>,
    pub unknown_client: UnknownClientPolicy,
    /// Stop after grouping: nothing is rendered or committed.
    pub dry_run: bool,
}

impl From<&Config> for PipelineSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            procedure_code: cfg.procedure_code.clone(),
            excluded_sources: cfg.excluded_sources.clone(),
            unknown_client: cfg.unknown_client,
            dry_run: false,
        }
    }
}

/// Sequences validate → match → filter-new → group → render → commit.
///
/// The cache file is the only durable state touched, and only in the final
/// commit step, after every group has rendered.
pub struct Pipeline<'a> {
    settings: PipelineSettings,
    cache: &'a ProcessedCache,
    renderer: &'a mut dyn NotificationRenderer,
    observer: &'a mut dyn PipelineObserver,
    run_id: String,
    stage: Stage,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        settings: PipelineSettings,
        cache: &'a ProcessedCache,
        renderer: &'a mut dyn NotificationRenderer,
        observer: &'a mut dyn PipelineObserver,
    ) -> Self {
        Self {
            settings,
            cache,
            renderer,
            observer,
            run_id: Uuid::new_v4().to_string(),
            stage: Stage::Idle,
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn enter(&mut self, stage: Stage, detail: impl AsRef<str>) {
        self.stage = stage;
        self.observer.stage(stage, detail.as_ref());
    }

    /// Execute one run against `inputs`, evaluating "future" relative to `now`.
    pub fn run(&mut self, inputs: PipelineInputs, now: NaiveDateTime) -> Result<RunReport> {
        let result = self.run_stages(inputs, now);
        if let Err(e) = &result {
            self.enter(Stage::Failed, e.to_string());
        }
        result
    }

    fn run_stages(&mut self, inputs: PipelineInputs, now: NaiveDateTime) -> Result<RunReport> {
        self.enter(Stage::Validating, "checking inputs");
        let (clients, referrals, appointments) = validate(inputs)?;

        let code = self.settings.procedure_code.clone();
        self.enter(Stage::Matching, format!("matching appointments for code {code}"));
        let outcome = match_clients(
            &clients,
            &referrals,
            &appointments,
            &code,
            now,
            self.settings.unknown_client,
        )?;
        let matched_count = outcome.clients.len();

        let snapshot = self.cache.load();
        let new_clients: Vec<MatchedClient> = outcome
            .clients
            .into_iter()
            .filter(|c| !snapshot.ids.contains(&c.client_id))
            .collect();
        self.enter(
            Stage::Filtering,
            format!(
                "{} matched, {} already notified, {} new",
                matched_count,
                matched_count - new_clients.len(),
                new_clients.len()
            ),
        );

        let mut report = RunReport {
            run_id: self.run_id.clone(),
            procedure_code: code,
            matched_count,
            new_count: new_clients.len(),
            skipped_appointments: outcome.skipped_appointments,
            excluded_count: 0,
            cache_degraded: snapshot.degraded,
            dry_run: self.settings.dry_run,
            new_clients,
            rendered_groups: Vec::new(),
        };

        if report.new_clients.is_empty() {
            self.enter(Stage::Done, "no new clients found");
            return Ok(report);
        }

        let groups = group_by_referral(&report.new_clients, &self.settings.excluded_sources);
        let grouped: usize = groups.iter().map(|g| g.clients.len()).sum();
        report.excluded_count = report.new_clients.len() - grouped;
        self.enter(
            Stage::Grouping,
            format!(
                "{} referral groups, {} clients without a notifiable source",
                groups.len(),
                report.excluded_count
            ),
        );

        if self.settings.dry_run {
            report.rendered_groups = groups
                .iter()
                .map(|g| planned_group(&Notification::from_group(g), g))
                .collect();
            self.enter(Stage::Done, "dry run; nothing rendered or committed");
            return Ok(report);
        }

        self.enter(Stage::Rendering, format!("rendering {} notifications", groups.len()));
        report.rendered_groups = self.render_all(&groups)?;

        self.enter(Stage::Committing, "updating processed-client cache");
        let mut ids = snapshot.ids;
        ids.extend(report.new_clients.iter().map(|c| c.client_id.clone()));
        self.cache.save(&ids)?;

        self.enter(
            Stage::Done,
            format!("found {} new clients with '{}' appointments", report.new_count, report.procedure_code),
        );
        Ok(report)
    }

    /// Render every group; on the first failure, discard what this run wrote.
    fn render_all(&mut self, groups: &[ReferralGroup]) -> Result<Vec<RenderedGroup>> {
        let mut produced: Vec<Artifact> = Vec::new();
        let mut rendered = Vec::new();
        for group in groups {
            let notification = Notification::from_group(group);
            match self.renderer.render(&notification) {
                Ok(artifact) => {
                    rendered.push(RenderedGroup {
                        referral_source: group.referral_source.clone(),
                        recipient: notification.recipient.clone(),
                        clients: group.clients.len(),
                        artifact: artifact.id.clone(),
                    });
                    produced.push(artifact);
                }
                Err(e) => {
                    for artifact in &produced {
                        if let Err(discard_err) = self.renderer.discard(artifact) {
                            tracing::warn!(artifact = %artifact.id, error = %discard_err, "failed to discard artifact");
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(rendered)
    }
}

fn planned_group(notification: &Notification, group: &ReferralGroup) -> RenderedGroup {
    RenderedGroup {
        referral_source: group.referral_source.clone(),
        recipient: notification.recipient.clone(),
        clients: group.clients.len(),
        artifact: String::new(),
    }
}

type Tables = (Vec<ClientRecord>, Vec<ReferralRecord>, Vec<AppointmentRecord>);

fn validate(inputs: PipelineInputs) -> Result<Tables> {
    match (inputs.clients, inputs.referrals, inputs.appointments) {
        (Some(c), Some(r), Some(a)) => Ok((c, r, a)),
        (c, r, a) => {
            let missing = [
                (c.is_none(), TableKind::Demographics),
                (r.is_none(), TableKind::Referral),
                (a.is_none(), TableKind::Appointments),
            ]
            .into_iter()
            .filter(|(absent, _)| *absent)
            .map(|(_, kind)| kind.label().to_string())
            .collect();
            Err(ReferralError::MissingInput(missing))
        }
    }
}
