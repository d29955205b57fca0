use crate::error::{ReferralError, Result};
use crate::grouper::ReferralGroup;
use crate::io::{atomic_write, ensure_dir, unique_path};
use crate::names;
use crate::timestamp::{DISPLAY_FORMAT, UNKNOWN_TIME};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const CONFIDENTIALITY_NOTICE: &str = "Confidentiality Statement. The documents accompanying this transmission contain confidential health information that is legally protected. This information is intended only for the use of the individuals or entities listed above. If you are not the intended recipient, you are hereby notified that any disclosure, copying, distribution, or action taken in reliance on the contents of these documents is strictly prohibited. If you have received this information in error, please notify the sender immediately and arrange for the return or destruction of these documents.";

// ---------------------------------------------------------------------------
// Notification / Artifact
// ---------------------------------------------------------------------------

/// One (client, appointment) line of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationEntry {
    pub client_name: String,
    pub appointment_time: String,
}

/// Everything a renderer needs for one referral group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Exact referral source key the group was built from.
    pub referral_source: String,
    /// Normalized name used in the greeting.
    pub recipient: String,
    pub entries: Vec<NotificationEntry>,
}

impl Notification {
    pub fn from_group(group: &ReferralGroup) -> Self {
        Self {
            referral_source: group.referral_source.clone(),
            recipient: names::normalize(&group.referral_source),
            entries: group
                .clients
                .iter()
                .map(|c| NotificationEntry {
                    client_name: c.display_name.clone(),
                    appointment_time: c.appointment_time.clone(),
                })
                .collect(),
        }
    }
}

/// Identifier of a rendered notification (for the letter renderer, a file path).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub recipient: String,
    pub id: String,
}

// ---------------------------------------------------------------------------
// NotificationRenderer
// ---------------------------------------------------------------------------

pub trait NotificationRenderer {
    fn render(&mut self, notification: &Notification) -> Result<Artifact>;

    /// Remove an artifact produced earlier in a run that is being abandoned.
    fn discard(&mut self, _artifact: &Artifact) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LetterRenderer
// ---------------------------------------------------------------------------

/// Writes one Markdown letter per referral group into an output directory.
#[derive(Debug, Clone)]
pub struct LetterRenderer {
    output_dir: PathBuf,
    logo: Option<PathBuf>,
    /// Logo path that was not found; reported once, on the first letter.
    missing_logo: Option<PathBuf>,
    organization: String,
}

impl LetterRenderer {
    /// `logo` is used only if it exists on disk; otherwise the organization name
    /// is printed as the letterhead.
    pub fn new(output_dir: impl Into<PathBuf>, logo: &Path, organization: impl Into<String>) -> Self {
        let (logo, missing_logo) = if logo.exists() {
            (Some(logo.to_path_buf()), None)
        } else {
            (None, Some(logo.to_path_buf()))
        };
        Self {
            output_dir: output_dir.into(),
            logo,
            missing_logo,
            organization: organization.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Letter body for `notification`.
    pub fn compose(&self, notification: &Notification) -> String {
        let mut out = String::new();
        match &self.logo {
            Some(logo) => {
                let _ = writeln!(out, "![{}]({})\n", self.organization, logo.display());
            }
            None => {
                let _ = writeln!(out, "# {}\n", self.organization);
            }
        }
        let _ = writeln!(out, "Hi {},\n", notification.recipient);
        out.push_str(
            "Thank you for referring the following clients. \
             Here is a list of their tentative evaluation appointments:\n\n",
        );
        for entry in &notification.entries {
            let _ = writeln!(out, "- {}", appointment_line(entry));
        }
        let _ = writeln!(out, "\nThank you again!\n\n{}\n", self.organization);
        let _ = writeln!(out, "---\n\n*{CONFIDENTIALITY_NOTICE}*");
        out
    }
}

impl NotificationRenderer for LetterRenderer {
    fn render(&mut self, notification: &Notification) -> Result<Artifact> {
        if let Some(missing) = self.missing_logo.take() {
            tracing::warn!(logo = %missing.display(), "logo file not found; letters will use a text letterhead");
        }
        ensure_dir(&self.output_dir).map_err(|e| render_error(notification, e))?;
        let stem = file_stem(notification);
        let path = unique_path(&self.output_dir, &stem, "md");
        let body = self.compose(notification);
        atomic_write(&path, body.as_bytes()).map_err(|e| render_error(notification, e))?;
        tracing::info!(path = %path.display(), recipient = %notification.recipient, "created letter");
        Ok(Artifact {
            recipient: notification.recipient.clone(),
            id: path.display().to_string(),
        })
    }

    fn discard(&mut self, artifact: &Artifact) -> Result<()> {
        let path = Path::new(&artifact.id);
        if path.exists() {
            std::fs::remove_file(path)?;
            tracing::info!(path = %path.display(), "discarded letter");
        }
        Ok(())
    }
}

fn render_error(notification: &Notification, e: impl std::fmt::Display) -> ReferralError {
    ReferralError::Render {
        recipient: notification.recipient.clone(),
        reason: e.to_string(),
    }
}

/// `Jane Doe on 03/04/2031 at 9:05 AM`, or `Jane Doe - Appointment time unknown`.
pub fn appointment_line(entry: &NotificationEntry) -> String {
    if entry.appointment_time == UNKNOWN_TIME {
        return format!("{} - Appointment time unknown", entry.client_name);
    }
    match NaiveDateTime::parse_from_str(&entry.appointment_time, DISPLAY_FORMAT) {
        Ok(dt) => format!(
            "{} on {} at {}",
            entry.client_name,
            dt.format("%m/%d/%Y"),
            dt.format("%-I:%M %p")
        ),
        Err(_) => format!("{} on {}", entry.client_name, entry.appointment_time),
    }
}

/// File stem for a letter: the source's parenthesized annotation (usually a
/// fax number), else the recipient name, else `Referral`. Only letters, digits
/// and single spaces survive.
pub fn file_stem(notification: &Notification) -> String {
    let candidates = [
        names::parenthesized(&notification.referral_source).map(title_case),
        Some(notification.recipient.clone()),
    ];
    candidates
        .into_iter()
        .flatten()
        .map(|s| sanitize(&s))
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| "Referral".to_string())
}

fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
