//! Run lifecycle model for one extraction job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RecordKind;
use crate::error::PipelineError;

/// Maximum length of the stored error summary.
pub const ERROR_TEXT_CAP: usize = 2000;

/// Run lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Completed and Failed are final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Transitions only move forward: Pending -> Running -> {Completed, Failed}.
    /// A Pending run may also fail directly when setup blows up.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Failed)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which extraction engine produced (or last attempted) a run's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Http,
    Browser,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Browser => "browser",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "http" => Some(Self::Http),
            "browser" => Some(Self::Browser),
            _ => None,
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for creating a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRun {
    pub municipality_code: String,
    pub area: String,
    pub year: i32,
    pub months: Vec<u32>,
    pub kinds: Vec<RecordKind>,
}

impl NewRun {
    pub fn new(municipality_code: &str, area: &str, year: i32) -> Self {
        Self {
            municipality_code: municipality_code.to_string(),
            area: area.to_string(),
            year,
            months: Vec::new(),
            kinds: Vec::new(),
        }
    }

    pub fn months(mut self, months: impl IntoIterator<Item = u32>) -> Self {
        self.months = months.into_iter().collect();
        self
    }

    pub fn kinds(mut self, kinds: impl IntoIterator<Item = RecordKind>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    /// Sort and dedupe months, dedupe kinds keeping request order, default to honorarium.
    pub fn normalized(mut self) -> Self {
        self.months.retain(|m| (1..=12).contains(m));
        self.months.sort_unstable();
        self.months.dedup();

        let mut kinds = Vec::with_capacity(self.kinds.len());
        for kind in self.kinds {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        if kinds.is_empty() {
            kinds.push(RecordKind::Honorarium);
        }
        self.kinds = kinds;
        self
    }
}

/// One extraction job and its persisted lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: i64,
    /// Numeric municipality identifier as supplied by the caller.
    pub municipality_code: String,
    /// Subject area (e.g. "Salud").
    pub area: String,
    pub year: i32,
    pub months: Vec<u32>,
    pub kinds: Vec<RecordKind>,
    pub status: RunStatus,
    pub engine_used: Option<EngineKind>,
    /// Exact count of canonical records handed to persistence.
    pub records_loaded: u64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Run {
    /// Build a pending run from creation parameters.
    pub fn pending(id: i64, new: NewRun) -> Self {
        let new = new.normalized();
        Self {
            id,
            municipality_code: new.municipality_code,
            area: new.area,
            year: new.year,
            months: new.months,
            kinds: new.kinds,
            status: RunStatus::Pending,
            engine_used: None,
            records_loaded: 0,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Portal organization code derived from the municipality identifier.
    pub fn org_code(&self) -> String {
        org_code(&self.municipality_code)
    }

    /// Move to `next`, refusing anything but a forward transition.
    fn transition(&mut self, next: RunStatus) -> Result<(), PipelineError> {
        if !self.status.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Mark as running.
    pub fn set_running(&mut self) -> Result<(), PipelineError> {
        self.transition(RunStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Close the run with its final outcome, which must be terminal.
    pub fn finish(&mut self, status: RunStatus, errors: &[String]) -> Result<(), PipelineError> {
        if !status.is_terminal() {
            return Err(PipelineError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: status,
            });
        }
        self.transition(status)?;
        self.error_message = if errors.is_empty() {
            None
        } else {
            Some(cap_error_text(&errors.join("; ")))
        };
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Mark failed from a fatal error.
    pub fn fail(&mut self, error: &str) -> Result<(), PipelineError> {
        self.transition(RunStatus::Failed)?;
        self.error_message = Some(cap_error_text(error));
        self.completed_at = Some(Utc::now());
        Ok(())
    }
}

/// Derive the portal organization code (`MU280`) from a municipality identifier.
///
/// Numeric codes are zero-padded to three digits. Anything else is passed
/// through upper-cased so already-formed codes keep working.
pub fn org_code(municipality_code: &str) -> String {
    let trimmed = municipality_code.trim();
    match trimmed.parse::<u32>() {
        Ok(n) => format!("MU{:03}", n),
        Err(_) => trimmed.to_uppercase(),
    }
}

/// Truncate error text to the storage cap on a char boundary.
pub fn cap_error_text(text: &str) -> String {
    text.chars().take(ERROR_TEXT_CAP).collect()
}
