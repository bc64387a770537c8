use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ForgeError;

/// Feature version tag that marks a feature as part of the MVP.
pub const MVP_VERSION: &str = "v1";

pub fn is_mvp_version(version: &str) -> bool {
    version == MVP_VERSION
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Welcome,
    Problem,
    Personas,
    Mvp,
    Summary,
    Complete,
}

impl Stage {
    pub fn all() -> &'static [Stage] {
        &[
            Stage::Welcome,
            Stage::Problem,
            Stage::Personas,
            Stage::Mvp,
            Stage::Summary,
            Stage::Complete,
        ]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<Stage> {
        Stage::all().get(self.index() + 1).copied()
    }

    /// 1-based position in the sequence (`welcome` = 1, `complete` = 6).
    pub fn number(self) -> usize {
        self.index() + 1
    }

    /// Stages shown in progress indicators; `complete` is not one of them.
    pub fn visible_count() -> usize {
        Stage::all().len() - 1
    }

    pub fn is_complete(self) -> bool {
        self == Stage::Complete
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Welcome => "welcome",
            Stage::Problem => "problem",
            Stage::Personas => "personas",
            Stage::Mvp => "mvp",
            Stage::Summary => "summary",
            Stage::Complete => "complete",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::all()
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| ForgeError::Validation(format!("invalid stage: {s}")))
    }
}

// ---------------------------------------------------------------------------
// PrdStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrdStatus {
    Pending,
    Draft,
    Ready,
    InProgress,
    Complete,
}

impl PrdStatus {
    pub fn all() -> &'static [PrdStatus] {
        &[
            PrdStatus::Pending,
            PrdStatus::Draft,
            PrdStatus::Ready,
            PrdStatus::InProgress,
            PrdStatus::Complete,
        ]
    }

    /// The transition table. `in_progress -> ready` is only taken when the
    /// active PRD is cleared.
    pub fn allowed_next(self) -> &'static [PrdStatus] {
        match self {
            PrdStatus::Pending => &[PrdStatus::Draft],
            PrdStatus::Draft => &[PrdStatus::Ready],
            PrdStatus::Ready => &[PrdStatus::InProgress],
            PrdStatus::InProgress => &[PrdStatus::Complete, PrdStatus::Ready],
            PrdStatus::Complete => &[],
        }
    }

    pub fn can_transition_to(self, target: PrdStatus) -> bool {
        self.allowed_next().contains(&target)
    }

    /// Statuses an external caller may request directly. `pending` and
    /// `draft` are only reached through generation.
    pub fn externally_settable() -> &'static [PrdStatus] {
        &[PrdStatus::Ready, PrdStatus::InProgress, PrdStatus::Complete]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PrdStatus::Pending => "pending",
            PrdStatus::Draft => "draft",
            PrdStatus::Ready => "ready",
            PrdStatus::InProgress => "in_progress",
            PrdStatus::Complete => "complete",
        }
    }
}

impl fmt::Display for PrdStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PrdStatus {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PrdStatus::Pending),
            "draft" => Ok(PrdStatus::Draft),
            "ready" => Ok(PrdStatus::Ready),
            "in_progress" => Ok(PrdStatus::InProgress),
            "complete" => Ok(PrdStatus::Complete),
            _ => Err(ForgeError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
