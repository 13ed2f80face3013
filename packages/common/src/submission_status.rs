#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::event::JudgeStatus;

/// Status of a submission row during its lifecycle.
///
/// Set exactly twice: `Pending` on creation, then one terminal status once
/// the verdict is known. When the `sea-orm` feature is enabled, this enum
/// can be used directly in SeaORM entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Created, verdict not yet known.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "pending"))]
    Pending,
    /// All test cases passed.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "accepted"))]
    Accepted,
    /// Output did not match the expected output.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "wrong_answer"))]
    WrongAnswer,
    /// Program crashed, exited non-zero, or the run was aborted.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "runtime_error"))]
    RuntimeError,
    /// Failed to compile (or failed syntax analysis before compile).
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "compilation_error"))]
    CompilationError,
    /// Exceeded a time or memory constraint.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "limit_exceed"))]
    LimitExceed,
}

impl SubmissionStatus {
    /// Returns true once the submission can no longer change.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// All possible status values.
    pub const ALL: &'static [SubmissionStatus] = &[
        Self::Pending,
        Self::Accepted,
        Self::WrongAnswer,
        Self::RuntimeError,
        Self::CompilationError,
        Self::LimitExceed,
    ];

    /// Returns the string representation (snake_case, as stored).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::WrongAnswer => "wrong_answer",
            Self::RuntimeError => "runtime_error",
            Self::CompilationError => "compilation_error",
            Self::LimitExceed => "limit_exceed",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for SubmissionStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// The terminal status a judge outcome finalizes the submission row with.
impl From<JudgeStatus> for SubmissionStatus {
    fn from(status: JudgeStatus) -> Self {
        match status {
            JudgeStatus::Accepted => Self::Accepted,
            JudgeStatus::WrongAnswer => Self::WrongAnswer,
            JudgeStatus::RuntimeError => Self::RuntimeError,
            JudgeStatus::CompilationError => Self::CompilationError,
            JudgeStatus::TimeLimitExceeded | JudgeStatus::MemoryLimitExceeded => Self::LimitExceed,
        }
    }
}

/// Error when parsing an invalid status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError {
    invalid: String,
}

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid status '{}'. Valid values: {}",
            self.invalid,
            SubmissionStatus::ALL
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for SubmissionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "wrong_answer" => Ok(Self::WrongAnswer),
            "runtime_error" => Ok(Self::RuntimeError),
            "compilation_error" => Ok(Self::CompilationError),
            "limit_exceed" => Ok(Self::LimitExceed),
            _ => Err(ParseStatusError {
                invalid: s.to_string(),
            }),
        }
    }
}
