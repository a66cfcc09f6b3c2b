//! Records carried in revision note payloads: inline comments, robot
//! comments, and submit-requirement results.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::change::{AccountId, PatchSetId};
use crate::error::TypeError;
use crate::timestamp::Timestamp;

/// Identity of an inline comment. Unique within a change.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommentKey {
    pub patch_set: PatchSetId,
    pub filename: String,
    pub uuid: String,
}

impl CommentKey {
    pub fn new(
        patch_set: PatchSetId,
        filename: impl Into<String>,
        uuid: impl Into<String>,
    ) -> Self {
        Self {
            patch_set,
            filename: filename.into(),
            uuid: uuid.into(),
        }
    }
}

impl fmt::Display for CommentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.filename, self.uuid, self.patch_set)
    }
}

/// A published inline comment written by a human.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub key: CommentKey,
    /// `None` for file-level comments.
    pub line: Option<u32>,
    pub author: AccountId,
    pub real_author: Option<AccountId>,
    pub written_on: Timestamp,
    pub message: String,
    #[serde(default)]
    pub unresolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_uuid: Option<String>,
}

/// A comment posted by an automated checker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotComment {
    pub key: CommentKey,
    pub line: Option<u32>,
    pub author: AccountId,
    pub written_on: Timestamp,
    pub message: String,
    pub robot_id: String,
    pub robot_run_id: String,
}

/// Outcome of evaluating one submit requirement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitRequirementStatus {
    Satisfied,
    Unsatisfied,
    Overridden,
    NotApplicable,
    Error,
}

impl SubmitRequirementStatus {
    /// Whether this status lets the change be submitted.
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Satisfied | Self::Overridden | Self::NotApplicable)
    }
}

impl FromStr for SubmitRequirementStatus {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "satisfied" => Ok(Self::Satisfied),
            "unsatisfied" => Ok(Self::Unsatisfied),
            "overridden" => Ok(Self::Overridden),
            "not_applicable" => Ok(Self::NotApplicable),
            "error" => Ok(Self::Error),
            other => Err(TypeError::InvalidSubmitRequirementStatus(other.to_string())),
        }
    }
}

/// A stored submit-requirement result for a patch set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequirementResult {
    pub name: String,
    pub patch_set: PatchSetId,
    pub status: SubmitRequirementStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_key_display() {
        let key = CommentKey::new(PatchSetId::new(3), "src/lib.rs", "abc");
        assert_eq!(key.to_string(), "src/lib.rs:abc@3");
    }

    #[test]
    fn fulfilled_statuses() {
        assert!(SubmitRequirementStatus::Satisfied.is_fulfilled());
        assert!(SubmitRequirementStatus::Overridden.is_fulfilled());
        assert!(SubmitRequirementStatus::NotApplicable.is_fulfilled());
        assert!(!SubmitRequirementStatus::Unsatisfied.is_fulfilled());
        assert!(!SubmitRequirementStatus::Error.is_fulfilled());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&SubmitRequirementStatus::NotApplicable).unwrap();
        assert_eq!(json, "\"not_applicable\"");
        assert_eq!(
            "not_applicable".parse::<SubmitRequirementStatus>().unwrap(),
            SubmitRequirementStatus::NotApplicable
        );
    }

    #[test]
    fn comment_defaults_unresolved_to_false() {
        let json = r#"{
            "key": {"patch_set": 1, "filename": "a.rs", "uuid": "u1"},
            "line": 4,
            "author": 1000,
            "real_author": null,
            "written_on": 5,
            "message": "typo"
        }"#;
        let comment: Comment = serde_json::from_str(json).unwrap();
        assert!(!comment.unresolved);
        assert_eq!(comment.parent_uuid, None);
    }
}
