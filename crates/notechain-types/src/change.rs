use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::timestamp::Timestamp;

/// Numeric account identifier of a user or robot acting on a change.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(u32);

impl AccountId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.0)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Patch set number within a change, starting at 1.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatchSetId(u32);

impl PatchSetId {
    pub const FIRST: Self = Self(1);

    pub const fn new(n: u32) -> Self {
        Self(n)
    }

    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for PatchSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PatchSetId({})", self.0)
    }
}

impl fmt::Display for PatchSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    #[default]
    New,
    Abandoned,
    Merged,
}

impl ChangeStatus {
    /// Abandoned and merged changes are closed. Transitions into a closed
    /// status are the terminal actions exempt from the update ceiling.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Abandoned | Self::Merged)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Abandoned => "abandoned",
            Self::Merged => "merged",
        }
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeStatus {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "abandoned" => Ok(Self::Abandoned),
            "merged" => Ok(Self::Merged),
            other => Err(TypeError::InvalidStatus(other.to_string())),
        }
    }
}

/// An account's role on a change.
///
/// `Removed` is only ever written as an update; a loaded state drops removed
/// accounts from its reviewer table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewerState {
    Reviewer,
    Cc,
    Removed,
}

impl ReviewerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reviewer => "reviewer",
            Self::Cc => "cc",
            Self::Removed => "removed",
        }
    }
}

impl fmt::Display for ReviewerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a vote: who voted on which label of which patch set.
///
/// The vote's value is deliberately not part of its identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoteKey {
    pub patch_set: PatchSetId,
    pub label: String,
    pub account: AccountId,
}

impl VoteKey {
    pub fn new(patch_set: PatchSetId, label: impl Into<String>, account: AccountId) -> Self {
        Self {
            patch_set,
            label: label.into(),
            account,
        }
    }
}

/// A label vote cast on a patch set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub key: VoteKey,
    pub value: i16,
    /// Set when the vote was cast on behalf of another user.
    pub real_account: Option<AccountId>,
    pub granted: Timestamp,
}

/// A change message: the free-text body of one update commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeMessage {
    /// 1-based position of the carrying commit in the chain. Stable under
    /// chain rewrites, unlike the commit's object id.
    pub seq: usize,
    pub patch_set: PatchSetId,
    pub author: AccountId,
    pub real_author: Option<AccountId>,
    pub written_on: Timestamp,
    pub tag: Option<String>,
    pub message: String,
}
