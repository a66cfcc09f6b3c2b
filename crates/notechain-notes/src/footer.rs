//! The footer vocabulary of update commits.
//!
//! An update commit message has three parts separated by blank lines:
//!
//! ```text
//! Update patch set 2
//!
//! Free-text change message (optional, may span paragraphs)
//!
//! Patch-set: 2
//! Status: new
//! Label: Code-Review=+1 1000
//! Reviewer: 1001
//! ```
//!
//! The last paragraph is the footer block. Keys outside the vocabulary are
//! ignored so that older readers tolerate newer writers.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use notechain_types::{AccountId, ChangeStatus, PatchSetId, ReviewerState};

pub const FOOTER_PATCH_SET: &str = "Patch-set";
pub const FOOTER_STATUS: &str = "Status";
pub const FOOTER_TOPIC: &str = "Topic";
pub const FOOTER_LABEL: &str = "Label";
pub const FOOTER_HASHTAGS: &str = "Hashtags";
pub const FOOTER_SUBJECT: &str = "Subject";
pub const FOOTER_BRANCH: &str = "Branch";
pub const FOOTER_REAL_USER: &str = "Real-user";
pub const FOOTER_TAG: &str = "Tag";
pub const FOOTER_WORK_IN_PROGRESS: &str = "Work-in-progress";
pub const FOOTER_PRIVATE: &str = "Private";
pub const FOOTER_SUBMISSION_ID: &str = "Submission-id";
pub const FOOTER_REVIEWER: &str = "Reviewer";
pub const FOOTER_CC: &str = "CC";
pub const FOOTER_REMOVED: &str = "Removed";

/// The footer key that records an account entering `state`.
pub fn reviewer_footer(state: ReviewerState) -> &'static str {
    match state {
        ReviewerState::Reviewer => FOOTER_REVIEWER,
        ReviewerState::Cc => FOOTER_CC,
        ReviewerState::Removed => FOOTER_REMOVED,
    }
}

/// A footer block that does not follow the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FooterError {
    #[error("missing {0} footer")]
    Missing(&'static str),

    #[error("expected exactly one {key} footer, found {count}")]
    Duplicate { key: &'static str, count: usize },

    #[error("invalid {key} footer: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// A vote footer: either sets or removes one account's vote on a label.
///
/// `account = None` means the vote belongs to the commit author.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LabelFooter {
    Set {
        label: String,
        value: i16,
        account: Option<AccountId>,
    },
    Remove {
        label: String,
        account: Option<AccountId>,
    },
}

impl LabelFooter {
    fn encode(&self) -> String {
        let (mut line, account) = match self {
            Self::Set {
                label,
                value,
                account,
            } => (format!("{label}={value:+}"), account),
            Self::Remove { label, account } => (format!("-{label}"), account),
        };
        if let Some(account) = account {
            let _ = write!(line, " {account}");
        }
        line
    }

    fn parse(value: &str) -> Result<Self, FooterError> {
        let invalid = || FooterError::Invalid {
            key: FOOTER_LABEL,
            value: value.to_string(),
        };
        let (vote, account) = match value.split_once(' ') {
            Some((vote, account)) => {
                let id = account.trim().parse::<u32>().map_err(|_| invalid())?;
                (vote, Some(AccountId::new(id)))
            }
            None => (value, None),
        };
        if let Some(label) = vote.strip_prefix('-') {
            if !valid_label(label) {
                return Err(invalid());
            }
            return Ok(Self::Remove {
                label: label.to_string(),
                account,
            });
        }
        let (label, raw) = vote.split_once('=').ok_or_else(invalid)?;
        if !valid_label(label) {
            return Err(invalid());
        }
        let value = raw
            .strip_prefix('+')
            .unwrap_or(raw)
            .parse::<i16>()
            .map_err(|_| invalid())?;
        Ok(Self::Set {
            label: label.to_string(),
            value,
            account,
        })
    }
}

fn valid_label(label: &str) -> bool {
    !label.is_empty()
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// The structured content of one update commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateFields {
    pub patch_set: PatchSetId,
    pub status: Option<ChangeStatus>,
    /// `Some("")` clears the topic.
    pub topic: Option<String>,
    pub hashtags: Option<BTreeSet<String>>,
    pub subject: Option<String>,
    pub branch: Option<String>,
    pub real_user: Option<AccountId>,
    pub tag: Option<String>,
    pub work_in_progress: Option<bool>,
    pub private: Option<bool>,
    pub submission_id: Option<String>,
    pub labels: Vec<LabelFooter>,
    /// Reviewer role changes, one per account.
    pub reviewers: BTreeMap<AccountId, ReviewerState>,
    /// Free-text change message.
    pub body: Option<String>,
}

impl UpdateFields {
    pub fn new(patch_set: PatchSetId) -> Self {
        Self {
            patch_set,
            status: None,
            topic: None,
            hashtags: None,
            subject: None,
            branch: None,
            real_user: None,
            tag: None,
            work_in_progress: None,
            private: None,
            submission_id: None,
            labels: Vec::new(),
            reviewers: BTreeMap::new(),
            body: None,
        }
    }

    /// Render the full commit message.
    pub fn to_message(&self) -> String {
        let mut msg = format!("Update patch set {}\n\n", self.patch_set);
        if let Some(body) = self.body.as_deref().filter(|b| !b.is_empty()) {
            msg.push_str(body);
            msg.push_str("\n\n");
        }
        let mut footer = |key: &str, value: &str| {
            let _ = writeln!(msg, "{key}: {value}");
        };
        footer(FOOTER_PATCH_SET, &self.patch_set.to_string());
        if let Some(status) = self.status {
            footer(FOOTER_STATUS, status.as_str());
        }
        if let Some(topic) = &self.topic {
            footer(FOOTER_TOPIC, topic);
        }
        if let Some(hashtags) = &self.hashtags {
            let joined = hashtags.iter().map(String::as_str).collect::<Vec<_>>().join(",");
            footer(FOOTER_HASHTAGS, &joined);
        }
        if let Some(subject) = &self.subject {
            footer(FOOTER_SUBJECT, subject);
        }
        if let Some(branch) = &self.branch {
            footer(FOOTER_BRANCH, branch);
        }
        if let Some(real_user) = self.real_user {
            footer(FOOTER_REAL_USER, &real_user.to_string());
        }
        if let Some(tag) = &self.tag {
            footer(FOOTER_TAG, tag);
        }
        if let Some(wip) = self.work_in_progress {
            footer(FOOTER_WORK_IN_PROGRESS, &wip.to_string());
        }
        if let Some(private) = self.private {
            footer(FOOTER_PRIVATE, &private.to_string());
        }
        if let Some(submission_id) = &self.submission_id {
            footer(FOOTER_SUBMISSION_ID, submission_id);
        }
        for label in &self.labels {
            footer(FOOTER_LABEL, &label.encode());
        }
        for (account, state) in &self.reviewers {
            footer(reviewer_footer(*state), &account.to_string());
        }
        msg
    }

    /// Parse a commit message produced by [`UpdateFields::to_message`].
    pub fn parse(message: &str) -> Result<Self, FooterError> {
        let parts = MessageParts::split(message);
        let footers = parse_footer_block(parts.footers);

        let patch_set = one(&footers, FOOTER_PATCH_SET)?
            .ok_or(FooterError::Missing(FOOTER_PATCH_SET))
            .and_then(|v| {
                v.parse::<u32>()
                    .ok()
                    .filter(|n| *n > 0)
                    .map(PatchSetId::new)
                    .ok_or_else(|| invalid(FOOTER_PATCH_SET, v))
            })?;

        let mut fields = Self::new(patch_set);
        fields.status = one(&footers, FOOTER_STATUS)?
            .map(|v| v.parse().map_err(|_| invalid(FOOTER_STATUS, v)))
            .transpose()?;
        fields.topic = one(&footers, FOOTER_TOPIC)?.map(str::to_string);
        fields.hashtags = one(&footers, FOOTER_HASHTAGS)?.map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        });
        fields.subject = one(&footers, FOOTER_SUBJECT)?.map(str::to_string);
        fields.branch = one(&footers, FOOTER_BRANCH)?.map(str::to_string);
        fields.real_user = one(&footers, FOOTER_REAL_USER)?
            .map(|v| {
                v.parse::<u32>()
                    .map(AccountId::new)
                    .map_err(|_| invalid(FOOTER_REAL_USER, v))
            })
            .transpose()?;
        fields.tag = one(&footers, FOOTER_TAG)?.map(str::to_string);
        fields.work_in_progress = one(&footers, FOOTER_WORK_IN_PROGRESS)?
            .map(|v| parse_bool(FOOTER_WORK_IN_PROGRESS, v))
            .transpose()?;
        fields.private = one(&footers, FOOTER_PRIVATE)?
            .map(|v| parse_bool(FOOTER_PRIVATE, v))
            .transpose()?;
        fields.submission_id = one(&footers, FOOTER_SUBMISSION_ID)?.map(str::to_string);
        fields.labels = footers
            .iter()
            .filter(|(k, _)| *k == FOOTER_LABEL)
            .map(|(_, v)| LabelFooter::parse(v))
            .collect::<Result<_, _>>()?;
        for (key, value) in &footers {
            let state = match *key {
                FOOTER_REVIEWER => ReviewerState::Reviewer,
                FOOTER_CC => ReviewerState::Cc,
                FOOTER_REMOVED => ReviewerState::Removed,
                _ => continue,
            };
            let key = reviewer_footer(state);
            let account = value
                .parse::<u32>()
                .map(AccountId::new)
                .map_err(|_| invalid(key, value))?;
            // One role change per account per update.
            if fields.reviewers.insert(account, state).is_some() {
                return Err(invalid(key, value));
            }
        }
        fields.body = parts.body.map(str::to_string);
        Ok(fields)
    }

    /// An update that moves the change into a closed status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_some_and(|s| s.is_closed())
    }
}

fn invalid(key: &'static str, value: &str) -> FooterError {
    FooterError::Invalid {
        key,
        value: value.to_string(),
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, FooterError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(invalid(key, other)),
    }
}

/// The single value of a footer that may appear at most once.
fn one<'a>(
    footers: &[(&str, &'a str)],
    key: &'static str,
) -> Result<Option<&'a str>, FooterError> {
    let mut values = footers.iter().filter(|(k, _)| *k == key).map(|(_, v)| *v);
    let first = values.next();
    let rest = values.count();
    if rest > 0 {
        return Err(FooterError::Duplicate {
            key,
            count: rest + 1,
        });
    }
    Ok(first)
}

fn parse_footer_block(block: &str) -> Vec<(&str, &str)> {
    block
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            let key_ok = !key.is_empty()
                && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
            key_ok.then(|| (key, value.trim()))
        })
        .collect()
}

/// The three paragraphs of a commit message, borrowed from the original.
///
/// Splitting and re-joining with [`MessageParts::join`] reproduces the input
/// byte for byte, which lets rewrites replace the body while leaving the
/// footer block untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageParts<'a> {
    pub subject: &'a str,
    pub body: Option<&'a str>,
    pub footers: &'a str,
}

impl<'a> MessageParts<'a> {
    pub fn split(message: &'a str) -> Self {
        let Some((subject, rest)) = message.split_once("\n\n") else {
            return Self {
                subject: message,
                body: None,
                footers: "",
            };
        };
        match rest.rsplit_once("\n\n") {
            Some((body, footers)) => Self {
                subject,
                body: Some(body),
                footers,
            },
            None => Self {
                subject,
                body: None,
                footers: rest,
            },
        }
    }

    pub fn join(&self) -> String {
        self.with_body(self.body)
    }

    /// Re-assemble the message with a different body.
    pub fn with_body(&self, body: Option<&str>) -> String {
        let mut msg = String::with_capacity(self.subject.len() + self.footers.len() + 64);
        msg.push_str(self.subject);
        if self.footers.is_empty() && body.is_none() {
            return msg;
        }
        msg.push_str("\n\n");
        if let Some(body) = body.filter(|b| !b.is_empty()) {
            msg.push_str(body);
            msg.push_str("\n\n");
        }
        msg.push_str(self.footers);
        msg
    }
}
