use notechain_types::EntityId;

use crate::config::NotesConfig;
use crate::error::{NotesError, NotesResult};

/// Ceiling on the length of one change's update chain.
///
/// Evaluated on every append. Reads never fail because of the ceiling, so a
/// chain that grew past it under an older, larger limit stays loadable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdateGuard {
    max_updates: usize,
}

impl UpdateGuard {
    pub fn new(max_updates: usize) -> Self {
        Self { max_updates }
    }

    pub fn from_config(config: &NotesConfig) -> Self {
        Self::new(config.max_updates)
    }

    pub fn max_updates(&self) -> usize {
        self.max_updates
    }

    /// Whether a chain of `count` commits has reached the ceiling.
    pub fn exceeded(&self, count: usize) -> bool {
        count >= self.max_updates
    }

    /// Allow or reject appending to a chain that already has `count` commits.
    ///
    /// Terminal updates (abandon, submit) are always allowed.
    pub fn check(&self, entity: &EntityId, count: usize, is_terminal: bool) -> NotesResult<()> {
        if is_terminal || !self.exceeded(count) {
            return Ok(());
        }
        Err(NotesError::LimitExceeded {
            entity: entity.clone(),
            max_updates: self.max_updates,
        })
    }
}
