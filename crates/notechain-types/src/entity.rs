use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Name of the project (repository) that owns a change.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectName(String);

impl ProjectName {
    /// Create a project name, rejecting empty names and names with
    /// surrounding slashes.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name.is_empty() || name.starts_with('/') || name.ends_with('/') {
            return Err(TypeError::InvalidProjectName(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProjectName({})", self.0)
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Numeric identifier of a change, unique within its project.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChangeId(u32);

impl ChangeId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChangeId({})", self.0)
    }
}

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one change within one project. Immutable once assigned.
///
/// Each entity owns exactly one meta ref holding its update chain; see
/// [`EntityId::meta_ref`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    pub project: ProjectName,
    pub change: ChangeId,
}

impl EntityId {
    pub fn new(project: ProjectName, change: ChangeId) -> Self {
        Self { project, change }
    }

    /// Name of the ref holding this change's update chain, sharded by the
    /// last two digits of the change number:
    /// `refs/changes/34/1234/meta`.
    pub fn meta_ref(&self) -> String {
        let id = self.change.get();
        format!("refs/changes/{:02}/{}/meta", id % 100, id)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}~{})", self.project, self.change)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}~{}", self.project, self.change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(change: u32) -> EntityId {
        EntityId::new(ProjectName::new("infra/tools").unwrap(), ChangeId::new(change))
    }

    #[test]
    fn meta_ref_is_sharded_by_last_two_digits() {
        assert_eq!(entity(1234).meta_ref(), "refs/changes/34/1234/meta");
        assert_eq!(entity(7).meta_ref(), "refs/changes/07/7/meta");
        assert_eq!(entity(100).meta_ref(), "refs/changes/00/100/meta");
    }

    #[test]
    fn display_joins_project_and_change() {
        assert_eq!(entity(42).to_string(), "infra/tools~42");
    }

    #[test]
    fn project_name_validation() {
        assert!(ProjectName::new("").is_err());
        assert!(ProjectName::new("/leading").is_err());
        assert!(ProjectName::new("trailing/").is_err());
        assert!(ProjectName::new("a/b").is_ok());
    }

    #[test]
    fn ordering_is_project_then_change() {
        let a = EntityId::new(ProjectName::new("a").unwrap(), ChangeId::new(9));
        let b = EntityId::new(ProjectName::new("b").unwrap(), ChangeId::new(1));
        assert!(a < b);
        assert!(entity(1) < entity(2));
    }

    #[test]
    fn serde_roundtrip() {
        let id = entity(55);
        let json = serde_json::to_string(&id).unwrap();
        let parsed: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }
}
