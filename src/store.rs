use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::model::{BrowseFilter, CompletionRecord, Stamp, WantedItem, WantedStatus};

/// Read reference: the main line or a named work branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsOf<'a> {
    Main,
    Branch(&'a str),
}

/// Precondition a backend re-checks against current row state at commit
/// time, not against whatever the caller read earlier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Guard {
    pub status: Option<WantedStatus>,
    pub claimed_by: Option<String>,
    pub posted_by: Option<String>,
    pub claimed_or_posted_by: Option<String>,
}

impl Guard {
    pub fn check(&self, item: &WantedItem) -> Result<()> {
        if let Some(status) = self.status {
            if item.status != status {
                return Err(Error::Precondition(format!(
                    "item {} is {}, not {}",
                    item.id, item.status, status
                )));
            }
        }
        if let Some(rig) = &self.claimed_by {
            if !item.is_claimer(rig) {
                return Err(Error::Precondition(format!(
                    "item {} is not claimed by {rig}",
                    item.id
                )));
            }
        }
        if let Some(rig) = &self.posted_by {
            if !item.is_poster(rig) {
                return Err(Error::Precondition(format!(
                    "item {} was not posted by {rig}",
                    item.id
                )));
            }
        }
        if let Some(rig) = &self.claimed_or_posted_by {
            if !item.is_claimer(rig) && !item.is_poster(rig) {
                return Err(Error::Precondition(format!(
                    "item {} is neither posted nor claimed by {rig}",
                    item.id
                )));
            }
        }
        Ok(())
    }
}

/// Field-level patch; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    pub status: Option<WantedStatus>,
    // Some(None) clears the claim.
    pub claimed_by: Option<Option<String>>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub project: Option<String>,
    pub kind: Option<String>,
    pub priority: Option<i32>,
    pub tags: Option<Vec<String>>,
    pub effort_level: Option<Option<String>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ItemPatch {
    pub fn apply(&self, item: &mut WantedItem) {
        if let Some(status) = self.status {
            item.status = status;
        }
        if let Some(claimed_by) = &self.claimed_by {
            item.claimed_by = claimed_by.clone();
        }
        if let Some(title) = &self.title {
            item.title = title.clone();
        }
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        if let Some(project) = &self.project {
            item.project = project.clone();
        }
        if let Some(kind) = &self.kind {
            item.kind = kind.clone();
        }
        if let Some(priority) = self.priority {
            item.priority = priority;
        }
        if let Some(tags) = &self.tags {
            item.tags = tags.clone();
        }
        if let Some(effort_level) = &self.effort_level {
            item.effort_level = effort_level.clone();
        }
        if let Some(updated_at) = self.updated_at {
            item.updated_at = updated_at;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionPatch {
    pub stamp_id: Option<String>,
    pub validated_by: Option<String>,
}

impl CompletionPatch {
    pub fn apply(&self, record: &mut CompletionRecord) {
        if let Some(stamp_id) = &self.stamp_id {
            record.stamp_id = Some(stamp_id.clone());
        }
        if let Some(validated_by) = &self.validated_by {
            record.validated_by = Some(validated_by.clone());
        }
    }
}

/// One logical write inside an atomic commit.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    InsertItem(WantedItem),
    UpdateItem {
        id: String,
        guard: Guard,
        patch: ItemPatch,
    },
    // Branch-scoped row removal; present-or-not, never guarded.
    DeleteItem {
        id: String,
    },
    InsertCompletion(CompletionRecord),
    UpdateCompletion {
        wanted_id: String,
        patch: CompletionPatch,
    },
    DeleteCompletion {
        wanted_id: String,
    },
    InsertStamp(Stamp),
}

/// Versioned storage for one commons fork. Implementations map these calls
/// onto their own transaction and branch machinery; every `exec` must be
/// all-or-nothing and must surface failed guards as
/// [`Error::Precondition`].
pub trait Store: Send + Sync {
    fn item(&self, id: &str, as_of: AsOf) -> Result<Option<WantedItem>>;
    fn items(&self, filter: &BrowseFilter, as_of: AsOf) -> Result<Vec<WantedItem>>;
    fn completion(&self, wanted_id: &str, as_of: AsOf) -> Result<Option<CompletionRecord>>;
    fn stamp(&self, id: &str, as_of: AsOf) -> Result<Option<Stamp>>;

    /// Atomic multi-statement commit. An empty `branch` targets main; a
    /// named branch is created from main's current state if absent.
    fn exec(
        &self,
        branch: &str,
        commit_message: &str,
        signed: bool,
        statements: &[Statement],
    ) -> Result<()>;

    /// Branch names starting with `prefix`, sorted.
    fn branches(&self, prefix: &str) -> Result<Vec<String>>;
    fn delete_branch(&self, name: &str) -> Result<()>;
    fn delete_remote_branch(&self, name: &str) -> Result<()>;

    fn push_branch(&self, name: &str, log: &str) -> Result<()>;
    fn push_main(&self, log: &str) -> Result<()>;
    /// Push main with one internal pull-then-retry cycle to absorb
    /// concurrent pushes from other rigs.
    fn push_with_sync(&self, log: &str) -> Result<()>;
    fn sync(&self) -> Result<()>;
    fn merge_branch(&self, name: &str) -> Result<()>;

    /// Capability gate: whether this backend can write main directly.
    fn can_wild_west(&self) -> Result<()>;
}
