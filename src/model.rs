use chrono::{DateTime, Utc};
use rand::random;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WantedStatus {
    Open,
    Claimed,
    InReview,
    Completed,
    Withdrawn,
}

impl WantedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WantedStatus::Open => "open",
            WantedStatus::Claimed => "claimed",
            WantedStatus::InReview => "in_review",
            WantedStatus::Completed => "completed",
            WantedStatus::Withdrawn => "withdrawn",
        }
    }

    /// Terminal items accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WantedStatus::Completed | WantedStatus::Withdrawn)
    }
}

impl std::fmt::Display for WantedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task posting on the shared board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WantedItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub project: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub priority: i32,
    pub tags: Vec<String>,
    pub posted_by: String,
    pub claimed_by: Option<String>,
    pub status: WantedStatus,
    pub effort_level: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WantedItem {
    pub fn is_poster(&self, rig: &str) -> bool {
        self.posted_by == rig
    }

    pub fn is_claimer(&self, rig: &str) -> bool {
        self.claimed_by.as_deref() == Some(rig)
    }

    /// Row equality over every field a mutation can touch, ignoring
    /// timestamps.
    pub(crate) fn content_matches(&self, other: &WantedItem) -> bool {
        self.id == other.id
            && self.title == other.title
            && self.description == other.description
            && self.project == other.project
            && self.kind == other.kind
            && self.priority == other.priority
            && self.tags == other.tags
            && self.posted_by == other.posted_by
            && self.claimed_by == other.claimed_by
            && self.status == other.status
            && self.effort_level == other.effort_level
    }
}

/// Evidence attached to a claimed item awaiting review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub id: String,
    pub wanted_id: String,
    pub completed_by: String,
    pub evidence: String,
    pub stamp_id: Option<String>,
    pub validated_by: Option<String>,
}

/// Reputation record minted when a poster accepts a completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stamp {
    pub id: String,
    pub author: String,
    pub subject: String,
    pub quality: i32,
    pub reliability: i32,
    pub severity: i32,
    pub context_id: String,
    pub context_type: String,
    pub skill_tags: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PostInput {
    pub title: String,
    pub description: String,
    pub project: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub priority: i32,
    pub tags: Vec<String>,
    pub effort_level: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateFields {
    pub title: Option<String>,
    pub description: Option<String>,
    pub project: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub priority: Option<i32>,
    pub tags: Option<Vec<String>>,
    pub effort_level: Option<String>,
}

impl UpdateFields {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.project.is_none()
            && self.kind.is_none()
            && self.priority.is_none()
            && self.tags.is_none()
            && self.effort_level.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptInput {
    pub quality: i32,
    pub reliability: i32,
    pub severity: i32,
    pub message: String,
}

impl Default for AcceptInput {
    fn default() -> Self {
        AcceptInput {
            quality: 3,
            reliability: 3,
            severity: 0,
            message: String::new(),
        }
    }
}

/// Conjunctive browse filter; `None` fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowseFilter {
    pub status: Option<WantedStatus>,
    pub project: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub tag: Option<String>,
    pub posted_by: Option<String>,
    pub claimed_by: Option<String>,
    pub search: Option<String>,
}

impl BrowseFilter {
    pub fn matches(&self, item: &WantedItem) -> bool {
        if let Some(status) = self.status {
            if item.status != status {
                return false;
            }
        }
        if let Some(project) = &self.project {
            if &item.project != project {
                return false;
            }
        }
        if let Some(kind) = &self.kind {
            if &item.kind != kind {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !item.tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        if let Some(posted_by) = &self.posted_by {
            if &item.posted_by != posted_by {
                return false;
            }
        }
        if let Some(claimed_by) = &self.claimed_by {
            if item.claimed_by.as_ref() != Some(claimed_by) {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let haystack = format!("{} {}", item.title, item.description).to_lowercase();
            if !haystack.contains(&needle) {
                return false;
            }
        }
        true
    }
}

pub fn generate_id(prefix: &str) -> String {
    let value: u32 = random();
    format!("{prefix}{value:08x}")
}

/// Open items first, then by priority (high to low), then newest postings.
pub fn sort_items(items: &mut [WantedItem]) {
    items.sort_by(|a, b| {
        if a.status != b.status {
            if a.status == WantedStatus::Open {
                return std::cmp::Ordering::Less;
            }
            if b.status == WantedStatus::Open {
                return std::cmp::Ordering::Greater;
            }
        }
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, status: WantedStatus, priority: i32) -> WantedItem {
        let now = Utc::now();
        WantedItem {
            id: id.to_string(),
            title: format!("Item {id}"),
            description: String::new(),
            project: "commons".to_string(),
            kind: "task".to_string(),
            priority,
            tags: vec!["rust".to_string()],
            posted_by: "alice".to_string(),
            claimed_by: None,
            status,
            effort_level: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn generate_id_is_prefixed_hex() {
        let id = generate_id("w-");
        assert!(id.starts_with("w-"));
        assert_eq!(id.len(), 10);
        assert!(id[2..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn sort_items_puts_open_first_then_priority() {
        let mut items = vec![
            item("a", WantedStatus::Claimed, 5),
            item("b", WantedStatus::Open, 1),
            item("c", WantedStatus::Open, 4),
        ];
        sort_items(&mut items);
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn filter_matches_tag_and_search() {
        let mut subject = item("a", WantedStatus::Open, 3);
        subject.title = "Fix the flaky parser".to_string();

        let by_tag = BrowseFilter {
            tag: Some("rust".to_string()),
            ..BrowseFilter::default()
        };
        assert!(by_tag.matches(&subject));

        let by_search = BrowseFilter {
            search: Some("FLAKY".to_string()),
            ..BrowseFilter::default()
        };
        assert!(by_search.matches(&subject));

        let miss = BrowseFilter {
            status: Some(WantedStatus::Claimed),
            ..BrowseFilter::default()
        };
        assert!(!miss.matches(&subject));
    }

    #[test]
    fn content_matches_ignores_timestamps() {
        let a = item("a", WantedStatus::Open, 3);
        let mut b = a.clone();
        b.updated_at = a.updated_at + chrono::Duration::seconds(90);
        assert!(a.content_matches(&b));

        b.claimed_by = Some("bob".to_string());
        assert!(!a.content_matches(&b));
    }

    #[test]
    fn terminal_statuses() {
        assert!(WantedStatus::Completed.is_terminal());
        assert!(WantedStatus::Withdrawn.is_terminal());
        assert!(!WantedStatus::InReview.is_terminal());
    }
}
