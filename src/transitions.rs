//! The wanted-item state machine: which transitions each actor may take,
//! and the guarded statements that realize each one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    generate_id, AcceptInput, CompletionRecord, PostInput, Stamp, UpdateFields, WantedItem,
    WantedStatus,
};
use crate::store::{CompletionPatch, Guard, ItemPatch, Statement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Claim,
    Unclaim,
    Done,
    Accept,
    Reject,
    Close,
    Delete,
}

pub const ALL_TRANSITIONS: [Transition; 7] = [
    Transition::Claim,
    Transition::Unclaim,
    Transition::Done,
    Transition::Accept,
    Transition::Reject,
    Transition::Close,
    Transition::Delete,
];

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Claim => "claim",
            Transition::Unclaim => "unclaim",
            Transition::Done => "done",
            Transition::Accept => "accept",
            Transition::Reject => "reject",
            Transition::Close => "close",
            Transition::Delete => "delete",
        }
    }

    /// The (from, to) edge this transition travels in the status graph.
    pub fn hop(&self) -> (WantedStatus, WantedStatus) {
        match self {
            Transition::Claim => (WantedStatus::Open, WantedStatus::Claimed),
            Transition::Unclaim => (WantedStatus::Claimed, WantedStatus::Open),
            Transition::Done => (WantedStatus::Claimed, WantedStatus::InReview),
            Transition::Accept => (WantedStatus::InReview, WantedStatus::Completed),
            Transition::Reject => (WantedStatus::InReview, WantedStatus::Claimed),
            Transition::Close => (WantedStatus::InReview, WantedStatus::Withdrawn),
            Transition::Delete => (WantedStatus::Open, WantedStatus::Withdrawn),
        }
    }

    pub fn target(&self) -> WantedStatus {
        self.hop().1
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single transition covering `from -> to`, if one exists.
pub fn transition_between(from: WantedStatus, to: WantedStatus) -> Option<Transition> {
    ALL_TRANSITIONS.iter().copied().find(|t| t.hop() == (from, to))
}

/// Legal transitions for `actor` given the item's current state. Pure:
/// what the actor may attempt, not whether it will still hold at commit.
pub fn available_transitions(item: &WantedItem, actor: &str) -> Vec<Transition> {
    let poster = item.is_poster(actor);
    let claimer = item.is_claimer(actor);
    let mut out = Vec::new();
    match item.status {
        WantedStatus::Open => {
            out.push(Transition::Claim);
            if poster {
                out.push(Transition::Delete);
            }
        }
        WantedStatus::Claimed => {
            if poster || claimer {
                out.push(Transition::Unclaim);
            }
            if claimer {
                out.push(Transition::Done);
            }
        }
        WantedStatus::InReview => {
            if poster {
                out.push(Transition::Accept);
                out.push(Transition::Reject);
                out.push(Transition::Close);
            }
        }
        WantedStatus::Completed | WantedStatus::Withdrawn => {}
    }
    out
}

pub fn post_statements(
    input: &PostInput,
    rig: &str,
    now: DateTime<Utc>,
) -> (WantedItem, Vec<Statement>) {
    let item = WantedItem {
        id: generate_id("w-"),
        title: input.title.clone(),
        description: input.description.clone(),
        project: input.project.clone(),
        kind: input.kind.clone(),
        priority: input.priority,
        tags: input.tags.clone(),
        posted_by: rig.to_string(),
        claimed_by: None,
        status: WantedStatus::Open,
        effort_level: input.effort_level.clone(),
        created_at: now,
        updated_at: now,
    };
    let statements = vec![Statement::InsertItem(item.clone())];
    (item, statements)
}

pub fn claim_statements(item_id: &str, rig: &str, now: DateTime<Utc>) -> Vec<Statement> {
    vec![Statement::UpdateItem {
        id: item_id.to_string(),
        guard: Guard {
            status: Some(WantedStatus::Open),
            ..Guard::default()
        },
        patch: ItemPatch {
            status: Some(WantedStatus::Claimed),
            claimed_by: Some(Some(rig.to_string())),
            updated_at: Some(now),
            ..ItemPatch::default()
        },
    }]
}

pub fn unclaim_statements(item_id: &str, rig: &str, now: DateTime<Utc>) -> Vec<Statement> {
    vec![Statement::UpdateItem {
        id: item_id.to_string(),
        guard: Guard {
            status: Some(WantedStatus::Claimed),
            claimed_or_posted_by: Some(rig.to_string()),
            ..Guard::default()
        },
        patch: ItemPatch {
            status: Some(WantedStatus::Open),
            claimed_by: Some(None),
            updated_at: Some(now),
            ..ItemPatch::default()
        },
    }]
}

pub fn done_statements(
    item_id: &str,
    rig: &str,
    evidence: &str,
    now: DateTime<Utc>,
) -> Vec<Statement> {
    vec![
        Statement::UpdateItem {
            id: item_id.to_string(),
            guard: Guard {
                status: Some(WantedStatus::Claimed),
                claimed_by: Some(rig.to_string()),
                ..Guard::default()
            },
            patch: ItemPatch {
                status: Some(WantedStatus::InReview),
                updated_at: Some(now),
                ..ItemPatch::default()
            },
        },
        Statement::InsertCompletion(CompletionRecord {
            id: generate_id("c-"),
            wanted_id: item_id.to_string(),
            completed_by: rig.to_string(),
            evidence: evidence.to_string(),
            stamp_id: None,
            validated_by: None,
        }),
    ]
}

/// Accept completes the item, marks the completion validated, and mints the
/// stamp. Stamps carry reputation, so stamping one's own completion is
/// refused; a poster reviewing their own work closes instead.
pub fn accept_statements(
    item: &WantedItem,
    completion: &CompletionRecord,
    rig: &str,
    input: &AcceptInput,
    now: DateTime<Utc>,
) -> Result<Vec<Statement>> {
    if completion.completed_by == rig {
        return Err(Error::InvalidInput(format!(
            "cannot stamp your own completion of {}; close it instead",
            item.id
        )));
    }
    let stamp = Stamp {
        id: generate_id("s-"),
        author: rig.to_string(),
        subject: completion.completed_by.clone(),
        quality: input.quality,
        reliability: input.reliability,
        severity: input.severity,
        context_id: completion.id.clone(),
        context_type: "completion".to_string(),
        skill_tags: item.tags.clone(),
        message: input.message.clone(),
    };
    Ok(vec![
        Statement::UpdateItem {
            id: item.id.clone(),
            guard: Guard {
                status: Some(WantedStatus::InReview),
                posted_by: Some(rig.to_string()),
                ..Guard::default()
            },
            patch: ItemPatch {
                status: Some(WantedStatus::Completed),
                updated_at: Some(now),
                ..ItemPatch::default()
            },
        },
        Statement::UpdateCompletion {
            wanted_id: item.id.clone(),
            patch: CompletionPatch {
                stamp_id: Some(stamp.id.clone()),
                validated_by: Some(rig.to_string()),
            },
        },
        Statement::InsertStamp(stamp),
    ])
}

pub fn reject_statements(item_id: &str, rig: &str, now: DateTime<Utc>) -> Vec<Statement> {
    vec![
        Statement::UpdateItem {
            id: item_id.to_string(),
            guard: Guard {
                status: Some(WantedStatus::InReview),
                posted_by: Some(rig.to_string()),
                ..Guard::default()
            },
            patch: ItemPatch {
                status: Some(WantedStatus::Claimed),
                updated_at: Some(now),
                ..ItemPatch::default()
            },
        },
        Statement::DeleteCompletion {
            wanted_id: item_id.to_string(),
        },
    ]
}

pub fn close_statements(item_id: &str, rig: &str, now: DateTime<Utc>) -> Vec<Statement> {
    vec![Statement::UpdateItem {
        id: item_id.to_string(),
        guard: Guard {
            status: Some(WantedStatus::InReview),
            posted_by: Some(rig.to_string()),
            ..Guard::default()
        },
        patch: ItemPatch {
            status: Some(WantedStatus::Withdrawn),
            updated_at: Some(now),
            ..ItemPatch::default()
        },
    }]
}

pub fn delete_statements(item_id: &str, rig: &str, now: DateTime<Utc>) -> Vec<Statement> {
    vec![Statement::UpdateItem {
        id: item_id.to_string(),
        guard: Guard {
            status: Some(WantedStatus::Open),
            posted_by: Some(rig.to_string()),
            ..Guard::default()
        },
        patch: ItemPatch {
            status: Some(WantedStatus::Withdrawn),
            updated_at: Some(now),
            ..ItemPatch::default()
        },
    }]
}

/// Field edits never move the state machine; the guard pins the status the
/// caller saw so a concurrent transition surfaces as a precondition error.
pub fn update_statements(
    item: &WantedItem,
    rig: &str,
    fields: &UpdateFields,
    now: DateTime<Utc>,
) -> Vec<Statement> {
    vec![Statement::UpdateItem {
        id: item.id.clone(),
        guard: Guard {
            status: Some(item.status),
            posted_by: Some(rig.to_string()),
            ..Guard::default()
        },
        patch: ItemPatch {
            title: fields.title.clone(),
            description: fields.description.clone(),
            project: fields.project.clone(),
            kind: fields.kind.clone(),
            priority: fields.priority,
            tags: fields.tags.clone(),
            effort_level: fields.effort_level.clone().map(Some),
            updated_at: Some(now),
            ..ItemPatch::default()
        },
    }]
}
