//! Read-side reconciliation of an item's main and branch-local views.

use serde::{Deserialize, Serialize, Serializer};

use crate::branch;
use crate::config::Mode;
use crate::error::Result;
use crate::model::{CompletionRecord, Stamp, WantedItem};
use crate::store::{AsOf, Store};
use crate::transitions::{self, Transition};

/// How a branch's view of an item differs from main's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delta {
    /// The item exists only on the branch.
    New,
    /// Exactly one transition separates main from the branch.
    Transition(Transition),
    /// Two or more hops; the intermediate path is not surfaced.
    Changes,
}

impl Delta {
    pub fn label(&self) -> &'static str {
        match self {
            Delta::New => "new",
            Delta::Transition(t) => t.as_str(),
            Delta::Changes => "changes",
        }
    }
}

impl std::fmt::Display for Delta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Delta {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Branch-level operations offered to the acting rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchAction {
    SubmitPr,
    Discard,
    Apply,
}

/// One item's state as-of a single reference.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub item: Option<WantedItem>,
    pub completion: Option<CompletionRecord>,
    pub stamp: Option<Stamp>,
}

/// Main and branch views of one item, merged for presentation.
#[derive(Debug, Clone)]
pub struct ResolvedItem {
    pub main: Option<WantedItem>,
    pub branch: Option<WantedItem>,
    pub completion: Option<CompletionRecord>,
    pub stamp: Option<Stamp>,
    pub delta: Option<Delta>,
}

impl ResolvedItem {
    /// The branch view wins whenever one exists.
    pub fn effective(&self) -> Option<&WantedItem> {
        self.branch.as_ref().or(self.main.as_ref())
    }
}

/// Load item, completion and stamp as-of one reference.
pub fn snapshot(store: &dyn Store, item_id: &str, as_of: AsOf) -> Result<Snapshot> {
    let item = store.item(item_id, as_of)?;
    let completion = store.completion(item_id, as_of)?;
    let stamp = match completion.as_ref().and_then(|c| c.stamp_id.as_deref()) {
        Some(stamp_id) => store.stamp(stamp_id, as_of)?,
        None => None,
    };
    Ok(Snapshot {
        item,
        completion,
        stamp,
    })
}

/// Resolve one item for `rig`: main snapshot plus the rig's branch snapshot
/// when that branch exists.
pub fn resolve(store: &dyn Store, rig: &str, item_id: &str) -> Result<ResolvedItem> {
    let name = branch::branch_name(rig, item_id);
    let main = snapshot(store, item_id, AsOf::Main)?;
    let listed = store.branches(&name)?.iter().any(|b| b == &name);
    let branch = if listed {
        Some(snapshot(store, item_id, AsOf::Branch(&name))?)
    } else {
        None
    };
    Ok(merge(main, branch))
}

pub(crate) fn merge(main: Snapshot, branch: Option<Snapshot>) -> ResolvedItem {
    let delta = delta_between(
        main.item.as_ref(),
        branch.as_ref().and_then(|b| b.item.as_ref()),
    );
    match branch {
        Some(branch_snap) if branch_snap.item.is_some() => ResolvedItem {
            main: main.item,
            branch: branch_snap.item,
            completion: branch_snap.completion,
            stamp: branch_snap.stamp,
            delta,
        },
        _ => ResolvedItem {
            main: main.item,
            branch: None,
            completion: main.completion,
            stamp: main.stamp,
            delta,
        },
    }
}

pub(crate) fn delta_between(
    main: Option<&WantedItem>,
    branch: Option<&WantedItem>,
) -> Option<Delta> {
    let branch = branch?;
    let main = match main {
        None => return Some(Delta::New),
        Some(main) => main,
    };
    if main.status == branch.status {
        // same status but edited fields still needs a review
        if main.content_matches(branch) {
            return None;
        }
        return Some(Delta::Changes);
    }
    match transitions::transition_between(main.status, branch.status) {
        Some(t) => Some(Delta::Transition(t)),
        None => Some(Delta::Changes),
    }
}

/// The action set shown next to a pending branch. Discard disappears once
/// delete covers the same ground, and apply only exists outside review.
pub fn branch_actions(
    mode: Mode,
    branch_present: bool,
    delta_present: bool,
    pr_url: Option<&str>,
    delete_available: bool,
) -> Vec<BranchAction> {
    if !branch_present || !delta_present {
        return Vec::new();
    }
    match mode {
        Mode::Pr => {
            if pr_url.is_some() {
                vec![BranchAction::Discard]
            } else if delete_available {
                vec![BranchAction::SubmitPr]
            } else {
                vec![BranchAction::SubmitPr, BranchAction::Discard]
            }
        }
        Mode::WildWest => {
            if delete_available {
                vec![BranchAction::Apply]
            } else {
                vec![BranchAction::Apply, BranchAction::Discard]
            }
        }
    }
}
