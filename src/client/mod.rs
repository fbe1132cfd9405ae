//! One mutation engine per upstream board. All writes for an upstream go
//! through a single `Client`, which serializes them behind one lock and
//! routes each through the wild-west or pull-request path.

use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;
use tracing::{debug, info};

use crate::branch::{branch_name, parse_branch, rig_prefix};
use crate::capability::{Capabilities, PullRequestSpec};
use crate::config::{Mode, Settings, UpstreamInfo};
use crate::error::{Error, Result};
use crate::model::{sort_items, BrowseFilter, CompletionRecord, Stamp, WantedItem, WantedStatus};
use crate::resolve::{self, BranchAction, Delta, ResolvedItem};
use crate::store::{AsOf, Store};
use crate::transitions::{available_transitions, Transition};

mod lifecycle;
mod mutate;

pub struct Client {
    upstream: UpstreamInfo,
    rig: String,
    store: Arc<dyn Store>,
    capabilities: Capabilities,
    settings: RwLock<Settings>,
    // one writer per upstream; see mutate.rs
    write_lock: Mutex<()>,
}

/// Everything a presenter needs to show one item: the effective row, the
/// review artifacts, and the actions open to the acting rig.
#[derive(Debug, Clone, Serialize)]
pub struct ItemDetail {
    pub item: WantedItem,
    /// Status on main, when the item exists there. Differs from
    /// `item.status` while a local branch is pending.
    pub main_status: Option<WantedStatus>,
    pub completion: Option<CompletionRecord>,
    pub stamp: Option<Stamp>,
    pub actions: Vec<Transition>,
    pub branch: Option<String>,
    pub delta: Option<Delta>,
    pub branch_actions: Vec<BranchAction>,
    pub pr_url: Option<String>,
    pub branch_url: Option<String>,
}

/// What a mutation left behind. `detail` is `None` only when the subject
/// row no longer exists anywhere, e.g. after discarding an unsubmitted post.
#[derive(Debug, Clone, Serialize)]
pub struct MutationOutcome {
    pub detail: Option<ItemDetail>,
    pub branch: Option<String>,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingBranch {
    pub branch: String,
    pub wanted_id: String,
    pub title: String,
    pub status: WantedStatus,
    pub delta: Delta,
    pub pr_url: Option<String>,
}

/// The rig's standing on one board: items it posted, items it is working,
/// reviews it owes, and branches not yet landed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Dashboard {
    pub posted: Vec<WantedItem>,
    pub claimed: Vec<WantedItem>,
    pub review: Vec<WantedItem>,
    pub pending: Vec<PendingBranch>,
}

impl Client {
    pub fn new(
        upstream: UpstreamInfo,
        rig: impl Into<String>,
        store: Arc<dyn Store>,
        capabilities: Capabilities,
    ) -> Client {
        let settings = Settings {
            mode: upstream.mode,
            sign_commits: false,
        };
        Client {
            upstream,
            rig: rig.into(),
            store,
            capabilities,
            settings: RwLock::new(settings),
            write_lock: Mutex::new(()),
        }
    }

    pub fn rig_handle(&self) -> &str {
        &self.rig
    }

    pub fn upstream(&self) -> &UpstreamInfo {
        &self.upstream
    }

    pub fn settings(&self) -> Settings {
        *self.settings.read().expect("settings lock poisoned")
    }

    pub fn mode(&self) -> Mode {
        self.settings().mode
    }

    fn signed_commits(&self) -> bool {
        self.settings().sign_commits
    }

    /// Persist new settings through the host, then adopt them. Refused when
    /// the host gave us nowhere to persist; settings never change only in
    /// memory.
    pub fn save_settings(&self, settings: Settings) -> Result<()> {
        let persist = self
            .capabilities
            .persist_settings
            .as_ref()
            .ok_or(Error::Capability("settings persistence"))?;
        persist(&settings).map_err(|err| Error::Transport(format!("{err:#}")))?;
        *self.settings.write().expect("settings lock poisoned") = settings;
        info!(upstream = %self.upstream.id, mode = %settings.mode, "settings saved");
        Ok(())
    }

    pub fn sync(&self) -> Result<()> {
        self.store.sync()
    }

    /// Items as visible on main, in board order.
    pub fn browse(&self, filter: &BrowseFilter) -> Result<Vec<WantedItem>> {
        let mut items = self.store.items(filter, AsOf::Main)?;
        sort_items(&mut items);
        Ok(items)
    }

    pub fn detail(&self, id: &str) -> Result<ItemDetail> {
        let resolved = resolve::resolve(self.store.as_ref(), &self.rig, id)?;
        self.detail_with(id, resolved, None)
    }

    /// Build the presentation view from an already-resolved item. `known_pr`
    /// short-circuits the lookup when the caller just created the PR.
    fn detail_with(
        &self,
        id: &str,
        resolved: ResolvedItem,
        known_pr: Option<String>,
    ) -> Result<ItemDetail> {
        let ResolvedItem {
            main,
            branch,
            completion,
            stamp,
            delta,
        } = resolved;
        let main_status = main.as_ref().map(|item| item.status);
        let branch_present = branch.is_some();
        let item = branch
            .or(main)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let actions = available_transitions(&item, &self.rig);
        let name = branch_name(&self.rig, &item.id);
        let pr_url = match known_pr {
            Some(url) => Some(url),
            None if branch_present => self.lookup_pull_request(&name),
            None => None,
        };
        let branch_url = if branch_present {
            self.lookup_branch_url(&name)
        } else {
            None
        };
        let branch_actions = resolve::branch_actions(
            self.mode(),
            branch_present,
            delta.is_some(),
            pr_url.as_deref(),
            actions.contains(&Transition::Delete),
        );
        Ok(ItemDetail {
            item,
            main_status,
            completion,
            stamp,
            actions,
            branch: branch_present.then_some(name),
            delta,
            branch_actions,
            pr_url,
            branch_url,
        })
    }

    pub fn dashboard(&self) -> Result<Dashboard> {
        let everything = self.store.items(&BrowseFilter::default(), AsOf::Main)?;
        let mut dashboard = Dashboard::default();
        for item in everything {
            let posted = item.is_poster(&self.rig) && !item.status.is_terminal();
            let claimed = item.is_claimer(&self.rig)
                && matches!(item.status, WantedStatus::Claimed | WantedStatus::InReview);
            if posted && item.status == WantedStatus::InReview {
                dashboard.review.push(item.clone());
            }
            if posted {
                dashboard.posted.push(item.clone());
            }
            if claimed {
                dashboard.claimed.push(item);
            }
        }
        sort_items(&mut dashboard.posted);
        sort_items(&mut dashboard.claimed);
        sort_items(&mut dashboard.review);

        for name in self.store.branches(&rig_prefix(&self.rig))? {
            let wanted_id = match parse_branch(&name) {
                Ok((_, id)) => id.to_string(),
                Err(_) => continue,
            };
            let resolved = resolve::resolve(self.store.as_ref(), &self.rig, &wanted_id)?;
            // a branch that would change nothing is not pending work
            let Some(delta) = resolved.delta else { continue };
            let Some(item) = resolved.branch.or(resolved.main) else {
                continue;
            };
            let pr_url = self.lookup_pull_request(&name);
            dashboard.pending.push(PendingBranch {
                branch: name,
                wanted_id,
                title: item.title,
                status: item.status,
                delta,
                pr_url,
            });
        }
        Ok(dashboard)
    }

    fn has_branch(&self, name: &str) -> Result<bool> {
        Ok(self.store.branches(name)?.iter().any(|b| b == name))
    }

    fn pull_request_spec(&self, branch: &str, resolved: &ResolvedItem) -> Option<PullRequestSpec> {
        let item = resolved.effective()?;
        let label = resolved.delta.map(|d| d.label()).unwrap_or("changes");
        Some(PullRequestSpec {
            branch: branch.to_string(),
            title: format!("{label}: {}", item.title),
            body: format!(
                "{} proposes `{label}` for {} on branch `{branch}`.",
                self.rig, item.id
            ),
        })
    }

    /// Lookup failures degrade to "no PR known"; the view stays usable
    /// when the forge is unreachable.
    fn lookup_pull_request(&self, branch: &str) -> Option<String> {
        let check = self.capabilities.check_pull_request.as_ref()?;
        match check(branch) {
            Ok(found) => found,
            Err(err) => {
                debug!(branch, "pull request lookup failed: {err:#}");
                None
            }
        }
    }

    fn lookup_branch_url(&self, branch: &str) -> Option<String> {
        let url_for = self.capabilities.branch_web_url.as_ref()?;
        match url_for(branch) {
            Ok(url) => Some(url),
            Err(err) => {
                debug!(branch, "branch url lookup failed: {err:#}");
                None
            }
        }
    }
}
