//! The write path. Every mutation serializes behind the engine's write
//! lock, re-reads the item as of its execution target, builds guarded
//! statements from that snapshot, and commits them atomically. Wild-west
//! mode lands on main directly; pr mode stages on a per-item branch.

use chrono::Utc;
use tracing::{debug, info, warn};

use super::{Client, MutationOutcome};
use crate::branch::branch_name;
use crate::config::Mode;
use crate::error::{Error, Result};
use crate::model::{AcceptInput, PostInput, UpdateFields, WantedStatus};
use crate::resolve::{self, Snapshot};
use crate::store::{AsOf, Statement};
use crate::transitions::{self, Transition};

const REVERT_HINT: &str = "reverted — branch cleaned up";

impl Client {
    pub fn post(&self, input: &PostInput) -> Result<MutationOutcome> {
        if input.title.trim().is_empty() {
            return Err(Error::InvalidInput(
                "a wanted item needs a title".to_string(),
            ));
        }
        let (item, statements) = transitions::post_statements(input, &self.rig, Utc::now());
        let message = format!("{}: post {}", self.rig, item.id);
        self.mutate(&item.id, message, Some(WantedStatus::Open), move |_| {
            Ok(statements)
        })
    }

    pub fn claim(&self, item_id: &str) -> Result<MutationOutcome> {
        let message = format!("{}: claim {}", self.rig, item_id);
        self.mutate(item_id, message, Some(Transition::Claim.target()), |_| {
            Ok(transitions::claim_statements(item_id, &self.rig, Utc::now()))
        })
    }

    pub fn unclaim(&self, item_id: &str) -> Result<MutationOutcome> {
        let message = format!("{}: unclaim {}", self.rig, item_id);
        self.mutate(item_id, message, Some(Transition::Unclaim.target()), |_| {
            Ok(transitions::unclaim_statements(
                item_id, &self.rig, Utc::now(),
            ))
        })
    }

    pub fn done(&self, item_id: &str, evidence: &str) -> Result<MutationOutcome> {
        let message = format!("{}: done {}", self.rig, item_id);
        self.mutate(item_id, message, Some(Transition::Done.target()), |_| {
            Ok(transitions::done_statements(
                item_id, &self.rig, evidence, Utc::now(),
            ))
        })
    }

    pub fn accept(&self, item_id: &str, input: &AcceptInput) -> Result<MutationOutcome> {
        for (field, value) in [("quality", input.quality), ("reliability", input.reliability)] {
            if !(1..=5).contains(&value) {
                return Err(Error::InvalidInput(format!(
                    "{field} must be between 1 and 5"
                )));
            }
        }
        let message = format!("{}: accept {}", self.rig, item_id);
        self.mutate(item_id, message, Some(Transition::Accept.target()), |pre| {
            let item = pre
                .item
                .as_ref()
                .ok_or_else(|| Error::NotFound(item_id.to_string()))?;
            let completion = pre.completion.as_ref().ok_or_else(|| {
                Error::Precondition(format!("item {item_id} has no completion to accept"))
            })?;
            transitions::accept_statements(item, completion, &self.rig, input, Utc::now())
        })
    }

    pub fn reject(&self, item_id: &str, reason: &str) -> Result<MutationOutcome> {
        let mut message = format!("{}: reject {}", self.rig, item_id);
        if !reason.is_empty() {
            message.push_str(": ");
            message.push_str(reason);
        }
        self.mutate(item_id, message, Some(Transition::Reject.target()), |_| {
            Ok(transitions::reject_statements(item_id, &self.rig, Utc::now()))
        })
    }

    pub fn close(&self, item_id: &str) -> Result<MutationOutcome> {
        let message = format!("{}: close {}", self.rig, item_id);
        self.mutate(item_id, message, Some(Transition::Close.target()), |_| {
            Ok(transitions::close_statements(item_id, &self.rig, Utc::now()))
        })
    }

    /// Field edits on the poster's own item. Never moves the status.
    pub fn update(&self, item_id: &str, fields: &UpdateFields) -> Result<MutationOutcome> {
        if fields.is_empty() {
            return Err(Error::InvalidInput("nothing to update".to_string()));
        }
        let message = format!("{}: update {}", self.rig, item_id);
        self.mutate(item_id, message, None, |pre| {
            let item = pre
                .item
                .as_ref()
                .ok_or_else(|| Error::NotFound(item_id.to_string()))?;
            if item.status.is_terminal() {
                return Err(Error::Precondition(format!(
                    "item {item_id} is {}; terminal items cannot be edited",
                    item.status
                )));
            }
            Ok(transitions::update_statements(
                item, &self.rig, fields, Utc::now(),
            ))
        })
    }

    /// Withdraw an open item. An item that exists only on this rig's branch
    /// was never submitted, so there is nothing to withdraw: the branch is
    /// disposed of and the item simply ceases to exist.
    pub fn delete(&self, item_id: &str) -> Result<MutationOutcome> {
        let _guard = self.write_lock.lock().expect("write lock poisoned");
        let name = branch_name(&self.rig, item_id);
        if self.store.item(item_id, AsOf::Main)?.is_none() {
            if !self.has_branch(&name)? {
                return Err(Error::NotFound(item_id.to_string()));
            }
            info!(branch = %name, "deleting unsubmitted item; disposing of its branch");
            self.store.delete_branch(&name)?;
            if let Err(err) = self.store.delete_remote_branch(&name) {
                warn!(branch = %name, "remote cleanup failed: {err}");
            }
            return Ok(MutationOutcome {
                detail: None,
                branch: None,
                hint: Some(format!("{item_id} deleted; branch cleaned up")),
            });
        }
        let message = format!("{}: delete {}", self.rig, item_id);
        self.mutate_locked(item_id, message, Some(Transition::Delete.target()), |_| {
            Ok(transitions::delete_statements(item_id, &self.rig, Utc::now()))
        })
    }

    /// Run one mutation under the engine's write lock. `build` receives the
    /// item's snapshot as of the execution target (main, or the branch when
    /// one exists) so its guards re-state what the caller saw. `target` is
    /// the status the mutation lands on, used to detect replays.
    fn mutate<F>(
        &self,
        item_id: &str,
        message: String,
        target: Option<WantedStatus>,
        build: F,
    ) -> Result<MutationOutcome>
    where
        F: FnOnce(&Snapshot) -> Result<Vec<Statement>>,
    {
        let _guard = self.write_lock.lock().expect("write lock poisoned");
        self.mutate_locked(item_id, message, target, build)
    }

    fn mutate_locked<F>(
        &self,
        item_id: &str,
        message: String,
        target: Option<WantedStatus>,
        build: F,
    ) -> Result<MutationOutcome>
    where
        F: FnOnce(&Snapshot) -> Result<Vec<Statement>>,
    {
        debug!(upstream = %self.upstream.id, item = item_id, mode = %self.mode(), "mutating: {message}");
        match self.mode() {
            Mode::WildWest => self.mutate_wild_west(item_id, &message, build),
            Mode::Pr => self.mutate_branch(item_id, &message, target, build),
        }
    }

    fn mutate_wild_west<F>(&self, item_id: &str, message: &str, build: F) -> Result<MutationOutcome>
    where
        F: FnOnce(&Snapshot) -> Result<Vec<Statement>>,
    {
        self.store.can_wild_west()?;
        let pre = resolve::snapshot(self.store.as_ref(), item_id, AsOf::Main)?;
        let statements = build(&pre)?;
        self.store
            .exec("", message, self.signed_commits(), &statements)?;
        self.store.push_with_sync(message)?;
        let resolved = resolve::resolve(self.store.as_ref(), &self.rig, item_id)?;
        let detail = self.detail_with(item_id, resolved, None)?;
        Ok(MutationOutcome {
            detail: Some(detail),
            branch: None,
            hint: None,
        })
    }

    fn mutate_branch<F>(
        &self,
        item_id: &str,
        message: &str,
        target: Option<WantedStatus>,
        build: F,
    ) -> Result<MutationOutcome>
    where
        F: FnOnce(&Snapshot) -> Result<Vec<Statement>>,
    {
        let name = branch_name(&self.rig, item_id);
        let main_pre = resolve::snapshot(self.store.as_ref(), item_id, AsOf::Main)?;
        let branch_pre = if self.has_branch(&name)? {
            Some(resolve::snapshot(
                self.store.as_ref(),
                item_id,
                AsOf::Branch(&name),
            )?)
        } else {
            None
        };

        // Replaying a mutation whose branch already reached the target
        // status must not commit again; finish the PR step instead.
        if let (Some(target), Some(branch_pre)) = (target, branch_pre.as_ref()) {
            let on_branch = branch_pre.item.as_ref().map(|item| item.status);
            let on_main = main_pre.item.as_ref().map(|item| item.status);
            if on_branch == Some(target) && on_main != Some(target) {
                debug!(branch = %name, "branch already at {target}; skipping commit");
                return self.branch_outcome(item_id, &name);
            }
        }

        let statements = build(branch_pre.as_ref().unwrap_or(&main_pre))?;
        self.store
            .exec(&name, message, self.signed_commits(), &statements)?;
        let branch_post = resolve::snapshot(self.store.as_ref(), item_id, AsOf::Branch(&name))?;
        self.store.push_branch(&name, message)?;

        if net_zero(&main_pre, &branch_post) {
            info!(branch = %name, "branch no longer differs from main; cleaning up");
            self.store.delete_branch(&name)?;
            if let Err(err) = self.store.delete_remote_branch(&name) {
                warn!(branch = %name, "remote cleanup failed: {err}");
            }
            let resolved = resolve::resolve(self.store.as_ref(), &self.rig, item_id)?;
            let detail = if resolved.effective().is_some() {
                Some(self.detail_with(item_id, resolved, None)?)
            } else {
                None
            };
            return Ok(MutationOutcome {
                detail,
                branch: None,
                hint: Some(REVERT_HINT.to_string()),
            });
        }

        self.branch_outcome(item_id, &name)
    }

    fn branch_outcome(&self, item_id: &str, name: &str) -> Result<MutationOutcome> {
        let resolved = resolve::resolve(self.store.as_ref(), &self.rig, item_id)?;
        let (pr_url, hint) = self.try_auto_pull_request(name, &resolved);
        let detail = self.detail_with(item_id, resolved, pr_url)?;
        Ok(MutationOutcome {
            detail: Some(detail),
            branch: Some(name.to_string()),
            hint,
        })
    }

    /// Open a PR for the branch when the host can and none exists yet.
    /// Failures never unwind the mutation: the branch is already pushed,
    /// so report the problem as a hint and leave submit-pr available.
    fn try_auto_pull_request(
        &self,
        branch: &str,
        resolved: &resolve::ResolvedItem,
    ) -> (Option<String>, Option<String>) {
        let Some(create) = self.capabilities.create_pull_request.as_ref() else {
            return (None, None);
        };
        // retrying without the checker would file duplicate PRs
        if self.capabilities.check_pull_request.is_none() {
            return (None, None);
        }
        if let Some(url) = self.lookup_pull_request(branch) {
            return (Some(url), None);
        }
        let Some(spec) = self.pull_request_spec(branch, resolved) else {
            return (None, None);
        };
        match create(&spec) {
            Ok(url) => {
                info!(branch, url = %url, "pull request opened");
                (Some(url), None)
            }
            Err(err) => {
                warn!(branch, "pull request submission failed: {err:#}");
                (None, Some(format!("pull request submission failed: {err:#}")))
            }
        }
    }
}

/// A branch whose view matches main changed nothing worth reviewing.
/// Timestamps are ignored; a claim followed by an unclaim nets to zero.
fn net_zero(main: &Snapshot, branch: &Snapshot) -> bool {
    match (&main.item, &branch.item) {
        (Some(before), Some(after)) => {
            before.content_matches(after) && main.completion == branch.completion
        }
        (None, None) => true,
        _ => false,
    }
}
