//! Branch lifecycle outside the mutation loop: landing a pending branch on
//! main, discarding one, and the manual pull-request surface.

use tracing::{info, warn};

use super::{Client, MutationOutcome};
use crate::branch::parse_branch;
use crate::error::{Error, Result};
use crate::resolve;
use crate::store::Statement;

impl Client {
    /// Merge one of this rig's branches into main, drop the branch, and
    /// publish. Wild-west review flow: look at the diff, then apply.
    /// Branches that change nothing are refused; discard handles those.
    pub fn apply_branch(&self, name: &str) -> Result<MutationOutcome> {
        let _guard = self.write_lock.lock().expect("write lock poisoned");
        let wanted_id = self.owned_branch(name)?;
        if !self.has_branch(name)? {
            return Err(Error::UnknownBranch(name.to_string()));
        }
        let pending = resolve::resolve(self.store.as_ref(), &self.rig, &wanted_id)?;
        if pending.delta.is_none() {
            return Err(Error::Precondition(format!(
                "branch {name} changes nothing on main; discard it instead"
            )));
        }
        self.store.merge_branch(name)?;
        self.store.delete_branch(name)?;
        self.store
            .push_main(&format!("{}: apply {name}", self.rig))?;
        if let Err(err) = self.store.delete_remote_branch(name) {
            warn!(branch = name, "remote cleanup failed: {err}");
        }
        info!(branch = name, "branch applied to main");
        let resolved = resolve::resolve(self.store.as_ref(), &self.rig, &wanted_id)?;
        let detail = self.detail_with(&wanted_id, resolved, None)?;
        Ok(MutationOutcome {
            detail: Some(detail),
            branch: None,
            hint: Some(format!("{name} merged into main")),
        })
    }

    /// Throw a pending branch away. Closing its PR and deleting the branch
    /// refs are best-effort, but clearing the staged rows must succeed:
    /// once the rows are gone the item stops resurfacing in views even if
    /// the refs linger.
    pub fn discard_branch(&self, name: &str) -> Result<MutationOutcome> {
        let _guard = self.write_lock.lock().expect("write lock poisoned");
        let wanted_id = self.owned_branch(name)?;
        if !self.has_branch(name)? {
            return Err(Error::UnknownBranch(name.to_string()));
        }
        if let Some(close) = self.capabilities.close_pull_request.as_ref() {
            if let Err(err) = close(name) {
                warn!(branch = name, "pull request close failed: {err:#}");
            }
        }
        let statements = [
            Statement::DeleteCompletion {
                wanted_id: wanted_id.clone(),
            },
            Statement::DeleteItem {
                id: wanted_id.clone(),
            },
        ];
        self.store.exec(
            name,
            &format!("{}: discard {name}", self.rig),
            self.signed_commits(),
            &statements,
        )?;
        if let Err(err) = self.store.delete_branch(name) {
            warn!(branch = name, "branch cleanup failed: {err}");
        }
        if let Err(err) = self.store.delete_remote_branch(name) {
            warn!(branch = name, "remote cleanup failed: {err}");
        }
        info!(branch = name, "branch discarded");
        let resolved = resolve::resolve(self.store.as_ref(), &self.rig, &wanted_id)?;
        let detail = if resolved.effective().is_some() {
            Some(self.detail_with(&wanted_id, resolved, None)?)
        } else {
            None
        };
        Ok(MutationOutcome {
            detail,
            branch: None,
            hint: Some(format!("{name} discarded")),
        })
    }

    /// Manually open a pull request for a pending branch, for hosts where
    /// the automatic attempt after the mutation failed. Returns the URL of
    /// the new PR, or of the one that already covers the branch.
    pub fn submit_pr(&self, name: &str) -> Result<String> {
        let _guard = self.write_lock.lock().expect("write lock poisoned");
        let wanted_id = self.owned_branch(name)?;
        if !self.has_branch(name)? {
            return Err(Error::UnknownBranch(name.to_string()));
        }
        let create = self
            .capabilities
            .create_pull_request
            .as_ref()
            .ok_or(Error::Capability("pull request creation"))?;
        if let Some(url) = self.lookup_pull_request(name) {
            return Ok(url);
        }
        // re-push first; the branch may have landed locally while the
        // remote was unreachable
        self.store
            .push_branch(name, &format!("{}: submit {name}", self.rig))?;
        let resolved = resolve::resolve(self.store.as_ref(), &self.rig, &wanted_id)?;
        let spec = self
            .pull_request_spec(name, &resolved)
            .ok_or_else(|| Error::NotFound(wanted_id.clone()))?;
        let url = create(&spec).map_err(|err| Error::Transport(format!("{err:#}")))?;
        info!(branch = name, url = %url, "pull request opened");
        Ok(url)
    }

    /// Unified diff between a branch and main, rendered by the host.
    pub fn branch_diff(&self, name: &str) -> Result<String> {
        parse_branch(name)?;
        if !self.has_branch(name)? {
            return Err(Error::UnknownBranch(name.to_string()));
        }
        let load = self
            .capabilities
            .load_diff
            .as_ref()
            .ok_or(Error::Capability("diff loading"))?;
        load(name).map_err(|err| Error::Transport(format!("{err:#}")))
    }

    fn owned_branch(&self, name: &str) -> Result<String> {
        let (rig, wanted_id) = parse_branch(name)?;
        if rig != self.rig {
            return Err(Error::InvalidInput(format!(
                "branch {name} belongs to {rig}, not {}",
                self.rig
            )));
        }
        Ok(wanted_id.to_string())
    }
}
