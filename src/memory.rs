//! In-process store backend. Branches copy main on first write, commits
//! are all-or-nothing, and merges diff a branch against the main state it
//! was created from. Backs the engine test suites and single-process
//! boards that do not need a remote commons.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::model::{BrowseFilter, CompletionRecord, Stamp, WantedItem};
use crate::store::{AsOf, Statement, Store};

#[derive(Debug, Clone, Default, PartialEq)]
struct Tables {
    items: BTreeMap<String, WantedItem>,
    // completions are one-per-item, keyed by wanted_id
    completions: BTreeMap<String, CompletionRecord>,
    stamps: BTreeMap<String, Stamp>,
}

#[derive(Debug, Clone)]
struct BranchData {
    /// Main as of branch creation; merges diff against this.
    base: Tables,
    tables: Tables,
}

#[derive(Debug, Default)]
struct Shared {
    main: Tables,
    branches: BTreeMap<String, BranchData>,
    remote: BTreeSet<String>,
    commits: usize,
    main_pushes: usize,
    syncs: usize,
    wild_west_denied: bool,
    fail_branch_deletes: bool,
    branch_push_failure: Option<String>,
    commit_failure: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    shared: Mutex<Shared>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().expect("memory store mutex poisoned")
    }
}

fn apply_statement(tables: &mut Tables, statement: &Statement) -> Result<()> {
    match statement {
        Statement::InsertItem(item) => {
            if tables.items.contains_key(&item.id) {
                return Err(Error::Precondition(format!(
                    "item {} already exists",
                    item.id
                )));
            }
            tables.items.insert(item.id.clone(), item.clone());
        }
        Statement::UpdateItem { id, guard, patch } => {
            let item = tables
                .items
                .get_mut(id)
                .ok_or_else(|| Error::Precondition(format!("item {id} not found")))?;
            guard.check(item)?;
            patch.apply(item);
        }
        Statement::DeleteItem { id } => {
            tables.items.remove(id);
        }
        Statement::InsertCompletion(record) => {
            tables
                .completions
                .insert(record.wanted_id.clone(), record.clone());
        }
        Statement::UpdateCompletion { wanted_id, patch } => {
            let record = tables.completions.get_mut(wanted_id).ok_or_else(|| {
                Error::Precondition(format!("no completion recorded for item {wanted_id}"))
            })?;
            patch.apply(record);
        }
        Statement::DeleteCompletion { wanted_id } => {
            tables.completions.remove(wanted_id);
        }
        Statement::InsertStamp(stamp) => {
            tables.stamps.insert(stamp.id.clone(), stamp.clone());
        }
    }
    Ok(())
}

fn merge_section<V: Clone + PartialEq>(
    main: &mut BTreeMap<String, V>,
    base: &BTreeMap<String, V>,
    branch: &BTreeMap<String, V>,
) {
    for (key, value) in branch {
        if base.get(key) != Some(value) {
            main.insert(key.clone(), value.clone());
        }
    }
    for key in base.keys() {
        if !branch.contains_key(key) {
            main.remove(key);
        }
    }
}

impl Shared {
    fn tables(&self, as_of: AsOf) -> Result<&Tables> {
        match as_of {
            AsOf::Main => Ok(&self.main),
            AsOf::Branch(name) => self
                .branches
                .get(name)
                .map(|data| &data.tables)
                .ok_or_else(|| Error::UnknownBranch(name.to_string())),
        }
    }
}

impl Store for MemoryStore {
    fn item(&self, id: &str, as_of: AsOf) -> Result<Option<WantedItem>> {
        let shared = self.lock();
        Ok(shared.tables(as_of)?.items.get(id).cloned())
    }

    fn items(&self, filter: &BrowseFilter, as_of: AsOf) -> Result<Vec<WantedItem>> {
        let shared = self.lock();
        Ok(shared
            .tables(as_of)?
            .items
            .values()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect())
    }

    fn completion(&self, wanted_id: &str, as_of: AsOf) -> Result<Option<CompletionRecord>> {
        let shared = self.lock();
        Ok(shared.tables(as_of)?.completions.get(wanted_id).cloned())
    }

    fn stamp(&self, id: &str, as_of: AsOf) -> Result<Option<Stamp>> {
        let shared = self.lock();
        Ok(shared.tables(as_of)?.stamps.get(id).cloned())
    }

    fn exec(
        &self,
        branch: &str,
        _commit_message: &str,
        _signed: bool,
        statements: &[Statement],
    ) -> Result<()> {
        let mut shared = self.lock();
        if let Some(diagnostic) = &shared.commit_failure {
            return Err(Error::Transport(diagnostic.clone()));
        }
        if branch.is_empty() {
            let mut next = shared.main.clone();
            for statement in statements {
                apply_statement(&mut next, statement)?;
            }
            shared.main = next;
        } else {
            let mut data = match shared.branches.get(branch) {
                Some(data) => data.clone(),
                None => BranchData {
                    base: shared.main.clone(),
                    tables: shared.main.clone(),
                },
            };
            for statement in statements {
                apply_statement(&mut data.tables, statement)?;
            }
            shared.branches.insert(branch.to_string(), data);
        }
        shared.commits += 1;
        Ok(())
    }

    fn branches(&self, prefix: &str) -> Result<Vec<String>> {
        let shared = self.lock();
        Ok(shared
            .branches
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn delete_branch(&self, name: &str) -> Result<()> {
        let mut shared = self.lock();
        if shared.fail_branch_deletes {
            return Err(Error::Transport(format!(
                "backend refused to delete {name}"
            )));
        }
        if shared.branches.remove(name).is_none() {
            return Err(Error::UnknownBranch(name.to_string()));
        }
        Ok(())
    }

    fn delete_remote_branch(&self, name: &str) -> Result<()> {
        let mut shared = self.lock();
        if shared.fail_branch_deletes {
            return Err(Error::Transport(format!(
                "backend refused to delete remote {name}"
            )));
        }
        if !shared.remote.remove(name) {
            return Err(Error::UnknownBranch(name.to_string()));
        }
        Ok(())
    }

    fn push_branch(&self, name: &str, _log: &str) -> Result<()> {
        let mut shared = self.lock();
        if let Some(diagnostic) = &shared.branch_push_failure {
            return Err(Error::Transport(diagnostic.clone()));
        }
        if !shared.branches.contains_key(name) {
            return Err(Error::UnknownBranch(name.to_string()));
        }
        shared.remote.insert(name.to_string());
        Ok(())
    }

    fn push_main(&self, _log: &str) -> Result<()> {
        self.lock().main_pushes += 1;
        Ok(())
    }

    fn push_with_sync(&self, _log: &str) -> Result<()> {
        // no concurrent writers to reconcile in-process
        self.lock().main_pushes += 1;
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.lock().syncs += 1;
        Ok(())
    }

    fn merge_branch(&self, name: &str) -> Result<()> {
        let mut shared = self.lock();
        let data = shared
            .branches
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownBranch(name.to_string()))?;
        merge_section(&mut shared.main.items, &data.base.items, &data.tables.items);
        merge_section(
            &mut shared.main.completions,
            &data.base.completions,
            &data.tables.completions,
        );
        merge_section(
            &mut shared.main.stamps,
            &data.base.stamps,
            &data.tables.stamps,
        );
        Ok(())
    }

    fn can_wild_west(&self) -> Result<()> {
        if self.lock().wild_west_denied {
            return Err(Error::Capability("direct main push"));
        }
        Ok(())
    }
}

#[cfg(test)]
impl MemoryStore {
    pub fn deny_wild_west(&self) {
        self.lock().wild_west_denied = true;
    }

    pub fn fail_branch_deletes(&self) {
        self.lock().fail_branch_deletes = true;
    }

    pub fn fail_branch_pushes(&self, diagnostic: &str) {
        self.lock().branch_push_failure = Some(diagnostic.to_string());
    }

    pub fn fail_commits(&self, diagnostic: &str) {
        self.lock().commit_failure = Some(diagnostic.to_string());
    }

    pub fn commit_count(&self) -> usize {
        self.lock().commits
    }

    pub fn main_push_count(&self) -> usize {
        self.lock().main_pushes
    }

    pub fn sync_count(&self) -> usize {
        self.lock().syncs
    }

    pub fn remote_branches(&self) -> Vec<String> {
        self.lock().remote.iter().cloned().collect()
    }
}
