//! Optional provider hooks. The engine never talks to a fork/PR provider
//! directly; adapter layers hand it closures, and anything left out turns
//! the dependent operation into a typed capability error.

use std::fmt;

use serde::Serialize;

use crate::config::Settings;

/// Request handed to the create-pull-request hook.
#[derive(Debug, Clone, Serialize)]
pub struct PullRequestSpec {
    pub branch: String,
    pub title: String,
    pub body: String,
}

pub type CreatePullRequestFn = dyn Fn(&PullRequestSpec) -> anyhow::Result<String> + Send + Sync;
pub type CheckPullRequestFn = dyn Fn(&str) -> anyhow::Result<Option<String>> + Send + Sync;
pub type ClosePullRequestFn = dyn Fn(&str) -> anyhow::Result<()> + Send + Sync;
pub type LoadDiffFn = dyn Fn(&str) -> anyhow::Result<String> + Send + Sync;
pub type BranchWebUrlFn = dyn Fn(&str) -> anyhow::Result<String> + Send + Sync;
pub type PersistSettingsFn = dyn Fn(&Settings) -> anyhow::Result<()> + Send + Sync;

/// Provider hooks by capability. All optional.
#[derive(Default)]
pub struct Capabilities {
    /// Open a pull request for a branch; returns its URL.
    pub create_pull_request: Option<Box<CreatePullRequestFn>>,
    /// URL of an already-open pull request for a branch, if any.
    pub check_pull_request: Option<Box<CheckPullRequestFn>>,
    pub close_pull_request: Option<Box<ClosePullRequestFn>>,
    /// Diff of a branch against main, as provider-rendered text.
    pub load_diff: Option<Box<LoadDiffFn>>,
    pub branch_web_url: Option<Box<BranchWebUrlFn>>,
    pub persist_settings: Option<Box<PersistSettingsFn>>,
}

impl Capabilities {
    pub fn new() -> Capabilities {
        Capabilities::default()
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("create_pull_request", &self.create_pull_request.is_some())
            .field("check_pull_request", &self.check_pull_request.is_some())
            .field("close_pull_request", &self.close_pull_request.is_some())
            .field("load_diff", &self.load_diff.is_some())
            .field("branch_web_url", &self.branch_web_url.is_some())
            .field("persist_settings", &self.persist_settings.is_some())
            .finish()
    }
}
