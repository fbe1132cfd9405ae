//! Mutation engine for a federated wanted-item board. Each upstream board
//! gets one [`Client`], which validates transitions against fresh state,
//! stages guarded statements, and lands them either directly on main
//! (wild-west mode) or through a per-item pull-request branch (pr mode).

pub mod branch;
pub mod capability;
pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod model;
pub mod resolve;
pub mod store;
pub mod transitions;
pub mod workspace;

pub use capability::{Capabilities, PullRequestSpec};
pub use client::{Client, Dashboard, ItemDetail, MutationOutcome, PendingBranch};
pub use config::{Mode, Settings, UpstreamInfo};
pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use model::{
    AcceptInput, BrowseFilter, CompletionRecord, PostInput, Stamp, UpdateFields, WantedItem,
    WantedStatus,
};
pub use resolve::{BranchAction, Delta, ResolvedItem};
pub use store::{AsOf, Statement, Store};
pub use transitions::{available_transitions, Transition};
pub use workspace::Workspace;
