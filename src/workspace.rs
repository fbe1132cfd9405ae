use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::client::Client;
use crate::error::{Error, Result};

/// Every upstream board this rig participates in, addressed by upstream
/// id. Lookups hand out `Arc`s; each engine serializes its own writes.
#[derive(Default)]
pub struct Workspace {
    clients: Mutex<HashMap<String, Arc<Client>>>,
}

impl Workspace {
    pub fn new() -> Workspace {
        Workspace::default()
    }

    pub fn add(&self, client: Arc<Client>) -> Result<()> {
        let mut clients = self.lock();
        let id = client.upstream().id.clone();
        if clients.contains_key(&id) {
            return Err(Error::InvalidInput(format!(
                "upstream {id} is already registered"
            )));
        }
        clients.insert(id, client);
        Ok(())
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        if self.lock().remove(id).is_none() {
            return Err(Error::InvalidInput(format!(
                "no upstream registered as {id}"
            )));
        }
        Ok(())
    }

    pub fn client(&self, id: &str) -> Option<Arc<Client>> {
        self.lock().get(id).cloned()
    }

    /// Registered engines, ordered by upstream id.
    pub fn upstreams(&self) -> Vec<Arc<Client>> {
        let mut all: Vec<Arc<Client>> = self.lock().values().cloned().collect();
        all.sort_by(|a, b| a.upstream().id.cmp(&b.upstream().id));
        all
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<Client>>> {
        self.clients.lock().expect("workspace mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capabilities;
    use crate::config::{Mode, UpstreamInfo};
    use crate::memory::MemoryStore;

    fn client(id: &str) -> Arc<Client> {
        let upstream = UpstreamInfo {
            id: id.to_string(),
            fork_org: "rigs".to_string(),
            fork_db: format!("{id}-fork"),
            mode: Mode::Pr,
        };
        Arc::new(Client::new(
            upstream,
            "alice",
            Arc::new(MemoryStore::new()),
            Capabilities::new(),
        ))
    }

    #[test]
    fn add_lookup_remove() {
        let workspace = Workspace::new();
        workspace.add(client("boards.example/main")).unwrap();
        assert!(workspace.client("boards.example/main").is_some());
        assert!(workspace.client("elsewhere").is_none());

        workspace.remove("boards.example/main").unwrap();
        assert!(workspace.client("boards.example/main").is_none());
        assert!(workspace.remove("boards.example/main").is_err());
    }

    #[test]
    fn upstreams_come_back_sorted_by_id() {
        let workspace = Workspace::new();
        for id in ["gamma", "alpha", "beta"] {
            workspace.add(client(id)).unwrap();
        }
        let ids: Vec<String> = workspace
            .upstreams()
            .iter()
            .map(|c| c.upstream().id.clone())
            .collect();
        assert_eq!(ids, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn duplicate_registration_is_refused() {
        let workspace = Workspace::new();
        workspace.add(client("alpha")).unwrap();
        let err = workspace.add(client("alpha")).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
