// repo.rs
use std::sync::Arc;

use crate::store::StoreClient;

pub mod jobrepo;
pub mod messagerepo;
pub mod proposalrepo;

/// Handle the repositories hang off: the store client plus the namespaced
/// collection names. Cheap to clone, one per process.
#[derive(Clone)]
pub struct StoreHandle {
    pub client: Arc<dyn StoreClient>,
    jobs: String,
    proposals: String,
    messages: String,
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("jobs", &self.jobs)
            .field("proposals", &self.proposals)
            .field("messages", &self.messages)
            .finish()
    }
}

impl StoreHandle {
    pub fn new(client: Arc<dyn StoreClient>, namespace: &str) -> Self {
        StoreHandle {
            client,
            jobs: format!("{namespace}.jobs"),
            proposals: format!("{namespace}.proposals"),
            messages: format!("{namespace}.messages"),
        }
    }

    pub fn jobs(&self) -> &str {
        &self.jobs
    }

    pub fn proposals(&self) -> &str {
        &self.proposals
    }

    pub fn messages(&self) -> &str {
        &self.messages
    }
}
