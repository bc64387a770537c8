//! Where the discovery state machine hands off to the PRD lifecycle.
//!
//! When a discovery enters `complete`, the [`DiscoveryController`] calls its
//! [`CompletionHook`] before committing the stage. The PRD controller is the
//! hook: it seeds one pending PRD per MVP feature. If seeding fails the
//! discovery stays at `summary` and confirmation can be retried; features
//! already seeded are skipped on the next attempt.

use std::sync::Arc;

use crate::controller::{DiscoveryController, PrdController, PrdPolicy};
use crate::discovery::{Discovery, DiscoverySummary};
use crate::error::Result;
use crate::generation::Generator;
use crate::prd::Prd;
use crate::store::Store;

pub trait CompletionHook: Send + Sync {
    /// Called with the discovery already in `complete` (not yet persisted).
    /// Returns the PRDs created by this call.
    fn discovery_completed(
        &self,
        discovery: &Discovery,
        summary: &DiscoverySummary,
    ) -> Result<Vec<Prd>>;
}

impl CompletionHook for PrdController {
    fn discovery_completed(
        &self,
        discovery: &Discovery,
        summary: &DiscoverySummary,
    ) -> Result<Vec<Prd>> {
        self.seed_from_summary(discovery, summary)
    }
}

/// Both controllers over one store, with PRD seeding wired into discovery
/// completion.
#[derive(Clone)]
pub struct Controllers {
    pub discovery: Arc<DiscoveryController>,
    pub prds: Arc<PrdController>,
}

impl Controllers {
    pub fn new(store: Arc<dyn Store>, generator: Arc<dyn Generator>, policy: PrdPolicy) -> Self {
        let prds = Arc::new(PrdController::new(Arc::clone(&store), generator, policy));
        let hook: Arc<dyn CompletionHook> = prds.clone();
        let discovery = Arc::new(DiscoveryController::new(store).with_completion_hook(hook));
        Self { discovery, prds }
    }
}
