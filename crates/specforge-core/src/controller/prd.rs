use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::GenerationConfig;
use crate::discovery::{Discovery, DiscoverySummary};
use crate::error::{ForgeError, Result};
use crate::generation::{parse_generated, GenerationError, GenerationRequest, Generator};
use crate::locks::{prd_key, project_key, KeyedLocks};
use crate::prd::{NewPrd, Prd, PrdContentUpdate, UserStory};
use crate::store::Store;
use crate::types::{PrdStatus, MVP_VERSION};

/// Limits applied to generation attempts.
#[derive(Debug, Clone)]
pub struct PrdPolicy {
    pub max_generation_attempts: u32,
    pub generation_timeout: Duration,
}

impl Default for PrdPolicy {
    fn default() -> Self {
        Self {
            max_generation_attempts: 3,
            generation_timeout: Duration::from_secs(60),
        }
    }
}

impl PrdPolicy {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            max_generation_attempts: config.max_attempts,
            generation_timeout: config.timeout(),
        }
    }
}

/// Owns the per-feature PRD lifecycle and the one-active-PRD rule.
pub struct PrdController {
    store: Arc<dyn Store>,
    generator: Arc<dyn Generator>,
    policy: PrdPolicy,
    locks: KeyedLocks,
}

impl PrdController {
    pub fn new(store: Arc<dyn Store>, generator: Arc<dyn Generator>, policy: PrdPolicy) -> Self {
        Self {
            store,
            generator,
            policy,
            locks: KeyedLocks::new(),
        }
    }

    pub fn policy(&self) -> &PrdPolicy {
        &self.policy
    }

    // -----------------------------------------------------------------------
    // Creation and queries
    // -----------------------------------------------------------------------

    /// Create a pending PRD. A second PRD for the same feature is rejected.
    pub fn create(&self, mut new: NewPrd) -> Result<Prd> {
        new.title = new.title.trim().to_string();
        if new.title.is_empty() {
            return Err(ForgeError::Validation("title is required".to_string()));
        }
        if new.version.trim().is_empty() {
            new.version = MVP_VERSION.to_string();
        }
        let prd = Prd::new(new);
        self.store.create_prd(&prd)?;
        info!(prd = %prd.id, feature = %prd.feature_id, "created PRD");
        Ok(prd)
    }

    pub fn get(&self, id: &str) -> Result<Prd> {
        self.store
            .get_prd(id)?
            .ok_or_else(|| ForgeError::PrdNotFound(id.to_string()))
    }

    /// Project PRDs by version, priority, creation.
    pub fn list(&self, project_id: &str) -> Result<Vec<Prd>> {
        self.store.list_prds(project_id)
    }

    pub fn list_mvp(&self, project_id: &str) -> Result<Vec<Prd>> {
        let mut prds = self.list(project_id)?;
        prds.retain(Prd::is_mvp);
        Ok(prds)
    }

    pub fn get_active(&self, project_id: &str) -> Result<Prd> {
        self.list(project_id)?
            .into_iter()
            .find(Prd::is_active)
            .ok_or(ForgeError::NoActivePrd)
    }

    /// The ready PRD with the lowest priority number.
    pub fn next_prd(&self, project_id: &str) -> Result<Prd> {
        self.list(project_id)?
            .into_iter()
            .filter(|p| p.status == PrdStatus::Ready)
            .min_by_key(|p| p.priority)
            .ok_or(ForgeError::NoReadyPrd)
    }

    // -----------------------------------------------------------------------
    // Status transitions
    // -----------------------------------------------------------------------

    pub fn mark_ready(&self, id: &str) -> Result<Prd> {
        self.change_status(id, PrdStatus::Ready, |prd| {
            if prd.status != PrdStatus::Draft {
                return Err(ForgeError::InvalidStatusChange {
                    from: prd.status.to_string(),
                    to: PrdStatus::Ready.to_string(),
                    reason: "only draft PRDs can be marked ready".to_string(),
                });
            }
            Ok(())
        })
    }

    pub fn start_implementation(&self, id: &str) -> Result<Prd> {
        self.change_status(id, PrdStatus::InProgress, |_| Ok(()))
    }

    pub fn complete_implementation(&self, id: &str) -> Result<Prd> {
        self.change_status(id, PrdStatus::Complete, |_| Ok(()))
    }

    /// External status change. Only `ready`, `in_progress` and `complete`
    /// may be requested; the transition table decides the rest.
    pub fn update_status(&self, id: &str, target: PrdStatus) -> Result<Prd> {
        if !PrdStatus::externally_settable().contains(&target) {
            return Err(ForgeError::Validation(
                "status must be one of: ready, in_progress, complete".to_string(),
            ));
        }
        self.change_status(id, target, |_| Ok(()))
    }

    /// Activate a ready PRD of `project_id`.
    pub fn set_active_prd(&self, project_id: &str, prd_id: &str) -> Result<Prd> {
        let prd = self.get(prd_id)?;
        if prd.project_id != project_id {
            return Err(ForgeError::PrdNotInProject {
                prd: prd_id.to_string(),
                project: project_id.to_string(),
            });
        }
        self.change_status(prd_id, PrdStatus::InProgress, |prd| {
            if prd.status != PrdStatus::Ready {
                return Err(ForgeError::InvalidStatusChange {
                    from: prd.status.to_string(),
                    to: PrdStatus::InProgress.to_string(),
                    reason: "PRD must be in ready status".to_string(),
                });
            }
            Ok(())
        })
    }

    /// Pause the project's active PRD back to `ready`. `None` when nothing
    /// was active.
    pub fn clear_active_prd(&self, project_id: &str) -> Result<Option<Prd>> {
        self.locks.with(&project_key(project_id), || {
            let Some(active) = self.list(project_id)?.into_iter().find(Prd::is_active) else {
                return Ok(None);
            };
            self.locks.with(&prd_key(&active.id), || {
                let mut prd = self.get(&active.id)?;
                prd.transition(PrdStatus::Ready)?;
                self.store.update_prd(&prd)?;
                info!(project = project_id, prd = %prd.id, "cleared active PRD");
                Ok(Some(prd))
            })
        })
    }

    /// Every status change goes through here. `check` and the transition
    /// table run once before any lock is taken, then again under project
    /// lock and PRD lock along with the single-active rule. A PRD that is
    /// still generating fails the first pass.
    fn change_status(
        &self,
        id: &str,
        target: PrdStatus,
        check: impl Fn(&Prd) -> Result<()>,
    ) -> Result<Prd> {
        let snapshot = self.get(id)?;
        check(&snapshot)?;
        snapshot.ensure_transition(target)?;

        let project_id = snapshot.project_id;
        self.locks.with(&project_key(&project_id), || {
            self.locks.with(&prd_key(id), || {
                let mut prd = self.get(id)?;
                check(&prd)?;
                if target == PrdStatus::InProgress && prd.status == PrdStatus::Ready {
                    if let Some(active) = self
                        .list(&project_id)?
                        .into_iter()
                        .find(|p| p.is_active() && p.id != prd.id)
                    {
                        return Err(ForgeError::InvalidStatusChange {
                            from: prd.status.to_string(),
                            to: target.to_string(),
                            reason: format!(
                                "PRD {} is already in progress; clear it first",
                                active.id
                            ),
                        });
                    }
                }
                let from = prd.status;
                prd.transition(target)?;
                self.store.update_prd(&prd)?;
                info!(prd = id, %from, to = %target, "PRD status changed");
                Ok(prd)
            })
        })
    }

    // -----------------------------------------------------------------------
    // Generation
    // -----------------------------------------------------------------------

    /// Generate content for a pending PRD. Any other status is returned
    /// unchanged.
    pub fn generate(&self, id: &str) -> Result<Prd> {
        self.locks.with(&prd_key(id), || {
            let prd = self.get(id)?;
            if prd.status != PrdStatus::Pending {
                return Ok(prd);
            }
            self.attempt_locked(prd)
        })
    }

    /// One more generation attempt for a pending PRD.
    pub fn retry_generation(&self, id: &str) -> Result<Prd> {
        self.locks.with(&prd_key(id), || {
            let prd = self.get(id)?;
            if prd.status != PrdStatus::Pending {
                return Err(ForgeError::InvalidStatusChange {
                    from: prd.status.to_string(),
                    to: PrdStatus::Draft.to_string(),
                    reason: "can only retry failed or pending PRDs".to_string(),
                });
            }
            self.attempt_locked(prd)
        })
    }

    /// Generate every pending PRD of the project that has attempts left,
    /// MVP first. Failed attempts are recorded on the PRD.
    pub fn generate_pending(&self, project_id: &str) -> Result<Vec<Prd>> {
        let max = self.policy.max_generation_attempts;
        let pending: Vec<Prd> = self
            .list(project_id)?
            .into_iter()
            .filter(|p| p.status == PrdStatus::Pending && p.generation_attempts < max)
            .collect();

        let mut results = Vec::with_capacity(pending.len());
        for prd in pending {
            match self.generate(&prd.id) {
                Ok(prd) => results.push(prd),
                // another caller used the last attempt meanwhile
                Err(ForgeError::MaxRetriesExceeded { .. }) => {
                    debug!(prd = %prd.id, "skipping PRD with no attempts left");
                }
                Err(e) => return Err(e),
            }
        }
        let drafted = results
            .iter()
            .filter(|p| p.status == PrdStatus::Draft)
            .count();
        info!(
            project = project_id,
            attempted = results.len(),
            drafted,
            "generated pending PRDs"
        );
        Ok(results)
    }

    /// Caller holds the PRD lock and has checked the status is `pending`.
    fn attempt_locked(&self, mut prd: Prd) -> Result<Prd> {
        let max = self.policy.max_generation_attempts;
        if prd.generation_attempts >= max {
            return Err(ForgeError::MaxRetriesExceeded {
                attempts: prd.generation_attempts,
                max,
            });
        }
        let request = self.build_request(&prd)?;

        // counted before the call so a crash mid-generation still uses it up
        prd.generation_attempts += 1;
        self.store.update_prd(&prd)?;
        let attempt = prd.generation_attempts;
        info!(prd = %prd.id, attempt, max, mvp = request.is_mvp(), "generating PRD");

        match self
            .run_generator(request)
            .and_then(|raw| parse_generated(&raw))
        {
            Ok(content) => {
                prd.accept_generated(content)?;
                info!(prd = %prd.id, attempt, "PRD drafted");
            }
            Err(e) => {
                warn!(prd = %prd.id, attempt, max, error = %e, "PRD generation failed");
                prd.record_failure(e.to_string());
            }
        }
        self.store.update_prd(&prd)?;
        Ok(prd)
    }

    /// Run the generator on a helper thread, waiting at most the policy
    /// timeout. A timed-out call is abandoned, not cancelled.
    fn run_generator(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<String, GenerationError> {
        let timeout = self.policy.generation_timeout;
        let generator = Arc::clone(&self.generator);
        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("prd-generation".to_string())
            .spawn(move || {
                let _ = tx.send(generator.generate(&request));
            })
            .map_err(|e| GenerationError::Failed(format!("could not start generation: {e}")))?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(GenerationError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(GenerationError::Failed(
                "generator stopped without a result".to_string(),
            )),
        }
    }

    /// Project context from the discovery, falling back to the PRD itself
    /// when the discovery has since been reset.
    fn build_request(&self, prd: &Prd) -> Result<GenerationRequest> {
        let mut request = GenerationRequest {
            prd_id: prd.id.clone(),
            feature_name: prd.title.clone(),
            version: prd.version.clone(),
            priority: prd.priority,
            ..Default::default()
        };
        let Some(discovery) = self.store.get_discovery(&prd.discovery_id)? else {
            return Ok(request);
        };
        let users = self.store.list_users(&discovery.id)?;
        let features = self.store.list_features(&discovery.id)?;
        let summary = DiscoverySummary::build(&discovery, users, features);

        if let Some(feature) = summary.feature(&prd.feature_id) {
            request.feature_name = feature.name.clone();
        }
        request.project_name = summary.project_name.clone();
        request.problem_statement = discovery
            .problem_statement
            .clone()
            .unwrap_or_else(|| summary.solves_statement.clone());
        request.related_features = summary
            .mvp_features
            .iter()
            .filter(|f| f.id != prd.feature_id)
            .cloned()
            .collect();
        request.users = summary.users;
        Ok(request)
    }

    // -----------------------------------------------------------------------
    // Draft editing
    // -----------------------------------------------------------------------

    fn edit<T>(&self, id: &str, f: impl FnOnce(&mut Prd) -> Result<T>) -> Result<T> {
        self.locks.with(&prd_key(id), || {
            let mut prd = self.get(id)?;
            let out = f(&mut prd)?;
            self.store.update_prd(&prd)?;
            Ok(out)
        })
    }

    pub fn update_content(&self, id: &str, update: PrdContentUpdate) -> Result<Prd> {
        self.edit(id, |prd| {
            prd.apply_content(update)?;
            Ok(prd.clone())
        })
    }

    pub fn add_user_story(&self, id: &str, story: UserStory) -> Result<UserStory> {
        self.edit(id, |prd| prd.add_user_story(story))
    }

    pub fn update_user_story(&self, id: &str, story_id: &str, story: UserStory) -> Result<UserStory> {
        self.edit(id, |prd| prd.replace_user_story(story_id, story))
    }

    pub fn delete_user_story(&self, id: &str, story_id: &str) -> Result<()> {
        self.edit(id, |prd| prd.remove_user_story(story_id))
    }

    // -----------------------------------------------------------------------
    // Seeding
    // -----------------------------------------------------------------------

    /// One pending PRD per MVP feature that has none yet.
    pub fn seed_from_summary(
        &self,
        discovery: &Discovery,
        summary: &DiscoverySummary,
    ) -> Result<Vec<Prd>> {
        let mut seeded = Vec::new();
        for feature in &summary.mvp_features {
            if self.store.prd_for_feature(&feature.id)?.is_some() {
                debug!(feature = %feature.id, "PRD already exists for feature, skipping");
                continue;
            }
            let prd = Prd::new(NewPrd {
                discovery_id: discovery.id.clone(),
                feature_id: feature.id.clone(),
                project_id: discovery.project_id.clone(),
                title: feature.name.clone(),
                overview: String::new(),
                version: feature.version.clone(),
                priority: feature.priority,
            });
            match self.store.create_prd(&prd) {
                Ok(()) => seeded.push(prd),
                Err(ForgeError::PrdExists(_)) => {
                    debug!(feature = %feature.id, "PRD created concurrently, skipping");
                }
                Err(e) => return Err(e),
            }
        }
        info!(
            discovery = %discovery.id,
            project = %discovery.project_id,
            count = seeded.len(),
            "seeded PRDs from discovery"
        );
        Ok(seeded)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{NewFeature, NewUser};
    use crate::orchestration::Controllers;
    use crate::store::{MemoryStore, PrdRepository};
    use crate::types::Stage;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const DRAFT_JSON: &str = r#"{"overview":"Take orders online.","userStories":[{"id":"US-001","asA":"baker","iWant":"see orders","soThat":"nothing is lost","priority":"must","complexity":"low"}],"acceptanceCriteria":[],"technicalNotes":[]}"#;

    /// Pops scripted replies; an empty script fails every call.
    #[derive(Default)]
    struct Scripted {
        replies: Mutex<VecDeque<std::result::Result<String, GenerationError>>>,
        prompts: Mutex<Vec<GenerationRequest>>,
        delay: Option<Duration>,
    }

    impl Scripted {
        fn with(replies: Vec<std::result::Result<String, GenerationError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                ..Default::default()
            })
        }
    }

    impl Generator for Scripted {
        fn generate(
            &self,
            request: &GenerationRequest,
        ) -> std::result::Result<String, GenerationError> {
            self.prompts.lock().unwrap().push(request.clone());
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GenerationError::Failed("script exhausted".into())))
        }
    }

    /// Reports each call on `started` and blocks until `release` fires.
    struct Gated {
        started: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl Generator for Gated {
        fn generate(
            &self,
            _request: &GenerationRequest,
        ) -> std::result::Result<String, GenerationError> {
            let _ = self.started.lock().unwrap().send(());
            let _ = self.release.lock().unwrap().recv();
            Ok(DRAFT_JSON.to_string())
        }
    }

    fn controller(generator: Arc<dyn Generator>) -> PrdController {
        PrdController::new(Arc::new(MemoryStore::new()), generator, PrdPolicy::default())
    }

    fn new_prd(project: &str, feature: &str, priority: i32) -> NewPrd {
        NewPrd {
            discovery_id: "disc".into(),
            feature_id: feature.into(),
            project_id: project.into(),
            title: format!("{feature} title"),
            overview: String::new(),
            version: "v1".into(),
            priority,
        }
    }

    fn drafted(c: &PrdController, project: &str, feature: &str, priority: i32) -> Prd {
        let prd = c.create(new_prd(project, feature, priority)).unwrap();
        let prd = c.generate(&prd.id).unwrap();
        assert_eq!(prd.status, PrdStatus::Draft);
        prd
    }

    fn ready(c: &PrdController, project: &str, feature: &str, priority: i32) -> Prd {
        let prd = drafted(c, project, feature, priority);
        c.mark_ready(&prd.id).unwrap()
    }

    fn always_ok(n: usize) -> Arc<Scripted> {
        Scripted::with((0..n).map(|_| Ok(DRAFT_JSON.to_string())).collect())
    }

    #[test]
    fn create_starts_pending_and_rejects_duplicate_feature() {
        let c = controller(always_ok(0));
        let prd = c.create(new_prd("proj", "feat", 1)).unwrap();
        assert_eq!(prd.status, PrdStatus::Pending);
        assert_eq!(prd.generation_attempts, 0);

        let err = c.create(new_prd("proj", "feat", 2)).unwrap_err();
        assert!(matches!(err, ForgeError::PrdExists(_)));
        assert_eq!(c.get(&prd.id).unwrap().priority, 1);
    }

    #[test]
    fn successful_generation_drafts_the_prd() {
        let c = controller(always_ok(1));
        let prd = drafted(&c, "proj", "feat", 1);
        assert_eq!(prd.generation_attempts, 1);
        assert!(prd.generated_at.is_some());
        assert_eq!(prd.user_stories[0].id, "US-001");
        assert!(prd.last_error.is_none());
    }

    #[test]
    fn failed_attempts_stay_pending_until_the_ceiling() {
        let c = controller(Scripted::with(vec![
            Err(GenerationError::Failed("overloaded".into())),
            Ok("not json".into()),
        ]));
        let prd = c.create(new_prd("proj", "feat", 1)).unwrap();

        let first = c.generate(&prd.id).unwrap();
        assert_eq!(first.status, PrdStatus::Pending);
        assert_eq!(first.generation_attempts, 1);
        assert!(first.last_error.as_deref().unwrap().contains("overloaded"));

        let second = c.retry_generation(&prd.id).unwrap();
        assert_eq!(second.generation_attempts, 2);
        assert!(second.last_error.as_deref().unwrap().contains("malformed"));

        let third = c.retry_generation(&prd.id).unwrap();
        assert_eq!(third.generation_attempts, 3);

        let err = c.retry_generation(&prd.id).unwrap_err();
        assert!(err.to_string().starts_with("maximum retries exceeded"));
        assert_eq!(c.get(&prd.id).unwrap().generation_attempts, 3);
    }

    #[test]
    fn success_after_failure_clears_last_error() {
        let c = controller(Scripted::with(vec![
            Err(GenerationError::Failed("overloaded".into())),
            Ok(DRAFT_JSON.into()),
        ]));
        let prd = c.create(new_prd("proj", "feat", 1)).unwrap();
        c.generate(&prd.id).unwrap();
        let prd = c.retry_generation(&prd.id).unwrap();
        assert_eq!(prd.status, PrdStatus::Draft);
        assert_eq!(prd.generation_attempts, 2);
        assert!(prd.last_error.is_none());
    }

    #[test]
    fn slow_generator_times_out_as_a_failure() {
        let generator = Arc::new(Scripted {
            replies: Mutex::new(vec![Ok(DRAFT_JSON.to_string())].into()),
            delay: Some(Duration::from_millis(500)),
            ..Default::default()
        });
        let c = PrdController::new(
            Arc::new(MemoryStore::new()),
            generator,
            PrdPolicy {
                max_generation_attempts: 3,
                generation_timeout: Duration::from_millis(20),
            },
        );
        let prd = c.create(new_prd("proj", "feat", 1)).unwrap();
        let prd = c.generate(&prd.id).unwrap();
        assert_eq!(prd.status, PrdStatus::Pending);
        assert_eq!(prd.generation_attempts, 1);
        assert!(prd.last_error.unwrap().contains("timed out"));
    }

    #[test]
    fn retry_rejects_generated_prds() {
        let c = controller(always_ok(1));
        let prd = drafted(&c, "proj", "feat", 1);
        let err = c.retry_generation(&prd.id).unwrap_err();
        assert!(err.to_string().contains("can only retry failed or pending PRDs"));
        // generate on a draft is a no-op
        assert_eq!(c.generate(&prd.id).unwrap().generation_attempts, 1);
    }

    #[test]
    fn pending_cannot_be_set_ready() {
        let c = controller(always_ok(0));
        let prd = c.create(new_prd("proj", "feat", 1)).unwrap();
        assert!(matches!(
            c.update_status(&prd.id, PrdStatus::Ready),
            Err(ForgeError::InvalidStatusChange { .. })
        ));
        assert!(matches!(
            c.mark_ready(&prd.id),
            Err(ForgeError::InvalidStatusChange { .. })
        ));
    }

    #[test]
    fn internal_statuses_cannot_be_requested() {
        let c = controller(always_ok(0));
        let prd = c.create(new_prd("proj", "feat", 1)).unwrap();
        for target in [PrdStatus::Pending, PrdStatus::Draft] {
            let err = c.update_status(&prd.id, target).unwrap_err();
            assert_eq!(
                err.to_string(),
                "status must be one of: ready, in_progress, complete"
            );
        }
    }

    #[test]
    fn full_lifecycle_stamps_in_order() {
        let c = controller(always_ok(1));
        let prd = ready(&c, "proj", "feat", 1);
        c.set_active_prd("proj", &prd.id).unwrap();
        let done = c.complete_implementation(&prd.id).unwrap();

        assert_eq!(done.status, PrdStatus::Complete);
        let (approved, started, completed) = (
            done.approved_at.unwrap(),
            done.started_at.unwrap(),
            done.completed_at.unwrap(),
        );
        assert!(done.generated_at.unwrap() <= approved);
        assert!(approved <= started && started <= completed);
    }

    #[test]
    fn only_one_prd_in_progress_per_project() {
        let c = controller(always_ok(3));
        let a = ready(&c, "proj", "a", 1);
        let b = ready(&c, "proj", "b", 2);
        let other = ready(&c, "other", "x", 1);

        c.start_implementation(&a.id).unwrap();
        let err = c.set_active_prd("proj", &b.id).unwrap_err();
        assert!(err.to_string().contains(&a.id));
        let err = c.update_status(&b.id, PrdStatus::InProgress).unwrap_err();
        assert!(matches!(err, ForgeError::InvalidStatusChange { .. }));
        // other projects are unaffected
        c.start_implementation(&other.id).unwrap();

        assert_eq!(c.get_active("proj").unwrap().id, a.id);
        c.clear_active_prd("proj").unwrap();
        c.set_active_prd("proj", &b.id).unwrap();
        assert_eq!(c.get_active("proj").unwrap().id, b.id);
    }

    #[test]
    fn concurrent_activation_admits_one() {
        let c = Arc::new(controller(always_ok(6)));
        let ids: Vec<_> = (0..6)
            .map(|i| ready(&c, "proj", &format!("f{i}"), i).id)
            .collect();
        let handles: Vec<_> = ids
            .into_iter()
            .map(|id| {
                let c = Arc::clone(&c);
                std::thread::spawn(move || c.set_active_prd("proj", &id).is_ok())
            })
            .collect();
        let wins = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap().then_some(()))
            .count();
        assert_eq!(wins, 1);
        let active = c
            .list("proj")
            .unwrap()
            .into_iter()
            .filter(Prd::is_active)
            .count();
        assert_eq!(active, 1);
    }

    #[test]
    fn status_changes_do_not_wait_for_generation() {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let store = Arc::new(MemoryStore::new());
        let c = Arc::new(PrdController::new(
            store.clone(),
            Arc::new(Gated {
                started: Mutex::new(started_tx),
                release: Mutex::new(release_rx),
            }),
            PrdPolicy {
                max_generation_attempts: 3,
                generation_timeout: Duration::from_secs(30),
            },
        ));

        let mut waiting = Prd::new(new_prd("proj", "waiting", 2));
        waiting.transition(PrdStatus::Draft).unwrap();
        waiting.transition(PrdStatus::Ready).unwrap();
        store.create_prd(&waiting).unwrap();

        let slow = c.create(new_prd("proj", "slow", 1)).unwrap();
        let generation = {
            let c = Arc::clone(&c);
            let id = slow.id.clone();
            std::thread::spawn(move || c.generate(&id))
        };
        started_rx.recv_timeout(Duration::from_secs(10)).unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        {
            let c = Arc::clone(&c);
            let (slow_id, waiting_id) = (slow.id.clone(), waiting.id.clone());
            std::thread::spawn(move || {
                let complete = c.update_status(&slow_id, PrdStatus::Complete);
                let activate = c.set_active_prd("proj", &waiting_id);
                let _ = done_tx.send((complete, activate));
            });
        }
        let outcome = done_rx.recv_timeout(Duration::from_secs(5));
        release_tx.send(()).unwrap();

        let (complete, activate) = outcome.expect("status changes blocked behind generation");
        assert!(matches!(
            complete,
            Err(ForgeError::InvalidStatusChange { .. })
        ));
        assert_eq!(activate.unwrap().status, PrdStatus::InProgress);
        assert_eq!(generation.join().unwrap().unwrap().status, PrdStatus::Draft);
    }

    #[test]
    fn set_active_checks_project_and_status() {
        let c = controller(always_ok(1));
        let draft = drafted(&c, "proj", "feat", 1);
        assert!(matches!(
            c.set_active_prd("elsewhere", &draft.id),
            Err(ForgeError::PrdNotInProject { .. })
        ));
        let err = c.set_active_prd("proj", &draft.id).unwrap_err();
        assert!(err.to_string().contains("PRD must be in ready status"));
        assert!(matches!(
            c.set_active_prd("proj", "missing"),
            Err(ForgeError::PrdNotFound(_))
        ));
    }

    #[test]
    fn clear_without_active_is_noop() {
        let c = controller(always_ok(0));
        assert!(c.clear_active_prd("proj").unwrap().is_none());
        assert!(matches!(c.get_active("proj"), Err(ForgeError::NoActivePrd)));
    }

    #[test]
    fn clear_reverts_to_ready_and_keeps_start_time() {
        let c = controller(always_ok(1));
        let prd = ready(&c, "proj", "feat", 1);
        let started = c.start_implementation(&prd.id).unwrap().started_at;
        let cleared = c.clear_active_prd("proj").unwrap().unwrap();
        assert_eq!(cleared.status, PrdStatus::Ready);
        assert_eq!(cleared.started_at, started);
    }

    #[test]
    fn next_prd_picks_lowest_priority_number() {
        let c = controller(always_ok(3));
        assert!(matches!(c.next_prd("proj"), Err(ForgeError::NoReadyPrd)));
        ready(&c, "proj", "c", 3);
        let first = ready(&c, "proj", "a", 1);
        drafted(&c, "proj", "z", 0);
        assert_eq!(c.next_prd("proj").unwrap().id, first.id);
    }

    #[test]
    fn draft_editing() {
        let c = controller(always_ok(1));
        let prd = drafted(&c, "proj", "feat", 1);

        let added = c.add_user_story(&prd.id, UserStory::default()).unwrap();
        assert_eq!(added.id, "US-002");
        let updated = c
            .update_user_story(
                &prd.id,
                "US-001",
                UserStory {
                    i_want: "print tickets".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.id, "US-001");
        c.delete_user_story(&prd.id, "US-002").unwrap();
        let prd = c
            .update_content(
                &prd.id,
                PrdContentUpdate {
                    overview: Some("Edited.".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(prd.overview, "Edited.");
        assert_eq!(prd.user_stories.len(), 1);
        assert_eq!(prd.user_stories[0].i_want, "print tickets");

        c.mark_ready(&prd.id).unwrap();
        let err = c
            .add_user_story(&prd.id, UserStory::default())
            .unwrap_err();
        assert!(err.to_string().contains("can only edit draft PRDs"));
        assert!(matches!(
            c.delete_user_story(&prd.id, "US-009"),
            Err(ForgeError::InvalidStatusChange { .. })
        ));
    }

    #[test]
    fn request_carries_discovery_context() {
        let generator = always_ok(1);
        let controllers = Controllers::new(
            Arc::new(MemoryStore::new()),
            generator.clone(),
            PrdPolicy::default(),
        );
        let d = controllers.discovery.get_or_create("proj").unwrap();
        controllers
            .discovery
            .update_data(
                &d.id,
                &crate::discovery::DiscoveryUpdate {
                    project_name: Some("OrderBook".into()),
                    problem_statement: Some("orders get lost".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        controllers
            .discovery
            .add_user(
                &d.id,
                NewUser {
                    description: "Bakers".into(),
                    user_count: 3,
                    ..Default::default()
                },
            )
            .unwrap();
        for (name, priority) in [("Orders", 1), ("Stock", 2)] {
            controllers
                .discovery
                .add_feature(
                    &d.id,
                    NewFeature {
                        name: name.into(),
                        priority,
                        version: None,
                    },
                )
                .unwrap();
        }
        while controllers.discovery.get(&d.id).unwrap().stage != Stage::Summary {
            controllers.discovery.advance_stage(&d.id).unwrap();
        }
        let confirmation = controllers.discovery.confirm(&d.id).unwrap();
        let orders = &confirmation.seeded[0];

        controllers.prds.generate(&orders.id).unwrap();
        let request = generator.prompts.lock().unwrap()[0].clone();
        assert_eq!(request.feature_name, "Orders");
        assert_eq!(request.project_name, "OrderBook");
        assert_eq!(request.problem_statement, "orders get lost");
        assert_eq!(request.users[0].description, "Bakers");
        let related: Vec<_> = request
            .related_features
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(related, ["Stock"]);
    }

    #[test]
    fn confirmation_seeds_one_pending_prd_per_mvp_feature() {
        let controllers = Controllers::new(
            Arc::new(MemoryStore::new()),
            always_ok(0),
            PrdPolicy::default(),
        );
        let discovery = &controllers.discovery;
        let d = discovery.get_or_create("proj").unwrap();
        for description in ["Bakers", "Couriers"] {
            discovery
                .add_user(
                    &d.id,
                    NewUser {
                        description: description.into(),
                        ..Default::default()
                    },
                )
                .unwrap();
        }
        for (name, version) in [("Orders", "v1"), ("Stock", "v1"), ("Loyalty", "v2")] {
            discovery
                .add_feature(
                    &d.id,
                    NewFeature {
                        name: name.into(),
                        priority: 1,
                        version: Some(version.into()),
                    },
                )
                .unwrap();
        }
        for _ in 0..4 {
            discovery.advance_stage(&d.id).unwrap();
        }
        let confirmation = discovery.confirm(&d.id).unwrap();

        assert_eq!(confirmation.summary.users.len(), 2);
        assert_eq!(confirmation.summary.mvp_features.len(), 2);
        assert_eq!(confirmation.summary.future_features.len(), 1);
        let prds = controllers.prds.list("proj").unwrap();
        assert_eq!(prds.len(), 2);
        assert!(prds.iter().all(|p| p.status == PrdStatus::Pending && p.is_mvp()));

        // seeding again creates nothing new
        let again = controllers
            .prds
            .seed_from_summary(&confirmation.discovery, &confirmation.summary)
            .unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn generate_pending_skips_exhausted_prds() {
        let c = PrdController::new(
            Arc::new(MemoryStore::new()),
            Scripted::with(vec![
                Err(GenerationError::Failed("down".into())),
                Ok(DRAFT_JSON.into()),
            ]),
            PrdPolicy {
                max_generation_attempts: 1,
                generation_timeout: Duration::from_secs(5),
            },
        );
        let exhausted = c.create(new_prd("proj", "a", 1)).unwrap();
        c.generate(&exhausted.id).unwrap();
        let fresh = c.create(new_prd("proj", "b", 2)).unwrap();

        let results = c.generate_pending("proj").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, fresh.id);
        assert_eq!(results[0].status, PrdStatus::Draft);
    }
}
