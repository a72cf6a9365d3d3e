//! In-memory queue service simulator.
//!
//! Used by the test suites and by `--mock` dev runs. State transitions
//! happen only through explicit scenario controls, so tests decide
//! exactly when a job is accepted, promoted, or finished.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use fairq_id::{JobId, QueueId};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{
    CancelOutcome, HaltOutcome, JobRef, Program, QueueError, QueueService, RemoteStatus,
    WaitOutcome,
};

/// Granularity of the simulated wait-for-execution poll.
const WAIT_POLL: Duration = Duration::from_millis(10);

#[derive(Default)]
struct MockState {
    pending: Vec<JobId>,
    running: Option<JobId>,
    settled: HashSet<JobId>,
    loading: HashMap<JobId, u32>,
    unreachable: bool,
    halt_calls: Vec<JobId>,
    cancel_calls: Vec<JobId>,
}

/// Simulated hardware queue.
pub struct MockQueueService {
    queue_id: QueueId,
    loading_polls: u32,
    state: Mutex<MockState>,
}

impl MockQueueService {
    pub fn new(queue_id: QueueId) -> Self {
        Self {
            queue_id,
            loading_polls: 0,
            state: Mutex::new(MockState::default()),
        }
    }

    /// Newly enqueued jobs report `loading` for this many status polls
    /// before they are accepted into the pending list.
    pub fn with_loading_polls(mut self, polls: u32) -> Self {
        self.loading_polls = polls;
        self
    }

    fn job_ref(&self, id: JobId) -> JobRef {
        JobRef {
            id,
            queue_id: self.queue_id.clone(),
        }
    }

    async fn guard(&self) -> Result<MutexGuard<'_, MockState>, QueueError> {
        let state = self.state.lock().await;
        if state.unreachable {
            return Err(QueueError::Unavailable(
                "mock queue is unreachable".to_string(),
            ));
        }
        Ok(state)
    }

    // ---- scenario controls -------------------------------------------

    /// Makes every subsequent call fail with [`QueueError::Unavailable`].
    pub async fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().await.unreachable = unreachable;
    }

    /// Places an externally-submitted job at the back of the pending list.
    pub async fn seed_pending(&self, id: &str) -> JobRef {
        let id = JobId::parse(id).expect("seeded job id must be wire-safe");
        self.state.lock().await.pending.push(id.clone());
        self.job_ref(id)
    }

    /// Installs an externally-submitted job as the running one.
    pub async fn seed_running(&self, id: &str) -> JobRef {
        let id = JobId::parse(id).expect("seeded job id must be wire-safe");
        self.state.lock().await.running = Some(id.clone());
        self.job_ref(id)
    }

    /// Promotes the front pending job to running.
    pub async fn promote_next(&self) -> Option<JobRef> {
        let mut state = self.state.lock().await;
        if state.pending.is_empty() {
            return None;
        }
        let id = state.pending.remove(0);
        state.running = Some(id.clone());
        Some(self.job_ref(id))
    }

    /// Completes the running job naturally.
    pub async fn finish_running(&self) -> Option<JobRef> {
        let mut state = self.state.lock().await;
        let id = state.running.take()?;
        state.settled.insert(id.clone());
        Some(self.job_ref(id))
    }

    /// Every halt call observed so far, in order.
    pub async fn halt_calls(&self) -> Vec<JobId> {
        self.state.lock().await.halt_calls.clone()
    }

    /// Every cancel call observed so far, in order.
    pub async fn cancel_calls(&self) -> Vec<JobId> {
        self.state.lock().await.cancel_calls.clone()
    }
}

#[async_trait]
impl QueueService for MockQueueService {
    fn queue_id(&self) -> &QueueId {
        &self.queue_id
    }

    async fn enqueue(&self, _program: &Program) -> Result<JobRef, QueueError> {
        let mut state = self.guard().await?;
        let id = JobId::parse(&format!("job-{}", Uuid::new_v4().simple()))
            .map_err(|e| QueueError::Malformed(e.to_string()))?;
        if self.loading_polls > 0 {
            state.loading.insert(id.clone(), self.loading_polls);
        } else {
            state.pending.push(id.clone());
        }
        Ok(self.job_ref(id))
    }

    async fn job_status(&self, job: &JobRef) -> Result<RemoteStatus, QueueError> {
        let mut state = self.guard().await?;
        if let Some(remaining) = state.loading.get_mut(&job.id) {
            *remaining -= 1;
            if *remaining == 0 {
                state.loading.remove(&job.id);
                state.pending.push(job.id.clone());
                return Ok(RemoteStatus::Pending);
            }
            return Ok(RemoteStatus::Loading);
        }
        if state.pending.contains(&job.id) {
            return Ok(RemoteStatus::Pending);
        }
        if state.running.as_ref() == Some(&job.id) {
            return Ok(RemoteStatus::Running);
        }
        if state.settled.contains(&job.id) {
            return Ok(RemoteStatus::Done);
        }
        Err(QueueError::NotFound(job.id.clone()))
    }

    async fn position_in_queue(&self, job: &JobRef) -> Result<Option<u32>, QueueError> {
        let state = self.guard().await?;
        Ok(state
            .pending
            .iter()
            .position(|id| id == &job.id)
            .map(|index| index as u32))
    }

    async fn cancel(&self, job: &JobRef) -> Result<CancelOutcome, QueueError> {
        let mut state = self.guard().await?;
        state.cancel_calls.push(job.id.clone());
        if let Some(index) = state.pending.iter().position(|id| id == &job.id) {
            state.pending.remove(index);
            state.settled.insert(job.id.clone());
            Ok(CancelOutcome::Canceled)
        } else {
            Ok(CancelOutcome::AlreadySettled)
        }
    }

    async fn halt(&self, job: &JobRef) -> Result<HaltOutcome, QueueError> {
        let mut state = self.guard().await?;
        state.halt_calls.push(job.id.clone());
        if state.running.as_ref() == Some(&job.id) {
            state.running = None;
            state.settled.insert(job.id.clone());
            Ok(HaltOutcome::Halted)
        } else {
            Ok(HaltOutcome::AlreadySettled)
        }
    }

    async fn wait_for_execution(
        &self,
        job: &JobRef,
        timeout: Duration,
    ) -> Result<WaitOutcome, QueueError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let state = self.guard().await?;
                if state.running.as_ref() == Some(&job.id) {
                    return Ok(WaitOutcome::Running);
                }
                if state.settled.contains(&job.id) {
                    return Ok(WaitOutcome::Gone);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(WaitOutcome::TimedOut);
            }
            tokio::time::sleep(WAIT_POLL).await;
        }
    }

    async fn list_pending_jobs(&self) -> Result<Vec<JobRef>, QueueError> {
        let state = self.guard().await?;
        Ok(state
            .pending
            .iter()
            .cloned()
            .map(|id| self.job_ref(id))
            .collect())
    }

    async fn get_running_job(&self) -> Result<Option<JobRef>, QueueError> {
        let state = self.guard().await?;
        Ok(state.running.clone().map(|id| self.job_ref(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock() -> MockQueueService {
        MockQueueService::new(QueueId::parse("qm-1").unwrap())
    }

    #[tokio::test]
    async fn enqueue_lands_in_pending_order() {
        let queue = mock();
        let first = queue.enqueue(&Program::new("a", serde_json::json!({}))).await.unwrap();
        let second = queue.enqueue(&Program::new("b", serde_json::json!({}))).await.unwrap();

        let pending = queue.list_pending_jobs().await.unwrap();
        assert_eq!(pending, vec![first.clone(), second.clone()]);
        assert_eq!(
            queue.position_in_queue(&second).await.unwrap(),
            Some(1)
        );
    }

    #[tokio::test]
    async fn loading_countdown_then_pending() {
        let queue = mock().with_loading_polls(2);
        let job = queue.enqueue(&Program::new("a", serde_json::json!({}))).await.unwrap();

        assert_eq!(queue.job_status(&job).await.unwrap(), RemoteStatus::Loading);
        assert_eq!(queue.job_status(&job).await.unwrap(), RemoteStatus::Pending);
        assert_eq!(queue.list_pending_jobs().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cancel_is_idempotent_via_outcome() {
        let queue = mock();
        let job = queue.enqueue(&Program::new("a", serde_json::json!({}))).await.unwrap();

        assert_eq!(queue.cancel(&job).await.unwrap(), CancelOutcome::Canceled);
        assert_eq!(
            queue.cancel(&job).await.unwrap(),
            CancelOutcome::AlreadySettled
        );
        assert_eq!(queue.job_status(&job).await.unwrap(), RemoteStatus::Done);
    }

    #[tokio::test]
    async fn halt_only_applies_to_the_running_job() {
        let queue = mock();
        let job = queue.seed_running("r1").await;
        let other = queue.seed_pending("p1").await;

        assert_eq!(queue.halt(&other).await.unwrap(), HaltOutcome::AlreadySettled);
        assert_eq!(queue.halt(&job).await.unwrap(), HaltOutcome::Halted);
        assert!(queue.get_running_job().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn wait_times_out_then_sees_promotion() {
        let queue = mock();
        let job = queue.seed_pending("p1").await;

        let outcome = queue
            .wait_for_execution(&job, Duration::from_millis(30))
            .await
            .unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut);

        queue.promote_next().await;
        let outcome = queue
            .wait_for_execution(&job, Duration::from_millis(30))
            .await
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Running);
    }

    #[tokio::test]
    async fn unreachable_surfaces_everywhere() {
        let queue = mock();
        queue.set_unreachable(true).await;

        let err = queue.list_pending_jobs().await.unwrap_err();
        assert!(matches!(err, QueueError::Unavailable(_)));
    }
}
