//! HTTP client for the hardware queue gateway.

use std::time::Duration;

use async_trait::async_trait;
use fairq_id::{JobId, QueueId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    CancelOutcome, HaltOutcome, JobRef, Program, QueueError, QueueService, RemoteStatus,
    WaitOutcome,
};

/// Baseline timeout for plain requests; waits get their own margin.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Extra slack granted to a long-poll wait on top of the caller's bound.
const WAIT_MARGIN: Duration = Duration::from_secs(2);

/// Queue service client against the gateway's REST surface.
pub struct HttpQueueService {
    client: reqwest::Client,
    base_url: String,
    queue_id: QueueId,
}

impl HttpQueueService {
    pub fn new(base_url: &str, queue_id: QueueId) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            queue_id,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
        job: Option<&JobRef>,
    ) -> Result<T, QueueError> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            if let Some(job) = job {
                return Err(QueueError::NotFound(job.id.clone()));
            }
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueueError::Rejected(format!("{status} - {body}")));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| QueueError::Malformed(e.to_string()))
    }
}

fn transport_error(e: reqwest::Error) -> QueueError {
    if e.is_connect() || e.is_timeout() {
        QueueError::Unavailable(e.to_string())
    } else {
        QueueError::Rejected(e.to_string())
    }
}

#[derive(Debug, Serialize)]
struct EnqueueRequest<'a> {
    name: &'a str,
    program: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct EnqueueResponse {
    job_id: JobId,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: RemoteStatus,
}

#[derive(Debug, Deserialize)]
struct PositionResponse {
    position: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OutcomeResponse {
    outcome: String,
}

#[derive(Debug, Serialize)]
struct WaitRequest {
    timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
struct PendingResponse {
    jobs: Vec<JobId>,
}

#[derive(Debug, Deserialize)]
struct RunningResponse {
    job: Option<JobId>,
}

#[async_trait]
impl QueueService for HttpQueueService {
    fn queue_id(&self) -> &QueueId {
        &self.queue_id
    }

    async fn enqueue(&self, program: &Program) -> Result<JobRef, QueueError> {
        let url = self.url(&format!("/v1/queues/{}/jobs", self.queue_id));
        debug!(url = %url, name = %program.name, "enqueueing job");

        let response = self
            .client
            .post(&url)
            .json(&EnqueueRequest {
                name: &program.name,
                program: &program.body,
            })
            .send()
            .await
            .map_err(transport_error)?;

        let body: EnqueueResponse = self.decode(response, None).await?;
        Ok(JobRef {
            id: body.job_id,
            queue_id: self.queue_id.clone(),
        })
    }

    async fn job_status(&self, job: &JobRef) -> Result<RemoteStatus, QueueError> {
        let url = self.url(&format!("/v1/jobs/{}", job.id));
        let response = self.client.get(&url).send().await.map_err(transport_error)?;
        let body: StatusResponse = self.decode(response, Some(job)).await?;
        Ok(body.status)
    }

    async fn position_in_queue(&self, job: &JobRef) -> Result<Option<u32>, QueueError> {
        let url = self.url(&format!("/v1/jobs/{}/position", job.id));
        let response = self.client.get(&url).send().await.map_err(transport_error)?;
        let body: PositionResponse = self.decode(response, Some(job)).await?;
        Ok(body.position)
    }

    async fn cancel(&self, job: &JobRef) -> Result<CancelOutcome, QueueError> {
        let url = self.url(&format!("/v1/jobs/{}/cancel", job.id));
        let response = self.client.post(&url).send().await.map_err(transport_error)?;
        let body: OutcomeResponse = self.decode(response, Some(job)).await?;
        match body.outcome.as_str() {
            "canceled" => Ok(CancelOutcome::Canceled),
            "noop" => Ok(CancelOutcome::AlreadySettled),
            other => Err(QueueError::Malformed(format!(
                "unknown cancel outcome {other:?}"
            ))),
        }
    }

    async fn halt(&self, job: &JobRef) -> Result<HaltOutcome, QueueError> {
        let url = self.url(&format!("/v1/jobs/{}/halt", job.id));
        let response = self.client.post(&url).send().await.map_err(transport_error)?;
        let body: OutcomeResponse = self.decode(response, Some(job)).await?;
        match body.outcome.as_str() {
            "halted" => Ok(HaltOutcome::Halted),
            "noop" => Ok(HaltOutcome::AlreadySettled),
            other => Err(QueueError::Malformed(format!(
                "unknown halt outcome {other:?}"
            ))),
        }
    }

    async fn wait_for_execution(
        &self,
        job: &JobRef,
        timeout: Duration,
    ) -> Result<WaitOutcome, QueueError> {
        let url = self.url(&format!("/v1/jobs/{}/wait", job.id));
        let response = self
            .client
            .post(&url)
            .json(&WaitRequest {
                timeout_ms: timeout.as_millis() as u64,
            })
            .timeout(timeout + WAIT_MARGIN)
            .send()
            .await
            .map_err(transport_error)?;

        let body: OutcomeResponse = self.decode(response, Some(job)).await?;
        match body.outcome.as_str() {
            "running" => Ok(WaitOutcome::Running),
            "timeout" => Ok(WaitOutcome::TimedOut),
            "gone" => Ok(WaitOutcome::Gone),
            other => Err(QueueError::Malformed(format!(
                "unknown wait outcome {other:?}"
            ))),
        }
    }

    async fn list_pending_jobs(&self) -> Result<Vec<JobRef>, QueueError> {
        let url = self.url(&format!("/v1/queues/{}/pending", self.queue_id));
        let response = self.client.get(&url).send().await.map_err(transport_error)?;
        let body: PendingResponse = self.decode(response, None).await?;
        Ok(body
            .jobs
            .into_iter()
            .map(|id| JobRef {
                id,
                queue_id: self.queue_id.clone(),
            })
            .collect())
    }

    async fn get_running_job(&self) -> Result<Option<JobRef>, QueueError> {
        let url = self.url(&format!("/v1/queues/{}/running", self.queue_id));
        let response = self.client.get(&url).send().await.map_err(transport_error)?;
        let body: RunningResponse = self.decode(response, None).await?;
        Ok(body.job.map(|id| JobRef {
            id,
            queue_id: self.queue_id.clone(),
        }))
    }
}
