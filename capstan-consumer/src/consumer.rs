//! The consumer side of the lease protocol: poll the gateway for leased
//! jobs, execute them, and report each outcome. The consumer holds no queue
//! state; if it crashes mid-job the lease simply expires and the job is
//! reclaimed by a later tick.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::ConsumerError;

/// A leased job as handed out by the gateway's dequeue endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct JobRef {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub target: String,
}

#[derive(Debug, Deserialize)]
struct DequeueResponse {
    job: Option<JobRef>,
}

pub fn build_http_client(request_timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent("capstan-consumer")
        .timeout(request_timeout)
        .build()
}

pub struct Consumer {
    client: Client,
    gateway_url: String,
    token: String,
    jobs_per_tick: usize,
    poll_interval: Duration,
}

impl Consumer {
    pub fn new(config: &AppConfig) -> Self {
        let client = build_http_client(config.request_timeout)
            .expect("failed to construct reqwest client for the consumer");

        Self {
            client,
            gateway_url: config.gateway_url.clone(),
            token: config.token.clone(),
            jobs_per_tick: config.jobs_per_tick,
            poll_interval: config.poll_interval,
        }
    }

    /// Run this consumer to continuously drain jobs as they become available.
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.poll_interval);

        loop {
            interval.tick().await;
            match self.tick().await {
                Ok(0) => {}
                Ok(processed) => info!("processed {} jobs", processed),
                Err(err) => error!("tick failed, will retry on the next poll: {}", err),
            }
        }
    }

    /// One poll: lease up to `jobs_per_tick` jobs, stopping early when the
    /// queue runs dry, and report every outcome back to the gateway.
    pub async fn tick(&self) -> Result<usize, ConsumerError> {
        let mut processed = 0;

        for _ in 0..self.jobs_per_tick {
            let Some(job) = self.dequeue().await? else {
                break;
            };

            match self.execute(&job).await {
                Ok(result) => {
                    self.complete(&job.id, result).await?;
                    metrics::counter!("consumer_jobs_completed").increment(1);
                }
                Err(err) => {
                    warn!("job {} failed: {}", job.id, err);
                    self.fail(&job.id, &err.to_string()).await?;
                    metrics::counter!("consumer_jobs_failed").increment(1);
                }
            }
            processed += 1;
        }

        Ok(processed)
    }

    async fn execute(&self, job: &JobRef) -> Result<Value, ConsumerError> {
        match job.kind.as_str() {
            "crawl" => self.crawl(&job.target).await,
            // `rank` is declared but has no execution path; failing it spends
            // the retry budget instead of leaving the lease to cycle forever.
            other => Err(ConsumerError::UnsupportedKind(other.to_owned())),
        }
    }

    async fn crawl(&self, target: &str) -> Result<Value, ConsumerError> {
        let response = self.client.get(target).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(ConsumerError::CrawlStatus {
                status: status.as_u16(),
            });
        }

        Ok(json!({"status": status.as_u16(), "bodyBytes": body.len()}))
    }

    async fn dequeue(&self) -> Result<Option<JobRef>, ConsumerError> {
        let response = self
            .client
            .post(format!("{}/v1/jobs/dequeue", self.gateway_url))
            .bearer_auth(&self.token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ConsumerError::Gateway {
                status: response.status().as_u16(),
            });
        }

        let body: DequeueResponse = response.json().await?;
        Ok(body.job)
    }

    async fn complete(&self, id: &str, result: Value) -> Result<(), ConsumerError> {
        self.report("complete", &json!({"id": id, "result": result}))
            .await
    }

    async fn fail(&self, id: &str, message: &str) -> Result<(), ConsumerError> {
        self.report("fail", &json!({"id": id, "error": message}))
            .await
    }

    async fn report(&self, operation: &str, body: &Value) -> Result<(), ConsumerError> {
        let response = self
            .client
            .post(format!("{}/v1/jobs/{}", self.gateway_url, operation))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ConsumerError::Gateway {
                status: response.status().as_u16(),
            });
        }

        Ok(())
    }
}
