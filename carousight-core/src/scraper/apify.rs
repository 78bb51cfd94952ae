//! Apify actor client.
//!
//! One fetch is three HTTP calls: start the platform's actor run, wait for
//! it to reach a terminal status, then read the run's default dataset.

use super::normalize::normalize_item;
use super::{PostSource, ScrapedPost};
use crate::config::ScraperConfig;
use crate::types::Platform;
use crate::{Error, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

pub const TIKTOK_ACTOR: &str = "clockworks~tiktok-scraper";
pub const INSTAGRAM_ACTOR: &str = "apify~instagram-scraper";

/// Seconds the provider may hold each status request open
const WAIT_FOR_FINISH_SECS: u64 = 60;

/// Actor id for a platform
pub fn actor_for(platform: Platform) -> &'static str {
    match platform {
        Platform::TikTok => TIKTOK_ACTOR,
        Platform::Instagram => INSTAGRAM_ACTOR,
    }
}

/// Actor input for one profile
pub fn actor_input(platform: Platform, username: &str, limit: usize) -> Value {
    match platform {
        Platform::TikTok => json!({
            "profiles": [username],
            "resultsPerPage": limit,
            "shouldDownloadVideos": false,
        }),
        Platform::Instagram => json!({
            "usernames": [username],
            "resultsLimit": limit,
        }),
    }
}

#[derive(Debug, Deserialize)]
struct RunEnvelope {
    data: ActorRun,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActorRun {
    id: String,
    status: String,
    default_dataset_id: Option<String>,
}

impl ActorRun {
    fn is_terminal(&self) -> bool {
        matches!(
            self.status.as_str(),
            "SUCCEEDED" | "FAILED" | "TIMED-OUT" | "ABORTED"
        )
    }
}

/// Blocking client for the Apify v2 API
pub struct ApifyClient {
    base_url: String,
    run_timeout: Duration,
    runtime: tokio::runtime::Runtime,
    http: reqwest::Client,
}

impl ApifyClient {
    /// Build a client. Fails when no API token is configured or in
    /// `APIFY_API_TOKEN`.
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let token = config
            .api_token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var("APIFY_API_TOKEN").ok().filter(|t| !t.is_empty()))
            .ok_or_else(|| {
                Error::Config(
                    "scraper.api_token (or APIFY_API_TOKEN) is required".to_string(),
                )
            })?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| Error::Config(format!("invalid apify token: {e}")))?,
        );

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Scraper(format!("failed to build tokio runtime: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Scraper(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            run_timeout: Duration::from_secs(config.run_timeout_secs.max(1)),
            runtime,
            http,
        })
    }

    async fn get_json(&self, url: String, what: &str) -> Result<Value> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Scraper(format!("{what} request failed: {e}")))?;
        read_json(resp, what).await
    }

    async fn start_run(&self, platform: Platform, input: &Value) -> Result<ActorRun> {
        let url = format!(
            "{}/v2/acts/{}/runs?waitForFinish={}",
            self.base_url,
            urlencoding::encode(actor_for(platform)),
            WAIT_FOR_FINISH_SECS
        );
        let resp = self
            .http
            .post(url)
            .json(input)
            .send()
            .await
            .map_err(|e| Error::Scraper(format!("start run request failed: {e}")))?;
        let envelope: RunEnvelope = serde_json::from_value(read_json(resp, "start run").await?)?;
        Ok(envelope.data)
    }

    async fn wait_for_run(&self, mut run: ActorRun) -> Result<ActorRun> {
        let deadline = Instant::now() + self.run_timeout;
        while !run.is_terminal() {
            if Instant::now() >= deadline {
                return Err(Error::Scraper(format!(
                    "actor run {} still {} after {}s",
                    run.id,
                    run.status,
                    self.run_timeout.as_secs()
                )));
            }
            tracing::debug!(run_id = %run.id, status = %run.status, "Waiting for actor run");
            let url = format!(
                "{}/v2/actor-runs/{}?waitForFinish={}",
                self.base_url,
                urlencoding::encode(&run.id),
                WAIT_FOR_FINISH_SECS
            );
            let envelope: RunEnvelope =
                serde_json::from_value(self.get_json(url, "run status").await?)?;
            run = envelope.data;
        }
        Ok(run)
    }

    async fn fetch(&self, platform: Platform, username: &str, limit: usize) -> Result<Vec<Value>> {
        let input = actor_input(platform, username, limit);
        let run = self.start_run(platform, &input).await?;
        tracing::info!(
            platform = %platform,
            username,
            run_id = %run.id,
            "Started actor run"
        );

        let run = self.wait_for_run(run).await?;
        if run.status != "SUCCEEDED" {
            return Err(Error::Scraper(format!(
                "actor run {} ended with status {}",
                run.id, run.status
            )));
        }

        let dataset_id = run.default_dataset_id.ok_or_else(|| {
            Error::Scraper(format!("actor run {} has no default dataset", run.id))
        })?;
        let url = format!(
            "{}/v2/datasets/{}/items?clean=true&format=json",
            self.base_url,
            urlencoding::encode(&dataset_id)
        );
        match self.get_json(url, "dataset items").await? {
            Value::Array(items) => Ok(items),
            other => Err(Error::Scraper(format!(
                "dataset items response was not an array: {}",
                other
            ))),
        }
    }
}

impl PostSource for ApifyClient {
    fn fetch_posts(&self, platform: Platform, username: &str, limit: usize) -> Result<Vec<ScrapedPost>> {
        let items = self.runtime.block_on(self.fetch(platform, username, limit))?;
        let total = items.len();
        let posts: Vec<ScrapedPost> = items
            .iter()
            .filter_map(|item| normalize_item(platform, item))
            .take(limit)
            .collect();

        if posts.len() < total.min(limit) {
            tracing::warn!(
                platform = %platform,
                username,
                dropped = total.min(limit) - posts.len(),
                "Dropped dataset items without an id"
            );
        }
        Ok(posts)
    }
}

async fn read_json(resp: reqwest::Response, what: &str) -> Result<Value> {
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| Error::Scraper(format!("{what} read body failed: {e}")))?;
    if !status.is_success() {
        return Err(Error::Scraper(format!(
            "{what} returned {}: {}",
            status.as_u16(),
            body
        )));
    }
    Ok(serde_json::from_str(&body)?)
}
