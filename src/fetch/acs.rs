// src/fetch/acs.rs
use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{PipelineConfig, RetryConfig};
use crate::error::PipelineError;
use crate::schema::estimate_column;

/// One geographic batch: every tract of one county for one data year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcsBatch {
    pub year: i32,
    pub state: String,
    pub county: String,
}

impl std::fmt::Display for AcsBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}{}", self.year, self.state, self.county)
    }
}

/// A tract row as returned by the API, estimates still in their raw text form.
#[derive(Debug, Clone, PartialEq)]
pub struct AcsRow {
    pub geo_id: String,
    pub name: String,
    /// Estimate column → cell. `None` when the API sent `null`.
    pub estimates: BTreeMap<String, Option<String>>,
}

/// Client for the ACS 5-year detailed tables endpoint.
pub struct AcsClient {
    client: Client,
    api_base: String,
    key: String,
    topics: Vec<String>,
    retry: RetryConfig,
}

impl AcsClient {
    pub fn new(client: Client, config: &PipelineConfig, key: String) -> Self {
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            key,
            topics: config.topics.clone(),
            retry: config.retry.clone(),
        }
    }

    pub fn estimate_columns(&self) -> Vec<String> {
        self.topics.iter().map(|t| estimate_column(t)).collect()
    }

    /// `{base}/{year}/acs/acs5?get=NAME,GEO_ID,...&for=tract:*&in=state:XX county:YYY&key=...`
    pub fn batch_url(&self, batch: &AcsBatch) -> Result<Url> {
        let mut get = vec!["NAME".to_string(), "GEO_ID".to_string()];
        get.extend(self.estimate_columns());
        let base = format!("{}/{}/acs/acs5", self.api_base, batch.year);
        let in_clause = format!("state:{} county:{}", batch.state, batch.county);
        Url::parse_with_params(
            &base,
            &[
                ("get", get.join(",").as_str()),
                ("for", "tract:*"),
                ("in", in_clause.as_str()),
                ("key", self.key.as_str()),
            ],
        )
        .with_context(|| format!("building API URL from {}", base))
    }

    /// Fetch one batch, retrying transient failures with exponential backoff.
    /// Once the attempts run out the batch fails with `SourceUnavailable`.
    #[tracing::instrument(level = "info", skip(self, batch), fields(batch = %batch))]
    pub async fn fetch_batch(&self, batch: &AcsBatch) -> Result<Vec<AcsRow>> {
        let url = self.batch_url(batch)?;
        let columns = self.estimate_columns();
        let unavailable = |attempts: usize, reason: String| PipelineError::SourceUnavailable {
            batch: batch.to_string(),
            attempts,
            reason,
        };

        let mut attempt = 0;
        let body = loop {
            attempt += 1;

            let reason = match self.client.get(url.clone()).send().await {
                Ok(resp) if resp.status().is_success() => match resp.text().await {
                    Ok(body) => break body,
                    Err(e) => format!("reading body: {}", e),
                },
                Ok(resp) if is_transient(resp.status()) => format!("HTTP {}", resp.status()),
                Ok(resp) => {
                    return Err(unavailable(attempt, format!("HTTP {}", resp.status())).into());
                }
                Err(e) => e.to_string(),
            };

            if attempt >= self.retry.attempts {
                return Err(unavailable(attempt, reason).into());
            }
            let delay = self.retry.delay_for(attempt);
            warn!(attempt, ?delay, %reason, "request failed; retrying");
            sleep(delay).await;
        };

        let rows = parse_response(&body, &columns)
            .map_err(|e| unavailable(attempt, format!("{:#} (check {})", e, crate::config::API_KEY_VAR)))?;
        info!(rows = rows.len(), attempts = attempt, "fetched batch");
        Ok(rows)
    }
}

fn cell_text(v: Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn is_transient(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Parse the API's array-of-arrays body: the first row names the columns,
/// every following row is one tract. An empty body means no tracts.
pub fn parse_response(body: &str, estimate_columns: &[String]) -> Result<Vec<AcsRow>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let table: Vec<Vec<Value>> =
        serde_json::from_str(body).context("API response is not a JSON table")?;
    let mut iter = table
        .into_iter()
        .map(|row| row.into_iter().map(cell_text).collect::<Vec<_>>());
    let Some(header) = iter.next() else {
        return Ok(Vec::new());
    };
    let header: Vec<String> = header.into_iter().map(Option::unwrap_or_default).collect();
    let index_of = |name: &str| {
        header
            .iter()
            .position(|h| h == name)
            .with_context(|| format!("API response has no {} column", name))
    };

    let geo_idx = index_of("GEO_ID")?;
    let name_idx = index_of("NAME")?;
    let estimate_idx = estimate_columns
        .iter()
        .map(|c| index_of(c).map(|i| (c.clone(), i)))
        .collect::<Result<Vec<_>>>()?;

    let mut rows = Vec::new();
    for (n, cells) in iter.enumerate() {
        let cell = |i: usize| cells.get(i).cloned().flatten();
        let Some(geo_id) = cell(geo_idx) else {
            debug!(row = n, "API row without GEO_ID skipped");
            continue;
        };
        rows.push(AcsRow {
            geo_id,
            name: cell(name_idx).unwrap_or_default(),
            estimates: estimate_idx
                .iter()
                .map(|(col, i)| (col.clone(), cell(*i)))
                .collect(),
        });
    }
    Ok(rows)
}
