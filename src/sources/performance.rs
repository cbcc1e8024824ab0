//! PageSpeed Insights adapter.

use async_trait::async_trait;
use log::warn;
use reqwest::Client;
use serde_json::Value;

use super::snapshot::{CoreWebVitals, PerformanceSnapshot, Strategy};
use super::{PerformanceSource, SourceError};
use crate::config::MetricsConfig;

pub const NO_URL_MESSAGE: &str = "No URL provided";
pub const FETCH_FAILED_MESSAGE: &str = "Failed to fetch performance data";
pub const INVALID_RESPONSE_MESSAGE: &str = "Invalid response from PageSpeed API";

/// HTTP client for the `runPagespeed` endpoint. No API key is required.
pub struct PageSpeedClient {
    http: Client,
    api_url: String,
}

impl PageSpeedClient {
    pub fn new(config: &MetricsConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(config.performance_timeout)
            .build()?;
        Ok(Self {
            http,
            api_url: config.pagespeed_url.clone(),
        })
    }

    async fn request(&self, url: &str, strategy: Strategy) -> Result<Value, SourceError> {
        let response = self
            .http
            .get(&self.api_url)
            .query(&[
                ("url", url),
                ("strategy", strategy.as_str()),
                ("category", "performance"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| SourceError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl PerformanceSource for PageSpeedClient {
    async fn fetch(&self, url: &str, strategy: Strategy) -> PerformanceSnapshot {
        let url = url.trim();
        if url.is_empty() {
            return PerformanceSnapshot::unavailable(NO_URL_MESSAGE);
        }

        let result = self
            .request(url, strategy)
            .await
            .and_then(|body| normalize_report(&body, strategy));

        match result {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Performance fetch for {} failed: {}", url, e);
                let message = match e {
                    SourceError::Malformed(_) => INVALID_RESPONSE_MESSAGE,
                    SourceError::Transport(_) | SourceError::Status(_) => FETCH_FAILED_MESSAGE,
                };
                PerformanceSnapshot::unavailable(message)
            }
        }
    }
}

/// Convert a PageSpeed response body into a snapshot.
pub(crate) fn normalize_report(
    body: &Value,
    strategy: Strategy,
) -> Result<PerformanceSnapshot, SourceError> {
    let lighthouse = body
        .get("lighthouseResult")
        .filter(|v| v.is_object())
        .ok_or_else(|| SourceError::Malformed("missing lighthouseResult".to_string()))?;

    let raw_score = lighthouse
        .pointer("/categories/performance/score")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    let score = (raw_score * 100.0).round().clamp(0.0, 100.0) as u8;

    let audits = lighthouse.get("audits").unwrap_or(&Value::Null);
    let metrics = CoreWebVitals {
        fcp: extract_metric(audits, "first-contentful-paint", false),
        lcp: extract_metric(audits, "largest-contentful-paint", false),
        cls: extract_metric(audits, "cumulative-layout-shift", true),
        tbt: extract_metric(audits, "total-blocking-time", false),
        si: extract_metric(audits, "speed-index", false),
    };

    Ok(PerformanceSnapshot {
        score,
        metrics,
        strategy,
        available: true,
        message: None,
    })
}

/// Time metrics above 100 are milliseconds and become seconds (2 decimals);
/// everything else keeps 3 decimals. Missing audits read as 0.
pub fn extract_metric(audits: &Value, key: &str, is_decimal: bool) -> f64 {
    let value = match audits
        .get(key)
        .and_then(|audit| audit.get("numericValue"))
        .and_then(Value::as_f64)
    {
        Some(v) => v,
        None => return 0.0,
    };

    if !is_decimal && value > 100.0 {
        round_to(value / 1000.0, 2)
    } else {
        round_to(value, 3)
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
