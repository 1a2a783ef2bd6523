//! Job actions: the outbound health check and the market-data sweep.
//!
//! Actions perform their own bounded-timeout I/O (the shared HTTP client is
//! built with a 30-second timeout) and classify expected failures into
//! outcomes. Only transport-level faults surface as `Err`, which the
//! scheduler records as `Outcome::Error`.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::{debug, warn};
use vigil_scheduler::{Action, BoxError, OutcomeKind};

/// Pause between sweep page fetches, to stay polite to the target site.
const REQUEST_SPACING: Duration = Duration::from_secs(2);

/// GET against a health endpoint: 200 is success (with the body as
/// payload), any other status an expected failure.
pub struct HealthPing {
    client: reqwest::Client,
    url: String,
}

impl HealthPing {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl Action for HealthPing {
    async fn run(&self) -> Result<OutcomeKind, BoxError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();

        if status == StatusCode::OK {
            let body = response.text().await?;
            debug!(url = %self.url, "health check succeeded");
            Ok(OutcomeKind::Success {
                response: Some(body),
            })
        } else {
            Ok(OutcomeKind::Failure {
                reason: format!("FAILED: {}", status.as_u16()),
            })
        }
    }
}

/// Numeric metrics pulled out of a fetched quote page.
static METRIC_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("market_cap", "Market Cap"),
        ("current_price", "Current Price"),
        ("stock_pe", "Stock P/E"),
        ("dividend_yield", "Dividend Yield"),
        ("roce", "ROCE"),
    ]
    .into_iter()
    .map(|(key, label)| {
        let pattern = format!(
            r#"{label}[\s\S]{{0,400}}?class="number">\s*([0-9][0-9.,]*)"#
        );
        (key, Regex::new(&pattern).expect("static metric pattern"))
    })
    .collect()
});

/// Fetches one quote page per configured ticker and extracts key metrics.
///
/// Per-ticker failures (bad status, parse miss) are expected and counted;
/// the run is a `Failure` only when every target failed.
pub struct MarketSweep {
    client: reqwest::Client,
    base_url: String,
    tickers: Vec<String>,
}

impl MarketSweep {
    pub fn new(client: reqwest::Client, base_url: String, tickers: Vec<String>) -> Self {
        Self {
            client,
            base_url,
            tickers,
        }
    }

    async fn fetch_quote(&self, ticker: &str) -> Result<Value, String> {
        let url = format!("{}/company/{}/", self.base_url.trim_end_matches('/'), ticker);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(format!("status {}", status.as_u16()));
        }

        let html = response.text().await.map_err(|e| e.to_string())?;
        let mut quote = serde_json::Map::new();
        quote.insert("ticker".to_string(), Value::String(ticker.to_string()));
        for (key, pattern) in METRIC_PATTERNS.iter() {
            let value = pattern
                .captures(&html)
                .and_then(|c| c.get(1))
                .and_then(|m| parse_numeric(m.as_str()));
            if let Some(value) = value
                && let Some(number) = serde_json::Number::from_f64(value)
            {
                quote.insert((*key).to_string(), Value::Number(number));
            }
        }
        Ok(Value::Object(quote))
    }
}

#[async_trait]
impl Action for MarketSweep {
    async fn run(&self) -> Result<OutcomeKind, BoxError> {
        let mut quotes = Vec::new();
        let mut failed = 0usize;

        for (i, ticker) in self.tickers.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(REQUEST_SPACING).await;
            }
            match self.fetch_quote(ticker).await {
                Ok(quote) => quotes.push(quote),
                Err(reason) => {
                    warn!(ticker = %ticker, reason = %reason, "failed to fetch quote");
                    failed += 1;
                }
            }
        }

        if quotes.is_empty() && !self.tickers.is_empty() {
            return Ok(OutcomeKind::Failure {
                reason: format!("all {} sweep targets failed", self.tickers.len()),
            });
        }

        let payload = json!({
            "fetched": quotes.len(),
            "failed": failed,
            "quotes": quotes,
        });
        Ok(OutcomeKind::Success {
            response: Some(payload.to_string()),
        })
    }
}

/// Parse a display value like `"1,234.5"`, `"₹ 512"`, or `"0.52%"`.
fn parse_numeric(raw: &str) -> Option<f64> {
    raw.trim()
        .trim_start_matches('₹')
        .trim_end_matches('%')
        .replace(',', "")
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn health_ping_classifies_200_as_success_with_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let ping = HealthPing::new(client(), format!("{}/health", server.uri()));
        let kind = ping.run().await.unwrap();

        assert_eq!(
            kind,
            OutcomeKind::Success {
                response: Some("ok".to_string())
            }
        );
    }

    #[tokio::test]
    async fn health_ping_classifies_non_200_as_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let ping = HealthPing::new(client(), format!("{}/health", server.uri()));
        let kind = ping.run().await.unwrap();

        assert_eq!(
            kind,
            OutcomeKind::Failure {
                reason: "FAILED: 503".to_string()
            }
        );
    }

    #[tokio::test]
    async fn health_ping_surfaces_transport_faults_as_err() {
        // Nothing is listening on this port.
        let ping = HealthPing::new(client(), "http://127.0.0.1:9/health".to_string());
        assert!(ping.run().await.is_err());
    }

    #[tokio::test]
    async fn sweep_extracts_metrics_and_counts_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/company/GOODCO/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<li>Current Price <span class="number">1,234.5</span></li>
                   <li>Stock P/E <span class="number">22.4</span></li>"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/company/BADCO/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let sweep = MarketSweep::new(
            client(),
            server.uri(),
            vec!["GOODCO".to_string(), "BADCO".to_string()],
        );
        let kind = sweep.run().await.unwrap();

        let OutcomeKind::Success { response: Some(payload) } = kind else {
            panic!("expected success, got {kind:?}");
        };
        let summary: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(summary["fetched"], 1);
        assert_eq!(summary["failed"], 1);
        assert_eq!(summary["quotes"][0]["ticker"], "GOODCO");
        assert_eq!(summary["quotes"][0]["current_price"], 1234.5);
        assert_eq!(summary["quotes"][0]["stock_pe"], 22.4);
    }

    #[tokio::test]
    async fn sweep_with_all_targets_failing_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let sweep = MarketSweep::new(client(), server.uri(), vec!["ONLYCO".to_string()]);
        let kind = sweep.run().await.unwrap();

        assert_eq!(
            kind,
            OutcomeKind::Failure {
                reason: "all 1 sweep targets failed".to_string()
            }
        );
    }

    #[test_case("1,234.5", Some(1234.5))]
    #[test_case("₹ 512", Some(512.0))]
    #[test_case("0.52%", Some(0.52))]
    #[test_case("  84,000  ", Some(84000.0))]
    #[test_case("N/A", None)]
    #[test_case("", None)]
    fn numeric_display_values_parse(raw: &str, expected: Option<f64>) {
        assert_eq!(parse_numeric(raw), expected);
    }

    #[test]
    fn metric_patterns_extract_from_markup() {
        let html = r#"
            <li>Market Cap <span class="number">84,000</span></li>
            <li>Current Price <span class="number"> 1,234.5</span></li>
            <li>Stock P/E <span class="number">22.4</span></li>
        "#;

        let price = METRIC_PATTERNS
            .iter()
            .find(|(key, _)| *key == "current_price")
            .and_then(|(_, p)| p.captures(html))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string());
        assert_eq!(price.as_deref(), Some("1,234.5"));
    }
}
