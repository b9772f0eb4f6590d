//! Binance klines data source.
//!
//! Fetches OHLCV candles from the public `/api/v3/klines` endpoint. The API
//! returns at most `PAGE_LIMIT` candles per call, so a range is walked page by
//! page, restarting one interval after the last candle received. Transient
//! failures are retried with exponential backoff.

use super::provider::{BarSource, DataError, SeriesKey};
use crate::domain::Bar;
use chrono::DateTime;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Maximum candles per klines request.
pub const PAGE_LIMIT: usize = 1000;

pub struct BinanceSource {
    client: reqwest::blocking::Client,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl BinanceSource {
    pub fn new() -> Result<Self, DataError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    fn klines_url(&self, key: &SeriesKey, start_ms: i64, end_ms: i64) -> String {
        format!(
            "{}/api/v3/klines?symbol={}&interval={}&startTime={start_ms}&endTime={end_ms}&limit={PAGE_LIMIT}",
            self.base_url.trim_end_matches('/'),
            key.symbol,
            key.interval,
        )
    }

    /// Execute one page request with retry logic.
    fn fetch_page(&self, key: &SeriesKey, url: &str) -> Result<Vec<Bar>, DataError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                debug!(attempt, ?delay, "retrying klines request");
                std::thread::sleep(delay);
            }

            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS
                        || status == reqwest::StatusCode::IM_A_TEAPOT
                    {
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        warn!(retry_after, "rate limited by binance");
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status == reqwest::StatusCode::BAD_REQUEST {
                        // Unknown symbols come back as 400 with an error payload.
                        return Err(DataError::SymbolNotFound {
                            symbol: key.symbol.clone(),
                        });
                    }

                    if !status.is_success() {
                        last_error = Some(DataError::Other(format!(
                            "HTTP {status} for {}",
                            key.symbol
                        )));
                        continue;
                    }

                    let rows: Vec<Vec<Value>> = resp.json().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse klines for {}: {e}",
                            key.symbol
                        ))
                    })?;
                    return parse_klines(&rows);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl BarSource for BinanceSource {
    fn name(&self) -> &str {
        "binance"
    }

    fn fetch(&self, key: &SeriesKey) -> Result<Vec<Bar>, DataError> {
        let step = key.interval.duration().num_milliseconds();
        let end_ms = key.end.timestamp_millis();
        let mut start_ms = key.start.timestamp_millis();
        let mut bars: Vec<Bar> = Vec::new();

        while start_ms < end_ms {
            let url = self.klines_url(key, start_ms, end_ms);
            let page = self.fetch_page(key, &url)?;
            let Some(last) = page.last() else {
                break;
            };
            start_ms = last.timestamp.timestamp_millis() + step;
            debug!(rows = page.len(), total = bars.len() + page.len(), "klines page");
            bars.extend(page.into_iter().filter(|b| b.timestamp < key.end));
        }

        if bars.is_empty() {
            return Err(DataError::SymbolNotFound {
                symbol: key.symbol.clone(),
            });
        }
        Ok(bars)
    }
}

/// Parse raw kline rows: `[open_time_ms, "open", "high", "low", "close", "volume", ...]`.
pub fn parse_klines(rows: &[Vec<Value>]) -> Result<Vec<Bar>, DataError> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let open_time = row
                .first()
                .and_then(Value::as_i64)
                .ok_or_else(|| malformed(i, "open time"))?;
            let timestamp = DateTime::from_timestamp_millis(open_time)
                .ok_or_else(|| malformed(i, "open time"))?;
            let field = |idx: usize, name: &str| -> Result<f64, DataError> {
                let v = row.get(idx).ok_or_else(|| malformed(i, name))?;
                match v {
                    Value::String(s) => s.parse::<f64>().map_err(|_| malformed(i, name)),
                    Value::Number(n) => n.as_f64().ok_or_else(|| malformed(i, name)),
                    _ => Err(malformed(i, name)),
                }
            };
            Ok(Bar::new(
                timestamp,
                field(1, "open")?,
                field(2, "high")?,
                field(3, "low")?,
                field(4, "close")?,
                field(5, "volume")?,
            ))
        })
        .collect()
}

fn malformed(row: usize, field: &str) -> DataError {
    DataError::ResponseFormatChanged(format!("kline row {row}: bad {field}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::Interval;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn parses_string_encoded_klines() {
        let rows: Vec<Vec<Value>> = vec![
            vec![
                json!(1_546_300_800_000i64),
                json!("3701.23"),
                json!("3713.00"),
                json!("3689.88"),
                json!("3700.31"),
                json!("686.36"),
                json!(1_546_304_399_999i64),
            ],
            vec![
                json!(1_546_304_400_000i64),
                json!("3700.20"),
                json!("3702.73"),
                json!("3684.22"),
                json!("3689.69"),
                json!("613.47"),
                json!(1_546_307_999_999i64),
            ],
        ];
        let bars = parse_klines(&rows).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(
            bars[0].timestamp,
            Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(bars[0].open, 3701.23);
        assert_eq!(bars[1].close, 3689.69);
        assert_eq!(bars[1].volume, 613.47);
    }

    #[test]
    fn malformed_row_is_format_error() {
        let rows: Vec<Vec<Value>> = vec![vec![json!(1_546_300_800_000i64), json!("abc")]];
        assert!(matches!(
            parse_klines(&rows),
            Err(DataError::ResponseFormatChanged(_))
        ));
    }

    #[test]
    fn url_carries_range_and_limit() {
        let source = BinanceSource::with_base_url("http://localhost:1/").unwrap();
        let key = SeriesKey::new(
            "BTCUSDT",
            Interval::Hour1,
            Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2019, 2, 1, 0, 0, 0).unwrap(),
        );
        let url = source.klines_url(&key, 1, 2);
        assert_eq!(
            url,
            "http://localhost:1/api/v3/klines?symbol=BTCUSDT&interval=1h&startTime=1&endTime=2&limit=1000"
        );
    }
}
