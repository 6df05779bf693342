use crate::error::{GateError, GateResult};
use common::{CompletionRequest, CompletionResponse};
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Fixed prompt rotation used by every benchmark run
const TEST_PROMPTS: [&str; 10] = [
    "What is the capital of France?",
    "Explain quantum computing in simple terms.",
    "Write a short poem about nature.",
    "What are the benefits of exercise?",
    "Describe the water cycle.",
    "What is machine learning?",
    "How does photosynthesis work?",
    "What is the theory of relativity?",
    "Explain blockchain technology.",
    "What are the layers of Earth's atmosphere?",
];

#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub base_url: String,
    pub model: String,
    pub concurrency_levels: Vec<usize>,
    pub requests_per_session: usize,
    pub max_tokens: u32,
    pub temperature: f32,
    pub request_timeout: Duration,
    /// Pause between concurrency levels, letting the server settle
    pub settle: Duration,
}

impl BenchConfig {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url,
            model,
            concurrency_levels: vec![1, 2, 4, 8, 16],
            requests_per_session: 5,
            max_tokens: 100,
            temperature: 0.7,
            request_timeout: Duration::from_secs(120),
            settle: Duration::from_secs(2),
        }
    }
}

/// Measurements from one completion request
#[derive(Debug, Clone)]
struct RequestOutcome {
    latency_s: f64,
    completion_tokens: u64,
    ok: bool,
    error: Option<String>,
}

/// Aggregated statistics for one concurrency level
#[derive(Debug, Clone, Serialize)]
pub struct LevelStats {
    pub concurrency: usize,
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub total_time_s: f64,
    pub avg_latency_s: f64,
    pub median_latency_s: f64,
    pub p95_latency_s: f64,
    pub p99_latency_s: f64,
    pub min_latency_s: f64,
    pub max_latency_s: f64,
    pub avg_tokens_per_second: f64,
    pub total_tokens_generated: u64,
    pub overall_throughput: f64,
}

impl LevelStats {
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.successful_requests as f64 / self.total_requests as f64 * 100.0
    }

    /// Multi-line human-readable block for one level
    pub fn summary(&self) -> String {
        format!(
            "Concurrency {}: {}/{} requests succeeded in {:.2}s\n\
             \x20 latency avg {:.3}s, median {:.3}s, p95 {:.3}s, p99 {:.3}s, \
             min {:.3}s, max {:.3}s\n\
             \x20 throughput {:.2} tokens/s overall, {:.2} tokens/s per request, \
             {} tokens total",
            self.concurrency,
            self.successful_requests,
            self.total_requests,
            self.total_time_s,
            self.avg_latency_s,
            self.median_latency_s,
            self.p95_latency_s,
            self.p99_latency_s,
            self.min_latency_s,
            self.max_latency_s,
            self.overall_throughput,
            self.avg_tokens_per_second,
            self.total_tokens_generated,
        )
    }
}

/// Concurrency-sweep completion benchmark against a validated server
pub struct BenchRunner {
    config: BenchConfig,
    client: reqwest::Client,
}

impl BenchRunner {
    pub fn new(config: BenchConfig) -> GateResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GateError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Run every configured concurrency level in order
    pub async fn run(&self) -> Vec<LevelStats> {
        let mut all_stats = Vec::with_capacity(self.config.concurrency_levels.len());

        for (i, &level) in self.config.concurrency_levels.iter().enumerate() {
            tracing::info!(
                "Benchmark level {}: {} concurrent sessions, {} requests each",
                i + 1,
                level,
                self.config.requests_per_session
            );

            let stats = self.run_level(level).await;
            tracing::info!(
                "Level {} done: {}/{} ok, {:.2} tokens/s",
                level,
                stats.successful_requests,
                stats.total_requests,
                stats.overall_throughput
            );
            all_stats.push(stats);

            if i + 1 < self.config.concurrency_levels.len() {
                tokio::time::sleep(self.config.settle).await;
            }
        }

        all_stats
    }

    /// Fire level * requests_per_session requests concurrently and aggregate
    pub async fn run_level(&self, concurrency: usize) -> LevelStats {
        let total = concurrency * self.config.requests_per_session;
        let mut tasks = JoinSet::new();
        let started = Instant::now();

        for request_id in 0..total {
            let client = self.client.clone();
            let url = format!("{}/completions", self.config.base_url);
            let request = CompletionRequest {
                model: self.config.model.clone(),
                prompt: TEST_PROMPTS[request_id % TEST_PROMPTS.len()].to_string(),
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            };

            tasks.spawn(async move { send_completion(client, url, request).await });
        }

        let mut outcomes = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => outcomes.push(RequestOutcome {
                    latency_s: 0.0,
                    completion_tokens: 0,
                    ok: false,
                    error: Some(format!("task failed: {}", e)),
                }),
            }
        }
        let total_time = started.elapsed();

        for outcome in outcomes.iter().filter(|o| !o.ok) {
            tracing::warn!(
                "Benchmark request failed: {}",
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }

        aggregate(concurrency, &outcomes, total_time.as_secs_f64())
    }
}

async fn send_completion(
    client: reqwest::Client,
    url: String,
    request: CompletionRequest,
) -> RequestOutcome {
    let started = Instant::now();

    let result: Result<CompletionResponse, String> = async {
        let response = client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("server returned {}", response.status()));
        }

        response.json().await.map_err(|e| e.to_string())
    }
    .await;

    let latency_s = started.elapsed().as_secs_f64();

    match result {
        Ok(completion) => RequestOutcome {
            latency_s,
            completion_tokens: completion.completion_tokens(),
            ok: true,
            error: None,
        },
        Err(error) => RequestOutcome {
            latency_s,
            completion_tokens: 0,
            ok: false,
            error: Some(error),
        },
    }
}

fn aggregate(concurrency: usize, outcomes: &[RequestOutcome], total_time_s: f64) -> LevelStats {
    let successful: Vec<&RequestOutcome> = outcomes.iter().filter(|o| o.ok).collect();
    let failed = outcomes.len() - successful.len();

    let mut latencies: Vec<f64> = successful.iter().map(|o| o.latency_s).collect();
    latencies.sort_by(|a, b| a.total_cmp(b));

    let total_tokens: u64 = successful.iter().map(|o| o.completion_tokens).sum();

    let (avg, median, p95, p99, min, max) = if latencies.is_empty() {
        (0.0, 0.0, 0.0, 0.0, 0.0, 0.0)
    } else {
        let avg = latencies.iter().sum::<f64>() / latencies.len() as f64;
        (
            avg,
            percentile(&latencies, 50.0),
            percentile(&latencies, 95.0),
            percentile(&latencies, 99.0),
            latencies[0],
            latencies[latencies.len() - 1],
        )
    };

    let avg_tokens_per_second = if successful.is_empty() {
        0.0
    } else {
        successful
            .iter()
            .map(|o| {
                if o.latency_s > 0.0 {
                    o.completion_tokens as f64 / o.latency_s
                } else {
                    0.0
                }
            })
            .sum::<f64>()
            / successful.len() as f64
    };

    LevelStats {
        concurrency,
        total_requests: outcomes.len(),
        successful_requests: successful.len(),
        failed_requests: failed,
        total_time_s,
        avg_latency_s: avg,
        median_latency_s: median,
        p95_latency_s: p95,
        p99_latency_s: p99,
        min_latency_s: min,
        max_latency_s: max,
        avg_tokens_per_second,
        total_tokens_generated: total_tokens,
        overall_throughput: if total_time_s > 0.0 {
            total_tokens as f64 / total_time_s
        } else {
            0.0
        },
    }
}

/// Linear-interpolation percentile over an ascending slice
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let frac = rank - lo as f64;

    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// Final cross-level summary table
pub fn summary_table(all_stats: &[LevelStats]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<12} {:<15} {:<22} {:<12}\n",
        "Concurrent", "Avg Latency (s)", "Throughput (tokens/s)", "Success"
    ));
    out.push_str(&"-".repeat(61));
    out.push('\n');

    for stats in all_stats {
        out.push_str(&format!(
            "{:<12} {:<15.3} {:<22.2} {:.1}%\n",
            stats.concurrency,
            stats.avg_latency_s,
            stats.overall_throughput,
            stats.success_rate()
        ));
    }

    out
}

/// Write the aggregated stats as pretty-printed JSON
pub fn write_results(path: &str, all_stats: &[LevelStats]) -> GateResult<()> {
    let json = serde_json::to_string_pretty(all_stats)
        .map_err(|e| GateError::Internal(format!("Failed to serialize results: {}", e)))?;
    std::fs::write(path, json)
        .map_err(|e| GateError::Internal(format!("Failed to write {}: {}", path, e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Json as AxumJson;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::net::SocketAddr;

    fn approx(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "expected {} ~= {}", a, b);
    }

    #[test]
    fn test_percentile_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];

        approx(percentile(&sorted, 0.0), 1.0);
        approx(percentile(&sorted, 50.0), 3.0);
        approx(percentile(&sorted, 95.0), 4.8);
        approx(percentile(&sorted, 100.0), 5.0);
    }

    #[test]
    fn test_percentile_degenerate_inputs() {
        assert_eq!(percentile(&[], 95.0), 0.0);
        approx(percentile(&[2.5], 99.0), 2.5);
    }

    #[test]
    fn test_aggregate_mixed_outcomes() {
        let outcomes = vec![
            RequestOutcome {
                latency_s: 1.0,
                completion_tokens: 10,
                ok: true,
                error: None,
            },
            RequestOutcome {
                latency_s: 3.0,
                completion_tokens: 30,
                ok: true,
                error: None,
            },
            RequestOutcome {
                latency_s: 0.5,
                completion_tokens: 0,
                ok: false,
                error: Some("timeout".to_string()),
            },
        ];

        let stats = aggregate(4, &outcomes, 4.0);

        assert_eq!(stats.concurrency, 4);
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.successful_requests, 2);
        assert_eq!(stats.failed_requests, 1);
        approx(stats.avg_latency_s, 2.0);
        approx(stats.median_latency_s, 2.0);
        approx(stats.min_latency_s, 1.0);
        approx(stats.max_latency_s, 3.0);
        assert_eq!(stats.total_tokens_generated, 40);
        approx(stats.overall_throughput, 10.0);
        approx(stats.avg_tokens_per_second, 10.0);
    }

    #[test]
    fn test_aggregate_all_failed_has_no_nan() {
        let outcomes = vec![RequestOutcome {
            latency_s: 0.2,
            completion_tokens: 0,
            ok: false,
            error: Some("refused".to_string()),
        }];

        let stats = aggregate(1, &outcomes, 1.0);

        assert_eq!(stats.successful_requests, 0);
        assert_eq!(stats.failed_requests, 1);
        assert_eq!(stats.avg_latency_s, 0.0);
        assert_eq!(stats.overall_throughput, 0.0);
        approx(stats.success_rate(), 0.0);
    }

    #[test]
    fn test_summary_table_contains_all_levels() {
        let stats = vec![
            aggregate(1, &[], 1.0),
            aggregate(16, &[], 1.0),
        ];

        let table = summary_table(&stats);
        assert!(table.contains("Concurrent"));
        assert!(table.contains("16"));
    }

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    async fn completions_fixed(AxumJson(_req): AxumJson<CompletionRequest>) -> Json<Value> {
        Json(json!({
            "choices": [{"text": "output"}],
            "usage": {"prompt_tokens": 5, "completion_tokens": 7, "total_tokens": 12}
        }))
    }

    #[tokio::test]
    async fn test_run_level_against_fake_server() {
        let app = Router::new().route("/v1/completions", post(completions_fixed));
        let addr = serve(app).await;

        let mut config = BenchConfig::new(
            format!("http://{}/v1", addr),
            "test-model".to_string(),
        );
        config.requests_per_session = 2;
        config.request_timeout = Duration::from_secs(5);

        let runner = BenchRunner::new(config).unwrap();
        let stats = runner.run_level(2).await;

        assert_eq!(stats.total_requests, 4);
        assert_eq!(stats.successful_requests, 4);
        assert_eq!(stats.failed_requests, 0);
        assert_eq!(stats.total_tokens_generated, 28);
        assert!(stats.max_latency_s >= stats.min_latency_s);
    }

    #[tokio::test]
    async fn test_run_level_counts_failures_without_aborting() {
        let app = Router::new().route(
            "/v1/completions",
            post(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "oom") }),
        );
        let addr = serve(app).await;

        let mut config = BenchConfig::new(
            format!("http://{}/v1", addr),
            "test-model".to_string(),
        );
        config.requests_per_session = 3;
        config.request_timeout = Duration::from_secs(5);

        let runner = BenchRunner::new(config).unwrap();
        let stats = runner.run_level(1).await;

        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.successful_requests, 0);
        assert_eq!(stats.failed_requests, 3);
        assert_eq!(stats.total_tokens_generated, 0);
    }

    #[tokio::test]
    async fn test_run_sweeps_all_levels() {
        let app = Router::new().route("/v1/completions", post(completions_fixed));
        let addr = serve(app).await;

        let mut config = BenchConfig::new(
            format!("http://{}/v1", addr),
            "test-model".to_string(),
        );
        config.concurrency_levels = vec![1, 2];
        config.requests_per_session = 1;
        config.settle = Duration::from_millis(10);
        config.request_timeout = Duration::from_secs(5);

        let runner = BenchRunner::new(config).unwrap();
        let stats = runner.run().await;

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].concurrency, 1);
        assert_eq!(stats[1].concurrency, 2);
    }

    #[test]
    fn test_write_results_produces_json() {
        let stats = vec![aggregate(1, &[], 0.5)];
        let dir = std::env::temp_dir();
        let path = dir.join("gate_bench_results_test.json");
        let path_str = path.to_str().unwrap();

        write_results(path_str, &stats).unwrap();

        let contents = std::fs::read_to_string(path_str).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0]["concurrency"], 1);

        let _ = std::fs::remove_file(path_str);
    }
}
