use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub namespace: String,
    pub pod_selector: String,
    pub base_url: String,
    pub model: String,
    pub poll_interval: Duration,
    pub max_wait: Duration,
    pub request_timeout: Duration,
    pub run_bench: bool,
    pub bench_results_path: Option<String>,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            namespace: env::var("GATE_NAMESPACE").unwrap_or_else(|_| "vllm".to_string()),
            pod_selector: env::var("GATE_POD_SELECTOR").unwrap_or_else(|_| "app=vllm".to_string()),
            base_url: env::var("VLLM_URL")
                .unwrap_or_else(|_| "http://localhost:30000/v1".to_string()),
            model: env::var("MODEL_NAME")
                .unwrap_or_else(|_| "TinyLlama/TinyLlama-1.1B-Chat-v1.0".to_string()),
            poll_interval: Duration::from_secs(
                env::var("POLL_INTERVAL_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
            ),
            max_wait: Duration::from_secs(
                env::var("MAX_WAIT_SECS")
                    .unwrap_or_else(|_| "600".to_string())
                    .parse()?,
            ),
            request_timeout: Duration::from_secs(
                env::var("REQUEST_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "120".to_string())
                    .parse()?,
            ),
            run_bench: env::var("RUN_BENCH")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            bench_results_path: env::var("BENCH_RESULTS_PATH").ok(),
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}
