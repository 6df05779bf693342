use gate::bench::{self, BenchConfig, BenchRunner};
use gate::kube::KubeStatusProvider;
use gate::smoke::SmokeRunner;
use gate::{Config, Outcome, ReadinessGate};
use tokio_util::sync::CancellationToken;

// Exit codes, one per terminal state, so pipeline steps can branch on them
const EXIT_VALIDATION_FAILED: i32 = 1;
const EXIT_PERMANENT_FAILURE: i32 = 2;
const EXIT_TIMED_OUT: i32 = 3;
const EXIT_CANCELLED: i32 = 4;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(config.log_level.clone())
        .init();

    tracing::info!("Readiness gate starting");
    tracing::info!("Namespace: {}", config.namespace);
    tracing::info!("Pod selector: {}", config.pod_selector);
    tracing::info!("Target URL: {}", config.base_url);
    tracing::info!(
        "Poll interval: {:?}, max wait: {:?}",
        config.poll_interval,
        config.max_wait
    );

    let gate = ReadinessGate::new(config.poll_interval, config.max_wait)?;

    tracing::info!("Connecting to Kubernetes...");
    let provider =
        KubeStatusProvider::new(config.namespace.clone(), config.pod_selector.clone()).await?;
    tracing::info!("Connected to Kubernetes");

    // Ctrl-C cancels the polling loop
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, cancelling");
                cancel.cancel();
            }
        });
    }

    let outcome = gate.wait_until_ready(&provider, &cancel).await;

    let code = match outcome {
        Outcome::Ready { attempts } => {
            tracing::info!("Target ready after {} polls, running smoke validation", attempts);
            run_validation(&config).await?
        }
        Outcome::PermanentFailure { diagnostics, .. } => {
            eprintln!("Deployment failed permanently. Last diagnostics:\n{}", diagnostics);
            EXIT_PERMANENT_FAILURE
        }
        Outcome::TimedOut { diagnostics, .. } => {
            eprintln!(
                "Deployment not ready within {:?}. Last diagnostics:\n{}",
                config.max_wait, diagnostics
            );
            EXIT_TIMED_OUT
        }
        Outcome::Cancelled => {
            eprintln!("Readiness gate cancelled");
            EXIT_CANCELLED
        }
    };

    std::process::exit(code);
}

async fn run_validation(config: &Config) -> anyhow::Result<i32> {
    let runner = SmokeRunner::new(
        config.base_url.clone(),
        config.model.clone(),
        config.request_timeout,
    )?;

    let report = runner.run().await;

    if !report.passed() {
        eprintln!("Smoke validation failed:");
        for failure in report.failures() {
            eprintln!("  {}: {}", failure.kind, failure.detail);
        }
        return Ok(EXIT_VALIDATION_FAILED);
    }

    tracing::info!("Smoke validation passed");
    for result in &report.results {
        println!("{}: {}", result.kind, result.detail);
    }

    if config.run_bench {
        run_benchmark(config).await?;
    }

    Ok(0)
}

async fn run_benchmark(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Running concurrent benchmark against {}", config.base_url);

    let mut bench_config = BenchConfig::new(config.base_url.clone(), config.model.clone());
    bench_config.request_timeout = config.request_timeout;

    let runner = BenchRunner::new(bench_config)?;
    let all_stats = runner.run().await;

    for stats in &all_stats {
        println!("{}", stats.summary());
    }
    println!("{}", bench::summary_table(&all_stats));

    if let Some(path) = &config.bench_results_path {
        bench::write_results(path, &all_stats)?;
        tracing::info!("Benchmark results written to {}", path);
    }

    Ok(())
}
