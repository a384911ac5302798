use anyhow::{Context, Result};
use tokio::sync::watch;

use kv_latency_bench::bench::{BenchmarkRunner, MockStoreServer, RunReport};
use kv_latency_bench::config::{Config, Target};
use kv_latency_bench::dataset::Dataset;
use kv_latency_bench::transport;

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = Config::load()?;

    // Initialize logging with a configured level
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.to_lowercase()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    if config.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    config.validate()?;

    // Fail fast on a bad dataset, before anything touches the network
    let dataset = Dataset::load(&config.keys_file, &config.values_file)
        .context("Failed to load dataset")?;

    let mut mock_server = match &config.target {
        Target::Mock(mock_config) => {
            let mut server = MockStoreServer::new(mock_config.clone());
            config.bench.port = server.start().await?;
            tracing::info!("Mock store started on port {}", config.bench.port);
            Some(server)
        }
        Target::Remote => None,
    };

    tracing::info!(
        "Benchmarking {} ({}, {}, {})",
        config.bench.display_target(),
        config.bench.transport,
        config.bench.pacing,
        config.bench.granularity
    );

    let transport = match transport::connect(&config.bench).await {
        Ok(transport) => transport,
        Err(e) => {
            tracing::error!("❌ Failed to connect: {}", e);
            return Err(e).context("Startup failed: store is unreachable or rejected the credentials");
        }
    };

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = cancel_tx.send(true);
    });

    let result = BenchmarkRunner::new(config.bench.clone(), transport)
        .with_cancel(cancel_rx)
        .run(&dataset)
        .await;

    if let Some(server) = mock_server.as_mut() {
        server.stop();
    }

    let report = result.context("Benchmark run failed")?;
    print_report(&report, config.json_output);

    if let Some(reason) = &report.aborted {
        anyhow::bail!("Run aborted: {}", reason);
    }

    Ok(())
}

fn print_report(report: &RunReport, json_output: bool) {
    if json_output {
        println!("{}", report.to_json());
    } else {
        report.print_summary();
    }
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, stopping after the current unit...");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, stopping after the current unit...");
        },
    }
}
