// Copyright 2026 The wattlog authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::Path;

use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wattlog::cli::{Cli, Commands, SampleArgs};
use wattlog::sampler::{Sampler, SamplerConfig, SamplerReport};
use wattlog::sink::CsvSink;
use wattlog::source::ipmi::IpmiSource;
use wattlog::source::nvidia::NvidiaSource;
use wattlog::source::rapl::RaplSource;
use wattlog::source::redfish::RedfishSource;
use wattlog::source::PowerSource;
use wattlog::Result;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wattlog=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let shutdown = spawn_signal_handler();

    match cli.command {
        Commands::Cpu(args) => {
            if args.list_domains {
                for name in RaplSource::available_domains()? {
                    println!("{name}");
                }
                return Ok(());
            }
            let config = sampler_config(&args.sample)?;
            let mut source = RaplSource::new(args.domain.as_deref())?;
            sample(&mut source, &args.sample, config, "cpu_power_data.csv", shutdown).await
        }
        Commands::Gpu(args) => {
            let config = sampler_config(&args.sample)?;
            let mut source = NvidiaSource::new(args.index, config.query_timeout()).await?;
            sample(&mut source, &args.sample, config, "gpu_power_data.csv", shutdown).await
        }
        Commands::Redfish(args) => {
            let config = sampler_config(&args.sample)?;
            let mut source = RedfishSource::new(
                &args.host,
                &args.chassis,
                args.username.clone(),
                args.password.clone(),
                args.insecure,
            )?;
            sample(&mut source, &args.sample, config, "redfish_power_data.csv", shutdown).await
        }
        Commands::Ipmi(args) => {
            let config = sampler_config(&args.sample)?;
            let mut source = IpmiSource::new(
                args.host.clone(),
                args.username.clone(),
                args.password.clone(),
                config.query_timeout(),
            )?;
            sample(&mut source, &args.sample, config, "ipmi_power_data.csv", shutdown).await
        }
    }
}

fn sampler_config(args: &SampleArgs) -> Result<SamplerConfig> {
    Ok(SamplerConfig::new(args.interval, args.duration)?
        .failure_warn_threshold(args.failure_warn_threshold))
}

async fn sample(
    source: &mut dyn PowerSource,
    args: &SampleArgs,
    config: SamplerConfig,
    default_output: &str,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut sink = CsvSink::create(&args.output_or(default_output), args.flush_every)?;

    if args.duration > 0.0 {
        println!(
            "Sampling {} every {}s for {}s...",
            source.id(),
            args.interval,
            args.duration
        );
    } else {
        println!("Sampling {} every {}s...", source.id(), args.interval);
        println!("Press Ctrl+C to stop");
    }
    println!("Data will be saved to {}", sink.path().display());

    let report = Sampler::new(source, &mut sink, config).run(shutdown).await?;
    print_summary(&report, sink.path());
    Ok(())
}

fn print_summary(report: &SamplerReport, output: &Path) {
    if report.cancelled {
        println!("\nSampling stopped by user.");
    }
    println!("\nSampling complete.");
    println!(
        "Collected {} readings over {:.2} seconds ({:.2} samples/sec)",
        report.readings,
        report.elapsed.as_secs_f64(),
        report.average_rate()
    );
    if report.failures > 0 {
        println!("{} readings had failed queries", report.failures);
    }
    if report.overruns > 0 {
        println!("{} ticks overran the interval", report.overruns);
    }
    println!("Data saved to {}", output.display());
}

/// Translate Ctrl+C and SIGTERM into a cooperative shutdown flag; the loop
/// observes it at the next tick boundary, flushes, and exits cleanly.
fn spawn_signal_handler() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("shutdown signal received, finishing up");
        let _ = tx.send(true);
    });
    rx
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to listen for SIGTERM");
        tokio::select! {
            _ = signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
    }
}
