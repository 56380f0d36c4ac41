//! Command-line runner: registers local files as uploads, runs one job and
//! prints its results as JSON.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use log::info;

use reelmix::{
    load_config, telemetry, Combination, Config, GenerateRequest, JobState, ReelmixService,
    UploadedAsset,
};

#[derive(Parser, Debug)]
#[command(name = "reelmix", version, about, long_about = None)]
struct Cli {
    /// JSON config file. Built-in defaults are used when omitted.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Concatenate combinations of local files and bundle the outputs.
    Run(RunArgs),
    /// Locate the media tool and print the health report.
    Probe,
    /// Validate the config file and print the effective configuration.
    CheckConfig,
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Project name used in output file names.
    #[arg(long, required_unless_present = "request")]
    project: Option<String>,

    /// Input file; registered under its file name. Repeatable.
    #[arg(long = "asset", value_name = "PATH")]
    assets: Vec<PathBuf>,

    /// Role hint for an asset, as NAME=LABEL. Repeatable.
    #[arg(long = "label", value_name = "NAME=LABEL", value_parser = parse_label)]
    labels: Vec<(String, String)>,

    /// Three asset names joined by commas, in role order. Repeatable.
    #[arg(long = "combo", value_name = "A,B,C", value_parser = parse_combination)]
    combinations: Vec<Combination>,

    /// Output container (mp4, mov, mkv, webm, m4a, mp3).
    #[arg(long)]
    format: Option<String>,

    /// Generate request as JSON, instead of --project/--combo/--format.
    #[arg(long, conflicts_with_all = ["project", "combinations", "format"])]
    request: Option<PathBuf>,

    /// Give up waiting after this many seconds.
    #[arg(long, value_name = "SECS")]
    wait_timeout: Option<u64>,
}

fn parse_label(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((name, label)) if !name.is_empty() && !label.is_empty() => {
            Ok((name.to_string(), label.to_string()))
        }
        _ => Err(format!("expected NAME=LABEL, got '{}'", value)),
    }
}

fn parse_combination(value: &str) -> Result<Combination, String> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    match parts.as_slice() {
        [first, second, third] => Ok(Combination::new(*first, *second, *third)),
        _ => Err(format!(
            "expected three comma-separated asset names, got '{}'",
            value
        )),
    }
}

fn read_request(path: &Path) -> anyhow::Result<GenerateRequest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading request {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing request {}", path.display()))
}

async fn run(service: &ReelmixService, args: RunArgs) -> anyhow::Result<bool> {
    let mut uploads = Vec::with_capacity(args.assets.len());
    for path in &args.assets {
        let upload = UploadedAsset::from_path(path)
            .with_context(|| format!("'{}' has no usable file name", path.display()))?;
        uploads.push(upload);
    }
    let labels: HashMap<String, String> = args.labels.into_iter().collect();

    let mut request = match &args.request {
        Some(path) => read_request(path)?,
        None => {
            let mut request = GenerateRequest::new(
                args.project.clone().unwrap_or_default(),
                args.combinations.clone(),
            );
            request.format = args.format.clone();
            request
        }
    };

    let job_id = service.upload(request.job_id.as_deref(), &uploads, labels)?;
    request.job_id = Some(job_id.clone());
    service.generate(request).await?;
    tracing::info!(job_id = %job_id, "Job submitted");

    let job = match args.wait_timeout {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), service.wait_for(&job_id))
            .await
            .with_context(|| format!("job {} still running after {}s", job_id, secs))??,
        None => service.wait_for(&job_id).await?,
    };

    println!("{}", serde_json::to_string_pretty(&job.results_snapshot())?);
    Ok(job.state == JobState::Completed)
}

async fn execute(cli: Cli) -> anyhow::Result<bool> {
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    telemetry::init_tracing(&config.logging);
    info!("Starting reelmix v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::CheckConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(true)
        }
        Commands::Probe => {
            let service = ReelmixService::from_config(config)?;
            println!("{}", serde_json::to_string_pretty(&service.health())?);
            Ok(true)
        }
        Commands::Run(args) => {
            if args.request.is_none() && args.combinations.is_empty() {
                bail!("at least one --combo is required");
            }
            let service = ReelmixService::from_config(config)?;
            run(&service, args).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    match execute(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("reelmix: {:#}", e);
            std::process::exit(2);
        }
    }
}
