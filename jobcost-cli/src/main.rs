//! Command line front end for jobcost: quotes waste and install time and costs job routes.

mod files;
mod logging;
mod report;

use std::future;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use jobcost_core::{
    DistanceProvider, JobCostService, LogisticsResult, ProviderSet, QuoteBatch, ZoneKind,
    ZoneProvider, ZoneProviders,
};
use jobcost_provider_google::GoogleDistanceProvider;
use jobcost_provider_static::{DistanceTable, DistrictZoneProvider};
use reqwest::Client;
use tokio::signal;

use crate::files::{DistanceBackend, JobFile, ProviderSettings};
use crate::report::Report;

#[derive(Parser)]
#[command(name = "jobcost", version)]
#[command(about = "Cost installation jobs: install time, waste and travel")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "jobcost.toml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Write logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the job's product lines and total install hours and waste
    Quote {
        /// Catalogue file with `[[products]]` and `[[aliases]]`
        #[arg(long)]
        catalogue: PathBuf,
        /// Job file
        job: PathBuf,
    },
    /// Cost the trip from the depot to the job site and back
    Route {
        /// Job file
        job: PathBuf,
    },
    /// Quote and route in one report
    Job {
        /// Catalogue file with `[[products]]` and `[[aliases]]`
        #[arg(long)]
        catalogue: PathBuf,
        /// Job file
        job: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.json_logs);

    tracing::debug!(config = %cli.config.display(), "loading configuration");
    let config = files::load_config(&cli.config)?;
    let providers = build_providers(&config.providers)?;
    let service = JobCostService::new(&config.settings, providers)
        .context("invalid configuration")?;

    let (job, catalogue) = match &cli.command {
        Command::Quote { catalogue, job } | Command::Job { catalogue, job } => {
            (job, Some(catalogue.as_path()))
        }
        Command::Route { job } => (job, None),
    };
    let job = files::load_job(job)?;

    let batch = catalogue
        .map(|path| quote(&service, path, &job))
        .transpose()?;
    let logistics = match cli.command {
        Command::Route { .. } | Command::Job { .. } => Some(route(&service, &job).await?),
        Command::Quote { .. } => None,
    };

    let output = Report {
        reference: job.reference.as_deref(),
        job_date: job.date,
        prepared: Local::now().date_naive(),
        quote: batch.as_ref(),
        route: logistics.as_ref(),
    }
    .render()?;

    io::stdout().lock().write_all(output.as_bytes())?;
    Ok(())
}

fn build_providers(settings: &ProviderSettings) -> Result<ProviderSet> {
    let distance: Arc<dyn DistanceProvider> = match settings.distance {
        DistanceBackend::Google => {
            let client = Client::builder()
                .user_agent(concat!("jobcost/", env!("CARGO_PKG_VERSION")))
                .build()?;
            let mut provider = GoogleDistanceProvider::new(client, settings.google.api_key()?);
            if let Some(base_url) = &settings.google.base_url {
                provider = provider.with_base_url(base_url.as_str());
            }
            Arc::new(provider)
        }
        DistanceBackend::Table => Arc::new(
            DistanceTable::new(settings.distances.clone())
                .context("invalid providers.distances entry")?,
        ),
    };
    tracing::debug!(provider = distance.name(), "distance provider selected");

    let congestion = settings.zones.congestion.as_ref().map_or_else(
        DistrictZoneProvider::london_congestion,
        |districts| DistrictZoneProvider::new(ZoneKind::Congestion, districts),
    );
    let emission = settings.zones.emission_zone.as_ref().map_or_else(
        DistrictZoneProvider::london_ulez,
        |districts| DistrictZoneProvider::new(ZoneKind::EmissionZone, districts),
    );
    let zones: Vec<Arc<dyn ZoneProvider>> = vec![Arc::new(congestion), Arc::new(emission)];

    Ok(ProviderSet::new(distance, ZoneProviders::new(zones)?))
}

fn quote(service: &JobCostService, catalogue: &Path, job: &JobFile) -> Result<QuoteBatch> {
    let file = files::load_catalogue(catalogue)?;
    let snapshot = service
        .catalogue(file.products, file.aliases)
        .context("invalid catalogue")?;
    tracing::debug!(entries = snapshot.len(), "catalogue loaded");

    Ok(service.quote(&job.lines, &snapshot)?)
}

async fn route(service: &JobCostService, job: &JobFile) -> Result<LogisticsResult> {
    let site = job.site()?;
    let collection = job.collection()?;

    let interrupted = async {
        // Without a signal handler the route simply runs to completion.
        if signal::ctrl_c().await.is_err() {
            future::pending::<()>().await;
        }
    };

    Ok(service.route_until(site, collection, interrupted).await?)
}
