#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use citycare::blob::FsBlobStore;
use citycare::config::AppConfig;
use citycare::directory::StaticWorkerDirectory;
use citycare::export::{write_complaints_to_file, ExportFormat};
use citycare::ids::SequentialIdGenerator;
use citycare::journal::SledJournal;
use citycare::logging::{init_logging, LogFormat, OperationTimer};
use citycare::metrics::EngineMetrics;
use citycare::models::{UserId, WorkerId};
use citycare::store::ComplaintStore;
use citycare::{Actor, Collaborators, ComplaintFilter, ComplaintService, Coordinates, CoreError, Role, Submission};

/// Exit code for rejected requests (bad input, illegal transition, conflict...)
const EXIT_REJECTED: u8 = 2;
/// Exit code for retryable failures (sysexits EX_TEMPFAIL)
const EXIT_RETRY: u8 = 75;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Acting user id
    #[arg(long, global = true, default_value_t = 1)]
    user: u64,

    /// Acting role (CITIZEN, INSPECTOR, COLLECTOR, OFFICER, SYSTEM)
    #[arg(long, global = true, default_value = "OFFICER")]
    role: Role,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Csv,
    Json,
}

impl From<FormatArg> for ExportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Csv => Self::Csv,
            FormatArg::Json => Self::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Report waste at a location
    Submit {
        /// Latitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Path to the before photo
        #[arg(short, long)]
        photo: PathBuf,

        /// Complainant name
        #[arg(short, long)]
        name: Option<String>,

        /// Display address
        #[arg(short, long)]
        address: Option<String>,
    },
    /// Assign a complaint to a worker
    Assign {
        /// Complaint code or UUID
        complaint: String,

        /// Worker id
        #[arg(short, long)]
        worker: u64,
    },
    /// Resolve an assigned complaint
    Resolve {
        /// Complaint code or UUID
        complaint: String,

        /// Path to the after photo
        #[arg(short, long)]
        photo: PathBuf,
    },
    /// Reject an assigned complaint
    Reject {
        /// Complaint code or UUID
        complaint: String,

        /// Why the work cannot be done
        #[arg(short, long)]
        reason: String,
    },
    /// Escalate complaints regardless of age
    Escalate {
        /// Complaint codes or UUIDs
        #[arg(required = true)]
        complaints: Vec<String>,
    },
    /// Escalate complaints idle longer than the SLA window
    Sweep {
        /// Keep sweeping every SECS seconds until interrupted
        #[arg(long, value_name = "SECS")]
        watch: Option<u64>,
    },
    /// List complaints, most urgent first
    List {
        /// Comma-separated statuses, e.g. PENDING,ESCALATED
        #[arg(short, long)]
        status: Option<String>,

        /// Only complaints assigned to this worker
        #[arg(short, long)]
        worker: Option<u64>,
    },
    /// Complaint counts per status
    Stats,
    /// Rank workers for a complaint
    Rank {
        /// Complaint code or UUID
        complaint: String,

        /// Candidate worker ids (default: whole roster)
        #[arg(short, long, value_delimiter = ',')]
        workers: Vec<u64>,
    },
    /// Export complaints to a file
    Export {
        /// Output format
        #[arg(short, long, value_enum, default_value = "csv")]
        format: FormatArg,

        /// Output file
        #[arg(short, long, default_value = "./output/complaints.csv")]
        output: PathBuf,

        /// Comma-separated statuses to include
        #[arg(short, long)]
        status: Option<String>,
    },
    /// Load demo complaints
    Seed {
        /// Seed fixture
        #[arg(short, long, default_value = "demos/seed.yaml")]
        file: PathBuf,

        /// Also scatter this many random reports around the first fixture
        #[arg(long, default_value_t = 0)]
        random: usize,
    },
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    reports: Vec<SeedReport>,
}

#[derive(Debug, Deserialize)]
struct SeedReport {
    user: u64,
    #[serde(default)]
    name: Option<String>,
    lat: f64,
    lon: f64,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    assign_to: Option<u64>,
}

#[derive(Debug, Default, Serialize)]
struct SeedSummary {
    created: Vec<String>,
    merged: Vec<String>,
    assigned: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            match e.downcast_ref::<CoreError>() {
                Some(core) if core.is_retryable() => ExitCode::from(EXIT_RETRY),
                Some(_) => ExitCode::from(EXIT_REJECTED),
                None => ExitCode::FAILURE,
            }
        }
    }
}

async fn run() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging
    let log_file = config.log_file();
    let _log_guard = init_logging(
        Some(&config.get_log_level()),
        log_file.as_deref(),
        LogFormat::from_setting(&config.logging.format),
    )?;

    if let Err(e) = EngineMetrics::init() {
        warn!(error = %e, "Metrics recorder not installed");
    }

    info!("Starting citycare");
    let actor = Actor::new(cli.user, cli.role);
    let service = open_service(&config)?;

    match cli.command {
        Commands::Submit {
            lat,
            lon,
            photo,
            name,
            address,
        } => {
            let photo_before = read_photo(&photo)?;
            let outcome = service.submit(
                &actor,
                Submission {
                    complainant_name: name,
                    coordinates: Coordinates::new(lat, lon),
                    address,
                    photo_before,
                },
            )?;
            print_json(&outcome)?;
        }
        Commands::Assign { complaint, worker } => {
            print_json(&service.assign(&actor, &complaint, UserId(worker))?)?;
        }
        Commands::Resolve { complaint, photo } => {
            let photo_after = read_photo(&photo)?;
            print_json(&service.resolve(&actor, &complaint, &photo_after)?)?;
        }
        Commands::Reject { complaint, reason } => {
            print_json(&service.reject(&actor, &complaint, &reason)?)?;
        }
        Commands::Escalate { complaints } => {
            print_json(&service.force_escalate(&actor, &complaints)?)?;
        }
        Commands::Sweep { watch: None } => print_json(&service.sweep()?)?,
        Commands::Sweep { watch: Some(secs) } => {
            info!(every_secs = secs, "Watching for overdue complaints; Ctrl-C to stop");
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
            };
            service
                .monitor()
                .run_every(std::time::Duration::from_secs(secs.max(1)), shutdown)
                .await;
        }
        Commands::List { status, worker } => {
            let filter = build_filter(status.as_deref(), worker)?;
            print_json(&service.list_complaints(&filter)?)?;
        }
        Commands::Stats => print_json(&service.get_stats()?)?,
        Commands::Rank { complaint, workers } => {
            let ids: Vec<WorkerId> = workers.into_iter().map(UserId).collect();
            let explicit = (!ids.is_empty()).then_some(ids.as_slice());
            print_json(&service.rank_workers(&complaint, explicit)?)?;
        }
        Commands::Export { format, output, status } => {
            let timer = OperationTimer::new("export_complaints");
            let filter = build_filter(status.as_deref(), None)?;
            let complaints = service.list_complaints(&filter)?;
            write_complaints_to_file(&complaints, format.into(), &output)
                .with_context(|| format!("Failed to export to {}", output.display()))?;
            timer.finish();
            print_json(&serde_json::json!({
                "path": output,
                "complaints": complaints.len(),
            }))?;
        }
        Commands::Seed { file, random } => {
            print_json(&seed(&service, &file, random)?)?;
        }
    }

    Ok(())
}

/// Open the journal-backed service described by `config`.
fn open_service(config: &AppConfig) -> Result<ComplaintService> {
    let settings = config.engine.clone();

    let journal = SledJournal::open(&config.storage.data_dir)
        .with_context(|| format!("Failed to open journal at {}", config.storage.data_dir))?;
    let store = Arc::new(ComplaintStore::open(settings.grid(), Arc::new(journal))?);
    let codes = store.codes()?;
    let ids = SequentialIdGenerator::resume_from(codes.iter().map(String::as_str));

    let roster = Path::new(&config.workers.roster_path);
    let directory = if roster.exists() {
        StaticWorkerDirectory::load(roster).with_context(|| format!("Failed to load roster {}", roster.display()))?
    } else {
        warn!(path = %roster.display(), "Worker roster not found; no workers available");
        StaticWorkerDirectory::new(Vec::new())
    };

    let blobs = FsBlobStore::new(&config.storage.blob_dir)
        .with_context(|| format!("Failed to open photo store at {}", config.storage.blob_dir))?;

    let collaborators = Collaborators::in_memory(Arc::new(directory))
        .with_blobs(Arc::new(blobs))
        .with_ids(Arc::new(ids));
    Ok(ComplaintService::new(settings, store, collaborators)?)
}

fn read_photo(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read photo {}", path.display()))
}

fn build_filter(status: Option<&str>, worker: Option<u64>) -> Result<ComplaintFilter> {
    let mut filter = ComplaintFilter::default();
    if let Some(list) = status {
        filter.statuses = Some(ComplaintFilter::parse_statuses(list)?);
    }
    if let Some(worker) = worker {
        filter = filter.with_worker(UserId(worker));
    }
    Ok(filter)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Load fixture reports, then scatter `random` extra ones around the first.
fn seed(service: &ComplaintService, file: &Path, random: usize) -> Result<SeedSummary> {
    let text = std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let fixture: SeedFile = serde_yaml::from_str(&text).with_context(|| format!("Invalid seed file {}", file.display()))?;
    let dispatcher = Actor::officer(0);
    let mut summary = SeedSummary::default();

    for report in &fixture.reports {
        let outcome = service.submit(
            &Actor::citizen(report.user),
            Submission {
                complainant_name: report.name.clone(),
                coordinates: Coordinates::new(report.lat, report.lon),
                address: report.address.clone(),
                photo_before: b"seed photo".to_vec(),
            },
        )?;
        let code = outcome.complaint.complaint_id.clone();
        if outcome.is_duplicate {
            summary.merged.push(code);
            continue;
        }
        if let Some(worker) = report.assign_to {
            service.assign(&dispatcher, &code, UserId(worker))?;
            summary.assigned.push(code.clone());
        }
        summary.created.push(code);
    }

    if let Some(centre) = fixture.reports.first() {
        let mut rng = rand::thread_rng();
        for _ in 0..random {
            let coordinates = Coordinates::new(
                centre.lat + rng.gen_range(-0.05..0.05),
                centre.lon + rng.gen_range(-0.05..0.05),
            );
            let outcome = service.submit(
                &Actor::citizen(rng.gen_range(1000..2000)),
                Submission {
                    complainant_name: None,
                    coordinates,
                    address: None,
                    photo_before: b"seed photo".to_vec(),
                },
            )?;
            let code = outcome.complaint.complaint_id;
            if outcome.is_duplicate {
                summary.merged.push(code);
            } else {
                summary.created.push(code);
            }
        }
    }

    info!(
        created = summary.created.len(),
        merged = summary.merged.len(),
        assigned = summary.assigned.len(),
        "Seed data loaded"
    );
    Ok(summary)
}
