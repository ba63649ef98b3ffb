use clap::Parser;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use claimq::config::QueueConfig;
use claimq::handler::HandlerRegistry;
use claimq::queue::{JobQueue, JobStatus};
use claimq::shutdown::install_shutdown_handler;
use claimq::store::{init_pool, JobStore};
use claimq::worker::WorkerPool;

#[derive(Parser, Debug)]
#[command(name = "claimq")]
#[command(version)]
#[command(about = "A durable, deduplicating job queue with a polling worker pool")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the queue daemon (polling worker pool)
    Serve(ServeArgs),

    /// Submit a job
    Submit {
        #[command(flatten)]
        store: StoreArgs,

        /// Job type name (e.g. "sleep", "analyze")
        #[arg(long = "type")]
        job_type: String,

        /// JSON payload (defaults to an empty object)
        #[arg(long)]
        payload: Option<String>,
    },

    /// Fetch a job by id
    Get {
        #[command(flatten)]
        store: StoreArgs,

        job_id: Uuid,
    },

    /// List jobs, optionally filtered by status
    List {
        #[command(flatten)]
        store: StoreArgs,

        /// Filter by status (queued, running, succeeded, failed, canceled)
        #[arg(long)]
        status: Option<String>,

        /// Maximum number of jobs to return
        #[arg(long, default_value_t = 100)]
        limit: u32,
    },

    /// Cancel a job that has not started running yet
    Cancel {
        #[command(flatten)]
        store: StoreArgs,

        job_id: Uuid,
    },
}

#[derive(Parser, Debug)]
struct StoreArgs {
    /// SQLite database URL shared with the daemon
    #[arg(long, default_value = "sqlite:jobs.db?mode=rwc")]
    db: String,
}

#[derive(Parser, Debug)]
struct ServeArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Maximum number of jobs executing concurrently
    #[arg(long, default_value_t = 3)]
    max_concurrency: usize,

    /// Automatic retries after the first failed attempt
    #[arg(long, default_value_t = 1)]
    retry_limit: u32,

    /// Delay between poll cycles, in milliseconds
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Delay before a failed job is re-queued, in milliseconds
    #[arg(long, default_value_t = 2000)]
    retry_backoff_ms: u64,

    /// Re-queue jobs left running by a previous crash before polling.
    /// Only enable when this daemon is the sole coordinator on the store.
    #[arg(long)]
    recover: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Commands::Serve(server_args) => run_server(server_args).await,
        command => run_client(command).await,
    }
}

async fn run_server(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = QueueConfig::new(args.store.db)
        .with_max_concurrency(args.max_concurrency)
        .with_retry_limit(args.retry_limit)
        .with_poll_interval(Duration::from_millis(args.poll_interval_ms))
        .with_retry_backoff(Duration::from_millis(args.retry_backoff_ms));

    // One connection per executor slot plus one for the poll loop.
    let pool = init_pool(&config.database_url, args.max_concurrency as u32 + 1).await?;
    let store = JobStore::new(pool);
    store.ensure_schema().await?;

    if args.recover {
        let recovered = store.requeue_interrupted().await?;
        if recovered > 0 {
            tracing::info!(recovered, "re-queued jobs interrupted by a previous run");
        }
    }

    let workers = WorkerPool::new(store, HandlerRegistry::default().into(), config);
    let shutdown = install_shutdown_handler();

    workers.run(shutdown).await;
    Ok(())
}

async fn open_queue(store: &StoreArgs) -> Result<JobQueue, claimq::QueueError> {
    let pool = init_pool(&store.db, 2).await?;
    let store = JobStore::new(pool);
    store.ensure_schema().await?;
    Ok(JobQueue::new(store))
}

async fn run_client(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Submit {
            store,
            job_type,
            payload,
        } => {
            let payload = payload
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .map_err(|e| format!("invalid payload JSON: {e}"))?;
            let job = open_queue(&store).await?.submit(&job_type, payload).await?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        Commands::Get { store, job_id } => match open_queue(&store).await?.get(job_id).await? {
            Some(job) => println!("{}", serde_json::to_string_pretty(&job)?),
            None => {
                eprintln!("Job not found: {job_id}");
                std::process::exit(1);
            }
        },
        Commands::List {
            store,
            status,
            limit,
        } => {
            let status = status.as_deref().map(str::parse::<JobStatus>).transpose()?;
            let jobs = open_queue(&store).await?.list(status, limit).await?;
            println!("{}", serde_json::to_string_pretty(&jobs)?);
        }
        Commands::Cancel { store, job_id } => match open_queue(&store).await?.cancel(job_id).await? {
            Some(job) => println!("{}", serde_json::to_string_pretty(&job)?),
            None => {
                eprintln!("Job not found: {job_id}");
                std::process::exit(1);
            }
        },
        Commands::Serve(_) => unreachable!("handled in main"),
    }
    Ok(())
}
