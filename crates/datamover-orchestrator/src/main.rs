//! datamover: provision and operate DataSync data movers
//!
//! Every command acts on movers owned by `--org`. Commands that touch a
//! target account take `--account`; with a session role configured, each
//! assumes it with the least privilege the command needs.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use datamover_common::MoverCreateRequest;
use datamover_common::defaults::{
    DEFAULT_LOCATION_RETRY_ATTEMPTS, DEFAULT_LOCATION_RETRY_DELAY_SECS, DEFAULT_REGION,
};
use datamover_orchestrator::aws::{AccountId, AwsContext, MemoryCloud, Operation, PermissionSet};
use datamover_orchestrator::config::{
    AwsConfig, Backend, OrchestratorConfig, RetryConfig, SessionConfig, StoreConfig,
};
use datamover_orchestrator::{
    AsyncTask, Backends, MemoryTaskStore, Orchestrator, SqliteTaskStore, TaskStore,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// How often `create` polls its task while streaming progress
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(name = "datamover")]
#[command(about = "Provision and operate DataSync data movers")]
#[command(version)]
struct Args {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(clap::Args, Debug)]
struct GlobalArgs {
    /// Organization that owns the movers
    #[arg(long, env = "DATAMOVER_ORG")]
    org: String,

    /// AWS region
    #[arg(long, env = "AWS_REGION", default_value = DEFAULT_REGION)]
    region: String,

    /// AWS profile to use
    #[arg(long, env = "AWS_PROFILE")]
    aws_profile: Option<String>,

    /// Role assumed in each target account (ambient credentials when unset)
    #[arg(long, env = "DATAMOVER_SESSION_ROLE")]
    session_role_name: Option<String>,

    /// External id presented when assuming the session role
    #[arg(long, env = "DATAMOVER_EXTERNAL_ID")]
    external_id: Option<String>,

    /// Async task database (default: platform data directory)
    #[arg(long, env = "DATAMOVER_STATE_DB")]
    state_db: Option<PathBuf>,

    /// Cloud backend; `memory` is a process-local dry run
    #[arg(long, value_enum, default_value_t = Backend::Aws)]
    backend: Backend,

    /// Attempts at creating a location before giving up
    #[arg(long, default_value_t = DEFAULT_LOCATION_RETRY_ATTEMPTS)]
    location_retry_attempts: usize,

    /// Seconds between location creation attempts
    #[arg(long, default_value_t = DEFAULT_LOCATION_RETRY_DELAY_SECS)]
    location_retry_delay_secs: u64,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

impl From<&GlobalArgs> for OrchestratorConfig {
    fn from(args: &GlobalArgs) -> Self {
        Self {
            org: args.org.clone(),
            backend: args.backend,
            aws: AwsConfig {
                region: args.region.clone(),
                aws_profile: args.aws_profile.clone(),
            },
            session: SessionConfig {
                role_name: args.session_role_name.clone(),
                external_id: args.external_id.clone(),
            },
            retry: RetryConfig {
                attempts: args.location_retry_attempts,
                delay_secs: args.location_retry_delay_secs,
            },
            store: StoreConfig {
                state_db: args.state_db.clone(),
            },
        }
    }
}

/// Identifies one mover
#[derive(clap::Args, Debug)]
struct MoverArgs {
    /// Target AWS account id
    #[arg(long)]
    account: String,

    /// Owning group
    #[arg(long)]
    group: String,

    /// Mover name
    #[arg(long)]
    name: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a mover from a JSON request
    Create {
        /// Target AWS account id
        #[arg(long)]
        account: String,

        /// Owning group
        #[arg(long)]
        group: String,

        /// Path to the create request (JSON)
        #[arg(long)]
        request: PathBuf,

        /// Print the task id instead of streaming progress
        #[arg(long)]
        no_wait: bool,
    },

    /// Delete a mover, its locations and their roles
    Delete(MoverArgs),

    /// Describe a mover
    Describe(MoverArgs),

    /// List movers
    List {
        /// Target AWS account id
        #[arg(long)]
        account: String,

        /// Only movers in this group
        #[arg(long)]
        group: Option<String>,
    },

    /// List a mover's runs
    Runs(MoverArgs),

    /// Describe one run
    RunDescribe {
        #[command(flatten)]
        mover: MoverArgs,

        #[arg(long)]
        run_id: String,
    },

    /// Start a run
    StartRun(MoverArgs),

    /// Stop the current run
    StopRun(MoverArgs),

    /// Show an async task
    TaskStatus {
        #[arg(long)]
        id: String,
    },

    /// Print the session permissions an operation uses
    Policy {
        /// create, delete, read or run
        #[arg(long)]
        operation: Operation,
    },
}

impl Command {
    fn operation(&self) -> Operation {
        match self {
            Command::Create { .. } => Operation::Create,
            Command::Delete(_) => Operation::Delete,
            Command::StartRun(_) | Command::StopRun(_) => Operation::Run,
            Command::Describe(_)
            | Command::List { .. }
            | Command::Runs(_)
            | Command::RunDescribe { .. }
            | Command::TaskStatus { .. }
            | Command::Policy { .. } => Operation::Read,
        }
    }

    fn account(&self) -> Option<&str> {
        match self {
            Command::Create { account, .. } | Command::List { account, .. } => Some(account.as_str()),
            Command::Delete(m)
            | Command::Describe(m)
            | Command::Runs(m)
            | Command::StartRun(m)
            | Command::StopRun(m)
            | Command::RunDescribe { mover: m, .. } => Some(m.account.as_str()),
            Command::TaskStatus { .. } | Command::Policy { .. } => None,
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,aws_config=warn,aws_smithy_runtime=warn,hyper=warn")
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.global.log_format);

    let config = OrchestratorConfig::from(&args.global);
    debug!(?config, "Loaded configuration");

    match args.command {
        Command::Policy { operation } => {
            let permissions = PermissionSet::for_operation(operation, &config.org);
            print_json(&serde_json::json!({
                "PolicyArns": permissions.policy_arns,
                "Policy": permissions.inline_policy,
            }))
        }

        Command::TaskStatus { id } => {
            let store = open_store(&config).await?;
            let task = store
                .get(&id)
                .await?
                .with_context(|| format!("task {id} not found"))?;
            print_json(&task)
        }

        command => {
            let operation = command.operation();
            let account = command
                .account()
                .context("command requires --account")?;

            let shutdown = CancellationToken::new();
            let orchestrator = connect(&config, account, operation, shutdown.clone()).await?;
            spawn_interrupt_handler(shutdown);

            execute(&orchestrator, command).await
        }
    }
}

async fn open_store(config: &OrchestratorConfig) -> Result<Arc<dyn TaskStore>> {
    match config.backend {
        Backend::Memory => Ok(Arc::new(MemoryTaskStore::new())),
        Backend::Aws => {
            let path = config.store.db_path()?;
            debug!(path = %path.display(), "Opening task database");
            Ok(Arc::new(SqliteTaskStore::open(&path).await?))
        }
    }
}

async fn connect(
    config: &OrchestratorConfig,
    account: &str,
    operation: Operation,
    shutdown: CancellationToken,
) -> Result<Orchestrator> {
    let account = AccountId::parse(account)?;
    let store = open_store(config).await?;

    let orchestrator = match config.backend {
        Backend::Memory => {
            info!("Using in-memory backend, nothing is provisioned");
            Orchestrator::new(&config.org, Backends::memory(Arc::new(MemoryCloud::new())), store)
        }
        Backend::Aws => {
            let aws = AwsContext::new(config.region(), config.aws_profile()).await;
            let session = config.session.params(operation, &account, &config.org)?;
            info!(account = %account, operation = %operation, region = %config.region(), "Connecting");
            Orchestrator::connect(&aws, session.as_ref(), &config.org, store).await?
        }
    };

    Ok(orchestrator
        .with_retry(config.retry.policy())
        .with_shutdown(shutdown))
}

/// Roll back in-flight creates on Ctrl-C.
fn spawn_interrupt_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight work");
            shutdown.cancel();
        }
    });
}

async fn execute(orchestrator: &Orchestrator, command: Command) -> Result<()> {
    match command {
        Command::Create {
            group,
            request,
            no_wait,
            ..
        } => {
            let body = std::fs::read_to_string(&request)
                .with_context(|| format!("Failed to read {}", request.display()))?;
            let request: MoverCreateRequest = serde_json::from_str(&body)
                .with_context(|| format!("Invalid create request in {}", request.display()))?;

            let task = orchestrator.create(&group, request).await?;
            let task = if no_wait {
                print_json(&serde_json::json!({ "TaskId": task.id }))?;
                orchestrator.wait_for_background().await;
                orchestrator.task_status(&task.id).await?
            } else {
                stream_task(orchestrator, &task.id).await?
            };
            print_json(&task)?;

            if let Some(failure) = task.failure {
                bail!("create failed: {failure}");
            }
            Ok(())
        }

        Command::Delete(m) => {
            orchestrator.delete(&m.group, &m.name).await?;
            print_json(&serde_json::json!({ "Deleted": m.name }))
        }

        Command::Describe(m) => print_json(&orchestrator.describe(&m.group, &m.name).await?),

        Command::List { group, .. } => {
            print_json(&orchestrator.list(group.as_deref().unwrap_or_default()).await?)
        }

        Command::Runs(m) => print_json(&orchestrator.run_list(&m.group, &m.name).await?),

        Command::RunDescribe { mover, run_id } => print_json(
            &orchestrator
                .run_describe(&mover.group, &mover.name, &run_id)
                .await?,
        ),

        Command::StartRun(m) => {
            let run_id = orchestrator.start_run(&m.group, &m.name).await?;
            print_json(&serde_json::json!({ "RunId": run_id }))
        }

        Command::StopRun(m) => {
            orchestrator.stop_run(&m.group, &m.name).await?;
            print_json(&serde_json::json!({ "Stopped": m.name }))
        }

        Command::TaskStatus { .. } | Command::Policy { .. } => Ok(()),
    }
}

/// Print a task's progress messages until it reaches a terminal state.
async fn stream_task(orchestrator: &Orchestrator, id: &str) -> Result<AsyncTask> {
    let mut printed = 0;
    loop {
        let task = orchestrator.task_status(id).await?;
        for event in task.events.iter().skip(printed) {
            eprintln!("[{}] {}", event.at.format("%H:%M:%S"), event.message);
        }
        printed = task.events.len();

        if task.state.is_terminal() {
            orchestrator.wait_for_background().await;
            return Ok(task);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
