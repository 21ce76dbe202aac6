//! Operator command line for the tenant port pool.
//!
//! Usage:
//!
//! ```text
//! port_admin [--admin <uuid>] <command> [options]
//! ```
//!
//! Configuration is read from `KARYALAY_PORTS_*` environment variables (see
//! [`karyalay_ports::config`]). Results are printed as JSON. Log output is
//! controlled with `RUST_LOG` and defaults to `info`.

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use eyre::{Result, WrapErr};
use karyalay_ports::allocation::{
    adapters::postgres::{AllocationPgPool, PostgresPortStore, PostgresSubscriptionDirectory},
    domain::{
        AdminUserId, AllocationAction, CustomerId, LogFilter, PlanId, PortFilter, PortId,
        PortStatus, Principal, SubscriptionId,
    },
    services::{
        AllocationLogService, AllocationPreference, PortAllocationService, PortDetailsRequest,
        PortRegistryService,
    },
};
use karyalay_ports::config::AllocatorConfig;
use mockable::DefaultClock;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Manage the tenant port pool.
#[derive(Debug, Parser)]
#[command(name = "port_admin", version, subcommand_required = true)]
struct Cli {
    /// Administrator performing mutations; omitted means a system action.
    #[arg(long, global = true, env = "KARYALAY_PORTS_ADMIN_ID")]
    admin: Option<AdminUserId>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List ports, newest first
    List(ListArgs),
    /// Show per-status totals
    Counts,
    /// Add a port to the pool
    Create(DetailsArgs),
    /// Add ports from a JSON array of port details
    Import {
        /// File holding the JSON array.
        path: PathBuf,
    },
    /// Edit the descriptive fields of a port
    Update {
        /// Port to edit.
        port: PortId,
        #[command(flatten)]
        details: DetailsArgs,
    },
    /// Remove an unassigned port from the pool
    Delete {
        /// Port to remove.
        port: PortId,
    },
    /// Bind a port to a subscription
    Assign {
        /// Port to assign.
        port: PortId,
        /// Subscription receiving the port.
        subscription: SubscriptionId,
        #[command(flatten)]
        notes: NotesArg,
    },
    /// Bind the oldest available port to a subscription
    Allocate {
        /// Subscription receiving a port.
        subscription: SubscriptionId,
        /// Only consider ports in this region.
        #[arg(long)]
        region: Option<String>,
    },
    /// Return an assigned port to the pool
    Release(TransitionArgs),
    /// Release the port held by an ended subscription
    Unassign {
        /// Subscription that ended.
        subscription: SubscriptionId,
        #[command(flatten)]
        notes: NotesArg,
    },
    /// Hold an available port
    Reserve(TransitionArgs),
    /// Drop a hold on a reserved port
    MakeAvailable(TransitionArgs),
    /// Take a port out of service
    Disable(TransitionArgs),
    /// Return a disabled port to the pool
    Enable(TransitionArgs),
    /// Query the allocation log, newest first
    Logs(LogArgs),
    /// List the actions present in the allocation log
    Actions {
        /// Print every known action instead of those recorded.
        #[arg(long)]
        all: bool,
    },
    /// Delete allocation log entries recorded before a timestamp
    Purge {
        /// RFC 3339 cutoff, e.g. `2024-01-01T00:00:00Z`.
        #[arg(long)]
        before: DateTime<Utc>,
    },
}

#[derive(Debug, Args)]
struct NotesArg {
    /// Justification stored with the log entry.
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Debug, Args)]
struct TransitionArgs {
    /// Port to transition.
    port: PortId,
    #[command(flatten)]
    notes: NotesArg,
}

#[derive(Debug, Args)]
struct PageArg {
    /// 1-based page number.
    #[arg(long, default_value_t = 1)]
    page: u64,
}

#[derive(Debug, Args)]
struct ListArgs {
    /// Only ports in this status.
    #[arg(long, value_parser = parse_status)]
    status: Option<PortStatus>,
    /// Case-insensitive match on URL, database host, database name or notes.
    #[arg(long)]
    search: Option<String>,
    #[command(flatten)]
    page: PageArg,
}

#[derive(Debug, Args)]
struct DetailsArgs {
    /// Instance URL.
    #[arg(long)]
    url: String,
    /// Database host.
    #[arg(long)]
    db_host: Option<String>,
    /// Database name.
    #[arg(long)]
    db_name: Option<String>,
    /// Hosting region.
    #[arg(long)]
    region: Option<String>,
    /// Administrator notes.
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Debug, Args)]
struct LogArgs {
    /// Only entries with this action.
    #[arg(long, value_parser = parse_action)]
    action: Option<AllocationAction>,
    /// Only entries for this plan.
    #[arg(long)]
    plan: Option<PlanId>,
    /// Only entries for this customer.
    #[arg(long)]
    customer: Option<CustomerId>,
    /// Only entries for this port.
    #[arg(long)]
    port: Option<PortId>,
    /// First day to include (UTC, inclusive).
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last day to include (UTC, inclusive).
    #[arg(long)]
    to: Option<NaiveDate>,
    /// Case-insensitive match on notes or the port's instance URL.
    #[arg(long)]
    search: Option<String>,
    #[command(flatten)]
    page: PageArg,
}

impl DetailsArgs {
    fn into_request(self) -> PortDetailsRequest {
        let Self {
            url,
            db_host,
            db_name,
            region,
            notes,
        } = self;
        let mut request = PortDetailsRequest::new(url);
        if let Some(host) = db_host {
            request = request.with_db_host(host);
        }
        if let Some(name) = db_name {
            request = request.with_db_name(name);
        }
        if let Some(server_region) = region {
            request = request.with_server_region(server_region);
        }
        if let Some(text) = notes {
            request = request.with_notes(text);
        }
        request
    }
}

impl LogArgs {
    fn filter(&self) -> LogFilter {
        let mut filter = LogFilter::new();
        if let Some(action) = self.action {
            filter = filter.with_action(action);
        }
        if let Some(plan_id) = self.plan {
            filter = filter.with_plan(plan_id);
        }
        if let Some(customer_id) = self.customer {
            filter = filter.with_customer(customer_id);
        }
        if let Some(port_id) = self.port {
            filter = filter.with_port(port_id);
        }
        if let Some(date) = self.from {
            filter = filter.with_date_from(date);
        }
        if let Some(date) = self.to {
            filter = filter.with_date_to(date);
        }
        if let Some(search) = &self.search {
            filter = filter.with_search(search.as_str());
        }
        filter
    }
}

type Store = PostgresPortStore;
type Directory = PostgresSubscriptionDirectory;

struct Services {
    registry: PortRegistryService<Store, DefaultClock>,
    allocation: PortAllocationService<Store, Directory, DefaultClock>,
    log: AllocationLogService<Store, Directory>,
}

impl Services {
    fn new(pool: AllocationPgPool, config: &AllocatorConfig) -> Self {
        let store = Arc::new(PostgresPortStore::new(pool.clone()));
        let directory = Arc::new(PostgresSubscriptionDirectory::new(pool));
        let clock = Arc::new(DefaultClock);
        Self {
            registry: PortRegistryService::new(Arc::clone(&store), Arc::clone(&clock)),
            allocation: PortAllocationService::new(
                Arc::clone(&store),
                Arc::clone(&directory),
                clock,
            )
            .with_allocation_attempts(config.allocation_attempts),
            log: AllocationLogService::new(store, directory),
        }
    }
}

#[derive(Serialize)]
struct ImportSummary {
    created: Vec<PortId>,
    rejected: Vec<RejectedRow>,
}

#[derive(Serialize)]
struct RejectedRow {
    index: usize,
    kind: &'static str,
    error: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AllocatorConfig::from_env()?;
    tracing::debug!(?config, "configuration loaded");

    let pool = connect(&config).await?;
    let services = Services::new(pool, &config);
    let principal = Principal::from_performed_by(cli.admin);

    run(cli.command, &services, &config, principal).await
}

async fn connect(config: &AllocatorConfig) -> Result<AllocationPgPool> {
    let manager = ConnectionManager::<PgConnection>::new(config.database_url.as_str());
    let max_size = config.pool_max_size;
    let pool =
        tokio::task::spawn_blocking(move || Pool::builder().max_size(max_size).build(manager))
            .await
            .wrap_err("database pool setup was interrupted")?
            .wrap_err("failed to connect to the port database")?;
    Ok(pool)
}

async fn run(
    command: Command,
    services: &Services,
    config: &AllocatorConfig,
    principal: Principal,
) -> Result<()> {
    match command {
        Command::List(args) => list(services, config, args).await,
        Command::Counts => emit(&services.registry.status_counts().await?),
        Command::Create(details) => emit(
            &services
                .registry
                .create(details.into_request(), principal)
                .await?,
        ),
        Command::Import { path } => import(services, path, principal).await,
        Command::Update { port, details } => emit(
            &services
                .registry
                .update_details(port, details.into_request(), principal)
                .await?,
        ),
        Command::Delete { port } => {
            services.registry.delete(port, principal).await?;
            emit(&port)
        }
        Command::Assign {
            port,
            subscription,
            notes,
        } => emit(
            &services
                .allocation
                .assign(port, subscription, principal, notes.notes)
                .await?,
        ),
        Command::Allocate {
            subscription,
            region,
        } => {
            let preference = region.map_or_else(AllocationPreference::any, |name| {
                AllocationPreference::any().with_region(name)
            });
            emit(
                &services
                    .allocation
                    .allocate(subscription, principal, preference)
                    .await?,
            )
        }
        Command::Release(args) => emit(
            &services
                .allocation
                .release(args.port, principal, args.notes.notes)
                .await?,
        ),
        Command::Unassign {
            subscription,
            notes,
        } => emit(
            &services
                .allocation
                .unassign_subscription(subscription, notes.notes)
                .await?,
        ),
        Command::Reserve(args) => emit(
            &services
                .allocation
                .reserve(args.port, principal, args.notes.notes)
                .await?,
        ),
        Command::MakeAvailable(args) => emit(
            &services
                .allocation
                .make_available(args.port, principal, args.notes.notes)
                .await?,
        ),
        Command::Disable(args) => emit(
            &services
                .allocation
                .disable(args.port, principal, args.notes.notes)
                .await?,
        ),
        Command::Enable(args) => emit(
            &services
                .allocation
                .enable(args.port, principal, args.notes.notes)
                .await?,
        ),
        Command::Logs(args) => {
            let page = config.page_request(args.page.page)?;
            emit(&services.log.query(&args.filter(), page).await?)
        }
        Command::Actions { all: true } => emit(&AllocationAction::ALL),
        Command::Actions { all: false } => emit(&services.log.distinct_actions().await?),
        Command::Purge { before } => emit(&services.log.purge_before(before).await?),
    }
}

async fn list(services: &Services, config: &AllocatorConfig, args: ListArgs) -> Result<()> {
    let mut filter = PortFilter::new();
    if let Some(status) = args.status {
        filter = filter.with_status(status);
    }
    if let Some(search) = args.search {
        filter = filter.with_search(search);
    }
    let page = config.page_request(args.page.page)?;
    emit(&services.registry.list(&filter, page).await?)
}

async fn import(services: &Services, path: PathBuf, principal: Principal) -> Result<()> {
    let requests = load_import(path).await?;
    let report = services.registry.import(requests, principal).await;
    emit(&ImportSummary {
        created: report.created.iter().map(|port| port.id()).collect(),
        rejected: report
            .rejected
            .into_iter()
            .map(|row| RejectedRow {
                index: row.index,
                kind: row.error.kind().as_str(),
                error: row.error.to_string(),
            })
            .collect(),
    })
}

/// Reads and parses an import file on the blocking pool.
async fn load_import(path: PathBuf) -> Result<Vec<PortDetailsRequest>> {
    tokio::task::spawn_blocking(move || {
        let raw = std::fs::read_to_string(&path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&raw).wrap_err("import file must be a JSON array")
    })
    .await
    .wrap_err("import file read was interrupted")?
}

#[expect(clippy::print_stdout, reason = "command output is written to stdout")]
fn emit(value: &impl Serialize) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).wrap_err("failed to render output")?;
    println!("{rendered}");
    Ok(())
}

fn parse_status(value: &str) -> Result<PortStatus, String> {
    PortStatus::try_from(value).map_err(|err| err.to_string())
}

fn parse_action(value: &str) -> Result<AllocationAction, String> {
    AllocationAction::try_from(value).map_err(|err| err.to_string())
}
