// crates/ontocore-cli/src/main.rs
// ============================================================================
// Crate: ontocore-cli
// Description: Administrative command-line surface over the identity &
//              ontology core, exercising the same engine and store crates
//              `ontocore-api` wires onto HTTP.
// Purpose: Give an operator or script a direct, scriptable path to every
//          mutating and read-only operation in §4 and §6, without standing
//          up a server.
// Dependencies: clap, ontocore-api, ontocore-config, ontocore-core,
//               ontocore-engine, ontocore-store-sqlite, ontocore-sync,
//               serde_json, tokio, tracing
// ============================================================================

//! ## Overview
//! Every subcommand opens its own [`SqliteLedgerStore`] against the
//! configured ledger path and calls straight into `ontocore-engine`; there
//! is no HTTP round-trip. Because each invocation is a short-lived process,
//! the in-process [`InProcessLockManager`] and [`InMemoryAuditLog`] wired up
//! here serialize nothing across invocations — concurrent writers still
//! serialize through SQLite's own busy-timeout, the same as any other
//! client of the ledger database. `serve` is the one subcommand that keeps
//! those handles alive for the process's lifetime, where they do their
//! real job of arbitrating concurrent HTTP requests.

use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use ontocore_api::AppState;
use ontocore_config::OntocoreConfig;
use ontocore_core::error::OntoError;
use ontocore_core::identifiers::CandidateId;
use ontocore_core::identifiers::FragmentId;
use ontocore_core::identifiers::IdempotencyKey;
use ontocore_core::identifiers::ProjectId;
use ontocore_core::interfaces::AdvisoryLockManager;
use ontocore_core::interfaces::Clock;
use ontocore_core::interfaces::GraphProjector;
use ontocore_core::interfaces::LedgerStore;
use ontocore_core::interfaces::SystemClock;
use ontocore_core::model::AxialRelationType;
use ontocore_core::model::AxialRow;
use ontocore_core::model::AxialState;
use ontocore_core::model::CandidateSource;
use ontocore_core::model::CandidateState;
use ontocore_core::model::CatalogStatus;
use ontocore_engine::freeze::FreezeController;
use ontocore_engine::lifecycle::CandidateLifecycleEngine;
use ontocore_engine::lifecycle::MergeIdsRequest;
use ontocore_engine::lifecycle::MergePair;
use ontocore_engine::lifecycle::MergePairsRequest;
use ontocore_engine::lifecycle::PromoteRequest;
use ontocore_engine::readiness::compute_readiness;
use ontocore_engine::repair::repair_cycles;
use ontocore_engine::resolver::CatalogIndex;
use ontocore_sync::HttpGraphProjector;
use ontocore_sync::RetryPolicy;
use ontocore_sync::SqliteSyncStateStore;
use ontocore_sync::SyncEntityKind;
use ontocore_sync::SyncRunner;
use ontocore_sync::SyncStateStore;
use ontocore_store_sqlite::InProcessLockManager;
use ontocore_store_sqlite::SqliteLedgerStore;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Surface
// ============================================================================

/// Administrative CLI for the identity & ontology core.
#[derive(Debug, Parser)]
#[command(name = "ontocore", disable_help_subcommand = true)]
struct Cli {
    /// Path to the TOML config file (defaults to `ontocore.toml` or the
    /// `ONTOCORE_CONFIG` environment override).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Runs the HTTP admin server until terminated.
    Serve,
    /// Reports the axial-readiness verdict for a project.
    Readiness(ProjectArg),
    /// Freeze-gate operations (§4.3).
    Freeze {
        #[command(subcommand)]
        command: FreezeCommand,
    },
    /// Candidate-lifecycle operations (§4.2).
    Candidates {
        #[command(subcommand)]
        command: CandidatesCommand,
    },
    /// Axial-relation operations (§4.4).
    Axial {
        #[command(subcommand)]
        command: AxialCommand,
    },
    /// Graph-projection operations (§4.6).
    Sync {
        #[command(subcommand)]
        command: SyncCommand,
    },
    /// Canonical-chain maintenance (§4.5, §8 P3).
    Repair {
        #[command(subcommand)]
        command: RepairCommand,
    },
    /// Lists the project's append-only version history (§3 "Audit Version").
    History(HistoryArgs),
}

/// Shared `--project` argument.
#[derive(Debug, Args)]
struct ProjectArg {
    /// Project identifier.
    #[arg(long)]
    project: u64,
}

#[derive(Debug, Subcommand)]
enum FreezeCommand {
    /// Reports the current freeze state.
    Get(ProjectArg),
    /// Engages the freeze, inhibiting ontology-mutating maintenance.
    Set(FreezeSetArgs),
    /// Lifts a previously engaged freeze.
    Break(FreezeSetArgs),
}

#[derive(Debug, Args)]
struct FreezeSetArgs {
    #[command(flatten)]
    project: ProjectArg,
    /// Identity of the actor performing the change.
    #[arg(long)]
    actor: String,
    /// Optional free-text annotation.
    #[arg(long)]
    note: Option<String>,
}

#[derive(Debug, Subcommand)]
enum CandidatesCommand {
    /// Checks proposed labels for near-duplicate existing candidates/codes.
    CheckBatch(CheckBatchArgs),
    /// Submits a new candidate.
    Submit(SubmitArgs),
    /// Validates a pending candidate.
    Validate(TransitionArgs),
    /// Rejects a pending candidate.
    Reject(TransitionArgs),
    /// Promotes a validated candidate into the catalog.
    Promote(PromoteArgs),
    /// Merges one or more candidates/codes into a single target label.
    Merge(MergeArgs),
    /// Merges several independent (source, target) label pairs in one call.
    AutoMerge(AutoMergeArgs),
}

#[derive(Debug, Args)]
struct CheckBatchArgs {
    #[command(flatten)]
    project: ProjectArg,
    /// Proposed labels to check, one per occurrence of this flag.
    #[arg(long = "label", required = true)]
    labels: Vec<String>,
}

#[derive(Debug, Args)]
struct SubmitArgs {
    #[command(flatten)]
    project: ProjectArg,
    /// Proposed label.
    #[arg(long)]
    codigo: String,
    /// Supporting fragment, when known.
    #[arg(long)]
    fragment_id: Option<String>,
    /// Producer of this candidate: manual, llm, discovery, semantic, legacy.
    #[arg(long, default_value = "manual")]
    source: String,
    /// Producer confidence in `[0, 1]`.
    #[arg(long, default_value_t = 1.0)]
    confidence: f64,
    /// Optional free-text annotation.
    #[arg(long)]
    memo: Option<String>,
}

#[derive(Debug, Args)]
struct TransitionArgs {
    #[command(flatten)]
    project: ProjectArg,
    /// Candidate identifier.
    #[arg(long)]
    id: u64,
    /// Identity of the actor performing the change.
    #[arg(long)]
    actor: String,
    /// Optional free-text annotation.
    #[arg(long)]
    memo: Option<String>,
}

#[derive(Debug, Args)]
struct PromoteArgs {
    #[command(flatten)]
    project: ProjectArg,
    /// Candidate identifier.
    #[arg(long)]
    id: u64,
    /// Verbatim extract grounding the new assignment, capped at 60 words.
    #[arg(long)]
    cita: String,
    /// Originating source file, for provenance.
    #[arg(long)]
    source_file: Option<String>,
    /// Identity of the actor performing the promotion.
    #[arg(long)]
    actor: String,
}

#[derive(Debug, Args)]
struct MergeArgs {
    #[command(flatten)]
    project: ProjectArg,
    /// Source candidate identifiers to merge, one per occurrence.
    #[arg(long = "source-id", required = true)]
    source_ids: Vec<u64>,
    /// Destination label; created if it does not already exist.
    #[arg(long)]
    target_codigo: String,
    /// Optional free-text annotation.
    #[arg(long)]
    memo: Option<String>,
    /// Reports the merge plan without writing it.
    #[arg(long)]
    dry_run: bool,
    /// Confirms the write (required unless `--dry-run` is given).
    #[arg(long)]
    confirm: bool,
    /// Identity of the actor performing the merge.
    #[arg(long)]
    actor: String,
    /// Idempotency key for safe retry of an identical request.
    #[arg(long)]
    idempotency_key: Option<String>,
}

#[derive(Debug, Args)]
struct AutoMergeArgs {
    #[command(flatten)]
    project: ProjectArg,
    /// A `source_codigo:target_codigo` pair; repeat for each pair to merge.
    #[arg(long = "pair", required = true)]
    pairs: Vec<String>,
    /// Optional free-text annotation.
    #[arg(long)]
    memo: Option<String>,
    /// Reports the merge plan without writing it.
    #[arg(long)]
    dry_run: bool,
    /// Confirms the write (required unless `--dry-run` is given).
    #[arg(long)]
    confirm: bool,
    /// Identity of the actor performing the merge.
    #[arg(long)]
    actor: String,
    /// Idempotency key for safe retry of an identical request.
    #[arg(long)]
    idempotency_key: Option<String>,
}

#[derive(Debug, Subcommand)]
enum AxialCommand {
    /// Records a category-to-code axial relation.
    Create(AxialCreateArgs),
}

#[derive(Debug, Args)]
struct AxialCreateArgs {
    #[command(flatten)]
    project: ProjectArg,
    /// Category label.
    #[arg(long)]
    categoria: String,
    /// Catalogued code label.
    #[arg(long)]
    codigo: String,
    /// Relation type: cause, condition, consequence, part_of.
    #[arg(long)]
    relation: String,
    /// Optional free-text annotation.
    #[arg(long)]
    memo: Option<String>,
    /// Supporting fragment id; at least two are required.
    #[arg(long = "evidence", required = true)]
    evidence: Vec<String>,
    /// Reports the relation that would be written without writing it.
    #[arg(long)]
    dry_run: bool,
    /// Confirms the write (required unless `--dry-run` is given).
    #[arg(long)]
    confirm: bool,
}

#[derive(Debug, Subcommand)]
enum SyncCommand {
    /// Projects due fragments, codes and axial relations to the graph store.
    Fragments(SyncArgs),
    /// Alias for `sync fragments`: one pass covers all three kinds (§4.6).
    Axial(SyncArgs),
    /// Placeholder: no prediction-projection pipeline exists in this core.
    Predictions(SyncArgs),
}

#[derive(Debug, Args)]
struct SyncArgs {
    #[command(flatten)]
    project: ProjectArg,
    /// Reports what is due for projection without running the projector.
    #[arg(long)]
    dry_run: bool,
    /// Confirms the run (required unless `--dry-run` is given).
    #[arg(long)]
    confirm: bool,
}

#[derive(Debug, Subcommand)]
enum RepairCommand {
    /// Breaks every non-trivial canonical-chain cycle in the catalog.
    Cycles(RepairCyclesArgs),
}

#[derive(Debug, Args)]
struct RepairCyclesArgs {
    #[command(flatten)]
    project: ProjectArg,
    /// Reports the cycles found and their planned survivor without writing.
    #[arg(long)]
    dry_run: bool,
    /// Identity of the actor performing the repair.
    #[arg(long)]
    actor: String,
}

#[derive(Debug, Args)]
struct HistoryArgs {
    #[command(flatten)]
    project: ProjectArg,
    /// Maximum number of events to return, most recent first.
    #[arg(long, default_value_t = 50)]
    limit: usize,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    message: String,
}

impl CliError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<OntoError> for CliError {
    fn from(err: OntoError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<ontocore_config::ConfigError> for CliError {
    fn from(err: ontocore_config::ConfigError) -> Self {
        Self::new(format!("config error: {err}"))
    }
}

type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = Arc::new(OntocoreConfig::load(cli.config.as_deref())?);

    match cli.command {
        Commands::Serve => command_serve(config).await,
        Commands::Readiness(args) => command_readiness(&config, args),
        Commands::Freeze {
            command,
        } => command_freeze(&config, command),
        Commands::Candidates {
            command,
        } => command_candidates(&config, command),
        Commands::Axial {
            command,
        } => command_axial(&config, command),
        Commands::Sync {
            command,
        } => command_sync(&config, command).await,
        Commands::Repair {
            command,
        } => command_repair(&config, command),
        Commands::History(args) => command_history(&config, &args),
    }
}

// ============================================================================
// SECTION: Runtime Wiring
// ============================================================================

/// Opens the ledger store named by `config`.
fn open_store(config: &OntocoreConfig) -> CliResult<SqliteLedgerStore> {
    SqliteLedgerStore::open(&config.ledger).map_err(|err| CliError::new(err.to_string()))
}

/// Derives the sync-state database path as a sibling of the ledger database.
fn sync_state_path(config: &OntocoreConfig) -> PathBuf {
    let parent = config.ledger.path.parent().filter(|parent| !parent.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    parent.join("ontocore-sync-state.sqlite3")
}

fn project_id(raw: u64) -> CliResult<ProjectId> {
    ProjectId::from_raw(raw).ok_or_else(|| CliError::new("project id must be non-zero"))
}

fn print_json(value: &impl Serialize) -> CliResult<()> {
    let rendered = serde_json::to_string_pretty(value).map_err(|err| CliError::new(format!("failed to render output: {err}")))?;
    println!("{rendered}");
    Ok(())
}

fn parse_enum<T: serde::de::DeserializeOwned>(field: &str, raw: &str) -> CliResult<T> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| CliError::new(format!("invalid value '{raw}' for {field}")))
}

/// Enforces the shared dry-run/confirm discipline every mutating command
/// follows (§4.7): a write must pass `--confirm` unless it is also a dry run.
fn require_confirm(dry_run: bool, confirm: bool) -> CliResult<()> {
    if dry_run || confirm {
        Ok(())
    } else {
        Err(CliError::new("refusing to write without --confirm (pass --dry-run to preview instead)"))
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

async fn command_serve(config: Arc<OntocoreConfig>) -> CliResult<()> {
    let store = Arc::new(open_store(&config)?);
    let locks: Arc<dyn AdvisoryLockManager> = Arc::new(InProcessLockManager::default());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let projector: Arc<dyn GraphProjector> = Arc::new(HttpGraphProjector::new(&config.graph_store)?);
    let sync_state = Arc::new(SqliteSyncStateStore::open(&sync_state_path(&config))?);

    let bind_addr = config.server.bind_addr.clone();
    let state = AppState::new(store as Arc<dyn LedgerStore>, locks, clock, config, projector, sync_state);
    ontocore_api::serve(state, &bind_addr).await.map_err(|err| CliError::new(format!("server error: {err}")))
}

// ============================================================================
// SECTION: Readiness Command
// ============================================================================

fn command_readiness(config: &OntocoreConfig, args: ProjectArg) -> CliResult<()> {
    let store = open_store(config)?;
    let project = project_id(args.project)?;
    let inputs = store.readiness_inputs(project)?;
    let readiness = compute_readiness(&inputs, config.readiness_max_hops);
    print_json(&readiness)
}

// ============================================================================
// SECTION: Freeze Commands
// ============================================================================

fn command_freeze(config: &OntocoreConfig, command: FreezeCommand) -> CliResult<()> {
    let store = open_store(config)?;
    let clock = SystemClock;
    let controller = FreezeController::new(&store, &clock);
    let row = match command {
        FreezeCommand::Get(args) => controller.get(project_id(args.project)?)?,
        FreezeCommand::Set(args) => {
            let project = project_id(args.project.project)?;
            controller.freeze(project, &args.actor, args.note.as_deref())?
        }
        FreezeCommand::Break(args) => {
            let project = project_id(args.project.project)?;
            controller.unfreeze(project, &args.actor, args.note.as_deref())?
        }
    };
    print_json(&row)
}

// ============================================================================
// SECTION: Candidate Commands
// ============================================================================

fn command_candidates(config: &OntocoreConfig, command: CandidatesCommand) -> CliResult<()> {
    let store = open_store(config)?;
    let clock = SystemClock;
    let engine = CandidateLifecycleEngine::new(&store, &clock, config.allow_catalog_row_merge);

    match command {
        CandidatesCommand::CheckBatch(args) => {
            let project = project_id(args.project.project)?;
            print_json(&engine.check_batch(project, &args.labels)?)
        }
        CandidatesCommand::Submit(args) => {
            let project = project_id(args.project.project)?;
            let source: CandidateSource = parse_enum("source", &args.source)?;
            let fragment_id = args.fragment_id.map(FragmentId::new);
            let row = engine.submit(project, &args.codigo, fragment_id, source, args.confidence, args.memo)?;
            print_json(&row)
        }
        CandidatesCommand::Validate(args) => candidate_transition(&engine, args, CandidateState::Validated),
        CandidatesCommand::Reject(args) => candidate_transition(&engine, args, CandidateState::Rejected),
        CandidatesCommand::Promote(args) => {
            let project = project_id(args.project.project)?;
            let candidate_id = CandidateId::from_raw(args.id).ok_or_else(|| CliError::new("candidate id must be non-zero"))?;
            let (catalog, assignment) = engine.promote(PromoteRequest {
                project_id: project,
                candidate_id,
                cita: &args.cita,
                source_file: args.source_file.as_deref(),
                actor: &args.actor,
            })?;
            print_json(&serde_json::json!({ "catalog": catalog, "assignment": assignment }))
        }
        CandidatesCommand::Merge(args) => command_merge(&engine, config, args),
        CandidatesCommand::AutoMerge(args) => command_auto_merge(&engine, config, args),
    }
}

fn candidate_transition(engine: &CandidateLifecycleEngine<'_>, args: TransitionArgs, new_state: CandidateState) -> CliResult<()> {
    let project = project_id(args.project.project)?;
    let candidate_id = CandidateId::from_raw(args.id).ok_or_else(|| CliError::new("candidate id must be non-zero"))?;
    let row = engine.transition(project, candidate_id, new_state, &args.actor, args.memo.as_deref())?;
    print_json(&row)
}

fn command_merge(engine: &CandidateLifecycleEngine<'_>, config: &OntocoreConfig, args: MergeArgs) -> CliResult<()> {
    require_confirm(args.dry_run, args.confirm)?;
    let project = project_id(args.project.project)?;
    let source_ids = args
        .source_ids
        .iter()
        .map(|raw| CandidateId::from_raw(*raw).ok_or_else(|| CliError::new("candidate id must be non-zero")))
        .collect::<CliResult<Vec<_>>>()?;
    let idempotency_key = args.idempotency_key.map(IdempotencyKey::new);
    let result = engine.merge_ids(MergeIdsRequest {
        project_id: project,
        source_ids: &source_ids,
        target_codigo: &args.target_codigo,
        memo: args.memo.as_deref(),
        dry_run: args.dry_run,
        idempotency_key: idempotency_key.as_ref(),
        idempotency_ttl_secs: config.idempotency_ttl_secs,
        actor: &args.actor,
    })?;
    print_json(&result)
}

fn command_auto_merge(engine: &CandidateLifecycleEngine<'_>, config: &OntocoreConfig, args: AutoMergeArgs) -> CliResult<()> {
    require_confirm(args.dry_run, args.confirm)?;
    let project = project_id(args.project.project)?;
    let pairs = args
        .pairs
        .iter()
        .map(|raw| {
            let (source_codigo, target_codigo) = raw
                .split_once(':')
                .ok_or_else(|| CliError::new(format!("pair '{raw}' must be 'source_codigo:target_codigo'")))?;
            Ok(MergePair {
                source_codigo: source_codigo.to_string(),
                target_codigo: target_codigo.to_string(),
            })
        })
        .collect::<CliResult<Vec<_>>>()?;
    let idempotency_key = args.idempotency_key.map(IdempotencyKey::new);
    let results = engine.merge_pairs(MergePairsRequest {
        project_id: project,
        pairs: &pairs,
        memo: args.memo.as_deref(),
        dry_run: args.dry_run,
        idempotency_key: idempotency_key.as_ref(),
        idempotency_ttl_secs: config.idempotency_ttl_secs,
        actor: &args.actor,
    })?;
    print_json(&results)
}

// ============================================================================
// SECTION: Axial Command
// ============================================================================

/// Minimum supporting fragments an axial relation must cite (§3 "Axial Relation").
const MIN_EVIDENCE: usize = 2;

fn command_axial(config: &OntocoreConfig, command: AxialCommand) -> CliResult<()> {
    let AxialCommand::Create(args) = command;
    require_confirm(args.dry_run, args.confirm)?;
    if args.evidence.len() < MIN_EVIDENCE {
        return Err(CliError::new(format!("axial relations require at least {MIN_EVIDENCE} supporting fragments")));
    }

    let store = open_store(config)?;
    let project = project_id(args.project.project)?;
    let relation: AxialRelationType = parse_enum("relation", &args.relation)?;

    let rows = store.list_catalog_rows(project)?;
    let index = CatalogIndex::build(&rows);
    let raw_code_id = index
        .code_id_of_label(&args.codigo)
        .ok_or_else(|| CliError::new(format!("code '{}' is not catalogued in project {}", args.codigo, args.project.project)))?;
    let code_id = index
        .resolve_canonical(raw_code_id, config.readiness_max_hops)
        .code_id()
        .ok_or_else(|| CliError::new(format!("code '{}' does not resolve to a canonical code_id", args.codigo)))?;

    if !args.dry_run {
        let inputs = store.readiness_inputs(project)?;
        let readiness = compute_readiness(&inputs, config.readiness_max_hops);
        if !readiness.axial_ready {
            return Err(CliError::new(format!("project is not axial-ready: {:?}", readiness.blocking_reasons)));
        }
    }

    let row = AxialRow {
        project_id: project,
        categoria: args.categoria,
        codigo: args.codigo,
        code_id,
        relation,
        memo: args.memo,
        evidence: args.evidence.into_iter().map(FragmentId::new).collect(),
        state: AxialState::Pending,
    };

    if !args.dry_run {
        store.upsert_axial(&row)?;
    }
    print_json(&row)
}

// ============================================================================
// SECTION: Sync Commands
// ============================================================================

/// `scanned`/`synced`/`remaining` mirror the API's `/sync/*` response
/// shape (§4.6, §6), not [`ontocore_sync::runner::SyncOutcome`] directly:
/// `scanned` is attempted this pass, `synced` succeeded, `remaining` is
/// still due once the pass (or preview) completes.
#[derive(Debug, Serialize, Default)]
struct SyncReport {
    scanned: usize,
    synced: usize,
    remaining: usize,
}

/// Counts rows still due for projection, the same way the API's sync
/// preview does: list each kind's keys from the ledger, then ask the
/// sync-state store which are due.
fn due_count(
    store: &dyn ontocore_core::interfaces::LedgerStore,
    sync_state: &dyn SyncStateStore,
    project: ProjectId,
    now_ms: i64,
) -> CliResult<usize> {
    let fragment_ids: std::collections::HashSet<String> =
        store.list_assignments(project)?.into_iter().map(|assignment| assignment.fragment_id.into_string()).collect();
    let code_keys: std::collections::HashSet<String> = store
        .list_catalog_rows(project)?
        .into_iter()
        .filter(|row| row.status == CatalogStatus::Active)
        .map(|row| row.code_id.get().to_string())
        .collect();
    let axial_keys: std::collections::HashSet<String> = store
        .list_axial_rows(project)?
        .into_iter()
        .map(|row| format!("{}/{}/{}", row.project_id.get(), row.categoria, row.codigo))
        .collect();

    let count_due = |kind: SyncEntityKind, keys: &std::collections::HashSet<String>| {
        keys.iter().filter(|key| sync_state.due_for_retry(project, kind, key, now_ms).unwrap_or(true)).count()
    };
    Ok(count_due(SyncEntityKind::Fragment, &fragment_ids) + count_due(SyncEntityKind::Code, &code_keys) + count_due(SyncEntityKind::Axial, &axial_keys))
}

async fn command_sync(config: &OntocoreConfig, command: SyncCommand) -> CliResult<()> {
    let args = match command {
        SyncCommand::Predictions(args) => {
            require_confirm(args.dry_run, args.confirm)?;
            project_id(args.project.project)?;
            return print_json(&SyncReport::default());
        }
        // `sync fragments` and `sync axial` drive the same full projection
        // pass; no per-kind entry point exists in `SyncRunner` (§4.6).
        SyncCommand::Fragments(args) | SyncCommand::Axial(args) => args,
    };
    require_confirm(args.dry_run, args.confirm)?;
    let project = project_id(args.project.project)?;

    let store = open_store(config)?;
    let clock = SystemClock;
    let sync_state = SqliteSyncStateStore::open(&sync_state_path(config))?;

    if args.dry_run {
        let remaining = due_count(&store, &sync_state, project, clock.now_ms())?;
        return print_json(&SyncReport { scanned: remaining, synced: 0, remaining });
    }

    let projector = HttpGraphProjector::new(&config.graph_store)?;
    let batch_size = usize::try_from(config.sync_batch_size).unwrap_or(usize::MAX);
    let retry = RetryPolicy {
        base_ms: config.sync_retry_base_ms,
        factor: config.sync_retry_factor,
        cap_ms: config.sync_retry_cap_ms,
        max_attempts: config.sync_retry_max_attempts,
    };
    let runner = SyncRunner::new(&store, &projector, &sync_state, &clock, batch_size, retry);
    let outcome = runner.run(project).await?;
    let remaining = due_count(&store, &sync_state, project, clock.now_ms())?;
    print_json(&SyncReport {
        scanned: outcome.fragments_synced + outcome.codes_synced + outcome.axial_synced + outcome.failed,
        synced: outcome.fragments_synced + outcome.codes_synced + outcome.axial_synced,
        remaining,
    })
}

// ============================================================================
// SECTION: Repair Command
// ============================================================================

fn command_repair(config: &OntocoreConfig, command: RepairCommand) -> CliResult<()> {
    let RepairCommand::Cycles(args) = command;
    let store = open_store(config)?;
    let clock = SystemClock;
    let project = project_id(args.project.project)?;
    let outcome = repair_cycles(&store, &clock, project, config.readiness_max_hops, args.dry_run, &args.actor)?;
    print_json(&outcome)
}

// ============================================================================
// SECTION: History Command
// ============================================================================

fn command_history(config: &OntocoreConfig, args: &HistoryArgs) -> CliResult<()> {
    let store = open_store(config)?;
    let project = project_id(args.project.project)?;
    let events = store.list_version_events(project, args.limit)?;
    print_json(&events)
}
