use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use tmtool_core::config::{TmConfig, load_config};
use tmtool_core::editor::{EditReport, StatusEdit, submit_edit};
use tmtool_core::gateway::MediaWikiGateway;
use tmtool_core::migrate::{current_version, pending_migration_count};
use tmtool_core::reconcile::Severity;
use tmtool_core::record::StatusRecord;
use tmtool_core::runtime::{
    PathOverrides, ResolutionContext, ResolvedPaths, init_layout, normalize_for_display,
    resolve_paths,
};
use tmtool_core::store::{StatusStore, SuggestionKey, SuggestionMode, format_mw_timestamp};
use tmtool_core::wordcount::record_word_count;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "tmtool",
    version,
    about = "Track translation status per page and keep target-wiki redirects in sync"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    project_root: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH", help = "SQLite database path")]
    db: Option<PathBuf>,
    #[arg(long, global = true, help = "Print resolved runtime diagnostics")]
    diagnostics: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    project_root: Option<PathBuf>,
    config: Option<PathBuf>,
    db: Option<PathBuf>,
    diagnostics: bool,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            project_root: cli.project_root.clone(),
            config: cli.config.clone(),
            db: cli.db.clone(),
            diagnostics: cli.diagnostics,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Create .tmtool/ with a starter config")]
    Init(InitArgs),
    #[command(about = "Show the translation status of a page")]
    Show(ShowArgs),
    #[command(about = "Edit a status record and reconcile its redirect")]
    Edit(EditArgs),
    #[command(about = "Record a computed word count")]
    Wordcount(WordcountArgs),
    #[command(about = "List actual or suggested translations")]
    Suggestions(SuggestionsArgs),
    #[command(about = "List known projects")]
    Projects,
    #[command(about = "List known translators")]
    Translators,
    #[command(about = "List status codes and configured languages")]
    Statuses,
    Db(DbArgs),
}

#[derive(Debug, Args)]
struct InitArgs {
    #[arg(long, help = "Overwrite an existing config file")]
    force: bool,
}

#[derive(Debug, Args)]
struct LanguageArg {
    #[arg(
        short = 'l',
        long,
        value_name = "CODE",
        help = "Target language (defaults to the only configured language)"
    )]
    language: Option<String>,
}

#[derive(Debug, Args)]
struct ShowArgs {
    page_id: i64,
    #[command(flatten)]
    language: LanguageArg,
    #[arg(long, help = "Print the record as JSON")]
    json: bool,
}

#[derive(Debug, Args)]
struct EditArgs {
    page_id: i64,
    #[command(flatten)]
    language: LanguageArg,
    #[arg(long, value_name = "TITLE", help = "Suggested title; empty clears it")]
    suggested_name: Option<String>,
    #[arg(long, value_name = "CODE")]
    status: Option<String>,
    #[arg(long)]
    project: Option<String>,
    #[arg(long)]
    translator: Option<String>,
    #[arg(long)]
    comments: Option<String>,
    #[arg(long, value_name = "COUNT")]
    wordcount: Option<String>,
    #[arg(long, value_name = "YYYY-MM-DD")]
    start_date: Option<String>,
    #[arg(long, value_name = "YYYY-MM-DD")]
    end_date: Option<String>,
    #[arg(long, value_name = "CODE", help = "Move the record to another target language")]
    new_language: Option<String>,
    #[arg(long, help = "Print the report as JSON")]
    json: bool,
}

#[derive(Debug, Args)]
struct WordcountArgs {
    page_id: i64,
    #[command(flatten)]
    language: LanguageArg,
    #[arg(long)]
    count: u32,
}

#[derive(Debug, Args)]
struct SuggestionsArgs {
    #[command(flatten)]
    language: LanguageArg,
    #[arg(long, help = "Key results by page title instead of page id")]
    by_title: bool,
    #[arg(long, help = "Ignore actual translations")]
    suggestions_only: bool,
    #[arg(long = "page-id", value_name = "ID")]
    page_ids: Vec<i64>,
}

#[derive(Debug, Args)]
struct DbArgs {
    #[command(subcommand)]
    command: DbSubcommand,
}

#[derive(Debug, Subcommand)]
enum DbSubcommand {
    Stats,
    Migrate,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let runtime = RuntimeOptions::from_cli(&cli);

    match cli.command {
        Commands::Init(args) => run_init(&runtime, args),
        Commands::Show(args) => run_show(&runtime, args),
        Commands::Edit(args) => run_edit(&runtime, args),
        Commands::Wordcount(args) => run_wordcount(&runtime, args),
        Commands::Suggestions(args) => run_suggestions(&runtime, args),
        Commands::Projects => run_projects(&runtime),
        Commands::Translators => run_translators(&runtime),
        Commands::Statuses => run_statuses(&runtime),
        Commands::Db(DbArgs { command }) => match command {
            DbSubcommand::Stats => run_db_stats(&runtime),
            DbSubcommand::Migrate => run_db_migrate(&runtime),
        },
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

struct Session {
    paths: ResolvedPaths,
    config: TmConfig,
    store: StatusStore,
}

fn open_session(runtime: &RuntimeOptions) -> Result<Session> {
    let paths = resolve_runtime_paths(runtime)?;
    let config = load_config(&paths.config_path)?;
    let store = StatusStore::open(&paths.db_path)?;
    debug!(
        db_path = %normalize_for_display(&paths.db_path),
        applied_migrations = store.migration_report().applied.len(),
        "opened status store"
    );
    if runtime.diagnostics {
        eprintln!("[diagnostics]\n{}", paths.diagnostics());
    }
    Ok(Session {
        paths,
        config,
        store,
    })
}

fn run_init(runtime: &RuntimeOptions, args: InitArgs) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let report = init_layout(&paths, args.force)?;
    let store = StatusStore::open(&paths.db_path)?;

    println!("Initialized tmtool runtime layout");
    println!("project_root: {}", normalize_for_display(&paths.project_root));
    println!("state_dir: {}", normalize_for_display(&paths.state_dir));
    println!("db_path: {}", normalize_for_display(&paths.db_path));
    println!("config_path: {}", normalize_for_display(&paths.config_path));
    println!("created_dirs: {}", report.created_dirs.len());
    println!("wrote_config: {}", report.wrote_config);
    println!("schema_version: {}", current_version(store.connection())?);
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }
    Ok(())
}

fn run_show(runtime: &RuntimeOptions, args: ShowArgs) -> Result<()> {
    let session = open_session(runtime)?;
    let language = resolve_language(&session.config, args.language.language)?;
    let record = session.store.load(args.page_id, &language)?;

    if args.json {
        let mut value = serde_json::to_value(&record).context("failed to serialize record")?;
        value["status"] = serde_json::Value::from(record.status().as_str());
        println!(
            "{}",
            serde_json::to_string_pretty(&value).context("failed to render record")?
        );
        return Ok(());
    }

    println!("status record");
    print_record(&record);
    Ok(())
}

fn run_edit(runtime: &RuntimeOptions, args: EditArgs) -> Result<()> {
    let session = open_session(runtime)?;
    let language = resolve_language(&session.config, args.language.language)?;
    let edit = StatusEdit {
        comments: args.comments,
        status: args.status,
        translator: args.translator,
        project: args.project,
        language: args.new_language,
        suggested_name: args.suggested_name,
        wordcount: args.wordcount,
        start_date: args.start_date,
        end_date: args.end_date,
    };

    let report = submit_edit(
        &session.store,
        &session.config,
        args.page_id,
        &language,
        &edit,
        MediaWikiGateway::connect,
    )?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to render report")?
        );
    } else {
        print_edit_report(&report);
    }

    if !report.saved {
        bail!("status edit for page {} was rejected", args.page_id);
    }
    if report.has_errors() {
        bail!(
            "status for page {} was saved but the redirect could not be reconciled",
            args.page_id
        );
    }
    Ok(())
}

fn run_wordcount(runtime: &RuntimeOptions, args: WordcountArgs) -> Result<()> {
    let session = open_session(runtime)?;
    let language = resolve_language(&session.config, args.language.language)?;
    let report = record_word_count(
        &session.store,
        &session.config,
        args.page_id,
        &language,
        args.count,
        Utc::now(),
    )?;

    println!("word count");
    println!("page_id: {}", args.page_id);
    println!("language: {language}");
    println!("count: {}", args.count);
    println!("wordcount_saved: {}", format_flag(report.wordcount_saved));
    println!("end_date_set: {}", format_flag(report.end_date_set));
    Ok(())
}

fn run_suggestions(runtime: &RuntimeOptions, args: SuggestionsArgs) -> Result<()> {
    let session = open_session(runtime)?;
    let language = resolve_language(&session.config, args.language.language)?;
    let key = if args.by_title {
        SuggestionKey::Title
    } else {
        SuggestionKey::PageId
    };
    let mode = if args.suggestions_only {
        SuggestionMode::SuggestionsOnly
    } else {
        SuggestionMode::TranslationsOverSuggestions
    };
    let page_ids = (!args.page_ids.is_empty()).then_some(args.page_ids.as_slice());
    let suggestions = session
        .store
        .suggestions_by_ids(&language, key, page_ids, mode)?;

    println!("suggestions");
    println!("language: {language}");
    println!("suggestions.count: {}", suggestions.len());
    for (key, title) in &suggestions {
        println!("suggestion: {key} -> {title}");
    }
    Ok(())
}

fn run_projects(runtime: &RuntimeOptions) -> Result<()> {
    let session = open_session(runtime)?;
    print_list("projects", &session.store.all_projects()?);
    Ok(())
}

fn run_translators(runtime: &RuntimeOptions) -> Result<()> {
    let session = open_session(runtime)?;
    print_list("translators", &session.store.all_translators()?);
    Ok(())
}

fn run_statuses(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let config = load_config(&paths.config_path)?;
    let catalog = config.catalog();

    println!("status codes");
    for code in catalog.status_codes() {
        println!("status: {code}");
    }
    let languages: Vec<String> = catalog.languages().map(ToString::to_string).collect();
    print_list("languages", &languages);
    println!("source_language: {}", config.source_language());
    Ok(())
}

fn run_db_stats(runtime: &RuntimeOptions) -> Result<()> {
    let session = open_session(runtime)?;
    let stats = session.store.stats()?;

    println!("db stats");
    println!("db_path: {}", normalize_for_display(&session.paths.db_path));
    println!(
        "schema_version: {}",
        current_version(session.store.connection())?
    );
    println!("status_rows: {}", stats.status_rows);
    println!("with_suggestion: {}", stats.with_suggestion);
    for (language, count) in &stats.by_language {
        println!("by_language.{language}: {count}");
    }
    for (status, count) in &stats.by_status {
        println!("by_status.{status}: {count}");
    }
    Ok(())
}

fn run_db_migrate(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let store = StatusStore::open(&paths.db_path)?;
    let report = store.migration_report();

    println!("db migrate");
    println!("db_path: {}", normalize_for_display(&paths.db_path));
    println!("applied: {}", report.applied.len());
    for migration in &report.applied {
        println!("applied.v{:03}: {}", migration.version, migration.name);
    }
    println!("current_version: {}", report.current_version);
    println!(
        "pending: {}",
        pending_migration_count(store.connection())?
    );
    Ok(())
}

fn resolve_language(config: &TmConfig, requested: Option<String>) -> Result<String> {
    if let Some(language) = requested {
        return Ok(language.trim().to_ascii_lowercase());
    }
    let languages: Vec<&str> = config.translation.languages.iter().map(String::as_str).collect();
    match languages.as_slice() {
        [only] => Ok(only.trim().to_ascii_lowercase()),
        [] => bail!("no target languages configured; add [translation].languages to the config"),
        _ => bail!(
            "several target languages are configured ({}); pass --language",
            languages.join(", ")
        ),
    }
}

fn resolve_runtime_paths(runtime: &RuntimeOptions) -> Result<ResolvedPaths> {
    dotenvy::dotenv().ok();

    let context = ResolutionContext::from_process()?;
    let overrides = PathOverrides {
        project_root: runtime.project_root.clone(),
        db: runtime.db.clone(),
        config: runtime.config.clone(),
    };

    let initial = resolve_paths(&context, &overrides)?;
    let project_env = initial.project_root.join(".env");
    if project_env.exists() {
        let _ = dotenvy::from_path_override(&project_env);
    }

    resolve_paths(&context, &overrides)
}

fn print_record(record: &StatusRecord) {
    println!("page_id: {}", record.page_id());
    println!("page_name: {}", record.page_name().unwrap_or("<unknown>"));
    println!("exists: {}", format_flag(record.exists()));
    println!("language: {}", record.language());
    println!("status: {}", record.status());
    println!("saved: {}", format_flag(record.is_saved()));
    println!("suggested_translation: {}", or_none(record.suggested_translation()));
    println!("actual_translation: {}", or_none(record.actual_translation()));
    println!("project: {}", or_none(record.project()));
    println!("translator: {}", or_none(record.translator()));
    println!("comments: {}", or_none(record.comments()));
    println!("article_type: {}", or_none(record.article_type()));
    println!(
        "wordcount: {}",
        record
            .wordcount()
            .map(|count| count.to_string())
            .unwrap_or_else(|| "<none>".to_string())
    );
    println!("start_date: {}", format_date(record.start_date()));
    println!("end_date: {}", format_date(record.end_date()));
}

fn print_edit_report(report: &EditReport) {
    println!("status edit");
    println!("saved: {}", format_flag(report.saved));
    if let Some(outcome) = &report.outcome {
        println!("redirect: {}", outcome.outcome.code());
    }
    for message in &report.messages {
        let level = match message.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Success => "ok",
            Severity::Silent => "info",
        };
        println!("{level}: [{}] {}", message.code, message.text);
    }
    if let Some(record) = &report.record {
        print_record(record);
    }
}

fn print_list(label: &str, values: &[String]) {
    println!("{label}.count: {}", values.len());
    if values.is_empty() {
        println!("{label}: <none>");
    }
    for value in values {
        println!("{label}: {value}");
    }
}

fn format_date(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|value| format!("{} ({})", value.format("%Y-%m-%d"), format_mw_timestamp(value)))
        .unwrap_or_else(|| "<none>".to_string())
}

fn or_none(value: Option<&str>) -> &str {
    value.unwrap_or("<none>")
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
