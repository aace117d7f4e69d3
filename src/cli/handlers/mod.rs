use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io;
use crate::io::watcher::WorkspaceWatcher;
use crate::model::config::Settings;
use crate::model::task::{InvalidPriority, TaskRecord};
use crate::ops::advisory::OllamaAdvisor;
use crate::ops::session::{EditReport, Session, SessionError};
use crate::ops::view::{ViewFilter, ViewNode};

/// How long the watcher waits for a burst of saves to finish.
const SETTLE: Duration = Duration::from_millis(250);

type CmdResult = Result<(), Box<dyn std::error::Error>>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub async fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;
    let root = resolve_root(cli.project_dir.as_deref())?;

    let mut settings = config_io::load_settings(&root);
    if !cli.tags.is_empty() {
        settings.todo_patterns = Some(cli.tags.clone());
    }

    let command = cli.command.unwrap_or(Commands::Scan(ScanArgs {
        filter: FilterArgs::default(),
        suggestions: false,
    }));

    match command {
        // Read commands
        Commands::Scan(args) => cmd_scan(&root, settings, args, json).await,
        Commands::List(args) => cmd_list(&root, settings, args, json).await,
        Commands::Watch(args) => cmd_watch(&root, settings, args, json).await,

        // Write commands
        Commands::Priority(args) => cmd_priority(&root, settings, args, json).await,
        Commands::Pin(args) => cmd_pin(&root, settings, args, json).await,
        Commands::Suggest(args) => cmd_suggest(&root, settings, args, json).await,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The workspace root: `-C` if given, else the current directory.
fn resolve_root(dir: Option<&str>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let root = match dir {
        Some(dir) => std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?,
        None => std::env::current_dir()?,
    };
    if !root.is_dir() {
        return Err(format!("not a directory: {}", root.display()).into());
    }
    Ok(root)
}

fn build_filter(args: &FilterArgs) -> Result<ViewFilter, InvalidPriority> {
    let priority = match args.priority.as_deref() {
        Some(raw) => ViewFilter::parse_priority(raw)?,
        None => None,
    };
    Ok(ViewFilter {
        task_type: args.task_type.as_deref().and_then(ViewFilter::parse_type),
        priority,
        query: args.search.as_deref().and_then(ViewFilter::parse_query),
    })
}

async fn scanned_session(root: &Path, settings: Settings) -> Session {
    let mut session = Session::new(root, settings);
    session.rescan().await;
    session
}

/// Resolve a TASK argument against the current scan.
fn find_task(session: &Session, reference: &str) -> Result<TaskRecord, SessionError> {
    session
        .find(reference)
        .cloned()
        .ok_or_else(|| SessionError::TaskNotFound(reference.to_string()))
}

fn print_tree(session: &Session, suggestions: bool, json: bool) -> CmdResult {
    let nodes = session.tree();
    if json {
        println!("{}", serde_json::to_string_pretty(&groups_to_json(&nodes, session.root()))?);
    } else if nodes.is_empty() {
        println!("(no annotations found)");
    } else {
        for line in render_tree(&nodes, suggestions) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn report_edit(root: &Path, record: &TaskRecord, report: &EditReport, json: bool) -> CmdResult {
    if let EditReport::NotFound = report {
        return Err(SessionError::TaskNotFound(record.id.clone()).into());
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&edit_to_json(record, root, report))?);
    } else {
        if let (_, Some(warning)) = edit_outcome(report) {
            eprintln!("warning: {}", warning);
        }
        println!("{}", format_edit(record, root, report));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

async fn cmd_scan(root: &Path, settings: Settings, args: ScanArgs, json: bool) -> CmdResult {
    let filter = build_filter(&args.filter)?;
    let mut session = scanned_session(root, settings).await;
    session.set_filter(filter);
    print_tree(&session, args.suggestions, json)
}

async fn cmd_list(root: &Path, settings: Settings, args: FilterArgs, json: bool) -> CmdResult {
    let filter = build_filter(&args)?;
    let mut session = scanned_session(root, settings).await;
    session.set_filter(filter);

    let records: Vec<&TaskRecord> = session
        .tree()
        .iter()
        .flat_map(|group| group.children())
        .filter_map(|node| match node {
            ViewNode::Task(record) => Some(record),
            _ => None,
        })
        .collect();

    if json {
        let tasks: Vec<TaskJson> = records.iter().map(|r| task_to_json(r, root)).collect();
        println!("{}", serde_json::to_string_pretty(&tasks)?);
    } else {
        for record in records {
            println!("{}", format_task_line(record, root));
        }
    }
    Ok(())
}

async fn cmd_watch(root: &Path, settings: Settings, args: FilterArgs, json: bool) -> CmdResult {
    let filter = build_filter(&args)?;
    let scan_on_startup = settings.scan_on_startup;
    let auto_refresh = settings.auto_refresh_on_save;
    let mut session = Session::new(root, settings);
    session.set_filter(filter);

    if scan_on_startup {
        session.rescan().await;
        print_tree(&session, false, json)?;
    }
    if !auto_refresh {
        warn!("auto refresh on save is disabled in settings; not watching");
        return Ok(());
    }

    let watcher = WorkspaceWatcher::start(root, session.exclusions().clone())?;
    info!("watching {}", root.display());
    loop {
        let Some(changed) = tokio::task::block_in_place(|| watcher.wait(SETTLE)) else {
            break;
        };
        info!("{} file(s) changed, rescanning", changed.len());
        session.rescan().await;
        if !json {
            println!();
        }
        print_tree(&session, false, json)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

async fn cmd_priority(
    root: &Path,
    settings: Settings,
    args: PriorityArgs,
    json: bool,
) -> CmdResult {
    let mut session = scanned_session(root, settings).await;
    let record = find_task(&session, &args.task)?;
    let report = session.set_priority(&record.id, args.level.priority());
    report_edit(root, &record, &report, json)
}

async fn cmd_pin(root: &Path, settings: Settings, args: PinArgs, json: bool) -> CmdResult {
    let mut session = scanned_session(root, settings).await;
    let record = find_task(&session, &args.task)?;
    let report = session.toggle_pin(&record.id);
    report_edit(root, &record, &report, json)
}

async fn cmd_suggest(root: &Path, settings: Settings, args: SuggestArgs, json: bool) -> CmdResult {
    let model = args.model.clone().unwrap_or_else(|| settings.ai_model.clone());
    let advisor = OllamaAdvisor::new(&model, &settings.ollama_url).with_timeout(args.timeout);

    let mut session = scanned_session(root, settings).await;
    let record = find_task(&session, &args.task)?;
    let suggestion = session.suggest(&record.id, &advisor).await?;

    if json {
        let out = SuggestionJson {
            id: record.id,
            model,
            suggestion,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", format_task_line(&record, root));
        println!("  {}", suggestion);
    }
    Ok(())
}
