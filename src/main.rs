// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Redshell Contributors

//! Redshell - AI-simulated red team shell
//!
//! Entry point for the Redshell CLI application.

use std::io::{self, Write};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use crossterm::{
    style::{Attribute, Color, ResetColor, SetAttribute, SetForegroundColor},
    ExecutableCommand,
};
use uuid::Uuid;

use redshell::config::Settings;
use redshell::error::{RedshellError, Result};
use redshell::llm::gemini::GeminiProvider;
use redshell::parse::{parse_blocks, strip_ansi, ParsedBlock};
use redshell::report::ReportSynthesizer;
use redshell::session::{
    CreateSession, ExchangeOutcome, JsonFileSink, ReportKind, Sender, Session, SessionEngine,
    SessionStore,
};

#[derive(Parser)]
#[command(name = "redshell", version, about = "AI-simulated red team shell")]
struct Cli {
    /// Enable debug diagnostics
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new engagement and drop into the interactive shell
    Run(RunArgs),
    /// List stored sessions
    Sessions,
    /// Render a session transcript
    Show {
        /// Session id (prefix accepted)
        session: String,
    },
    /// Resume an existing session's interactive shell
    Resume {
        /// Session id (prefix accepted)
        session: String,
    },
    /// Generate a report from a session
    Report {
        /// Session id (prefix accepted)
        session: String,
        /// Report kind: executive, technical, or full
        #[arg(long, default_value = "full")]
        kind: ReportKind,
    },
    /// Delete a session
    Delete {
        /// Session id (prefix accepted)
        session: String,
    },
}

#[derive(Parser)]
struct RunArgs {
    /// Engagement name
    #[arg(long, default_value = "engagement")]
    name: String,

    /// Target host or network
    #[arg(long)]
    target: String,

    /// Mission objective; `{target}` expands to the target
    #[arg(long)]
    objective: String,

    /// Model to drive the simulation
    #[arg(long)]
    model: Option<String>,

    /// Extra system instruction appended to the shell persona
    #[arg(long)]
    instruction: Option<String>,

    /// Skip the boot banner and auto-pilot kickoff
    #[arg(long)]
    no_auto: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());
    if cli.verbose > 0 {
        for directive in ["redshell=debug"] {
            if let Ok(parsed) = directive.parse() {
                env_filter = env_filter.add_directive(parsed);
            }
        }
    }
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    Settings::ensure_directories()?;
    let settings = Settings::load()?;

    let sink = JsonFileSink::new(Settings::sessions_path());
    let store = Arc::new(SessionStore::new(
        sink.load(),
        Box::new(JsonFileSink::new(Settings::sessions_path())),
    ));

    match cli.command {
        Commands::Run(args) => run_engagement(args, settings, store).await,
        Commands::Sessions => list_sessions(&store),
        Commands::Show { session } => show_session(&store, &session),
        Commands::Resume { session } => {
            let session = resolve_session(&store, &session)?;
            let engine = build_engine(&settings, Arc::clone(&store))?;
            interactive_loop(&engine, session.id).await
        }
        Commands::Report { session, kind } => generate_report(&settings, store, &session, kind).await,
        Commands::Delete { session } => {
            let session = resolve_session(&store, &session)?;
            store.delete(session.id)?;
            println!("deleted {} ({})", session.name, session.id);
            Ok(())
        }
    }
}

fn build_provider(settings: &Settings) -> Result<Arc<GeminiProvider>> {
    let api_key = settings.resolve_api_key()?;
    let provider = match &settings.gemini.base_url {
        Some(base_url) => GeminiProvider::with_base_url(api_key, base_url.clone()),
        None => GeminiProvider::new(api_key),
    };
    Ok(Arc::new(provider))
}

fn build_engine(settings: &Settings, store: Arc<SessionStore>) -> Result<Arc<SessionEngine>> {
    let provider = build_provider(settings)?;
    Ok(Arc::new(SessionEngine::new(store, provider)))
}

async fn run_engagement(args: RunArgs, settings: Settings, store: Arc<SessionStore>) -> Result<()> {
    let model = args
        .model
        .unwrap_or_else(|| settings.gemini.default_model.clone());

    let session = store.create(CreateSession {
        name: args.name,
        target: args.target,
        objective: args.objective,
        custom_instruction: args.instruction,
        model,
    })?;

    println!("session {} ({})", session.name, session.id);
    println!("target: {}  objective: {}", session.target, session.objective);

    let engine = build_engine(&settings, Arc::clone(&store))?;

    if !args.no_auto {
        let id = session.id;
        let boot = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.bootstrap(id).await })
        };
        stream_to_stdout(&engine, session.id, boot).await?;
    }

    interactive_loop(&engine, session.id).await
}

/// Interactive shell: each line is one exchange; Ctrl-C interrupts a
/// live stream, `exit` terminates the session.
async fn interactive_loop(engine: &Arc<SessionEngine>, session_id: Uuid) -> Result<()> {
    let stdin = io::stdin();
    loop {
        print!("\nroot@redshell:~# ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            engine.store().terminate(session_id)?;
            println!("session terminated");
            break;
        }

        let task = {
            let engine = Arc::clone(engine);
            let message = line.to_string();
            tokio::spawn(async move { engine.send(session_id, &message).await })
        };
        stream_to_stdout(engine, session_id, task).await?;
    }
    Ok(())
}

type ExchangeTask<T> = tokio::task::JoinHandle<Result<T>>;

/// Print the live agent entry incrementally while an exchange runs,
/// forwarding Ctrl-C as an interrupt.
async fn stream_to_stdout<T>(
    engine: &Arc<SessionEngine>,
    session_id: Uuid,
    mut task: ExchangeTask<T>,
) -> Result<()>
where
    T: ExchangeReport + Send + 'static,
{
    let mut cursor = LiveCursor::default();
    let mut tick = tokio::time::interval(std::time::Duration::from_millis(50));

    let outcome = loop {
        tokio::select! {
            result = &mut task => {
                break result.map_err(|e| RedshellError::Session(e.to_string()))??;
            }
            _ = tokio::signal::ctrl_c() => {
                engine.interrupt(session_id);
            }
            _ = tick.tick() => {
                print_live_delta(engine, session_id, &mut cursor)?;
            }
        }
    };

    // Flush whatever arrived after the last tick
    print_live_delta(engine, session_id, &mut cursor)?;
    println!();

    for line in outcome.summary_lines() {
        let mut stdout = io::stdout();
        stdout.execute(SetForegroundColor(Color::Yellow))?;
        println!("{line}");
        stdout.execute(ResetColor)?;
    }
    Ok(())
}

/// Tracks which agent entry is being echoed and how much of it has
/// already been written
#[derive(Default)]
struct LiveCursor {
    entry_id: Option<Uuid>,
    printed: usize,
}

fn print_live_delta(
    engine: &Arc<SessionEngine>,
    session_id: Uuid,
    cursor: &mut LiveCursor,
) -> Result<()> {
    let Some(session) = engine.store().get(session_id) else {
        return Ok(());
    };
    let Some(entry) = session.logs.iter().rev().find(|e| e.sender == Sender::Agent) else {
        return Ok(());
    };
    if cursor.entry_id != Some(entry.id) {
        // A new exchange started (bootstrap runs two back to back)
        if cursor.entry_id.is_some() {
            println!();
        }
        cursor.entry_id = Some(entry.id);
        cursor.printed = 0;
    }

    let content = strip_ansi(&entry.content);
    // The stripped text grows monotonically, but a fragment boundary can
    // land mid-codepoint; hold back until the boundary is clean
    if let Some(delta) = content.get(cursor.printed..) {
        if !delta.is_empty() {
            print!("{delta}");
            io::stdout().flush()?;
            cursor.printed = content.len();
        }
    }
    Ok(())
}

/// Something an exchange task can report once it finishes
trait ExchangeReport {
    fn summary_lines(&self) -> Vec<String>;
}

impl ExchangeReport for ExchangeOutcome {
    fn summary_lines(&self) -> Vec<String> {
        match self {
            ExchangeOutcome::Completed { new_artifacts } if *new_artifacts > 0 => {
                vec![format!("[+] captured {new_artifacts} artifact(s)")]
            }
            ExchangeOutcome::Completed { .. } => vec![],
            ExchangeOutcome::Aborted => vec!["^C".to_string()],
            ExchangeOutcome::Errored { message } => vec![format!("[!] {message}")],
        }
    }
}

impl ExchangeReport for Vec<ExchangeOutcome> {
    fn summary_lines(&self) -> Vec<String> {
        self.iter().flat_map(|o| o.summary_lines()).collect()
    }
}

fn list_sessions(store: &SessionStore) -> Result<()> {
    let sessions = store.list();
    if sessions.is_empty() {
        println!("no sessions");
        return Ok(());
    }
    for s in sessions {
        println!(
            "{}  {:<20} {:<16} {:?}  logs={} artifacts={} reports={}",
            s.id,
            s.name,
            s.target,
            s.status,
            s.logs.len(),
            s.artifacts.len(),
            s.reports.len()
        );
    }
    Ok(())
}

fn show_session(store: &SessionStore, query: &str) -> Result<()> {
    let session = resolve_session(store, query)?;
    let mut stdout = io::stdout();

    for entry in session.logs.iter().filter(|e| !e.hidden) {
        match entry.sender {
            Sender::User => {
                stdout.execute(SetAttribute(Attribute::Bold))?;
                println!("root@redshell:~# {}", entry.content);
                stdout.execute(SetAttribute(Attribute::Reset))?;
            }
            Sender::System => {
                let color = if entry.is_error { Color::Red } else { Color::Yellow };
                stdout.execute(SetForegroundColor(color))?;
                println!("[system] {}", entry.content);
                stdout.execute(ResetColor)?;
            }
            Sender::Agent => render_agent_entry(&mut stdout, &entry.content)?,
        }
    }

    if !session.artifacts.is_empty() {
        println!("\nartifacts:");
        for a in &session.artifacts {
            println!("  {} ({}, {} bytes)", a.filename, a.artifact_type, a.size);
        }
    }
    Ok(())
}

/// Render one agent message: thinking dim, code green under a language
/// header, plain text as-is.
fn render_agent_entry(stdout: &mut io::Stdout, content: &str) -> Result<()> {
    for block in parse_blocks(&strip_ansi(content)) {
        match block {
            ParsedBlock::Thinking { content } => {
                stdout.execute(SetAttribute(Attribute::Dim))?;
                print!("{content}");
                stdout.execute(SetAttribute(Attribute::Reset))?;
            }
            ParsedBlock::Code { content, language } => {
                stdout.execute(SetForegroundColor(Color::DarkGrey))?;
                println!("--- {language} ---");
                stdout.execute(SetForegroundColor(Color::Green))?;
                print!("{content}");
                stdout.execute(ResetColor)?;
            }
            ParsedBlock::Text { content } => print!("{content}"),
        }
    }
    println!();
    Ok(())
}

async fn generate_report(
    settings: &Settings,
    store: Arc<SessionStore>,
    query: &str,
    kind: ReportKind,
) -> Result<()> {
    let session = resolve_session(&store, query)?;
    let provider = build_provider(settings)?;
    let synthesizer = ReportSynthesizer::new(provider, Arc::clone(&store));

    let report = synthesizer.synthesize(session.id, kind).await?;
    println!("# {}\n", report.title);
    println!("{}", report.content);
    Ok(())
}

/// Find a session by full id or unambiguous id prefix
fn resolve_session(store: &SessionStore, query: &str) -> Result<Session> {
    let sessions = store.list();
    let matches: Vec<&Session> = sessions
        .iter()
        .filter(|s| s.id.to_string().starts_with(query))
        .collect();

    match matches.as_slice() {
        [one] => Ok((*one).clone()),
        [] => Err(RedshellError::InvalidInput(format!(
            "no session matches '{query}'"
        ))),
        _ => Err(RedshellError::InvalidInput(format!(
            "ambiguous session id '{query}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_store() -> (Arc<SessionStore>, Session) {
        let store = Arc::new(SessionStore::in_memory());
        let session = store
            .create(CreateSession {
                name: "t".to_string(),
                target: "10.0.0.1".to_string(),
                objective: "recon".to_string(),
                custom_instruction: None,
                model: "gemini-2.5-flash".to_string(),
            })
            .unwrap();
        (store, session)
    }

    #[test]
    fn test_resolve_session_by_prefix() {
        let (store, session) = seeded_store();
        let prefix = &session.id.to_string()[..8];
        assert_eq!(resolve_session(&store, prefix).unwrap().id, session.id);
    }

    #[test]
    fn test_resolve_session_no_match() {
        let (store, _) = seeded_store();
        assert!(resolve_session(&store, "zzzz").is_err());
    }

    #[test]
    fn test_outcome_summary_lines() {
        assert!(ExchangeOutcome::Completed { new_artifacts: 0 }
            .summary_lines()
            .is_empty());
        assert_eq!(
            ExchangeOutcome::Completed { new_artifacts: 2 }.summary_lines(),
            vec!["[+] captured 2 artifact(s)"]
        );
        assert_eq!(ExchangeOutcome::Aborted.summary_lines(), vec!["^C"]);
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "redshell", "run", "--target", "10.0.0.1", "--objective", "scan {target}",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.target, "10.0.0.1");
                assert!(!args.no_auto);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_cli_parses_report_kind() {
        let cli =
            Cli::try_parse_from(["redshell", "report", "abcd", "--kind", "executive"]).unwrap();
        match cli.command {
            Commands::Report { kind, .. } => assert_eq!(kind, ReportKind::Executive),
            _ => panic!("expected report command"),
        }
    }
}
