//! zenodo-dl command line

use clap::{ArgAction, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use zenodo_dl::config::{Config, ZENODO_SANDBOX_API};
use zenodo_dl::credentials::CredentialStore;
use zenodo_dl::download::Selection;
use zenodo_dl::menu;
use zenodo_dl::prompt::{Prompter, TerminalPrompter};
use zenodo_dl::session::Session;
use zenodo_dl::types::RecordId;
use zenodo_dl::{Error, Result};

/// Download files from public, restricted and draft Zenodo records
#[derive(Debug, Parser)]
#[command(name = "zenodo-dl", version, about, long_about = None)]
struct Cli {
    /// Record ID (prompted for when omitted)
    record_id: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,

    /// Configuration file (default: ~/.config/zenodo-dl/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, global = true, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Extract downloaded archives
    #[arg(long, global = true)]
    extract: bool,

    /// API base URL
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,

    /// Use the sandbox service
    #[arg(long, global = true, conflicts_with = "base_url")]
    sandbox: bool,

    /// More logging on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// List the record's files
    #[command(alias = "ls")]
    List,
    /// Download the whole record as one archive
    All,
    /// Download selected files: numbers, ranges (2-4) or a name pattern
    Get {
        /// Selection
        selection: String,
    },
    /// Interactive menu (default)
    Menu,
    /// Delete saved token files
    Forget,
}

impl Cli {
    /// Configuration file with command line overrides applied
    fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(url) = &self.base_url {
            config.api.base_url = url.clone();
        }
        if self.sandbox {
            config.api.base_url = ZENODO_SANDBOX_API.to_string();
        }
        if let Some(dir) = &self.output {
            config.download.output_dir = dir.clone();
        }
        if self.extract {
            config.extraction.enabled = true;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "zenodo_dl=warn",
        1 => "zenodo_dl=info",
        _ => "zenodo_dl=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.load_config()?;
    let command = cli.command.clone().unwrap_or(Command::Menu);
    let mut out = std::io::stdout();

    if let Command::Forget = command {
        let removed = CredentialStore::from_config(&config.credentials).remove()?;
        return menu::print_forgotten(&mut out, removed);
    }

    let mut prompter = TerminalPrompter::new();
    let record_id: RecordId = match &cli.record_id {
        Some(id) => id.parse()?,
        None => prompter.line("Record ID")?.parse()?,
    };

    // Dropping the losing future drops the session and its credential
    tokio::select! {
        result = execute(&config, record_id, command, &mut prompter, &mut out) => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!();
            Err(Error::Interrupted)
        }
    }
}

async fn execute(
    config: &Config,
    record_id: RecordId,
    command: Command,
    prompter: &mut dyn Prompter,
    out: &mut dyn Write,
) -> Result<()> {
    let mut session = Session::open(config, record_id, prompter).await?;
    writeln!(out, "Using access token from {}", session.source())?;
    if session.extract_enabled() {
        menu::print_tools(out, &session.check_tools())?;
    }

    match command {
        Command::List => {
            let listing = session.list().await?;
            menu::print_listing(out, &listing)?;
        }
        Command::All => {
            let outcome = session.download_all().await?;
            menu::print_bundle(out, &outcome)?;
        }
        Command::Get { selection } => {
            let listing = session.list().await?;
            let outcome = session
                .download_selected(&listing, &Selection::parse(&selection))
                .await?;
            menu::print_selection(out, &outcome)?;
            outcome.report.ensure_complete()?;
        }
        Command::Menu => menu::run(&mut session, prompter, out).await?,
        Command::Forget => {
            let removed = session.forget_token()?;
            menu::print_forgotten(out, removed)?;
        }
    }
    Ok(())
}
