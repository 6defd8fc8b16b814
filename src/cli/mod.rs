use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::prompt::StdinPrompt;
use crate::app::{App, Messages, SessionGate, StoreFactory};
use crate::auth::{AuthService, LocalAuth, User};
use crate::config::{AppConfig, Backend, ConfigLoader, ConfigPaths};
use crate::storage::{self, DataStore, LocalStore, StorageHandle, StoreError, TimedStore};

pub mod commands;

use self::commands::{AuthArgs, NoteArgs, NotesArgs, TagArgs};

#[derive(Parser, Debug)]
#[command(
    name = "tagnotes",
    version,
    about = "Terminal notes organised by colored tags"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over TAGNOTES_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over TAGNOTES_DATA)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive TUI (default)
    Tui,
    /// Register a new account and sign in
    Signup(AuthArgs),
    /// Sign in to an existing account
    Login(AuthArgs),
    /// Forget the remembered session
    Logout,
    /// Print the signed-in account
    Whoami,
    /// List notes, optionally under one tag
    Notes(NotesArgs),
    /// Create, edit or delete a single note
    Note(NoteArgs),
    /// Manage the account's tags
    Tag(TagArgs),
}

impl Commands {
    fn assume_yes(&self) -> bool {
        match self {
            Commands::Note(args) => args.assume_yes(),
            Commands::Tag(args) => args.assume_yes(),
            _ => false,
        }
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var("TAGNOTES_CONFIG", path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var("TAGNOTES_DATA", path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    let command = cli.command.unwrap_or(Commands::Tui);
    let sink = match command {
        Commands::Tui => LogSink::File(paths.log_dir.join("tagnotes.log")),
        _ => LogSink::Stderr,
    };
    init_tracing(&cli.log_level, &sink)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = loader.load_or_init()?;
    let storage = storage::init(&paths, &config.storage)?;

    let gate = build_gate(&config, &paths, storage)
        .with_prompt(Arc::new(StdinPrompt::new(command.assume_yes())));
    let output = match command {
        Commands::Tui => {
            let mut app = App::new(gate);
            return app.run();
        }
        Commands::Signup(args) => commands::sign_up(gate, args)?,
        Commands::Login(args) => commands::sign_in(gate, args)?,
        Commands::Logout => commands::sign_out(gate)?,
        Commands::Whoami => commands::whoami(gate)?,
        Commands::Notes(args) => commands::list_notes(gate, args)?,
        Commands::Note(args) => commands::handle_note_command(gate, args)?,
        Commands::Tag(args) => commands::handle_tag_command(gate, args)?,
    };
    print!("{output}");
    Ok(())
}

/// Wires auth, the configured backend and the default tags into a gate.
pub fn build_gate(config: &AppConfig, paths: &ConfigPaths, storage: StorageHandle) -> SessionGate {
    let session_file = config
        .session
        .remember_session
        .then(|| paths.session_file.clone());
    let auth: Arc<dyn AuthService> = Arc::new(LocalAuth::new(storage.clone(), session_file));
    let factory = store_factory(config, paths, storage);
    SessionGate::new(
        auth,
        factory,
        Messages::new(config.language),
        config.tags.defaults.clone(),
    )
    .with_fallback_color(&config.tags.fallback_color)
}

fn store_factory(config: &AppConfig, paths: &ConfigPaths, storage: StorageHandle) -> StoreFactory {
    let timeout = config.session.store_timeout();
    match config.backend {
        Backend::Sqlite => Box::new(move |user: &User| -> Result<Arc<dyn DataStore>, StoreError> {
            let inner: Arc<dyn DataStore> = Arc::new(storage.for_owner(&user.id));
            Ok(Arc::new(TimedStore::new(inner, timeout)))
        }),
        Backend::Local => {
            let dir = paths.local_dir.clone();
            Box::new(move |user: &User| -> Result<Arc<dyn DataStore>, StoreError> {
                let inner: Arc<dyn DataStore> = Arc::new(LocalStore::open(&dir, &user.id)?);
                Ok(Arc::new(TimedStore::new(inner, timeout)))
            })
        }
    }
}

enum LogSink {
    Stderr,
    /// The TUI owns the terminal, so its logs go to a file.
    File(PathBuf),
}

fn init_tracing(level: &str, sink: &LogSink) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| -> Result<()> {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        match sink {
            LogSink::Stderr => fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init(),
            LogSink::File(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("opening log file {}", path.display()))?;
                fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .init();
            }
        }
        Ok(())
    })
    .map(|_| ())
}
