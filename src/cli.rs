//! Command-line front end
//!
//! A thin presentation layer: every profile command goes through
//! [`ProfileOperations`], so the CLI is subject to the same guards as any
//! other host.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::backend::{ConfigBackend, FileBackend, SocketBackend};
use crate::config::{AppSettings, BackendKind, ConfigField, ConfigValue};
use crate::error::{ErrorKind, OperationReport, OperationResult, ProfileError};
use crate::ipc::{self, BackendServer};
use crate::notify::{Notification, Notifier, Operation, Severity, TracingNotifier};
use crate::oracle::{
    NoRunningApp, PollHandle, ProcessOracle, RunningAppOracle, RunningAppSignal, spawn_poller,
};
use crate::prefs::{JsonFileStorage, PreferenceStore};
use crate::profiles::ProfileOperations;

#[derive(Parser, Debug)]
#[command(name = "lsfg-profiles", version, about = "Manage lsfg-vk frame generation profiles")]
pub struct Cli {
    /// Settings file (default: $XDG_CONFIG_HOME/lsfg-profiles/settings.toml)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Print machine-readable JSON results on stdout
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List profiles, marking the active one
    List,
    /// Create a profile as a copy of another (the active one by default)
    Create {
        name: String,
        #[arg(long)]
        from: Option<String>,
    },
    Rename {
        old: String,
        new: String,
    },
    Delete {
        name: String,
    },
    /// Make a profile active
    Switch {
        name: String,
    },
    /// Show a profile's options (the active one by default)
    Show {
        name: Option<String>,
    },
    /// Change one option
    Set {
        key: String,
        value: String,
        #[arg(long)]
        profile: Option<String>,
    },
    /// Describe every option
    Options,
    /// Show the running game, if any
    Status,
    /// Print running game changes until interrupted
    Watch,
    /// Host the profile file over the backend socket
    Serve {
        #[arg(long)]
        socket: Option<PathBuf>,
    },
    /// Read or change persisted UI state
    Prefs {
        #[arg(long)]
        profiles_collapsed: Option<bool>,
        #[arg(long)]
        workarounds_collapsed: Option<bool>,
    },
}

/// Prints notifications on stderr so stdout stays clean for results
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, n: Notification) {
        match n.severity {
            Severity::Error => eprintln!("error: {}: {}", n.title, n.message),
            Severity::Success => eprintln!("{}: {}", n.title, n.message),
            Severity::Info => debug!(title = %n.title, "{}", n.message),
        }
    }
}

/// Execute one command; `Ok(false)` means the operation itself failed
pub async fn run(cli: Cli, settings: AppSettings) -> Result<bool> {
    match cli.command {
        Command::Options => {
            print_options(cli.json)?;
            Ok(true)
        }
        Command::Prefs {
            profiles_collapsed,
            workarounds_collapsed,
        } => run_prefs(cli.json, profiles_collapsed, workarounds_collapsed),
        Command::Serve { socket } => run_serve(&settings, socket).await,
        command => {
            // JSON callers read results from stdout; notices only go to the log
            let notifier: Arc<dyn Notifier> = if cli.json {
                Arc::new(TracingNotifier)
            } else {
                Arc::new(ConsoleNotifier)
            };
            let session = Session::start(&settings, notifier)?;
            let result = session.run(command, cli.json).await;
            session.poll.stop().await;
            result
        }
    }
}

/// Operations wired to the configured backend and oracle
struct Session {
    ops: ProfileOperations,
    poll: PollHandle,
    notifier: Arc<dyn Notifier>,
}

impl Session {
    fn start(settings: &AppSettings, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let backend = build_backend(settings)?;
        let oracle: Arc<dyn RunningAppOracle> = if settings.oracle.enabled {
            Arc::new(ProcessOracle::with_root(&settings.oracle.proc_root))
        } else {
            Arc::new(NoRunningApp)
        };
        let poll = spawn_poller(
            oracle,
            Duration::from_millis(settings.oracle.poll_interval_ms),
        );
        let ops = ProfileOperations::new(backend, poll.subscribe(), Arc::clone(&notifier));
        Ok(Self {
            ops,
            poll,
            notifier,
        })
    }

    async fn run(&self, command: Command, json: bool) -> Result<bool> {
        if matches!(command, Command::Status) {
            return print_status(json, self.poll.latest());
        }
        if matches!(command, Command::Watch) {
            return self.watch(json).await;
        }

        // Prime the cache quietly; `list` refreshes again with its own notification
        if let Err(e) = self.ops.store().refresh().await
            && let Some(operation) = operation_of(&command)
            && operation != Operation::Refresh
        {
            self.notifier.notify(Notification::failure(operation, &e));
            return report::<()>(json, Err(e), |_| {});
        }

        match command {
            Command::List => {
                let result = self.ops.refresh().await;
                report(json, result, |snapshot| {
                    for name in snapshot.display_order() {
                        let marker = if name == snapshot.current() { "*" } else { " " };
                        println!("{marker} {name}");
                    }
                })
            }
            Command::Create { name, from } => {
                let result = self.ops.create(&name, from.as_deref()).await;
                report(json, result, |_| {})
            }
            Command::Rename { old, new } => {
                let result = self.ops.rename(&old, &new).await;
                report(json, result, |_| {})
            }
            Command::Delete { name } => {
                let result = self.ops.delete(&name).await;
                report(json, result, |_| {})
            }
            Command::Switch { name } => {
                let result = self.ops.switch_to(&name).await;
                report(json, result, |_| {})
            }
            Command::Show { name } => {
                let name = name.unwrap_or_else(|| self.ops.store().current());
                let result = self.ops.load_config(&name).await;
                report(json, result, |config| {
                    println!("[{name}]");
                    for (field, value) in config.entries() {
                        println!("{field} = {value}");
                    }
                })
            }
            Command::Set {
                key,
                value,
                profile,
            } => {
                let profile = profile.unwrap_or_else(|| self.ops.store().current());
                let parsed = key
                    .parse::<ConfigField>()
                    .and_then(|field| ConfigValue::parse_for(field, &value).map(|v| (field, v)))
                    .map_err(|e| ProfileError::new(ErrorKind::InvalidOption, e.to_string()));
                let result = match parsed {
                    Ok((field, value)) => self.ops.set_option(&profile, field, value).await,
                    Err(e) => {
                        self.notifier
                            .notify(Notification::failure(Operation::UpdateConfig, &e));
                        Err(e)
                    }
                };
                report(json, result, |change| {
                    for field in &change.changed {
                        println!("{field} = {}", change.config.get(*field));
                    }
                })
            }
            Command::Options
            | Command::Status
            | Command::Watch
            | Command::Serve { .. }
            | Command::Prefs { .. } => Ok(true),
        }
    }

    async fn watch(&self, json: bool) -> Result<bool> {
        let mut rx = self.poll.subscribe();
        print_status(json, rx.borrow_and_update().clone())?;

        loop {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    signal.context("Failed to listen for Ctrl-C")?;
                    info!("Stopping watch");
                    return Ok(true);
                }
                changed = rx.changed() => {
                    if changed.is_err() {
                        return Ok(true);
                    }
                    let latest = rx.borrow_and_update().clone();
                    print_status(json, latest)?;
                }
            }
        }
    }
}

/// Operation a profile command reports under
fn operation_of(command: &Command) -> Option<Operation> {
    Some(match command {
        Command::List => Operation::Refresh,
        Command::Create { .. } => Operation::Create,
        Command::Rename { .. } => Operation::Rename,
        Command::Delete { .. } => Operation::Delete,
        Command::Switch { .. } => Operation::Switch,
        Command::Show { .. } => Operation::LoadConfig,
        Command::Set { .. } => Operation::UpdateConfig,
        Command::Options
        | Command::Status
        | Command::Watch
        | Command::Serve { .. }
        | Command::Prefs { .. } => return None,
    })
}

fn build_backend(settings: &AppSettings) -> Result<Arc<dyn ConfigBackend>> {
    Ok(match settings.backend.kind {
        BackendKind::File => {
            let path = settings.conf_path();
            info!(path = %path.display(), "Using profile file backend");
            Arc::new(FileBackend::new(path))
        }
        BackendKind::Socket => {
            let path = match &settings.backend.socket_path {
                Some(path) => path.clone(),
                None => ipc::default_socket_path()?,
            };
            info!(socket = %path.display(), "Using socket backend");
            Arc::new(SocketBackend::new(path))
        }
    })
}

/// Print the result and return whether it succeeded.
///
/// Failures are already on stderr through the notifier in text mode.
fn report<T: Serialize>(
    json: bool,
    result: OperationResult<T>,
    render: impl FnOnce(&T),
) -> Result<bool> {
    let success = result.is_ok();
    if json {
        let report = OperationReport::from(result);
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize result")?
        );
    } else if let Ok(value) = &result {
        render(value);
    }
    Ok(success)
}

fn print_status(json: bool, signal: RunningAppSignal) -> Result<bool> {
    if json {
        println!(
            "{}",
            serde_json::to_string(&signal).context("Failed to serialize status")?
        );
    } else {
        match signal {
            Some(app) => println!("running: {} (pid {})", app.display_name, app.pid),
            None => println!("no game running"),
        }
    }
    Ok(true)
}

#[derive(Serialize)]
struct OptionInfo {
    key: &'static str,
    kind: String,
    description: &'static str,
}

fn print_options(json: bool) -> Result<()> {
    let options: Vec<OptionInfo> = ConfigField::ALL
        .into_iter()
        .map(|field| OptionInfo {
            key: field.key(),
            kind: field.kind().to_string(),
            description: field.description(),
        })
        .collect();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&options).context("Failed to serialize options")?
        );
    } else {
        for option in options {
            println!("{:<28} {:<8} {}", option.key, option.kind, option.description);
        }
    }
    Ok(())
}

fn run_prefs(
    json: bool,
    profiles_collapsed: Option<bool>,
    workarounds_collapsed: Option<bool>,
) -> Result<bool> {
    let mut store = PreferenceStore::open(JsonFileStorage::default());
    if let Some(collapsed) = profiles_collapsed {
        store.set_profiles_collapsed(collapsed)?;
    }
    if let Some(collapsed) = workarounds_collapsed {
        store.set_workarounds_collapsed(collapsed)?;
    }

    let prefs = store.get();
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&prefs).context("Failed to serialize preferences")?
        );
    } else {
        println!("profiles_collapsed = {}", prefs.profiles_collapsed);
        println!("workarounds_collapsed = {}", prefs.workarounds_collapsed);
    }
    Ok(true)
}

async fn run_serve(settings: &AppSettings, socket: Option<PathBuf>) -> Result<bool> {
    let socket = match socket.or_else(|| settings.backend.socket_path.clone()) {
        Some(path) => path,
        None => ipc::default_socket_path()?,
    };
    // Always the file backend: serving a socket backend would loop back on itself
    let backend = Arc::new(FileBackend::new(settings.conf_path()));
    let server = BackendServer::bind_to(socket)?;
    info!(socket = %server.path().display(), conf = %settings.conf_path().display(), "Serving profiles");

    server
        .serve(backend, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = ?e, "Failed to listen for Ctrl-C");
            }
        })
        .await?;
    Ok(true)
}
