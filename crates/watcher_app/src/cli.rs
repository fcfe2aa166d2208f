use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use engine_logging::{level_for_verbosity, LogDestination};
use watcher_core::ObservedState;

use crate::platform::{App, SettingKey, StateDir};

/// Watches a hackerspace status page and tells you when the space opens or closes
#[derive(Debug, Parser)]
#[clap(version, about, long_about = None)]
pub struct WatcherCli {
    /// Directory for settings, the wakeup record and logs
    /// [default: ~/.config/space-watcher]
    #[clap(long, global = true)]
    state_dir: Option<PathBuf>,
    /// Log more; repeat for more detail
    #[clap(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Also write the log to this file
    /// [default for `run`: watcher.log in the state directory]
    #[clap(long, global = true)]
    log_file: Option<PathBuf>,
    #[clap(subcommand)]
    command: WatcherCommand,
}

impl WatcherCli {
    pub fn run(self) -> Result<()> {
        let dir = self
            .state_dir
            .map(StateDir::new)
            .unwrap_or_else(StateDir::default_location);
        let log_file = match (self.log_file, &self.command) {
            (Some(path), _) => Some(path),
            (None, WatcherCommand::Run { .. }) => dir.ensure().ok().map(|()| dir.log_path()),
            (None, _) => None,
        };
        init_logging(self.verbose, log_file);
        self.command.dispatch(App::new(dir))
    }
}

#[derive(Debug, Subcommand)]
#[clap(rename_all = "kebab-case")]
enum WatcherCommand {
    /// Keep polling until interrupted, resuming any recorded schedule
    Run {
        /// State to assume before the first poll (open, closed, unknown)
        #[clap(long)]
        carry: Option<ObservedState>,
        /// Invoked at login; exit unless start_on_boot is set
        #[clap(long)]
        boot: bool,
    },
    /// Poll once, record when the next poll is due and exit
    Poll {
        /// State to compare against instead of the recorded one
        #[clap(long)]
        carry: Option<ObservedState>,
    },
    /// Poll if the recorded next poll is due; meant for cron or systemd timers
    Tick,
    /// Stop watching, including a `run` in another shell, and clear the notification
    Stop,
    /// Show the last known state and the next poll
    Status {
        #[clap(long)]
        json: bool,
    },
    /// Show or change settings
    Settings {
        #[clap(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Debug, Subcommand)]
enum SettingsAction {
    /// Print the settings in effect
    Show,
    /// Change one setting, e.g. `set poll-interval 5m`
    Set { key: SettingKey, value: String },
    /// Restore all defaults
    Reset,
    /// Write a settings file with the defaults
    Init,
}

impl WatcherCommand {
    fn dispatch(self, app: App) -> Result<()> {
        match self {
            Self::Run { carry, boot } => app.run(carry, boot),
            Self::Poll { carry } => app.poll(carry),
            Self::Tick => app.tick(),
            Self::Stop => app.stop(),
            Self::Status { json } => app.status(json),
            Self::Settings { action } => match action {
                SettingsAction::Show => app.settings_show(),
                SettingsAction::Set { key, value } => app.settings_set(key, &value),
                SettingsAction::Reset => app.settings_reset(),
                SettingsAction::Init => app.settings_init(),
            },
        }
    }
}

fn init_logging(verbose: u8, log_file: Option<PathBuf>) {
    let destination = match log_file {
        Some(path) => LogDestination::Both(path),
        None => LogDestination::Terminal,
    };
    engine_logging::initialize(destination, level_for_verbosity(verbose));
}
