//! ck-netctrl
//!
//! Command-line control for the Christian-Koppler antenna tuner. Tuning
//! states go to the SBC65EC relay controller as UDP datagrams; in `run` mode
//! the transceiver frequency selects the state from the stored profiles.

mod commands;
mod settings;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::settings::Settings;

const DEFAULT_FILTER: &str =
    "ck_netctrl=info,tuner_protocol=info,tuner_net=info,tuner_session=info,tuner_sim=info";
const VERBOSE_FILTER: &str =
    "ck_netctrl=debug,tuner_protocol=debug,tuner_net=debug,tuner_session=debug,tuner_sim=debug";

/// Control the Christian-Koppler antenna tuner over the network
#[derive(Parser, Debug)]
#[command(name = "ck-netctrl", version, about)]
struct Cli {
    /// Settings file (default: $XDG_CONFIG_HOME/ck-netctrl/settings.json)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Tuner address overrides
#[derive(Args, Debug, Clone, Default)]
pub struct TunerArgs {
    /// Tuner controller address (default: from settings)
    #[arg(long)]
    host: Option<String>,

    /// Tuner controller UDP port (default: from settings)
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one tuning state
    Send {
        /// L-bank value
        #[arg(value_parser = clap::value_parser!(u8).range(0..=127))]
        l: u8,
        /// C-bank value
        c: u8,
        /// Select the high-pass path
        #[arg(long)]
        highpass: bool,
        #[command(flatten)]
        tuner: TunerArgs,
    },

    /// Check whether the tuner answers ping
    Probe {
        #[command(flatten)]
        tuner: TunerArgs,
    },

    /// Connect, keep the heartbeat running and tune from the transceiver frequency
    Run {
        #[command(flatten)]
        tuner: TunerArgs,
        /// Transceiver CAT address (default: trx_port from settings)
        #[arg(long)]
        cat: Option<String>,
        /// Use a dummy transceiver fixed at this frequency in Hz
        #[arg(long)]
        dummy: Option<u64>,
        /// Stay in setup mode: connect and monitor without automatic tuning
        #[arg(long)]
        setup: bool,
    },

    /// Manage frequency profiles
    Profiles {
        #[command(subcommand)]
        action: ProfilesAction,
    },

    /// Run a virtual tuner (and optionally a virtual transceiver) on this machine
    Sim {
        /// Address the virtual tuner listens on
        #[arg(long, default_value = "127.0.0.1:54123")]
        bind: String,
        /// Also serve a virtual CAT transceiver on this address
        #[arg(long)]
        cat: Option<String>,
        /// Start frequency of the virtual transceiver in Hz
        #[arg(long, default_value_t = tuner_session::DUMMY_START_FREQ)]
        frequency: u64,
    },

    /// Replace the current settings with those from another file
    Import {
        /// Settings file to read
        path: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProfilesAction {
    /// List profiles in lookup order
    List,
    /// Append a profile
    Add {
        /// Lower edge in Hz
        min: u64,
        /// Upper edge in Hz
        max: u64,
        /// L-bank value
        #[arg(value_parser = clap::value_parser!(u8).range(0..=127))]
        l: u8,
        /// C-bank value
        c: u8,
        /// Select the high-pass path
        #[arg(long)]
        highpass: bool,
    },
    /// Remove the profile at a list position
    Remove {
        /// Position as shown by `profiles list`
        index: usize,
    },
    /// Show the profile that applies to a frequency
    Lookup {
        /// Frequency in Hz
        frequency: u64,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let path = match cli.settings {
        Some(path) => path,
        None => Settings::default_path().context("could not determine settings path")?,
    };
    let mut settings = Settings::load_from(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;

    match cli.command {
        Command::Send {
            l,
            c,
            highpass,
            tuner,
        } => commands::send(&settings, &tuner, l, c, highpass).await,
        Command::Probe { tuner } => commands::probe(&settings, &tuner).await,
        Command::Run {
            tuner,
            cat,
            dummy,
            setup,
        } => commands::run(&settings, &tuner, cat, dummy, setup).await,
        Command::Profiles { action } => commands::profiles(&mut settings, action),
        Command::Sim {
            bind,
            cat,
            frequency,
        } => commands::sim(&bind, cat.as_deref(), frequency).await,
        Command::Import { path } => commands::import(&mut settings, &path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_send_rejects_l_out_of_range() {
        assert!(Cli::try_parse_from(["ck-netctrl", "send", "128", "0"]).is_err());

        let cli = Cli::try_parse_from(["ck-netctrl", "send", "127", "255", "--highpass"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Send {
                l: 127,
                c: 255,
                highpass: true,
                ..
            }
        ));
    }

    #[test]
    fn test_profiles_add_parses() {
        let cli = Cli::try_parse_from([
            "ck-netctrl",
            "--settings",
            "/tmp/x.json",
            "profiles",
            "add",
            "3500000",
            "3800000",
            "10",
            "20",
        ])
        .unwrap();
        assert_eq!(cli.settings, Some(PathBuf::from("/tmp/x.json")));
        assert!(matches!(
            cli.command,
            Command::Profiles {
                action: ProfilesAction::Add {
                    min: 3_500_000,
                    highpass: false,
                    ..
                }
            }
        ));
    }
}
