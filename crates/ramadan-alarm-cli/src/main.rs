use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "ramadan-alarm", version, about = "Sehri, iftar and custom alarms")]
struct Cli {
    /// JSON timetable with per-date prayer times; dates it does not cover use
    /// the built-in fallback times
    #[arg(long, global = true, value_name = "FILE")]
    timetable: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Alarm management
    Alarm {
        #[command(subcommand)]
        action: commands::alarm::AlarmAction,
    },
    /// Show sehri and iftar times, every prayer, or the next prayer
    Times(commands::times::TimesArgs),
    /// Ringtone registry
    Ringtone {
        #[command(subcommand)]
        action: commands::ringtone::RingtoneAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Run the scheduler until interrupted
    Run(commands::run::RunArgs),
    /// Print shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(match cli.command {
        Commands::Run(_) => "info",
        _ => "warn",
    });

    let ctx = commands::Context::new(cli.timetable);
    let result = match cli.command {
        Commands::Alarm { action } => commands::alarm::run(&ctx, action),
        Commands::Times(args) => commands::times::run(&ctx, args),
        Commands::Ringtone { action } => commands::ringtone::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Run(args) => commands::run::run(&ctx, args),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "ramadan-alarm", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
