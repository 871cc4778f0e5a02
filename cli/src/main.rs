use clap::{Parser, Subcommand};
use std::path::PathBuf;

use dexemu::EmuError;

use crate::commands::{command_emulate, command_methods, EmulateOptions};

mod commands;

#[derive(Parser)]
#[command(version, about, arg_required_else_help(true))]
struct Cli {
    #[command(subcommand)]
    commands: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Emulate a target method at every call site and report the results
    Emulate {
        /// Path to the apk file
        apk: PathBuf,

        /// Target method as LClassName;->methodName
        target: String,

        /// Show per-site progress and resolved static fields
        #[arg(short, long)]
        verbose: bool,

        /// Trace every executed instruction
        #[arg(short, long)]
        debug: bool,

        /// Limit to the first N call sites (0 = all)
        #[arg(short, long, default_value_t = 0)]
        limit: usize,

        /// Print the report as json instead of text
        #[arg(long)]
        json: bool,

        /// Package name the mocked Context reports
        #[arg(long)]
        package_name: Option<String>,
    },

    /// List every method with bytecode across all dex containers
    Methods {
        /// Path to the apk file
        apk: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    // -v raises the default level to info, -d to trace; RUST_LOG wins
    let default_level = match &cli.commands {
        Some(Commands::Emulate { debug: true, .. }) => "trace",
        Some(Commands::Emulate { verbose: true, .. }) => "info",
        _ => "warn",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let result = match cli.commands {
        Some(Commands::Emulate {
            apk,
            target,
            verbose,
            debug: _,
            limit,
            json,
            package_name,
        }) => command_emulate(EmulateOptions {
            apk,
            target,
            verbose,
            limit,
            json,
            package_name,
        }),
        Some(Commands::Methods { apk }) => command_methods(&apk),
        None => Ok(()),
    };

    if let Err(err) = result {
        eprintln!("{err:#}");

        // only a bad target or a missing method is a failure exit; a
        // degenerate analysis still completed
        let fatal = err.downcast_ref::<EmuError>().is_some_and(|e| {
            matches!(
                e,
                EmuError::InvalidTarget(_) | EmuError::MethodNotFound(_)
            )
        });
        if fatal {
            std::process::exit(1);
        }
    }
}
