//! bitbake-touched - show or build the recipes a BitBake layer touches
//!
//! Usage:
//!   bitbake-touched show-touched [-b] <layer>          List touched recipes
//!   bitbake-touched run-on-layer <task> <layer>...     Run a task on them
//!   bitbake-touched show-layers                        List configured layers
//!   bitbake-touched show-overlayed                     List overlayed recipes

use bitbake_touched::commands::{
    CommandError, is_interrupted, parse_recipes, run_on_layer, show_layers, show_overlayed,
    show_touched,
};
use bitbake_touched::{Cli, Commands};
use clap::Parser;
use convenient_bitbake::{BitbakeEngine, BuildEngine};
use std::io;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit status for an interrupted recipe parse
const EXIT_INTERRUPTED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "bitbake_touched=debug,convenient_bitbake=debug"
    } else {
        "bitbake_touched=info,convenient_bitbake=info"
    };

    // Logs go to stderr, stdout is reserved for command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    match run(&cli).await {
        Ok(code) => code,
        Err(e) if is_interrupted(&e) => ExitCode::from(EXIT_INTERRUPTED),
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<ExitCode, CommandError> {
    let config = cli.engine_config();
    let engine = BitbakeEngine::new(&config)?;
    let mut stdout = io::stdout();

    match &cli.command {
        Commands::ShowLayers => {
            show_layers::execute(engine.layer_paths(), engine.context(), &mut stdout)?;
        }
        Commands::ShowTouched { batch, layer } => {
            let engine = parse_recipes(engine).await?;
            show_touched::execute(&engine, layer, *batch, &mut stdout)?;
        }
        Commands::ShowOverlayed => {
            let engine = parse_recipes(engine).await?;
            show_overlayed::execute(&engine, &mut stdout)?;
        }
        Commands::RunOnLayer {
            unique,
            task,
            layers,
        } => {
            let engine = parse_recipes(engine).await?;
            let code = run_on_layer::execute(&engine, task, layers, *unique)?;
            return Ok(exit_code(code));
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Map an engine exit code onto the process exit code
fn exit_code(code: i32) -> ExitCode {
    match u8::try_from(code) {
        Ok(code) => ExitCode::from(code),
        Err(_) => ExitCode::FAILURE,
    }
}
