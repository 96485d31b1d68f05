//! bitbake-touched command-line interface
//!
//! - `show-touched`: list the recipes a layer touches
//! - `run-on-layer`: run one task on every recipe touched by some layers
//! - `show-layers`: list the configured layers
//! - `show-overlayed`: list recipes overridden by higher priority layers

use clap::{Parser, Subcommand};
use convenient_bitbake::{BuildEngine, EngineConfig, EngineError};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

pub mod run_on_layer;
pub mod show_layers;
pub mod show_overlayed;
pub mod show_touched;

/// Error type shared by all command handlers
pub type CommandError = Box<dyn std::error::Error + Send + Sync>;

/// Show or build the BitBake recipes a layer touches
#[derive(Debug, Parser)]
#[command(name = "bitbake-touched")]
#[command(about = "Show or build the BitBake recipes a layer touches")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Build directory (must contain conf/bblayers.conf)
    #[arg(short = 'd', long, env = "BUILDDIR", default_value = "build", global = true)]
    pub builddir: PathBuf,

    /// bitbake executable used to run tasks
    #[arg(long, env = "BITBAKE", default_value = "bitbake", global = true)]
    pub bitbake: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Engine settings derived from the command line
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            build_dir: self.builddir.clone(),
            bitbake: self.bitbake.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the recipes touched by a layer
    ///
    /// Every .bb and .bbappend file under the layer counts, except recipes
    /// overlayed by a higher priority layer.
    ShowTouched {
        /// Space separated output suitable for passing to other commands
        #[arg(short, long)]
        batch: bool,

        /// Layer name (last component of its path in BBLAYERS)
        layer: String,
    },

    /// Run a task on every recipe touched by the given layers
    RunOnLayer {
        /// Pass each recipe only once even if several layers touch it
        #[arg(long)]
        unique: bool,

        /// Task to run (e.g. compile, fetch, build)
        task: String,

        /// Layer names
        #[arg(required = true)]
        layers: Vec<String>,
    },

    /// List the configured layers with their priorities
    ShowLayers,

    /// List recipes overridden by a recipe of the same name in another layer
    ShowOverlayed,
}

/// Run the engine's recipe collection, stopping cleanly on Ctrl-C
///
/// On interruption the engine is shut down and [`EngineError::Interrupted`]
/// is returned.
pub async fn parse_recipes<E>(mut engine: E) -> Result<E, CommandError>
where
    E: BuildEngine + Send + 'static,
{
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    let mut parse = tokio::task::spawn_blocking(move || {
        let result = engine.parse_all(&flag);
        (engine, result)
    });

    let (mut engine, result) = tokio::select! {
        joined = &mut parse => joined?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, stopping recipe parsing");
            cancel.store(true, Ordering::SeqCst);
            parse.await?
        }
    };

    match result {
        Ok(()) => Ok(engine),
        Err(e) => {
            if matches!(e, EngineError::Interrupted) {
                engine.shutdown();
            }
            Err(e.into())
        }
    }
}

/// Whether `err` is an interrupted recipe parse
pub fn is_interrupted(err: &CommandError) -> bool {
    matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::Interrupted)
    )
}


#[cfg(test)]
mod tests {
    use super::testing::FakeEngine;
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_show_touched_batch_flag() {
        let cli = Cli::parse_from(["bitbake-touched", "show-touched", "-b", "meta-oe"]);
        match cli.command {
            Commands::ShowTouched { batch, layer } => {
                assert!(batch);
                assert_eq!(layer, "meta-oe");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_run_on_layer_needs_a_layer() {
        let result = Cli::try_parse_from(["bitbake-touched", "run-on-layer", "compile"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from([
            "bitbake-touched",
            "--builddir",
            "/tmp/build",
            "run-on-layer",
            "compile",
            "meta-a",
            "meta-b",
        ])
        .unwrap();
        assert_eq!(cli.engine_config().build_dir, PathBuf::from("/tmp/build"));
        match cli.command {
            Commands::RunOnLayer {
                task,
                layers,
                unique,
            } => {
                assert_eq!(task, "compile");
                assert_eq!(layers, vec!["meta-a", "meta-b"]);
                assert!(!unique);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_parse_recipes_returns_parsed_engine() {
        let engine = parse_recipes(FakeEngine::default()).await.unwrap();
        assert!(engine.overlayed().is_ok());
    }

    #[tokio::test]
    async fn test_interrupted_parse_shuts_engine_down() {
        let shut_down = Arc::new(AtomicBool::new(false));
        let engine = FakeEngine {
            interrupt_parse: true,
            shut_down: Arc::clone(&shut_down),
            ..FakeEngine::default()
        };

        let err = parse_recipes(engine).await.unwrap_err();
        assert!(is_interrupted(&err));
        assert!(shut_down.load(Ordering::SeqCst));
    }
}
