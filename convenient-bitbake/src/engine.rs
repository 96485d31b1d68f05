//! Build engine boundary
//!
//! Everything that needs real BitBake behaviour goes through [`BuildEngine`]:
//! collecting recipes (which yields the overlay map), and running a task on a
//! list of recipes. [`BitbakeEngine`] collects natively and hands task
//! execution to the `bitbake` executable.

use crate::error::{EngineError, EngineResult};
use crate::{BuildContext, BuildEnvironment, OverlayMap, RecipeCollection};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::sync::atomic::AtomicBool;
use tracing::{debug, info};

/// Operations the touched-recipe tooling needs from a build engine
pub trait BuildEngine {
    /// Configured layer paths, in configuration order
    fn layer_paths(&self) -> &[PathBuf];

    /// Collect all recipes. Must complete before [`BuildEngine::overlayed`]
    /// is available. Stops with [`EngineError::Interrupted`] once `cancel` is set.
    fn parse_all(&mut self, cancel: &AtomicBool) -> EngineResult<()>;

    /// Overlaying recipe -> overlayed recipes, available after `parse_all`
    fn overlayed(&self) -> EngineResult<&OverlayMap>;

    /// Run `task` for every recipe in `recipes` and wait for it to finish
    fn run_task(&self, task: &str, recipes: &[String]) -> EngineResult<ExitStatus>;

    /// Release engine state after an aborted run
    fn shutdown(&mut self);
}

/// Settings the engine is created from
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// BitBake build directory (TOPDIR), containing conf/bblayers.conf
    pub build_dir: PathBuf,
    /// bitbake executable used for task execution
    pub bitbake: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            build_dir: PathBuf::from("build"),
            bitbake: PathBuf::from("bitbake"),
        }
    }
}

/// [`BuildEngine`] backed by a BitBake build directory
#[derive(Debug)]
pub struct BitbakeEngine {
    bitbake: PathBuf,
    env: BuildEnvironment,
    context: BuildContext,
    collection: Option<RecipeCollection>,
}

impl BitbakeEngine {
    /// Load bblayers.conf and every layer.conf of the build directory
    pub fn new(config: &EngineConfig) -> EngineResult<Self> {
        let env = BuildEnvironment::from_build_dir(&config.build_dir).map_err(EngineError::Config)?;
        let context = env.create_build_context().map_err(EngineError::Config)?;

        Ok(Self {
            bitbake: config.bitbake.clone(),
            env,
            context,
            collection: None,
        })
    }

    /// Layers ordered by priority
    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    /// Build directory the engine runs in
    pub fn topdir(&self) -> &Path {
        &self.env.topdir
    }

    /// Command line handed to bitbake for `task` on `recipes`
    pub fn task_command(&self, task: &str, recipes: &[String]) -> Command {
        let mut command = Command::new(&self.bitbake);
        command
            .current_dir(&self.env.topdir)
            .env("BUILDDIR", &self.env.topdir)
            .arg("-c")
            .arg(task)
            .args(recipes);
        command
    }
}

impl BuildEngine for BitbakeEngine {
    fn layer_paths(&self) -> &[PathBuf] {
        self.env.get_layers()
    }

    fn parse_all(&mut self, cancel: &AtomicBool) -> EngineResult<()> {
        info!("Collecting recipes from {} layers", self.context.layers.len());
        self.collection = Some(RecipeCollection::collect(&self.context, cancel)?);
        Ok(())
    }

    fn overlayed(&self) -> EngineResult<&OverlayMap> {
        self.collection
            .as_ref()
            .map(|collection| &collection.overlayed)
            .ok_or(EngineError::NotParsed)
    }

    fn run_task(&self, task: &str, recipes: &[String]) -> EngineResult<ExitStatus> {
        info!("Running {} on {} recipes", task, recipes.len());
        let mut command = self.task_command(task, recipes);
        debug!("Executing {:?}", command);

        command.status().map_err(|source| EngineError::Spawn {
            program: self.bitbake.clone(),
            source,
        })
    }

    fn shutdown(&mut self) {
        info!("Shutting down build engine");
        self.collection = None;
    }
}
