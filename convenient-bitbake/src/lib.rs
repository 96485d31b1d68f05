//! Convenient BitBake layer tooling
//!
//! Reads a BitBake build directory (`conf/bblayers.conf` plus each layer's
//! `conf/layer.conf`), collects recipe files the way BitBake does before
//! parsing, and answers "which recipes does this layer touch?".
//!
//! ```no_run
//! use convenient_bitbake::{BitbakeEngine, BuildEngine, EngineConfig, LayerResolver};
//! use std::sync::atomic::AtomicBool;
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut engine = BitbakeEngine::new(&EngineConfig::default())?;
//! engine.parse_all(&AtomicBool::new(false))?;
//!
//! let resolver = LayerResolver::new(engine.layer_paths(), engine.overlayed()?);
//! let recipes = resolver.recipes_touched_by_layer("meta-custom")?;
//! engine.run_task("compile", &recipes)?;
//! # Ok(())
//! # }
//! ```

pub mod bitbake_config;
pub mod build_env;
pub mod engine;
pub mod error;
pub mod layer_context;
pub mod layer_resolver;
pub mod recipe_collection;

pub use bitbake_config::{BbLayersConfig, ConfFile, VariableExpander};
pub use build_env::BuildEnvironment;
pub use engine::{BitbakeEngine, BuildEngine, EngineConfig};
pub use error::{EngineError, EngineResult, LayerError};
pub use layer_context::{BuildContext, LayerConfig};
pub use layer_resolver::{LayerResolver, dedup_recipes, recipe_name};
pub use recipe_collection::{OverlayMap, RecipeCollection};
