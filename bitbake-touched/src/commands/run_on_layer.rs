//! Run one task on every recipe touched by a set of layers

use super::CommandError;
use convenient_bitbake::{BuildEngine, LayerResolver, dedup_recipes};
use tracing::{info, warn};

/// Resolve the touched recipes of `layers` and hand them to the engine
///
/// Recipes touched by several layers are passed once per layer unless
/// `unique` is set. Returns the engine's exit code; 0 when no recipe is
/// touched and nothing was run.
pub fn execute<E: BuildEngine>(
    engine: &E,
    task: &str,
    layers: &[String],
    unique: bool,
) -> Result<i32, CommandError> {
    let resolver = LayerResolver::new(engine.layer_paths(), engine.overlayed()?);
    let mut recipes = resolver.recipes_touched_by_layers(layers)?;
    if unique {
        recipes = dedup_recipes(recipes);
    }

    if recipes.is_empty() {
        warn!("No recipes touched by {}, nothing to run", layers.join(", "));
        return Ok(0);
    }

    info!("Running task {} on: {}", task, recipes.join(" "));
    let status = engine.run_task(task, &recipes)?;

    // Killed by a signal
    Ok(status.code().unwrap_or(1))
}
