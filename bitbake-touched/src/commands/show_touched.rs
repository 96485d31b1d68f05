//! List the recipes touched by a layer

use super::CommandError;
use convenient_bitbake::{BuildEngine, LayerResolver};
use std::io::Write;

/// Print the recipes touched by `layer`
///
/// One name per line, or a single space separated line in batch mode.
pub fn execute<E: BuildEngine, W: Write>(
    engine: &E,
    layer: &str,
    batch: bool,
    out: &mut W,
) -> Result<(), CommandError> {
    let resolver = LayerResolver::new(engine.layer_paths(), engine.overlayed()?);
    let recipes = resolver.recipes_touched_by_layer(layer)?;
    tracing::debug!("Layer {} touches {} recipes", layer, recipes.len());

    out.write_all(format_recipes(&recipes, batch).as_bytes())?;
    Ok(())
}

fn format_recipes(recipes: &[String], batch: bool) -> String {
    if recipes.is_empty() {
        return String::new();
    }
    let separator = if batch { " " } else { "\n" };
    let mut output = recipes.join(separator);
    output.push('\n');
    output
}
