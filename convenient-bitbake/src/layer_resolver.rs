//! Layer to touched-recipe resolution
//!
//! A layer "touches" every recipe that has a `.bb` or `.bbappend` file
//! physically located under its directory, minus the recipes another layer
//! overlays completely. Those never get built from this layer, so there is no
//! point in running tasks on them.

use crate::error::LayerError;
use crate::recipe_collection::{OverlayMap, is_recipe_file};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Resolves layer names against the configured layer paths
#[derive(Debug, Clone, Copy)]
pub struct LayerResolver<'a> {
    layer_paths: &'a [PathBuf],
    overlayed: &'a OverlayMap,
}

impl<'a> LayerResolver<'a> {
    pub fn new(layer_paths: &'a [PathBuf], overlayed: &'a OverlayMap) -> Self {
        Self {
            layer_paths,
            overlayed,
        }
    }

    /// Find the first configured layer whose last path component is `name`
    pub fn resolve_layer_path(&self, name: &str) -> Result<&'a Path, LayerError> {
        self.layer_paths
            .iter()
            .find(|path| path.file_name().is_some_and(|last| last == name))
            .map(PathBuf::as_path)
            .ok_or_else(|| LayerError::NotFound {
                name: name.to_string(),
            })
    }

    /// Recipes under `layer_path` that another recipe overlays
    pub fn shadowed_files(&self, layer_path: &Path) -> HashSet<PathBuf> {
        self.overlayed
            .iter()
            .flat_map(|(_, overlayed)| overlayed)
            .filter(|path| path.starts_with(layer_path))
            .cloned()
            .collect()
    }

    /// Names of the recipes touched by layer `name`, in traversal order
    ///
    /// A recipe shows up once per metadata file, so a recipe with both a `.bb`
    /// and a `.bbappend` in the layer is listed twice.
    pub fn recipes_touched_by_layer(&self, name: &str) -> Result<Vec<String>, LayerError> {
        let layer_path = self.resolve_layer_path(name)?;
        let shadowed = self.shadowed_files(layer_path);
        debug!(
            "Layer {} at {:?} has {} shadowed recipes",
            name,
            layer_path,
            shadowed.len()
        );

        let mut recipes = Vec::new();
        for entry in WalkDir::new(layer_path) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Error reading directory entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if shadowed.contains(path) {
                info!("Skipping {} since it's shadowed", path.display());
                continue;
            }
            if !is_recipe_file(path) {
                continue;
            }
            if let Some(recipe) = recipe_name(path) {
                recipes.push(recipe);
            }
        }

        Ok(recipes)
    }

    /// Touched recipes of several layers, concatenated in the given order
    ///
    /// Recipes touched by more than one layer appear once per layer.
    pub fn recipes_touched_by_layers<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<String>, LayerError> {
        let mut recipes = Vec::new();
        for name in names {
            recipes.extend(self.recipes_touched_by_layer(name.as_ref())?);
        }
        Ok(recipes)
    }
}

/// Recipe name of a metadata file: the file stem up to the first underscore
///
/// `foo_1.2.3.bb` -> `foo`, `bar.bb` -> `bar`, `foo_%.bbappend` -> `foo`
pub fn recipe_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    stem.split('_').next().map(str::to_string)
}

/// Drop repeated recipe names, keeping the first occurrence
pub fn dedup_recipes(recipes: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    recipes
        .into_iter()
        .filter(|recipe| seen.insert(recipe.clone()))
        .collect()
}
