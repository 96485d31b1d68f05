//! Recipe file collection across all configured layers
//!
//! Mirrors what BitBake's file collector does before parsing: every layer
//! contributes the files matching its `BBFILES` patterns, recipes are ordered by
//! the priority of the layer they live in, and a recipe file whose file name is
//! also provided by a higher priority layer is recorded as overlayed.

use crate::error::{EngineError, EngineResult};
use crate::{BuildContext, LayerConfig};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Overlaying recipe path -> recipe paths it fully overrides
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayMap {
    entries: BTreeMap<PathBuf, Vec<PathBuf>>,
}

impl OverlayMap {
    /// Create an empty overlay map
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `overlaying` supersedes `overlayed`
    pub fn insert(&mut self, overlaying: impl Into<PathBuf>, overlayed: impl Into<PathBuf>) {
        self.entries
            .entry(overlaying.into())
            .or_default()
            .push(overlayed.into());
    }

    /// Recipes overlayed by `overlaying`
    pub fn overlayed_by(&self, overlaying: &Path) -> &[PathBuf] {
        self.entries
            .get(overlaying)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &Vec<PathBuf>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<P: Into<PathBuf>, Q: Into<PathBuf>> FromIterator<(P, Q)> for OverlayMap {
    fn from_iter<I: IntoIterator<Item = (P, Q)>>(iter: I) -> Self {
        let mut map = OverlayMap::new();
        for (overlaying, overlayed) in iter {
            map.insert(overlaying, overlayed);
        }
        map
    }
}

/// Result of collecting recipe files from all layers
#[derive(Debug, Default)]
pub struct RecipeCollection {
    /// `.bb` files, lowest priority first
    pub bbfiles: Vec<PathBuf>,
    /// `.bbappend` files
    pub bbappends: Vec<PathBuf>,
    /// Recipes fully overridden by a higher priority layer
    pub overlayed: OverlayMap,
}

impl RecipeCollection {
    /// Collect recipe files for every layer in `context`
    ///
    /// `cancel` is polled between files; once set the collection stops with
    /// [`EngineError::Interrupted`].
    pub fn collect(context: &BuildContext, cancel: &AtomicBool) -> EngineResult<Self> {
        let mut seen = HashSet::new();
        let mut bbfiles: Vec<(i32, PathBuf)> = Vec::new();
        let mut bbappends = Vec::new();

        // Lowest priority first so equal names resolve towards later layers
        for layer in context.layers.iter().rev() {
            for file in layer_files(layer, cancel)? {
                if !seen.insert(file.clone()) {
                    continue;
                }
                match file.extension().and_then(|e| e.to_str()) {
                    Some("bb") => {
                        let priority = context
                            .layer_for_path(&file)
                            .map_or(layer.priority, |owner| owner.priority);
                        bbfiles.push((priority, file));
                    }
                    Some("bbappend") => bbappends.push(file),
                    _ => debug!("Ignoring non-recipe BBFILES match {:?}", file),
                }
            }
        }

        bbfiles.sort_by_key(|(priority, _)| *priority);
        let bbfiles: Vec<PathBuf> = bbfiles.into_iter().map(|(_, file)| file).collect();
        let overlayed = find_overlayed(&bbfiles);

        info!(
            "Collected {} recipes, {} appends, {} overlaying recipes",
            bbfiles.len(),
            bbappends.len(),
            overlayed.len()
        );

        Ok(RecipeCollection {
            bbfiles,
            bbappends,
            overlayed,
        })
    }
}

/// Walk the priority ordered list from the top; the first file seen for a
/// file name wins and overlays every later file of the same name.
fn find_overlayed(bbfiles: &[PathBuf]) -> OverlayMap {
    let mut top_files: HashMap<&std::ffi::OsStr, &PathBuf> = HashMap::new();
    let mut overlayed = OverlayMap::new();

    for file in bbfiles.iter().rev() {
        let Some(base) = file.file_name() else {
            continue;
        };
        match top_files.entry(base) {
            Entry::Occupied(top) => overlayed.insert(*top.get(), file),
            Entry::Vacant(slot) => {
                slot.insert(file);
            }
        }
    }

    overlayed
}

fn check_cancel(cancel: &AtomicBool) -> EngineResult<()> {
    if cancel.load(Ordering::SeqCst) {
        return Err(EngineError::Interrupted);
    }
    Ok(())
}

/// Files a layer contributes: its BBFILES matches, or every recipe file under
/// it when it declares no patterns
fn layer_files(layer: &LayerConfig, cancel: &AtomicBool) -> EngineResult<Vec<PathBuf>> {
    check_cancel(cancel)?;
    let mut files = Vec::new();

    if layer.bbfiles.is_empty() {
        debug!("No BBFILES for {}, scanning {:?}", layer.collection, layer.layer_dir);
        for entry in WalkDir::new(&layer.layer_dir) {
            check_cancel(cancel)?;
            match entry {
                Ok(entry) if entry.file_type().is_file() && is_recipe_file(entry.path()) => {
                    files.push(entry.into_path());
                }
                Ok(_) => {}
                Err(e) => warn!("Error reading directory entry: {}", e),
            }
        }
        return Ok(files);
    }

    for pattern in &layer.bbfiles {
        let paths = glob::glob(pattern).map_err(|source| EngineError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;
        for path in paths {
            check_cancel(cancel)?;
            match path {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => warn!("Error matching {}: {}", pattern, e),
            }
        }
    }

    Ok(files)
}

pub(crate) fn is_recipe_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("bb" | "bbappend")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn layer(root: &Path, name: &str, priority: i32, files: &[&str]) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(dir.join("conf")).unwrap();
        fs::write(
            dir.join("conf/layer.conf"),
            format!(
                "BBFILES += \"${{LAYERDIR}}/recipes-*/*/*.bb ${{LAYERDIR}}/recipes-*/*/*.bbappend\"\n\
                 BBFILE_COLLECTIONS += \"{name}\"\n\
                 BBFILE_PRIORITY_{name} = \"{priority}\"\n"
            ),
        )
        .unwrap();
        for file in files {
            let path = dir.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        }
        dir
    }

    #[test]
    fn test_higher_priority_overlays_same_file_name() {
        let temp = TempDir::new().unwrap();
        let low = layer(temp.path(), "meta-low", 5, &["recipes-core/foo/foo_1.0.bb"]);
        let high = layer(temp.path(), "meta-high", 10, &["recipes-core/foo/foo_1.0.bb"]);

        let context = BuildContext::from_layer_dirs(&[low.clone(), high.clone()]).unwrap();
        let collection = RecipeCollection::collect(&context, &AtomicBool::new(false)).unwrap();

        assert_eq!(collection.bbfiles.len(), 2);
        assert_eq!(
            collection
                .overlayed
                .overlayed_by(&high.join("recipes-core/foo/foo_1.0.bb")),
            &[low.join("recipes-core/foo/foo_1.0.bb")]
        );
        assert_eq!(collection.overlayed.len(), 1);
    }

    #[test]
    fn test_different_versions_do_not_overlay() {
        let temp = TempDir::new().unwrap();
        let low = layer(temp.path(), "meta-low", 5, &["recipes-core/foo/foo_1.0.bb"]);
        let high = layer(temp.path(), "meta-high", 10, &["recipes-core/foo/foo_2.0.bb"]);

        let context = BuildContext::from_layer_dirs(&[low, high]).unwrap();
        let collection = RecipeCollection::collect(&context, &AtomicBool::new(false)).unwrap();

        assert!(collection.overlayed.is_empty());
    }

    #[test]
    fn test_appends_collected_separately() {
        let temp = TempDir::new().unwrap();
        let dir = layer(
            temp.path(),
            "meta-a",
            6,
            &[
                "recipes-core/foo/foo_1.0.bb",
                "recipes-core/foo/foo_%.bbappend",
                "recipes-core/foo/foo.inc",
            ],
        );

        let context = BuildContext::from_layer_dirs(&[dir]).unwrap();
        let collection = RecipeCollection::collect(&context, &AtomicBool::new(false)).unwrap();

        assert_eq!(collection.bbfiles.len(), 1);
        assert_eq!(collection.bbappends.len(), 1);
    }

    #[test]
    fn test_layer_without_bbfiles_is_scanned() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("meta-plain");
        fs::create_dir_all(dir.join("deep/nested")).unwrap();
        fs::write(dir.join("deep/nested/bar.bb"), "").unwrap();
        fs::write(dir.join("deep/readme.txt"), "").unwrap();

        let context = BuildContext::from_layer_dirs(&[dir.clone()]).unwrap();
        let collection = RecipeCollection::collect(&context, &AtomicBool::new(false)).unwrap();

        assert_eq!(collection.bbfiles, vec![dir.join("deep/nested/bar.bb")]);
    }

    #[test]
    fn test_cancelled_collection() {
        let temp = TempDir::new().unwrap();
        let dir = layer(temp.path(), "meta-a", 6, &["recipes-core/foo/foo_1.0.bb"]);

        let context = BuildContext::from_layer_dirs(&[dir]).unwrap();
        let result = RecipeCollection::collect(&context, &AtomicBool::new(true));

        assert!(matches!(result, Err(EngineError::Interrupted)));
    }

    #[test]
    fn test_overlay_map_from_iter() {
        let map: OverlayMap = [("/a/foo.bb", "/b/foo.bb"), ("/a/foo.bb", "/c/foo.bb")]
            .into_iter()
            .collect();

        assert_eq!(map.len(), 1);
        assert_eq!(map.overlayed_by(Path::new("/a/foo.bb")).len(), 2);
        assert!(map.overlayed_by(Path::new("/x.bb")).is_empty());
    }
}
