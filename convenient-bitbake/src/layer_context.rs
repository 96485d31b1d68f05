// Layer context management for BitBake builds
// Handles layer configuration and priorities

use crate::{ConfFile, VariableExpander};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Layer configuration from layer.conf
#[derive(Debug, Clone)]
pub struct LayerConfig {
    /// Layer directory path
    pub layer_dir: PathBuf,
    /// Layer collection name (e.g., "core", "meta-oe", "fmu")
    pub collection: String,
    /// Layer priority (higher = more important)
    pub priority: i32,
    /// Layer version
    pub version: Option<String>,
    /// Layer dependencies (collection names, version constraints dropped)
    pub depends: Vec<String>,
    /// Layer series compatibility
    pub series_compat: Vec<String>,
    /// BBFILES glob patterns contributed by this layer, with LAYERDIR expanded
    pub bbfiles: Vec<String>,
    /// All variables from layer.conf
    pub variables: HashMap<String, String>,
}

impl LayerConfig {
    /// Parse a layer.conf file
    pub fn parse<P: AsRef<Path>>(layer_conf_path: P) -> Result<Self, String> {
        let path = layer_conf_path.as_ref();
        let layer_dir = path
            .parent()
            .and_then(|p| p.parent())
            .ok_or_else(|| "Invalid layer.conf path".to_string())?
            .to_path_buf();

        let conf = ConfFile::parse_file(path)?;

        let mut expander = VariableExpander::new();
        expander.set("LAYERDIR", layer_dir.to_string_lossy());

        let collection = conf
            .get("BBFILE_COLLECTIONS")
            .and_then(|s| s.split_whitespace().last())
            .map(str::to_string)
            .unwrap_or_else(|| dir_name(&layer_dir));

        // Priority lives in BBFILE_PRIORITY_<collection>
        let priority_key = format!("BBFILE_PRIORITY_{collection}");
        let priority = match conf.get(&priority_key) {
            Some(value) => value.trim().parse::<i32>().map_err(|e| {
                format!("Invalid {priority_key} '{value}' in {}: {e}", path.display())
            })?,
            None => 0,
        };

        let version_key = format!("LAYERVERSION_{collection}");
        let version = conf.get(&version_key).map(str::to_string);

        let depends_key = format!("LAYERDEPENDS_{collection}");
        let depends = conf.get(&depends_key).map(parse_depends).unwrap_or_default();

        let compat_key = format!("LAYERSERIES_COMPAT_{collection}");
        let series_compat = conf
            .get(&compat_key)
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let bbfiles = conf
            .get("BBFILES")
            .map(|s| {
                s.split_whitespace()
                    .map(|pattern| expander.expand(pattern))
                    .collect()
            })
            .unwrap_or_default();

        Ok(LayerConfig {
            layer_dir,
            collection,
            priority,
            version,
            depends,
            series_compat,
            bbfiles,
            variables: conf.variables,
        })
    }

    /// Load the configuration for a layer directory
    ///
    /// Layers without a `conf/layer.conf` get their directory name as
    /// collection and priority 0.
    pub fn for_layer_dir<P: AsRef<Path>>(layer_dir: P) -> Result<Self, String> {
        let layer_dir = layer_dir.as_ref();
        let layer_conf = layer_dir.join("conf/layer.conf");

        if layer_conf.is_file() {
            return Self::parse(&layer_conf);
        }

        warn!("Layer missing layer.conf: {:?}", layer_dir);
        Ok(LayerConfig {
            layer_dir: layer_dir.to_path_buf(),
            collection: dir_name(layer_dir),
            priority: 0,
            version: None,
            depends: Vec::new(),
            series_compat: Vec::new(),
            bbfiles: Vec::new(),
            variables: HashMap::new(),
        })
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

/// `LAYERDEPENDS_x = "core (>= 12) openembedded-layer"` -> `["core", "openembedded-layer"]`
fn parse_depends(value: &str) -> Vec<String> {
    let mut depends = Vec::new();
    let mut in_constraint = false;

    for word in value.split_whitespace() {
        if in_constraint {
            in_constraint = !word.ends_with(')');
            continue;
        }
        if word.starts_with('(') {
            in_constraint = !word.ends_with(')');
            continue;
        }
        depends.push(word.to_string());
    }

    depends
}

/// All configured layers ordered by priority
#[derive(Debug, Default)]
pub struct BuildContext {
    /// All layers in priority order (highest priority first)
    pub layers: Vec<LayerConfig>,
}

impl BuildContext {
    /// Create a new build context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer to the context
    pub fn add_layer(&mut self, layer: LayerConfig) {
        info!("Adding layer: {} (priority: {})", layer.collection, layer.priority);
        self.layers.push(layer);
        // Stable sort keeps BBLAYERS order among equal priorities
        self.layers.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Add a layer by parsing its layer.conf
    pub fn add_layer_from_conf<P: AsRef<Path>>(&mut self, layer_conf: P) -> Result<(), String> {
        let layer = LayerConfig::parse(layer_conf)?;
        self.add_layer(layer);
        Ok(())
    }

    /// Build a context from the configured layer directories
    pub fn from_layer_dirs(layer_dirs: &[PathBuf]) -> Result<Self, String> {
        let mut context = Self::new();
        for dir in layer_dirs {
            context.add_layer(LayerConfig::for_layer_dir(dir)?);
        }
        debug!("BuildContext created with {} layers", context.layers.len());
        Ok(context)
    }

    /// Get the layer that contains a given path
    ///
    /// Nested layers resolve to the deepest containing layer directory.
    pub fn layer_for_path(&self, path: &Path) -> Option<&LayerConfig> {
        self.layers
            .iter()
            .filter(|layer| path.starts_with(&layer.layer_dir))
            .max_by_key(|layer| layer.layer_dir.components().count())
    }

    /// Verify layer dependencies
    pub fn verify_dependencies(&self) -> Result<(), String> {
        let available: HashSet<_> = self.layers.iter().map(|l| l.collection.as_str()).collect();

        for layer in &self.layers {
            for dep in &layer.depends {
                if !available.contains(dep.as_str()) {
                    return Err(format!(
                        "Layer '{}' depends on '{}' which is not available",
                        layer.collection, dep
                    ));
                }
            }
        }

        Ok(())
    }
}
