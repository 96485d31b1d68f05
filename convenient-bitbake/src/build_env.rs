//! Build environment abstraction for BitBake
//!
//! Represents a BitBake build directory containing conf/bblayers.conf. The
//! expanded `BBLAYERS` list is the layer registry every other component works
//! from.

use crate::{BbLayersConfig, BuildContext, VariableExpander};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Represents a BitBake build environment
#[derive(Debug)]
pub struct BuildEnvironment {
    /// Build directory (TOPDIR)
    pub topdir: PathBuf,

    /// OE-Core root (OEROOT) - detected from layers
    pub oeroot: Option<PathBuf>,

    /// Configuration directory
    pub confdir: PathBuf,

    /// All layers with expanded paths, in BBLAYERS order
    pub layers: Vec<PathBuf>,

    /// Layer configuration from bblayers.conf
    pub bblayers_config: BbLayersConfig,
}

impl BuildEnvironment {
    /// Create a BuildEnvironment from a build directory
    ///
    /// # Arguments
    ///
    /// * `topdir` - Path to build directory (must contain conf/bblayers.conf)
    ///
    /// # Returns
    ///
    /// A fully initialized BuildEnvironment with expanded layer paths
    pub fn from_build_dir<P: AsRef<Path>>(topdir: P) -> Result<Self, String> {
        let topdir = topdir.as_ref();
        let topdir = topdir
            .canonicalize()
            .map_err(|e| format!("Failed to canonicalize TOPDIR {:?}: {}", topdir, e))?;

        info!("Loading build environment from: {:?}", topdir);

        if !topdir.is_dir() {
            return Err(format!("TOPDIR is not a directory: {:?}", topdir));
        }

        let confdir = topdir.join("conf");
        if !confdir.is_dir() {
            return Err(format!("conf/ directory not found in {:?}", topdir));
        }

        let bblayers_conf = confdir.join("bblayers.conf");
        if !bblayers_conf.exists() {
            return Err(format!("bblayers.conf not found: {:?}", bblayers_conf));
        }

        let bblayers_config = BbLayersConfig::parse(&bblayers_conf)?;

        let mut expander = VariableExpander::new();
        expander.set("TOPDIR", topdir.to_string_lossy());

        // Variables defined next to BBLAYERS (e.g. BSPDIR) may be referenced by it
        for (key, value) in &bblayers_config.variables {
            if key != "BBLAYERS" && expander.get(key).is_none() {
                expander.set(key.clone(), value.clone());
            }
        }

        let layers = expander.expand_paths(&bblayers_config.bblayers);
        debug!("Expanded {} layer paths", layers.len());

        let oeroot = Self::detect_oeroot(&layers);
        if let Some(ref oeroot_path) = oeroot {
            expander.set("OEROOT", oeroot_path.to_string_lossy());
            expander.set("COREBASE", oeroot_path.to_string_lossy());
            debug!("Detected OEROOT: {:?}", oeroot_path);
        }

        // Second pass picks up ${OEROOT}/${COREBASE} references
        let layers = expander.expand_paths(&layers);

        info!("Build environment initialized:");
        info!("  TOPDIR:     {:?}", topdir);
        info!("  Layers:     {} configured", layers.len());

        Ok(BuildEnvironment {
            topdir,
            oeroot,
            confdir,
            layers,
            bblayers_config,
        })
    }

    /// Detect OEROOT by looking for openembedded-core layer
    fn detect_oeroot(layers: &[PathBuf]) -> Option<PathBuf> {
        layers
            .iter()
            .find(|layer| layer.join("conf/bitbake.conf").exists())
            .and_then(|layer| layer.parent())
            .map(Path::to_path_buf)
    }

    /// Get all layers with absolute paths
    pub fn get_layers(&self) -> &[PathBuf] {
        &self.layers
    }

    /// Create a BuildContext from this environment
    ///
    /// Loads every layer.conf and orders the layers by priority.
    pub fn create_build_context(&self) -> Result<BuildContext, String> {
        info!("Creating BuildContext from environment");

        let build_context = BuildContext::from_layer_dirs(&self.layers)?;
        build_context.verify_dependencies()?;

        info!(
            "BuildContext created with {} layers",
            build_context.layers.len()
        );

        Ok(build_context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_build_env(temp_dir: &Path) -> PathBuf {
        let build_dir = temp_dir.join("build");
        let conf_dir = build_dir.join("conf");
        fs::create_dir_all(&conf_dir).unwrap();

        let bblayers_conf = conf_dir.join("bblayers.conf");
        fs::write(
            &bblayers_conf,
            r#"
POKY_BBLAYERS_CONF_VERSION = "2"
BBPATH = "${TOPDIR}"
BBFILES ?= ""
LAYERSDIR = "${TOPDIR}/../layers"

BBLAYERS ?= " \
  /path/to/meta \
  ${LAYERSDIR}/meta-custom \
  ${TOPDIR}/meta-local \
  "
"#,
        )
        .unwrap();

        build_dir
    }

    #[test]
    fn test_build_environment_from_build_dir() {
        let temp_dir = TempDir::new().unwrap();
        let build_dir = create_test_build_env(temp_dir.path());

        let env = BuildEnvironment::from_build_dir(&build_dir).unwrap();

        assert_eq!(env.layers.len(), 3);
        assert_eq!(env.layers[0], PathBuf::from("/path/to/meta"));
        assert!(env.oeroot.is_none());
    }

    #[test]
    fn test_variable_expansion_in_layer_paths() {
        let temp_dir = TempDir::new().unwrap();
        let build_dir = create_test_build_env(temp_dir.path());

        let env = BuildEnvironment::from_build_dir(&build_dir).unwrap();

        assert_eq!(env.layers[1], env.topdir.join("../layers/meta-custom"));
        assert_eq!(env.layers[2], env.topdir.join("meta-local"));
    }

    #[test]
    fn test_missing_bblayers_conf() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("conf")).unwrap();

        let err = BuildEnvironment::from_build_dir(temp_dir.path()).unwrap_err();
        assert!(err.contains("bblayers.conf not found"));
    }

    #[test]
    fn test_oeroot_detected_from_core_layer() {
        let temp_dir = TempDir::new().unwrap();
        let poky = temp_dir.path().join("poky");
        fs::create_dir_all(poky.join("meta/conf")).unwrap();
        fs::write(poky.join("meta/conf/bitbake.conf"), "").unwrap();

        let build_dir = temp_dir.path().join("build");
        fs::create_dir_all(build_dir.join("conf")).unwrap();
        fs::write(
            build_dir.join("conf/bblayers.conf"),
            format!("BBLAYERS = \"{}/meta\"\n", poky.display()),
        )
        .unwrap();

        let env = BuildEnvironment::from_build_dir(&build_dir).unwrap();
        assert_eq!(env.oeroot, Some(poky));
    }
}
