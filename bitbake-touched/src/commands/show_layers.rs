//! List the configured layers

use super::CommandError;
use convenient_bitbake::BuildContext;
use std::io::Write;
use std::path::PathBuf;

/// Print name, path and priority of every layer in BBLAYERS order
///
/// The name column is what `show-touched` and `run-on-layer` accept.
pub fn execute<W: Write>(
    layer_paths: &[PathBuf],
    context: &BuildContext,
    out: &mut W,
) -> Result<(), CommandError> {
    writeln!(out, "{:<24} {:<48} {}", "layer", "path", "priority")?;
    writeln!(out, "{}", "=".repeat(82))?;

    for path in layer_paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let priority = context
            .layer_for_path(path)
            .map_or_else(|| "-".to_string(), |layer| layer.priority.to_string());

        writeln!(out, "{:<24} {:<48} {}", name, path.display().to_string(), priority)?;
    }

    Ok(())
}
