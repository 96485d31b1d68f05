//! List recipes overridden by a same-named recipe in another layer

use super::CommandError;
use convenient_bitbake::BuildEngine;
use std::io::Write;

pub fn execute<E: BuildEngine, W: Write>(engine: &E, out: &mut W) -> Result<(), CommandError> {
    let overlayed = engine.overlayed()?;
    if overlayed.is_empty() {
        writeln!(out, "No overlayed recipes found.")?;
        return Ok(());
    }

    writeln!(out, "Overlayed recipes:")?;
    for (overlaying, files) in overlayed.iter() {
        writeln!(out, "{}", overlaying.display())?;
        for file in files {
            writeln!(out, "  {} (skipped)", file.display())?;
        }
    }

    Ok(())
}
