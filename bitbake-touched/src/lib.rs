//! bitbake-touched - show or build the recipes a BitBake layer touches
//!
//! A thin layer over **convenient-bitbake**:
//!
//! 1. **Configuration**: `BitbakeEngine` reads conf/bblayers.conf and every layer.conf
//! 2. **Collection**: the engine gathers recipe files and the overlay map
//! 3. **Resolution**: `LayerResolver` lists the recipes under a layer that are not overlayed
//! 4. **Execution**: the recipe list is handed to bitbake for a single task
//!
//! Building, dependency resolution and task scheduling stay with BitBake.

pub mod commands;

pub use commands::{Cli, CommandError, Commands};
