//! Config Command
//!
//! Manage ContextWeave configuration.
//!
//! Usage:
//!   contextweave config show [-g] [-f json]
//!   contextweave config path
//!   contextweave config init [-g] [--force]

use std::path::Path;

use crate::cli::util::CommandContext;
use crate::config::ConfigLoader;
use crate::types::Result;

/// Show configuration
pub fn show(ctx: &CommandContext, global: bool, format: &str) -> Result<()> {
    if global {
        match ConfigLoader::global_config_path() {
            Some(global_path) if global_path.exists() => {
                let content = std::fs::read_to_string(&global_path)?;
                println!("# Global Config: {}\n", global_path.display());
                println!("{}", content);
            }
            Some(_) => {
                println!("No global config found.");
                println!("Run 'contextweave config init --global' to create one.");
            }
            None => println!("Cannot determine global config directory."),
        }
    } else {
        // Merged effective config
        ConfigLoader::show_config(&ctx.config, format == "json")?;
    }
    Ok(())
}

/// Show configuration paths
pub fn path(root: &Path) -> Result<()> {
    ConfigLoader::show_path(root);
    Ok(())
}

/// Initialize global configuration
pub fn init_global(force: bool) -> Result<()> {
    let config_path = ConfigLoader::init_global(force)?;
    println!("✓ Initialized global configuration");
    println!("  Config:    {}", config_path.display());
    Ok(())
}

/// Initialize project configuration
pub fn init_project(root: &Path, force: bool) -> Result<()> {
    let config_path = ConfigLoader::init_project(root, force)?;
    println!("✓ Initialized project configuration");
    println!(
        "  Directory: {}",
        ConfigLoader::project_dir(root).display()
    );
    println!("  Config:    {}", config_path.display());
    Ok(())
}
