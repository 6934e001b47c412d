//! `validate` command implementation.

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::ValidateArgs;

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Validation failed for {}", args.config.display()))?;

    info!(
        config = %args.config.display(),
        sources = blueprint.sources.len(),
        transformers = blueprint.transformers.len(),
        consumers = blueprint.consumers.len(),
        "Blueprint is valid"
    );

    if args.print {
        let json = config_loader::ConfigLoader::to_json(&blueprint)
            .context("Failed to serialize blueprint")?;
        println!("{json}");
    }
    Ok(())
}
