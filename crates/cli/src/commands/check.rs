use std::path::Path;

use anyhow::{Context, Result};
use custodia_import::SchemaRegistry;

/// Execute the `check` command: load the configuration and list its sources.
pub fn execute(config_path: &Path) -> Result<()> {
    let registry = SchemaRegistry::load(config_path)
        .with_context(|| format!("Failed to load configuration: {}", config_path.display()))?;

    for schema in registry.sources() {
        println!(
            "{:18} OK  ({} columns, {} outputs, {} tables)",
            format!("{}:", schema.id),
            schema.fields.len(),
            schema.output.len(),
            schema.tables.len()
        );
    }

    let rejected: Vec<(&str, &str)> = registry.rejected().collect();
    for (id, reason) in &rejected {
        println!("{:18} FAILED", format!("{id}:"));
        println!("  {reason}");
    }

    if rejected.is_empty() {
        println!("\nAll {} sources valid.", registry.len());
        Ok(())
    } else {
        anyhow::bail!("{} source(s) failed validation", rejected.len())
    }
}
