//! Rotate every group of a config file

use anyhow::Result;
use logrot_core::{ConfigFile, GroupConfig};
use logrot_engine::Rotator;
use std::path::Path;
use tracing::{error, info};

/// Rotate the groups in file order.
///
/// A group whose configuration does not resolve is reported and skipped; any
/// other failure stops the run.
pub async fn execute(config_path: &Path) -> Result<()> {
    let config = ConfigFile::load(config_path)?;
    if config.groups.is_empty() {
        info!("No rotation groups in {}", config_path.display());
        return Ok(());
    }

    let mut invalid = 0;
    for (index, group) in config.groups.into_iter().enumerate() {
        let rotator = match prepare(group, index) {
            Ok(rotator) => rotator,
            Err(e) => {
                error!("Skipping group {}: {}", index, e);
                eprintln!("Error: group {}: {}", index, e);
                invalid += 1;
                continue;
            }
        };

        let report = rotator.rotate().await?;
        info!("{}", report);
    }

    if invalid > 0 {
        anyhow::bail!("{} group(s) had configuration errors", invalid);
    }
    Ok(())
}

fn prepare(group: GroupConfig, index: usize) -> logrot_core::Result<Rotator> {
    Rotator::new(group.into_group(index)?)
}
