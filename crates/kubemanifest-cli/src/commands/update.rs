//! Update command - patch an object from its previous manifest to a new one

use console::style;
use kubemanifest_core::ObjectRef;
use kubemanifest_kube::ReconcileConfig;
use std::path::Path;

use crate::display;
use crate::error::Result;
use crate::util;

/// Run the update command
pub async fn run(
    key: &str,
    previous: &Path,
    file: &Path,
    namespace: Option<&str>,
    config: ReconcileConfig,
) -> Result<()> {
    ObjectRef::from_key(key)?;
    let original = util::read_manifest(previous)?;
    let request = util::manifest_request(file, namespace, false)?;

    display::step(format!("Updating {}", style(key).cyan()));

    let reconciler = util::connect(config).await?;
    let updated = reconciler.update(key, &original, &request).await?;

    if updated.changed {
        display::success(format!("{} updated and ready", style(&updated.applied.key).cyan()));
    } else {
        display::success(format!(
            "{} already up to date",
            style(&updated.applied.key).cyan()
        ));
    }
    display::print_key(&updated.applied.key);
    Ok(())
}
