//! Create command - create an object and wait until it is ready

use console::style;
use kubemanifest_kube::ReconcileConfig;
use std::path::Path;

use crate::display;
use crate::error::Result;
use crate::util;

/// Run the create command
pub async fn run(file: &Path, namespace: Option<&str>, config: ReconcileConfig) -> Result<()> {
    let request = util::manifest_request(file, namespace, false)?;
    let object = request.resolve()?;

    display::step(format!(
        "Creating {} and waiting up to {:?} for readiness",
        style(object.display_name()).cyan(),
        config.create.timeout
    ));

    let reconciler = util::connect(config).await?;
    let applied = reconciler.create(&request).await?;

    display::success(format!("{} is ready", style(&applied.key).cyan()));
    display::print_key(&applied.key);
    Ok(())
}
