//! Delete command - delete an object and wait until it is gone

use console::style;
use kubemanifest_core::ObjectRef;
use kubemanifest_kube::ReconcileConfig;

use crate::display;
use crate::error::Result;
use crate::util;

/// Run the delete command
pub async fn run(key: &str, cascade: bool, config: ReconcileConfig) -> Result<()> {
    let object_ref = ObjectRef::from_key(key)?;

    display::step(format!(
        "Deleting {}{}",
        style(object_ref.display_name()).cyan(),
        if cascade { " (foreground)" } else { "" }
    ));

    let reconciler = util::connect(config).await?;
    reconciler.delete(key, cascade).await?;

    display::success(format!("{} deleted", style(key).cyan()));
    Ok(())
}
