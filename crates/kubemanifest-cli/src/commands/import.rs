//! Import command - adopt an existing object by tracking key

use console::style;
use kubemanifest_core::ObjectRef;
use kubemanifest_kube::ReconcileConfig;

use crate::display::{self, OutputFormat};
use crate::error::Result;
use crate::util;

/// Run the import command
pub async fn run(key: &str, output: OutputFormat, config: ReconcileConfig) -> Result<()> {
    ObjectRef::from_key(key)?;

    let reconciler = util::connect(config).await?;
    let imported = reconciler.import(key).await?;

    display::success(format!("Imported {}", style(&imported.key).cyan()));
    display::print_object(&imported.object, output)
}
