//! Read command - print the live state of an object

use console::style;
use kubemanifest_core::ObjectRef;
use kubemanifest_kube::ReconcileConfig;

use crate::display::{self, OutputFormat};
use crate::error::{CliError, Result};
use crate::util;

/// Run the read command
///
/// A gone object is reported as not found.
pub async fn run(key: &str, output: OutputFormat, config: ReconcileConfig) -> Result<()> {
    ObjectRef::from_key(key)?;

    let reconciler = util::connect(config).await?;
    match reconciler.read(key).await? {
        Some(object) => display::print_object(&object, output),
        None => Err(CliError::NotFound {
            message: format!("{} no longer exists", style(key).cyan()),
            help: Some("drop it from your state or create it again".to_string()),
        }),
    }
}
