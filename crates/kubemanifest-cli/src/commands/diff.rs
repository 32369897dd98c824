//! Diff command - show the patch an update would send

use kubemanifest_core::ObjectRef;
use kubemanifest_kube::ReconcileConfig;
use std::path::Path;

use crate::display;
use crate::error::Result;
use crate::util;

/// Run the diff command
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

    let reconciler = util::connect(config).await?;
    let patch = reconciler.plan(key, &original, &request).await?;
    display::print_patch(key, &patch)
}
