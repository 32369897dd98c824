//! Shared utility functions for CLI commands

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kubemanifest_kube::{ClusterApi, ManifestRequest, ReconcileConfig, Reconciler};

use crate::error::{CliError, Result};

/// Default config location, `$XDG_CONFIG_HOME/kubemanifest/config.yaml` or platform equivalent
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("kubemanifest").join("config.yaml"))
}

/// Load the reconcile config
///
/// An explicit path must exist. The default path is used only when present;
/// otherwise built-in defaults apply.
pub fn load_config(path: Option<&Path>, timeout: Option<Duration>) -> Result<ReconcileConfig> {
    let path = match path {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path().filter(|p| p.is_file()),
    };

    let config = match path {
        Some(path) => ReconcileConfig::load_from(&path)
            .map_err(|e| CliError::config(format!("{}: {}", path.display(), e)))?,
        None => ReconcileConfig::default(),
    };

    match timeout {
        Some(timeout) if timeout.is_zero() => {
            Err(CliError::input("--timeout must be greater than zero"))
        }
        Some(timeout) => Ok(config.with_timeout(timeout)),
        None => Ok(config),
    }
}

/// Read manifest text from a file, or stdin when the path is `-`
pub fn read_manifest(path: &Path) -> Result<String> {
    let content = if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| CliError::io(path, e))?;
        buffer
    } else {
        std::fs::read_to_string(path).map_err(|e| CliError::io(path, e))?
    };

    if content.trim().is_empty() {
        return Err(CliError::input_with_help(
            format!("{} is empty", path.display()),
            "pass a file containing one Kubernetes object",
        ));
    }
    Ok(content)
}

/// Build a request from a manifest file, checking that it decodes
pub fn manifest_request(
    path: &Path,
    namespace: Option<&str>,
    cascade: bool,
) -> Result<ManifestRequest> {
    let mut request = ManifestRequest::new(read_manifest(path)?).cascade(cascade);
    if let Some(namespace) = namespace {
        request = request.namespace(namespace);
    }
    request.resolve()?;
    Ok(request)
}

/// Connect to the cluster from the ambient kubeconfig
pub async fn connect(config: ReconcileConfig) -> Result<Reconciler<ClusterApi>> {
    let api = ClusterApi::try_default().await?;
    Ok(Reconciler::new(api, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_explicit_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "delete:\n  timeout: 90s").unwrap();

        let config = load_config(Some(file.path()), None).unwrap();
        assert_eq!(config.delete.timeout, Duration::from_secs(90));
    }

    #[test]
    fn test_timeout_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "delete:\n  timeout: 90s").unwrap();

        let config = load_config(Some(file.path()), Some(Duration::from_secs(10))).unwrap();
        assert_eq!(config.create.timeout, Duration::from_secs(10));
        assert_eq!(config.delete.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_missing_explicit_config() {
        let err = load_config(Some(Path::new("/nonexistent/config.yaml")), None).unwrap_err();
        assert!(matches!(err, CliError::Config { .. }));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{}}").unwrap();

        let err = load_config(Some(file.path()), Some(Duration::ZERO)).unwrap_err();
        assert!(matches!(err, CliError::Input { .. }));
    }

    #[test]
    fn test_manifest_request_resolves_namespace() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: settings"
        )
        .unwrap();

        let request = manifest_request(file.path(), Some("apps"), true).unwrap();
        assert_eq!(request.namespace.as_deref(), Some("apps"));
        assert!(request.delete_cascade);
    }

    #[test]
    fn test_empty_manifest_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = read_manifest(file.path()).unwrap_err();
        assert!(matches!(err, CliError::Input { .. }));
    }

    #[test]
    fn test_invalid_manifest_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "kind: ConfigMap").unwrap();

        let err = manifest_request(file.path(), None, false).unwrap_err();
        assert!(matches!(err, CliError::Input { .. }));
    }
}
