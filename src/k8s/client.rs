//! Kubernetes client builder with kubeconfig path and context support.

use std::path::Path;

use tracing::debug;

use crate::error::{MupError, Result};

/// Build a Kubernetes client.
///
/// An explicit kubeconfig path or context takes precedence; otherwise the
/// default search path (`KUBECONFIG`, `~/.kube/config`, in-cluster) is used.
pub async fn build_client(kubeconfig: Option<&Path>, context: Option<&str>) -> Result<kube::Client> {
    if kubeconfig.is_none() && context.is_none() {
        debug!("Using default kubeconfig search path");
        return kube::Client::try_default()
            .await
            .map_err(|e| MupError::Kubeconfig(e.to_string()));
    }

    let kubeconfig = match kubeconfig {
        Some(path) => {
            debug!("Reading kubeconfig from {}", path.display());
            kube::config::Kubeconfig::read_from(path)
                .map_err(|e| MupError::Kubeconfig(format!("{}: {e}", path.display())))?
        }
        None => kube::config::Kubeconfig::read().map_err(|e| MupError::Kubeconfig(e.to_string()))?,
    };

    if let Some(ctx) = context {
        debug!("Using kubeconfig context: {}", ctx);
    }

    let config = kube::Config::from_custom_kubeconfig(
        kubeconfig,
        &kube::config::KubeConfigOptions {
            context: context.map(ToString::to_string),
            ..Default::default()
        },
    )
    .await
    .map_err(|e| MupError::Kubeconfig(e.to_string()))?;

    kube::Client::try_from(config).map_err(|e| MupError::Kubeconfig(e.to_string()))
}
