//! Node status lookups.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node as KubeNode;
use kube::Api;

use crate::error::{MupError, Result};
use crate::machine::Node;

/// Fetch the observed status of a node.
///
/// Failures are expected while a node restarts and are reported as
/// [`MupError::TransientStatus`].
#[async_trait]
pub trait NodeStatusOracle: Send + Sync {
    async fn get_node(&self, name: &str) -> Result<Node>;
}

/// [`NodeStatusOracle`] backed by the core `Node` API.
pub struct KubeNodeOracle {
    api: Api<KubeNode>,
}

impl KubeNodeOracle {
    pub fn new(client: kube::Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

/// A node is ready when its `Ready` condition is `True`.
pub fn is_node_ready(node: &KubeNode) -> bool {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
}

impl From<&KubeNode> for Node {
    fn from(node: &KubeNode) -> Self {
        let kubelet_version = node
            .status
            .as_ref()
            .and_then(|s| s.node_info.as_ref())
            .map(|info| info.kubelet_version.clone())
            .unwrap_or_default();

        Self {
            name: node.metadata.name.clone().unwrap_or_default(),
            ready: is_node_ready(node),
            kubelet_version,
        }
    }
}

#[async_trait]
impl NodeStatusOracle for KubeNodeOracle {
    async fn get_node(&self, name: &str) -> Result<Node> {
        let node = self
            .api
            .get(name)
            .await
            .map_err(|e| MupError::TransientStatus(format!("Failed to get node {name}: {e}")))?;
        Ok(Node::from(&node))
    }
}
