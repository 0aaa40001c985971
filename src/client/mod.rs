//! Kubernetes pending-pod client
//!
//! One query: list pods in the `Pending` phase across all namespaces.
//! Cluster access resolution mirrors the usual client conventions: an
//! explicit kubeconfig path wins, otherwise in-cluster service-account
//! identity is tried, with `$HOME/.kube/config` as the final fallback.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

/// In-cluster service account mount point
const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// A pod currently waiting for scheduling
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PodRecord {
    pub name: String,
    pub namespace: String,
    pub status: String,
}

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("no cluster access: {0}")]
    NoClusterAccess(String),

    #[error("kubeconfig error: {0}")]
    Kubeconfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// The resource-counter capability consumed by the watcher and the HTML view
#[async_trait]
pub trait PendingPods: Send + Sync {
    /// List pods currently in the `Pending` phase
    async fn pending_pods(&self) -> Result<Vec<PodRecord>>;

    /// Count of pods currently in the `Pending` phase
    async fn pending_count(&self) -> Result<usize> {
        Ok(self.pending_pods().await?.len())
    }
}

/// Thin HTTP client against the Kubernetes API server
pub struct KubeClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl KubeClient {
    /// Resolve cluster access and build a client.
    ///
    /// `kubeconfig`: explicit path to a kubeconfig file. `None` tries
    /// in-cluster identity first, then the default kubeconfig path.
    pub fn connect(kubeconfig: Option<&Path>) -> Result<Self> {
        if let Some(path) = kubeconfig {
            return Self::from_kubeconfig(path);
        }
        match Self::in_cluster() {
            Ok(client) => Ok(client),
            Err(in_cluster_err) => {
                let home = std::env::var("HOME").map_err(|_| {
                    ClientError::NoClusterAccess(format!(
                        "not in cluster ({in_cluster_err}) and HOME is not set"
                    ))
                })?;
                let default = PathBuf::from(home).join(".kube").join("config");
                Self::from_kubeconfig(&default)
            }
        }
    }

    /// Build from in-cluster service-account identity
    fn in_cluster() -> Result<Self> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST")
            .map_err(|_| ClientError::NoClusterAccess("KUBERNETES_SERVICE_HOST unset".into()))?;
        let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());
        let token = std::fs::read_to_string(format!("{SERVICE_ACCOUNT_DIR}/token"))?;

        let mut builder = reqwest::Client::builder();
        let ca = std::fs::read(format!("{SERVICE_ACCOUNT_DIR}/ca.crt"))?;
        builder = builder.add_root_certificate(
            reqwest::Certificate::from_pem(&ca)
                .map_err(|e| ClientError::NoClusterAccess(format!("bad cluster CA: {e}")))?,
        );

        Ok(Self {
            http: builder.build()?,
            base_url: format!("https://{host}:{port}"),
            token: Some(token.trim().to_string()),
        })
    }

    /// Build from a kubeconfig file (server, token, CA or insecure flag)
    fn from_kubeconfig(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Kubeconfig = serde_yaml::from_str(&raw)
            .map_err(|e| ClientError::Kubeconfig(format!("{}: {e}", path.display())))?;

        let (cluster, user) = config.resolve()?;

        let mut builder = reqwest::Client::builder();
        if cluster.insecure_skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        } else if let Some(ca_path) = &cluster.certificate_authority {
            let ca = std::fs::read(ca_path)?;
            builder = builder.add_root_certificate(
                reqwest::Certificate::from_pem(&ca)
                    .map_err(|e| ClientError::Kubeconfig(format!("bad cluster CA: {e}")))?,
            );
        }

        Ok(Self {
            http: builder.build()?,
            base_url: cluster.server.trim_end_matches('/').to_string(),
            token: user.and_then(|u| u.token),
        })
    }

    /// Test constructor against an arbitrary API endpoint
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token: None,
        }
    }
}

#[async_trait]
impl PendingPods for KubeClient {
    async fn pending_pods(&self) -> Result<Vec<PodRecord>> {
        let url = format!("{}/api/v1/pods", self.base_url);
        let mut request = self
            .http
            .get(&url)
            .query(&[("fieldSelector", "status.phase=Pending")]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        // A non-success answer is an error, never an empty cluster.
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, message });
        }

        let list: PodList = response.json().await?;
        Ok(list
            .items
            .into_iter()
            .filter(|item| item.status.phase == "Pending")
            .map(|item| PodRecord {
                name: item.metadata.name,
                namespace: item.metadata.namespace,
                status: item.status.phase,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<PodItem>,
}

#[derive(Debug, Deserialize)]
struct PodItem {
    #[serde(default)]
    metadata: PodMetadata,
    #[serde(default)]
    status: PodStatus,
}

#[derive(Debug, Default, Deserialize)]
struct PodMetadata {
    #[serde(default)]
    name: String,
    #[serde(default)]
    namespace: String,
}

#[derive(Debug, Default, Deserialize)]
struct PodStatus {
    #[serde(default)]
    phase: String,
}

/// Minimal kubeconfig model: enough to reach a cluster with a bearer token
#[derive(Debug, Deserialize)]
struct Kubeconfig {
    #[serde(default, rename = "current-context")]
    current_context: String,
    #[serde(default)]
    contexts: Vec<NamedContext>,
    #[serde(default)]
    clusters: Vec<NamedCluster>,
    #[serde(default)]
    users: Vec<NamedUser>,
}

#[derive(Debug, Deserialize)]
struct NamedContext {
    name: String,
    context: ContextEntry,
}

#[derive(Debug, Deserialize)]
struct ContextEntry {
    cluster: String,
    #[serde(default)]
    user: String,
}

#[derive(Debug, Deserialize)]
struct NamedCluster {
    name: String,
    cluster: ClusterEntry,
}

#[derive(Debug, Clone, Deserialize)]
struct ClusterEntry {
    server: String,
    #[serde(default, rename = "certificate-authority")]
    certificate_authority: Option<PathBuf>,
    #[serde(default, rename = "insecure-skip-tls-verify")]
    insecure_skip_tls_verify: bool,
}

#[derive(Debug, Deserialize)]
struct NamedUser {
    name: String,
    user: UserEntry,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct UserEntry {
    #[serde(default)]
    token: Option<String>,
}

impl Kubeconfig {
    /// Pick the current context's cluster and user; falls back to the first
    /// cluster when no context is named.
    fn resolve(&self) -> Result<(ClusterEntry, Option<UserEntry>)> {
        let context = self
            .contexts
            .iter()
            .find(|c| c.name == self.current_context)
            .map(|c| &c.context);

        let cluster_name = context.map(|c| c.cluster.as_str());
        let cluster = match cluster_name {
            Some(name) => self
                .clusters
                .iter()
                .find(|c| c.name == name)
                .ok_or_else(|| {
                    ClientError::Kubeconfig(format!("cluster {name:?} not found"))
                })?,
            None => self
                .clusters
                .first()
                .ok_or_else(|| ClientError::Kubeconfig("no clusters defined".into()))?,
        };

        let user = context
            .map(|c| c.user.as_str())
            .and_then(|name| self.users.iter().find(|u| u.name == name))
            .map(|u| u.user.clone());

        Ok((cluster.cluster.clone(), user))
    }
}
