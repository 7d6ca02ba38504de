//! Direct namespace lookups against the API server.
//!
//! These are only used when a namespace has not yet been observed by the namespace index, e.g.
//! when a pod is created in a namespace immediately after the namespace itself is created.

use crate::k8s::{Api, Client, Namespace};
use std::time::Duration;
use tokio::time;

#[async_trait::async_trait]
pub trait FetchNamespace: Send + Sync {
    /// Fetches the named namespace, returning `None` if it does not exist.
    async fn fetch(&self, name: &str) -> Result<Option<Namespace>, Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Api(#[from] kube::Error),
}

/// Fetches namespaces from the API server, bounding each request with a timeout.
#[derive(Clone)]
pub struct ApiNamespaces {
    api: Api<Namespace>,
    timeout: Duration,
}

// === impl ApiNamespaces ===

impl ApiNamespaces {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self {
            api: Api::all(client),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl FetchNamespace for ApiNamespaces {
    async fn fetch(&self, name: &str) -> Result<Option<Namespace>, Error> {
        let ns = time::timeout(self.timeout, self.api.get_opt(name))
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;
        Ok(ns)
    }
}
