//! Pod placement admission.
//!
//! When a pod is created, its namespace's placement policy is resolved and merged into the pod:
//!
//! 1. The namespace is looked up in the namespace index. If the index has not observed the
//!    namespace, it is fetched directly from the API server (without updating the index).
//! 2. The namespace's node selector is resolved from its annotations, falling back to the cluster
//!    default when the namespace sets none.
//! 3. If the pod's own node selector pins a key to a different value than the resolved selector,
//!    the pod is forbidden and left untouched.
//! 4. Otherwise, the pod's node selector is replaced with the merge of the resolved selector and
//!    the pod's selector, and its tolerations with the concatenation of the cluster default, the
//!    namespace, and the pod tolerations, less exact duplicates.
//!
//! Each review is a single pass with no retries; the only secondary path is the fallback fetch.

use crate::{
    config::Config,
    core::{merge_tolerations, ParseError, Selector},
    fetch::{self, FetchNamespace},
    index::{self, NamespaceCache, PolicyError},
    k8s::{annotations, Namespace, Pod},
    metrics::{AdmissionMetrics, Fetch, Outcome},
};
use std::sync::Arc;
use tracing::{debug, trace, warn};


/// Applies namespace placement policy to pods as they are created.
#[derive(Clone)]
pub struct Placement {
    config: Arc<Config>,
    cache: Arc<dyn NamespaceCache>,
    client: Arc<dyn FetchNamespace>,
    metrics: AdmissionMetrics,
}

/// The kind of change an admission request makes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
    Connect,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupResource {
    pub group: String,
    pub resource: String,
}

/// The object under review.
#[derive(Clone, Debug, PartialEq)]
pub enum Object {
    Pod(Box<Pod>),
    Other,
}

/// Describes a single admission request.
#[derive(Clone, Debug, PartialEq)]
pub struct Attributes {
    pub resource: GroupResource,
    pub subresource: String,
    pub namespace: String,
    pub name: String,
    pub operation: Operation,
    pub object: Object,
}

/// Indicates why a pod was not admitted.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Policy(PolicyError),

    #[error("namespace {0} not found")]
    NotFound(String),

    #[error("failed to get namespace {namespace}: {source}")]
    Internal {
        namespace: String,
        #[source]
        source: fetch::Error,
    },

    #[error("pod {pod} is forbidden: pod node label selector conflicts with its namespace node label selector")]
    Forbidden { pod: String },
}

// === impl Placement ===

impl Placement {
    pub fn new(
        config: Arc<Config>,
        cache: Arc<dyn NamespaceCache>,
        client: Arc<dyn FetchNamespace>,
        metrics: AdmissionMetrics,
    ) -> Self {
        Self {
            config,
            cache,
            client,
            metrics,
        }
    }

    /// Only pod creation is subject to placement policy.
    pub fn handles(operation: Operation) -> bool {
        operation == Operation::Create
    }

    /// Admits the request, merging the namespace's placement policy into the pod.
    ///
    /// When an error is returned, the request's object has not been modified.
    pub async fn admit(&self, attrs: &mut Attributes) -> Result<(), Error> {
        let res = self.admit_pod(attrs).await;
        self.metrics.record(match &res {
            Ok(outcome) => *outcome,
            Err(error) => error.outcome(),
        });
        res.map(|_| ())
    }

    /// Records the outcome of a review that could not be evaluated.
    pub(crate) fn record(&self, outcome: Outcome) {
        self.metrics.record(outcome);
    }

    async fn admit_pod(&self, attrs: &mut Attributes) -> Result<Outcome, Error> {
        if !Self::handles(attrs.operation) {
            return Ok(Outcome::Ignored);
        }

        // Only pods proper are checked, not their subresources.
        if !attrs.resource.is_pods() || !attrs.subresource.is_empty() {
            trace!(resource = ?attrs.resource, subresource = %attrs.subresource, "Ignoring");
            return Ok(Outcome::Ignored);
        }

        let pod = match &mut attrs.object {
            Object::Pod(pod) => pod,
            Object::Other => {
                warn!(ns = %attrs.namespace, name = %attrs.name, "Expected a pod");
                return Ok(Outcome::Ignored);
            }
        };

        let ns = self.namespace(&attrs.namespace).await?;
        let selector = index::resolve_selector(&ns, &self.config.cluster_default_selector)?;
        // The cluster default tolerations are always merged first, so the namespace's own
        // tolerations are resolved without falling back to them.
        let ns_tolerations = index::resolve_tolerations(&ns, &[])?;

        let pod_selector = pod
            .spec
            .as_ref()
            .and_then(|spec| spec.node_selector.clone())
            .map(Selector::from)
            .unwrap_or_default();
        let pod_tolerations = annotations::pod_tolerations(pod)?;

        if selector.conflicts(&pod_selector) {
            return Err(Error::Forbidden {
                pod: pod_name(&attrs.name, pod),
            });
        }

        let merged_selector = selector.merge(&pod_selector);
        let merged_tolerations = merge_tolerations(
            &self.config.cluster_default_tolerations,
            &ns_tolerations,
            &pod_tolerations,
        );

        let mut mutated = false;
        if merged_selector != pod_selector {
            pod.spec.get_or_insert_with(Default::default).node_selector =
                Some(merged_selector.into_map());
            mutated = true;
        }
        if merged_tolerations != pod_tolerations {
            annotations::set_pod_tolerations(pod, &merged_tolerations);
            mutated = true;
        }

        if !mutated {
            return Ok(Outcome::Admitted);
        }
        debug!(ns = %attrs.namespace, name = %attrs.name, "Applied namespace placement policy");
        Ok(Outcome::Mutated)
    }

    /// Returns the namespace from the index or, if it has not been indexed, from the API server.
    async fn namespace(&self, name: &str) -> Result<Arc<Namespace>, Error> {
        if let Some(ns) = self.cache.get(name) {
            return Ok(ns);
        }

        debug!(ns = %name, "Namespace not indexed; fetching");
        match self.client.fetch(name).await {
            Ok(Some(ns)) => {
                self.metrics.record_fetch(Fetch::Found);
                Ok(Arc::new(ns))
            }
            Ok(None) => {
                self.metrics.record_fetch(Fetch::NotFound);
                Err(Error::NotFound(name.to_string()))
            }
            Err(source) => {
                self.metrics.record_fetch(Fetch::Error);
                Err(Error::Internal {
                    namespace: name.to_string(),
                    source,
                })
            }
        }
    }
}

/// Names the pod in error messages. Pods created with `generateName` have no name yet.
fn pod_name(name: &str, pod: &Pod) -> String {
    if !name.is_empty() {
        return name.to_string();
    }
    pod.metadata
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .or_else(|| pod.metadata.generate_name.clone())
        .unwrap_or_default()
}

// === impl GroupResource ===

impl GroupResource {
    pub fn new(group: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            resource: resource.into(),
        }
    }

    pub fn pods() -> Self {
        Self::new("", "pods")
    }

    fn is_pods(&self) -> bool {
        self.group.is_empty() && self.resource == "pods"
    }
}

// === impl Error ===

impl From<PolicyError> for Error {
    fn from(error: PolicyError) -> Self {
        match error {
            PolicyError::Parse(error) => Self::Parse(error),
            error => Self::Policy(error),
        }
    }
}

impl Error {
    /// The HTTP status code used to report the error.
    pub fn code(&self) -> u16 {
        match self {
            Self::Parse(_) | Self::Policy(_) => 400,
            Self::NotFound(_) => 404,
            Self::Internal { .. } => 500,
            Self::Forbidden { .. } => 403,
        }
    }

    /// The machine-readable status reason used to report the error.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Parse(_) | Self::Policy(_) => "BadRequest",
            Self::NotFound(_) => "NotFound",
            Self::Internal { .. } => "InternalError",
            Self::Forbidden { .. } => "Forbidden",
        }
    }

    fn outcome(&self) -> Outcome {
        match self {
            Self::Parse(_) | Self::Policy(_) => Outcome::Invalid,
            Self::NotFound(_) => Outcome::NotFound,
            Self::Internal { .. } => Outcome::Internal,
            Self::Forbidden { .. } => Outcome::Forbidden,
        }
    }
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Connect => "CONNECT",
        }
    }
}

impl Attributes {
    /// Returns the pod under review, if any.
    pub fn pod(&self) -> Option<&Pod> {
        match &self.object {
            Object::Pod(pod) => Some(pod),
            Object::Other => None,
        }
    }
}
