//! Plugin configuration.
//!
//! The configuration file is YAML (or JSON) and may hold several documents:
//!
//! ```yaml
//! podNodeEnvironmentPluginConfig:
//!   clusterDefaultNodeSelector: "infra=false"
//! podTolerationsPluginConfig:
//!   clusterDefaultTolerations:
//!     - key: dedicated
//!       operator: Equal
//!       value: infra
//!       effect: NoSchedule
//! ```
//!
//! The flat `clusterDefaultSelector` and `clusterDefaultTolerations` keys are accepted at the top
//! level as well. Documents are read in order and later documents override earlier ones. A
//! document that cannot be decoded is skipped.

use crate::core::{ParseError, Selector, Toleration};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

/// Cluster-wide placement defaults, applied to pods in namespaces that set no policy of their
/// own.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    pub cluster_default_selector: Selector,
    pub cluster_default_tolerations: Vec<Toleration>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid cluster default node selector {selector:?}: {source}")]
    Selector {
        selector: String,
        #[source]
        source: ParseError,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    #[serde(default)]
    pod_node_environment_plugin_config: Option<NodeEnvironment>,

    #[serde(default)]
    pod_tolerations_plugin_config: Option<Tolerations>,

    #[serde(default)]
    cluster_default_selector: Option<String>,

    #[serde(default)]
    cluster_default_tolerations: Option<Vec<Toleration>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeEnvironment {
    #[serde(default)]
    cluster_default_node_selector: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Tolerations {
    #[serde(default)]
    cluster_default_tolerations: Option<Vec<Toleration>>,
}

// === impl Config ===

impl Config {
    /// Loads the configuration from the given file.
    ///
    /// When no file is configured, or the file cannot be read, the empty configuration is used.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let Some(path) = path else {
            debug!("No configuration file; using empty cluster defaults");
            return Ok(Self::default());
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_yaml(&contents),
            Err(error) => {
                warn!(
                    %error,
                    path = %path.display(),
                    "Failed to read configuration; using empty cluster defaults"
                );
                Ok(Self::default())
            }
        }
    }

    /// Decodes the configuration from a YAML or JSON string.
    ///
    /// Malformed documents are skipped. The resulting default selector must parse.
    pub fn from_yaml(contents: &str) -> Result<Self, Error> {
        let mut selector = None;
        let mut tolerations = None;

        if !contents.trim().is_empty() {
            for (i, doc) in serde_yaml::Deserializer::from_str(contents).enumerate() {
                let doc = match Document::deserialize(doc) {
                    Ok(doc) => doc,
                    Err(error) => {
                        warn!(%error, document = i, "Skipping malformed configuration document");
                        continue;
                    }
                };

                if let Some(s) = doc
                    .pod_node_environment_plugin_config
                    .and_then(|c| c.cluster_default_node_selector)
                    .or(doc.cluster_default_selector)
                {
                    selector = Some(s);
                }

                if let Some(t) = doc
                    .pod_tolerations_plugin_config
                    .and_then(|c| c.cluster_default_tolerations)
                    .or(doc.cluster_default_tolerations)
                {
                    tolerations = Some(t);
                }
            }
        }

        let cluster_default_selector = match selector {
            Some(selector) => selector
                .parse::<Selector>()
                .map_err(|source| Error::Selector { selector, source })?,
            None => Selector::default(),
        };

        Ok(Self {
            cluster_default_selector,
            cluster_default_tolerations: tolerations.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Effect, Operator};

    #[test]
    fn empty() {
        assert_eq!(Config::from_yaml("").unwrap(), Config::default());
        assert_eq!(Config::from_yaml("  \n").unwrap(), Config::default());
        assert_eq!(Config::load(None).unwrap(), Config::default());
    }

    #[test]
    fn missing_file() {
        let path = Path::new("/nonexistent/placement-controller/config.yaml");
        assert_eq!(Config::load(Some(path)).unwrap(), Config::default());
    }

    #[test]
    fn nested_yaml() {
        let config = Config::from_yaml(
            r#"
podNodeEnvironmentPluginConfig:
  clusterDefaultNodeSelector: "infra = false"
podTolerationsPluginConfig:
  clusterDefaultTolerations:
    - key: dedicated
      operator: Equal
      value: infra
      effect: NoSchedule
"#,
        )
        .unwrap();
        assert_eq!(
            config,
            Config {
                cluster_default_selector: "infra=false".parse().unwrap(),
                cluster_default_tolerations: vec![Toleration {
                    key: "dedicated".to_string(),
                    operator: Some(Operator::Equal),
                    value: "infra".to_string(),
                    effect: Some(Effect::NoSchedule),
                }],
            }
        );
    }

    #[test]
    fn flat_json() {
        let config = Config::from_yaml(r#"{"clusterDefaultSelector": "env=test"}"#).unwrap();
        assert_eq!(
            config.cluster_default_selector,
            "env=test".parse::<Selector>().unwrap()
        );
        assert!(config.cluster_default_tolerations.is_empty());
    }

    #[test]
    fn later_documents_override() {
        let config = Config::from_yaml(
            r#"
clusterDefaultSelector: "env=test"
---
podNodeEnvironmentPluginConfig:
  clusterDefaultNodeSelector: "infra=true"
"#,
        )
        .unwrap();
        assert_eq!(
            config.cluster_default_selector,
            "infra=true".parse::<Selector>().unwrap()
        );
    }

    #[test]
    fn malformed_documents_are_skipped() {
        let config = Config::from_yaml(
            r#"
clusterDefaultSelector: "env=test"
---
clusterDefaultSelector: ["not", "a", "string"]
"#,
        )
        .unwrap();
        assert_eq!(
            config.cluster_default_selector,
            "env=test".parse::<Selector>().unwrap()
        );
    }

    #[test]
    fn malformed_selector_fails() {
        assert!(matches!(
            Config::from_yaml(r#"clusterDefaultSelector: "infra""#),
            Err(Error::Selector { .. })
        ));
    }
}
