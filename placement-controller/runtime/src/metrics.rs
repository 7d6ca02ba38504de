use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

#[derive(Clone, Debug)]
pub struct AdmissionMetrics {
    requests: Family<OutcomeLabels, Counter>,
    fallback_fetches: Family<FetchLabels, Counter>,
}

/// The result of a single admission review.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The request was not a pod creation and was admitted untouched.
    Ignored,
    /// The pod was admitted without modification.
    Admitted,
    /// The pod was admitted with a merged placement policy.
    Mutated,
    Forbidden,
    NotFound,
    Internal,
    /// The namespace policy or pod annotations could not be decoded.
    Invalid,
}

/// The result of a fallback namespace fetch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Fetch {
    Found,
    NotFound,
    Error,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct OutcomeLabels {
    outcome: &'static str,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct FetchLabels {
    result: &'static str,
}

// === impl AdmissionMetrics ===

impl AdmissionMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let requests = Family::<OutcomeLabels, Counter>::default();
        reg.register(
            "requests",
            "Total number of pod admission requests by outcome",
            requests.clone(),
        );

        let fallback_fetches = Family::<FetchLabels, Counter>::default();
        reg.register(
            "namespace_fallback_fetches",
            "Total number of namespaces fetched from the API server on an index miss",
            fallback_fetches.clone(),
        );

        Self {
            requests,
            fallback_fetches,
        }
    }

    pub fn record(&self, outcome: Outcome) {
        self.requests
            .get_or_create(&OutcomeLabels {
                outcome: outcome.as_str(),
            })
            .inc();
    }

    pub fn record_fetch(&self, fetch: Fetch) {
        self.fallback_fetches
            .get_or_create(&FetchLabels {
                result: fetch.as_str(),
            })
            .inc();
    }

    #[cfg(test)]
    pub(crate) fn requests(&self, outcome: Outcome) -> u64 {
        self.requests
            .get_or_create(&OutcomeLabels {
                outcome: outcome.as_str(),
            })
            .get()
    }

    #[cfg(test)]
    pub(crate) fn fallback_fetches(&self, fetch: Fetch) -> u64 {
        self.fallback_fetches
            .get_or_create(&FetchLabels {
                result: fetch.as_str(),
            })
            .get()
    }
}

// === impl Outcome ===

impl Outcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::Admitted => "admitted",
            Self::Mutated => "mutated",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Internal => "internal",
            Self::Invalid => "invalid",
        }
    }
}

// === impl Fetch ===

impl Fetch {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Found => "found",
            Self::NotFound => "not_found",
            Self::Error => "error",
        }
    }
}
