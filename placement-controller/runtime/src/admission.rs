use crate::{
    k8s::Pod,
    metrics::Outcome,
    placement::{self, Attributes, GroupResource, Object, Operation, Placement},
};
use anyhow::{anyhow, Result};
use futures::future;
use http_body_util::BodyExt;
use hyper::{http, Request, Response};
use kube::core::{admission, DynamicObject};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Serves pod admission reviews, mutating admitted pods with their namespace's placement policy.
#[derive(Clone)]
pub struct Admission {
    placement: Placement,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read request body: {0}")]
    Request(#[from] hyper::Error),

    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}

type Review = admission::AdmissionReview<DynamicObject>;
type AdmissionRequest = admission::AdmissionRequest<DynamicObject>;
type AdmissionResponse = admission::AdmissionResponse;
type AdmissionReview = admission::AdmissionReview<DynamicObject>;

type Body = http_body_util::Full<bytes::Bytes>;

// === impl AdmissionService ===

impl tower::Service<Request<hyper::body::Incoming>> for Admission {
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<hyper::body::Incoming>) -> Self::Future {
        trace!(?req);
        if req.method() != http::Method::POST || req.uri().path() != "/" {
            return Box::pin(future::ok(
                Response::builder()
                    .status(http::StatusCode::NOT_FOUND)
                    .body(Body::default())
                    .expect("not found response must be valid"),
            ));
        }

        let admission = self.clone();
        Box::pin(async move {
            use bytes::Buf;
            let bytes = req.into_body().collect().await?.to_bytes();
            let review: Review = match serde_json::from_reader(bytes.reader()) {
                Ok(review) => review,
                Err(error) => {
                    warn!(%error, "Failed to parse request body");
                    admission.placement.record(Outcome::Invalid);
                    return json_response(AdmissionResponse::invalid(error).into_review());
                }
            };
            trace!(?review);

            let rsp = match review.try_into() {
                Ok(req) => {
                    debug!(?req);
                    admission.admit(req).await
                }
                Err(error) => {
                    warn!(%error, "Invalid admission request");
                    admission.placement.record(Outcome::Invalid);
                    AdmissionResponse::invalid(error)
                }
            };
            debug!(?rsp);
            json_response(rsp.into_review())
        })
    }
}

impl Admission {
    pub fn new(placement: Placement) -> Self {
        Self { placement }
    }

    async fn admit(self, req: AdmissionRequest) -> AdmissionResponse {
        let rsp = AdmissionResponse::from(&req);

        let mut attrs = match attributes(req) {
            Ok(attrs) => attrs,
            Err(error) => {
                info!(%error, "Failed to parse admission request");
                self.placement.record(Outcome::Invalid);
                return rsp.deny(error);
            }
        };

        let original = match attrs.pod().map(serde_json::to_value).transpose() {
            Ok(original) => original,
            Err(error) => {
                warn!(%error, "Failed to encode pod");
                return AdmissionResponse::invalid(error);
            }
        };

        if let Err(error) = self.placement.admit(&mut attrs).await {
            info!(%error, ns = %attrs.namespace, name = %attrs.name, "Denied");
            return deny(rsp, &error);
        }

        let (Some(original), Some(pod)) = (original, attrs.pod()) else {
            return rsp;
        };
        let patch = match serde_json::to_value(pod) {
            Ok(mutated) => json_patch::diff(&original, &mutated),
            Err(error) => {
                warn!(%error, "Failed to encode pod");
                return AdmissionResponse::invalid(error);
            }
        };
        if patch.0.is_empty() {
            return rsp;
        }

        debug!(ns = %attrs.namespace, name = %attrs.name, ?patch, "Patching");
        match rsp.with_patch(patch) {
            Ok(rsp) => rsp,
            Err(error) => {
                warn!(%error, "Failed to serialize patch");
                AdmissionResponse::invalid(error)
            }
        }
    }
}

/// Converts an admission request into the attributes evaluated by the placement controller.
///
/// Objects are only decoded when the request creates a pod. Pod subresources, such as bindings
/// and evictions, carry other kinds of objects.
fn attributes(req: AdmissionRequest) -> Result<Attributes> {
    let resource = GroupResource::new(req.resource.group, req.resource.resource);
    let subresource = req.sub_resource.unwrap_or_default();
    let operation = match req.operation {
        admission::Operation::Create => Operation::Create,
        admission::Operation::Update => Operation::Update,
        admission::Operation::Delete => Operation::Delete,
        admission::Operation::Connect => Operation::Connect,
    };

    let object = match req.object {
        Some(obj)
            if resource == GroupResource::pods()
                && subresource.is_empty()
                && operation == Operation::Create =>
        {
            let pod = serde_json::from_value::<Pod>(serde_json::to_value(obj)?)
                .map_err(|error| anyhow!("failed to decode pod: {error}"))?;
            Object::Pod(Box::new(pod))
        }
        _ => Object::Other,
    };

    Ok(Attributes {
        resource,
        subresource,
        namespace: req.namespace.unwrap_or_default(),
        name: req.name,
        operation,
        object,
    })
}

fn deny(rsp: AdmissionResponse, error: &placement::Error) -> AdmissionResponse {
    let mut rsp = rsp.deny(error);
    rsp.result.code = error.code();
    rsp.result.reason = error.reason().to_string();
    rsp
}

fn json_response(rsp: AdmissionReview) -> Result<Response<Body>, Error> {
    let bytes = serde_json::to_vec(&rsp)?;
    Ok(Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("admission review response must be valid"))
}
