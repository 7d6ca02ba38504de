#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod annotations;

pub use k8s_openapi::api::core::v1::{Namespace, Pod, PodSpec};
pub use kube::{
    api::{Api, ObjectMeta, ResourceExt},
    Client,
};
