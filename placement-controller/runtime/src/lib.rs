#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use placement_controller_core as core;
pub use placement_controller_k8s_api as k8s;
pub use placement_controller_k8s_index as index;

mod admission;
mod args;
pub mod config;
pub mod fetch;
pub mod metrics;
pub mod placement;

pub use self::{
    admission::Admission,
    args::Args,
    config::Config,
    placement::{Attributes, Error, Object, Operation, Placement},
};
