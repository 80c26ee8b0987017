//! Monitoring job lists.
//!
//! Jobs are the configured targets (name + URL) that cache identifiers are
//! matched against. They come from the same YAML files the watcher reads.

pub mod descriptor;
pub mod identifier;

pub use descriptor::{
    extract_jobs, load_jobs, parse_jobs, DescriptorFields, JobDescriptor, JobListError,
};
pub use identifier::{IdentifierScheme, IdentifierSchemeError, JobIndex, JobMatch};
