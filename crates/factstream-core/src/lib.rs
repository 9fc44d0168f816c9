//! Periodic metrics sampling: discover managed objects through a registry,
//! read their attributes on a schedule, and stream the results as flat
//! fact lines.
//!
//! The pieces compose left to right: an [`registry::ObjectRegistry`]
//! answers discovery and attribute reads, a [`sampler::SampleHandler`]
//! runs cycles over it, a [`sampler::Scheduler`] paces the cycles, and a
//! [`format::FactFormatter`] plus a [`sink::FactSink`] turn each closed
//! activity into output. [`sampler::Sampler`] wires all of that from a
//! single [`sampler::SamplerConfig`].

pub mod conditions;
pub mod filter;
pub mod format;
pub mod model;
pub mod registry;
pub mod sampler;
pub mod sink;

pub use sampler::{SampleError, Sampler, SamplerConfig, ScheduleOptions};
