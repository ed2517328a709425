//! Workload descriptor table.

mod descriptor;

pub use descriptor::{Workload, WorkloadDescriptor};
