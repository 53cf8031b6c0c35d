pub mod lease;
pub mod registry;
pub mod token;

pub use lease::{LeaseGuard, TabLease};
pub use registry::{task_id, TaskGuard, TaskRegistry};
pub use token::{BatchId, ControlToken};
