//! Tasks wrap a single data operation: a parameterizable request, the
//! response it resolves to, and the three-phase lifecycle (`pre_process`,
//! `process`, `post_process`) the tree walker drives.

mod conditional;
mod dispatch;
mod request;
mod response;
mod substitute;
mod task;

pub use conditional::{ConditionalTask, CriteriaFn, ProcessingRecord, UpdateBodyFn};
pub use request::{Method, TaskRequest};
pub use response::TaskResponse;
pub use task::{PostProcessFn, Task};

pub(crate) use dispatch::dispatch_request;
pub(crate) use substitute::render_value;
