mod actor;
mod handle;

pub(crate) use actor::Command;
pub use actor::SessionEngine;
pub use handle::{SessionHandle, SubmitStatus};
