//! Server process supervision and readiness detection.

mod error;
mod process;
mod readiness;
mod registry;
mod running;
mod state;
mod supervisor;

pub use error::*;
pub use process::*;
pub use readiness::*;
pub use registry::*;
pub use running::RunningServer;
pub use state::*;
pub use supervisor::*;
