//! Install subsystem.
//!
//! Layered bottom-up: [`spawn`] launches processes, [`command`] builds the
//! elevated invocations, [`executor`] retries one app's command, [`batch`]
//! drives a whole list and [`manager`] admits batches and tracks the active set.

pub mod batch;
pub mod command;
pub mod executor;
pub mod manager;
pub mod spawn;
mod utils;

pub use batch::{ActiveSet, BatchFailure, BatchPolicy, BatchRunner, CANCELLED_MESSAGE};
pub use executor::{ExecError, ExecPolicy, Executor};
pub use manager::{InstallManager, InstallRequest, StartError, Started};
pub use spawn::{Invocation, ProcessOutput, SpawnError, Spawner, SystemSpawner};
pub use utils::{powershell_single_quote, shell_single_quote};
