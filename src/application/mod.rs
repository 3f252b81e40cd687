//! Application layer: the experiment pipeline and its executor.
//!
//! Components here raise typed errors and never change experiment state
//! themselves; only [`executor::JobExecutor`] does.

pub mod adjustment;
pub mod alignment;
pub mod correlation;
pub mod executor;
pub mod preparation;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Cooperative cancellation checkpoint.
///
/// # Errors
/// Returns [`Error::Stopped`] once `token` is cancelled.
pub(crate) fn checkpoint(token: &CancellationToken) -> Result<()> {
    if token.is_cancelled() {
        return Err(Error::Stopped);
    }
    Ok(())
}
