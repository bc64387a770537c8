pub mod discovery;
pub mod prds;

use specforge_core::ForgeError;

use crate::error::AppError;

/// Run a core call on the blocking pool. Core controllers take locks and
/// may wait on generation, so they never run on an async worker.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, ForgeError> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(result)
}
