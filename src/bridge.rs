//! Blocking bridge into async code.
//!
//! Pipelines run synchronously on the caller's thread, while the dataset
//! loader reads and downloads its files with `tokio`. `block_on` spins up a
//! throwaway current-thread runtime so a step can call an async function and
//! return a plain value. When the caller is itself inside a tokio runtime the
//! future is driven on a scoped helper thread instead, since a runtime cannot
//! be started from a thread that is already driving one.

use std::future::Future;

use crate::error::DetectError;

/// Drive `future` to completion on a fresh current-thread runtime
pub fn block_on<F, T>(future: F) -> Result<T, DetectError>
where
    F: Future<Output = Result<T, DetectError>> + Send,
    T: Send,
{
    if tokio::runtime::Handle::try_current().is_err() {
        return run(future);
    }

    tracing::trace!("inside a tokio runtime, blocking on a helper thread");
    std::thread::scope(|scope| {
        scope
            .spawn(move || run(future))
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    })
}

fn run<F, T>(future: F) -> Result<T, DetectError>
where
    F: Future<Output = Result<T, DetectError>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(DetectError::Runtime)?;

    runtime.block_on(future)
}
