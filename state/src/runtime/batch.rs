//! Batch fan-out with per-item failure tolerance.

use std::fmt;
use std::future::Future;

use futures::future::join_all;
use tracing::warn;

/// Runs every future in `tasks` concurrently and waits for all of them.
///
/// Each task is labelled with a name for logging. Failures are logged and
/// skipped; the successes are returned in input order. One failing item
/// never aborts its siblings.
pub async fn join_tolerant<T, E, F, I>(batch: &str, tasks: I) -> Vec<T>
where
    I: IntoIterator<Item = (String, F)>,
    F: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let (names, futures): (Vec<String>, Vec<F>) = tasks.into_iter().unzip();
    let results = join_all(futures).await;

    names
        .into_iter()
        .zip(results)
        .filter_map(|(item, result)| match result {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(batch, item = %item, error = %err, "batch item failed; skipped");
                None
            }
        })
        .collect()
}
