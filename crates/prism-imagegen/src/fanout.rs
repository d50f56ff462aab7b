use std::future::Future;

use futures::stream::{FuturesUnordered, StreamExt};

use crate::error::{ProviderError, Result};

/// Run `count` operations concurrently and collect their results by index
///
/// All operations are started together. The output holds the result of
/// operation `i` at position `i`, whatever order they finish in. The first
/// failure is returned as-is and every operation still in flight is dropped,
/// which cancels its pending network I/O.
pub(crate) async fn fan_out<T, F, Fut>(count: usize, operation: F) -> Result<Vec<T>>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut pending: FuturesUnordered<_> = (0..count)
        .map(|index| {
            let fut = operation(index);
            async move { (index, fut.await) }
        })
        .collect();

    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(count).collect();

    while let Some((index, outcome)) = pending.next().await {
        match outcome {
            Ok(value) => {
                if let Some(slot) = slots.get_mut(index) {
                    *slot = Some(value);
                }
            }
            Err(error) => {
                let abandoned = pending.len();
                if abandoned > 0 {
                    tracing::debug!(job = index, abandoned, "job failed, cancelling sibling jobs");
                }
                return Err(error);
            }
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| slot.ok_or_else(|| ProviderError::internal(format!("Job {index} produced no result."))))
        .collect()
}
