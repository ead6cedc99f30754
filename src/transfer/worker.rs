//! Fixed-size pool that works through the parts of a multipart transfer

use super::policy::PartPlan;
use super::progress::WorkerId;
use crate::error::{StorageError, StorageResult};
use futures_util::future::join_all;
use log::debug;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Run `job(worker, part_index)` for every part of `plan` on at most
/// `worker_count` tasks. Workers pull the next unclaimed part until none
/// remain; after the first failure no worker claims another part.
///
/// Outputs come back in completion order.
pub(crate) async fn run_parts<F, Fut, T>(
    worker_count: usize,
    plan: PartPlan,
    job: F,
) -> StorageResult<Vec<T>>
where
    F: Fn(WorkerId, u64) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StorageResult<T>> + Send + 'static,
    T: Send + 'static,
{
    let part_count = plan.part_count;
    let workers = (worker_count.max(1) as u64).min(part_count.max(1)) as usize;
    let job = Arc::new(job);
    let next_part = Arc::new(AtomicU64::new(0));
    let failed = Arc::new(AtomicBool::new(false));

    debug!("worker_pool_start: workers={} parts={}", workers, part_count);

    let handles = (0..workers).map(|worker| {
        let job = Arc::clone(&job);
        let next_part = Arc::clone(&next_part);
        let failed = Arc::clone(&failed);

        tokio::spawn(async move {
            let mut done = Vec::new();
            loop {
                if failed.load(Ordering::SeqCst) {
                    break;
                }
                let index = next_part.fetch_add(1, Ordering::SeqCst);
                if index >= part_count {
                    break;
                }
                match (*job)(worker, index).await {
                    Ok(output) => done.push(output),
                    Err(err) => {
                        failed.store(true, Ordering::SeqCst);
                        return Err(err);
                    }
                }
            }
            Ok(done)
        })
    });

    let mut outputs = Vec::with_capacity(part_count as usize);
    let mut first_error = None;
    for (worker, joined) in join_all(handles).await.into_iter().enumerate() {
        match joined {
            Ok(Ok(done)) => outputs.extend(done),
            Ok(Err(err)) => {
                first_error.get_or_insert(err);
            }
            Err(join_err) => {
                first_error.get_or_insert(StorageError::TransferFailure(format!(
                    "worker {} stopped: {}",
                    worker, join_err
                )));
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(outputs),
    }
}
