use std::any::Any;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Result of one task, tagged with the position of its input item.
#[derive(Debug)]
pub struct TaskOutput<T> {
    pub index: usize,
    /// `Err` carries the panic message of a crashed task.
    pub result: Result<T, String>,
}

/// Runs one tokio task per item with at most `concurrency` in flight.
///
/// Tasks are isolated: a panic is reported for that item only and never
/// cancels the others. There is no timeout; every task runs to completion.
#[derive(Debug, Clone, Copy)]
pub struct BoundedExecutor {
    concurrency: usize,
}

impl BoundedExecutor {
    /// `concurrency` is clamped to `1..=Semaphore::MAX_PERMITS`.
    pub fn new(concurrency: usize) -> Self {
        BoundedExecutor {
            concurrency: concurrency.clamp(1, Semaphore::MAX_PERMITS),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns one output per item, in input order.
    pub async fn run<I, T, F, Fut>(&self, items: Vec<I>, task: F) -> Vec<TaskOutput<T>>
    where
        I: Send + 'static,
        T: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let task = Arc::new(task);
        let mut handles: Vec<(usize, JoinHandle<T>)> = Vec::with_capacity(items.len());

        for (index, item) in items.into_iter().enumerate() {
            // The semaphore is owned here and never closed.
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let task = task.clone();
            handles.push((
                index,
                tokio::spawn(async move {
                    let _permit = permit;
                    task(item).await
                }),
            ));
        }

        let mut outputs = Vec::with_capacity(handles.len());
        for (index, handle) in handles {
            let result = handle.await.map_err(|e| {
                if e.is_panic() {
                    panic_message(e.into_panic())
                } else {
                    e.to_string()
                }
            });
            outputs.push(TaskOutput { index, result });
        }
        outputs
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn never_exceeds_concurrency() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let exec = BoundedExecutor::new(3);
        let (f, p) = (in_flight.clone(), peak.clone());
        let out = exec
            .run((0..12).collect(), move |i: u32| {
                let (f, p) = (f.clone(), p.clone());
                async move {
                    let now = f.fetch_add(1, Ordering::SeqCst) + 1;
                    p.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    f.fetch_sub(1, Ordering::SeqCst);
                    i * 2
                }
            })
            .await;

        assert_eq!(out.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(out.iter().all(|o| o.result.as_ref().unwrap() == &(o.index as u32 * 2)));
    }

    #[tokio::test]
    async fn panic_is_isolated() {
        let exec = BoundedExecutor::new(2);
        let out = exec
            .run(vec![1, 2, 3, 4], |i: u32| async move {
                if i == 3 {
                    panic!("boom on {i}");
                }
                i
            })
            .await;

        assert_eq!(out.len(), 4);
        assert_eq!(out[2].result.as_ref().unwrap_err(), "boom on 3");
        assert_eq!(out.iter().filter(|o| o.result.is_ok()).count(), 3);
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        assert_eq!(BoundedExecutor::new(0).concurrency(), 1);
    }

    #[tokio::test]
    async fn huge_concurrency_is_clamped_to_semaphore_limit() {
        let exec = BoundedExecutor::new(usize::MAX);
        assert_eq!(exec.concurrency(), Semaphore::MAX_PERMITS);

        let out = exec.run(vec![1u32, 2, 3], |i| async move { i + 1 }).await;
        let values: Vec<u32> = out.into_iter().map(|o| o.result.unwrap()).collect();
        assert_eq!(values, vec![2, 3, 4]);
    }
}
