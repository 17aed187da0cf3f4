use std::sync::mpsc;

use crate::error::VisionError;

pub const DEFAULT_MAX_WORKERS: usize = 100;

#[derive(Debug, Clone, Copy)]
pub struct BoundedExecutor {
    max_workers: usize,
}

impl Default for BoundedExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WORKERS)
    }
}

impl BoundedExecutor {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn run<T, R, W, C>(
        &self,
        tasks: Vec<T>,
        work: W,
        mut on_complete: C,
    ) -> Result<(), VisionError>
    where
        T: Send,
        R: Send,
        W: Fn(&T) -> R + Sync,
        C: FnMut(T, R),
    {
        if tasks.is_empty() {
            return Ok(());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers.min(tasks.len()))
            .thread_name(|i| format!("vision-trades-{i}"))
            .build()
            .map_err(|err| VisionError::WorkerPool(err.to_string()))?;
        let (tx, rx) = mpsc::channel::<(T, R)>();
        let work = &work;

        pool.in_place_scope(|scope| {
            for task in tasks {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let result = work(&task);
                    // The receiver lives until the scope ends.
                    let _ = tx.send((task, result));
                });
            }
            drop(tx);

            for (task, result) in rx {
                on_complete(task, result);
            }
        });
        Ok(())
    }
}
