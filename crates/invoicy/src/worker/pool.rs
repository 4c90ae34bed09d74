use std::sync::Arc;

use log::{debug, error, info};
use tokio::task::JoinHandle;

use crate::error::WorkerError;
use crate::worker::job::Job;
use crate::worker::queue::JobQueue;

/// N worker loops sharing one [`JobQueue`].
pub struct WorkerPool {
    queue: Arc<JobQueue>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `worker_count` loops on the current runtime.
    ///
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn start(queue: Arc<JobQueue>, worker_count: usize) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");

        let workers = (0..worker_count)
            .map(|worker_id| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { queue.worker_loop(worker_id).await })
            })
            .collect();

        info!("Started {} workers", worker_count);

        Self { queue, workers }
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    pub fn submit(&self, job: Job) -> Result<String, WorkerError> {
        self.queue.submit(job)
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.queue.close();
    }

    /// Waits for every loop to drain the queue and exit. Call after
    /// [`WorkerPool::shutdown`].
    pub async fn wait(self) {
        for (i, worker) in self.workers.into_iter().enumerate() {
            match worker.await {
                Ok(()) => debug!("Worker {} finished", i),
                Err(e) => error!("Worker {} panicked: {:?}", i, e),
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.queue.is_closed()
    }
}
