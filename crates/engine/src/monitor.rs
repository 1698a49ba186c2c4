// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status change fan-out for `follow_job`.
//!
//! Subscribers get the status at subscription time plus subsequent changes;
//! missed intermediate statuses are not replayed.

use drover_core::{JobKey, JobStatus};
use tokio::sync::{broadcast, mpsc};

/// Broadcast hub for job status changes.
#[derive(Clone)]
pub struct StatusHub {
    tx: broadcast::Sender<JobStatus>,
}

impl Default for StatusHub {
    fn default() -> Self {
        Self::new(256)
    }
}

impl StatusHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish a status change. Dropped silently when nobody listens.
    pub fn publish(&self, status: JobStatus) {
        let _ = self.tx.send(status);
    }

    /// Follow one job: yields `current` immediately, then every subsequent
    /// change for the key, ending after a terminal status.
    pub fn follow(&self, key: JobKey, current: JobStatus) -> mpsc::Receiver<JobStatus> {
        let (out_tx, out_rx) = mpsc::channel(16);
        let mut rx = self.tx.subscribe();
        tokio::spawn(async move {
            let terminal = current.status_code.is_terminal();
            if out_tx.send(current).await.is_err() || terminal {
                return;
            }
            loop {
                match rx.recv().await {
                    Ok(status) if status.job_key == key => {
                        let done = status.status_code.is_terminal();
                        if out_tx.send(status).await.is_err() || done {
                            return;
                        }
                    }
                    Ok(_) => {}
                    // Fell behind the broadcast: keep following from here.
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });
        out_rx
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
