//! A background thread that sends ready batches.
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{RecvTimeoutError, SyncSender},
        Arc,
    },
    time::Instant,
};

use crate::{uploader::Pipeline, Error, Result};

/// The flush thread waits until the oldest buffered batch is due (or until it is woken up by an
/// enqueue that changed the schedule), then sends every ready batch. On shutdown it drains the
/// accumulator completely before exiting.
pub(crate) struct FlushThread {
    join_handle: std::thread::JoinHandle<()>,

    /// Wakes the thread up. Buffer size of 1 is enough: if the buffer is full, a wake up is
    /// already pending and the thread will observe the latest state.
    wake_sender: SyncSender<()>,

    stopping: Arc<AtomicBool>,
}

impl FlushThread {
    pub(crate) fn start(pipeline: Arc<Pipeline>) -> std::io::Result<FlushThread> {
        let (wake_sender, wake_receiver) = std::sync::mpsc::sync_channel::<()>(1);
        let stopping = Arc::new(AtomicBool::new(false));

        let join_handle = {
            let stopping = Arc::clone(&stopping);

            std::thread::Builder::new()
                .name("mwt-flush".to_owned())
                .spawn(move || {
                    log::debug!(target: "mwt", "flush thread started");
                    loop {
                        let received = match pipeline.time_until_ready(Instant::now()) {
                            Some(timeout) => wake_receiver.recv_timeout(timeout),
                            None => wake_receiver
                                .recv()
                                .map_err(|_| RecvTimeoutError::Disconnected),
                        };

                        if stopping.load(Ordering::Acquire)
                            || received == Err(RecvTimeoutError::Disconnected)
                        {
                            log::debug!(target: "mwt", "flush thread received stop command");
                            pipeline.flush_all();
                            return;
                        }

                        pipeline.flush_ready(Instant::now());
                    }
                })?
        };

        Ok(FlushThread {
            join_handle,
            wake_sender,
            stopping,
        })
    }

    pub(crate) fn wake(&self) {
        // Full buffer means a wake up is pending already. Disconnected means the thread has
        // exited, which only happens on shutdown.
        let _ = self.wake_sender.try_send(());
    }

    /// Stop the thread and block until it has flushed everything and exited.
    pub(crate) fn shutdown(self) -> Result<()> {
        self.stopping.store(true, Ordering::Release);
        self.wake();

        self.join_handle
            .join()
            .map_err(|_| Error::FlushThreadPanicked)?;

        log::debug!(target: "mwt", "flush thread stopped");
        Ok(())
    }
}
