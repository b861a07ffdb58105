//! Dedicated thread owning a [`GalleryController`].
//!
//! Jobs run one at a time in submission order, so user intents are applied in the order they
//! arrive and observers always see states produced by completed operations.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use anyhow::Context;
use tracing::{debug, warn};

use super::GalleryController;

type Job = Box<dyn FnOnce(&mut GalleryController) + Send>;

pub struct GalleryWorker {
    sender: Option<mpsc::Sender<Job>>,
    handle: Option<JoinHandle<GalleryController>>,
}

impl std::fmt::Debug for GalleryWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GalleryWorker").field("running", &self.handle.is_some()).finish()
    }
}

impl GalleryWorker {
    /// Move `controller` onto a new worker thread.
    pub fn spawn(mut controller: GalleryController) -> crate::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let handle = thread::Builder::new()
            .name("gallery-worker".into())
            .spawn(move || {
                for job in receiver {
                    job(&mut controller);
                }
                debug!("gallery worker queue closed");
                controller
            })
            .context("spawning gallery worker thread")?;

        Ok(Self { sender: Some(sender), handle: Some(handle) })
    }

    /// Queue `job` without waiting. Returns `false` once the worker has stopped.
    pub fn submit<F>(&self, job: F) -> bool
    where
        F: FnOnce(&mut GalleryController) + Send + 'static,
    {
        let Some(sender) = &self.sender else {
            return false;
        };
        sender.send(Box::new(job)).is_ok()
    }

    /// Queue `job` and wait for its result.
    pub fn call<T, F>(&self, job: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut GalleryController) -> T + Send + 'static,
    {
        let (reply, result) = mpsc::sync_channel(1);
        let queued = self.submit(move |controller| {
            let _ = reply.send(job(controller));
        });
        if !queued {
            return None;
        }
        result.recv().ok()
    }

    /// Drain outstanding jobs and hand the controller back.
    pub fn shutdown(mut self) -> Option<GalleryController> {
        self.stop()
    }

    fn stop(&mut self) -> Option<GalleryController> {
        self.sender.take();
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(controller) => Some(controller),
            Err(_) => {
                warn!("gallery worker panicked");
                None
            }
        }
    }
}

impl Drop for GalleryWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
