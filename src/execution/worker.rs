//! Running a batch on a dedicated thread and joining it for the outcome.

use std::any::Any;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{ImportError, ImportResult};
use crate::types::{ImportOutcome, ImportRequest};

use super::Importer;
use super::observer::ProgressSink;

/// Handle to a batch running on its own thread.
///
/// Dropping the handle detaches the worker; the process does not wait for it on exit.
#[derive(Debug)]
pub struct ImportHandle {
    handle: JoinHandle<ImportResult<ImportOutcome>>,
}

/// Start `request` on a dedicated worker thread.
///
/// The worker owns the connection for the whole batch and reports to `sink` as it goes.
/// Use [`ImportHandle::is_finished`] to poll, or [`ImportHandle::wait_polling`] to poll on a
/// fixed interval while doing other work (e.g. draining a progress channel).
pub fn spawn_import(
    importer: Importer,
    request: ImportRequest,
    sink: Arc<dyn ProgressSink>,
) -> io::Result<ImportHandle> {
    let handle = thread::Builder::new()
        .name("tabload-import".to_string())
        .spawn(move || importer.run(&request, sink.as_ref()))?;
    Ok(ImportHandle { handle })
}

impl ImportHandle {
    /// Non-blocking completion check.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the worker is done.
    pub fn join(self) -> ImportResult<ImportOutcome> {
        self.handle
            .join()
            .map_err(|panic| ImportError::WorkerPanicked {
                message: panic_message(panic.as_ref()),
            })?
    }

    /// Call `on_tick` every `interval` until the worker is done, once more afterwards, then
    /// return its result.
    pub fn wait_polling<F>(self, interval: Duration, mut on_tick: F) -> ImportResult<ImportOutcome>
    where
        F: FnMut(),
    {
        while !self.is_finished() {
            on_tick();
            thread::sleep(interval);
        }
        on_tick();
        self.join()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
