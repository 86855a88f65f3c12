//! Keeping a model in sync with the file it came from
//!
//! A [`ModelHandle`] binds a [`PieceTable`] to a path on disk. Reloading the content from that path
//! happens in a [`ReloadJob`]: a tokio task that reads the file in chunks and builds a completely
//! separate table. The live model is never touched while that's happening -- edits and reads can
//! continue as normal -- and only once the owner collects the finished job (with
//! [`finish_reload`] or [`poll_reload`]) is the new table moved into place.
//!
//! Because the swap happens on the owner's side, with a single move, anything reading from the
//! handle sees either all of the old content or all of the new content, and nothing in between.
//!
//! [`finish_reload`]: ModelHandle::finish_reload
//! [`poll_reload`]: ModelHandle::poll_reload

use crate::config::Config;
use crate::error::ReloadError;
use crate::model::{ByteArrayModel, Notification};
use crate::piece_table::PieceTable;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio::runtime::Handle;

mod job;

pub use job::{FileStamp, JobState, JobStatus, LoadedContent, ReloadJob};

/// A [`PieceTable`] bound to the file it's loaded from
///
/// Dropping the handle cancels any reload still in flight.
#[derive(Debug)]
pub struct ModelHandle {
    path: PathBuf,
    model: PieceTable,
    config: Config,
    runtime: Handle,
    job: Option<ReloadJob>,
    /// The stamp of the file as of the last successful load
    stamp: Option<FileStamp>,
}

impl ModelHandle {
    /// Loads the file at `path`, returning a handle bound to it
    ///
    /// This must be called from within a tokio runtime; later reloads are spawned onto the same
    /// runtime.
    pub async fn open(path: impl Into<PathBuf>, config: Config) -> Result<Self, ReloadError> {
        let path = path.into();
        let runtime = Handle::current();

        let mut job = ReloadJob::spawn_file(&runtime, path.clone(), &config);
        let loaded = job.finish().await?;

        log::info!(
            "opened {} ({} bytes)",
            path.display(),
            loaded.table.size()
        );

        Ok(ModelHandle {
            path,
            model: loaded.table,
            config,
            runtime,
            job: None,
            stamp: loaded.stamp,
        })
    }

    /// Binds an existing model to `path` without reading anything
    ///
    /// The first call to [`reload_if_changed`](Self::reload_if_changed) will always reload, as
    /// nothing is known about the file yet.
    pub fn with_model(
        path: impl Into<PathBuf>,
        model: PieceTable,
        config: Config,
        runtime: Handle,
    ) -> Self {
        ModelHandle {
            path: path.into(),
            model,
            config,
            runtime,
            job: None,
            stamp: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the live model
    pub fn model(&self) -> &PieceTable {
        &self.model
    }

    /// Returns the live model, for editing
    ///
    /// Edits made while a reload is in flight are discarded when the reloaded content is swapped
    /// in.
    pub fn model_mut(&mut self) -> &mut PieceTable {
        &mut self.model
    }

    /// Consumes the handle, cancelling any reload and returning the live model
    pub fn into_model(mut self) -> PieceTable {
        self.cancel_reload();
        mem::take(&mut self.model)
    }

    /// Returns the state of the current reload, or `Idle` if there isn't one
    pub fn reload_state(&self) -> Arc<JobState> {
        match &self.job {
            Some(job) => job.state(),
            None => Arc::new(JobState::Idle),
        }
    }

    /// Returns a handle to the in-flight reload, for observing or cancelling it elsewhere
    pub fn job_status(&self) -> Option<JobStatus> {
        self.job.as_ref().map(ReloadJob::status)
    }

    /// Starts reloading the model from its file
    ///
    /// Any reload already in flight is cancelled and replaced by this one.
    pub fn start_read_from_file(&mut self) -> JobStatus {
        let job = ReloadJob::spawn_file(&self.runtime, self.path.clone(), &self.config);
        self.replace_job(job)
    }

    /// Starts reloading the model from an arbitrary stream instead of its file
    ///
    /// Errors from the stream are reported against the handle's path. Because nothing is known
    /// about the file afterwards, the next [`reload_if_changed`](Self::reload_if_changed) will
    /// reload.
    pub fn start_read_from_stream<R>(&mut self, reader: R) -> JobStatus
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let job = ReloadJob::spawn_stream(&self.runtime, self.path.clone(), reader, &self.config);
        self.replace_job(job)
    }

    /// Starts a reload if the file has changed since it was last loaded, returning whether one was
    /// started
    ///
    /// A file is considered changed if its length or modification time differ from when it was
    /// last successfully loaded.
    pub fn reload_if_changed(&mut self) -> Result<bool, ReloadError> {
        let metadata =
            std::fs::metadata(&self.path).map_err(|e| ReloadError::io(&self.path, e))?;

        if self.stamp == Some(FileStamp::from_metadata(&metadata)) {
            return Ok(false);
        }

        log::debug!("{} changed on disk", self.path.display());
        self.start_read_from_file();
        Ok(true)
    }

    /// Requests cancellation of the in-flight reload, returning whether there was one
    ///
    /// The job still has to be collected; it'll report [`ReloadError::Cancelled`].
    pub fn cancel_reload(&mut self) -> bool {
        match &self.job {
            Some(job) => {
                job.cancel();
                true
            }
            None => false,
        }
    }

    /// Waits for the in-flight reload to finish and swaps in its result
    ///
    /// Returns `Ok(true)` if new content was swapped in, and `Ok(false)` if there was no reload to
    /// wait for. On failure, the live model is left exactly as it was.
    ///
    /// If the returned future is dropped before completing, the reload is cancelled.
    pub async fn finish_reload(&mut self) -> Result<bool, ReloadError> {
        let mut job = match self.job.take() {
            Some(job) => job,
            None => return Ok(false),
        };

        let outcome = job.finish().await;
        self.complete(&job, outcome).map(|()| true)
    }

    /// Swaps in the result of the in-flight reload if it's finished, without waiting
    ///
    /// Returns `None` if there's no reload, or it's still running.
    pub fn poll_reload(&mut self) -> Option<Result<(), ReloadError>> {
        let outcome = self.job.as_mut()?.try_finish()?;
        let job = self.job.take()?;
        Some(self.complete(&job, outcome))
    }

    fn replace_job(&mut self, job: ReloadJob) -> JobStatus {
        let status = job.status();
        if let Some(old) = self.job.replace(job) {
            log::debug!("superseding in-flight reload of {}", old.path().display());
            old.cancel();
        }
        status
    }

    /// (*Internal*) Handles the outcome of a finished job, swapping in the new content if there is
    /// some
    fn complete(
        &mut self,
        job: &ReloadJob,
        outcome: Result<LoadedContent, ReloadError>,
    ) -> Result<(), ReloadError> {
        let loaded = match outcome {
            Ok(loaded) => loaded,
            Err(e) => {
                match &e {
                    ReloadError::Cancelled => {
                        log::debug!("reload of {} cancelled", job.path().display())
                    }
                    _ => log::warn!("reload of {} failed: {}", job.path().display(), e),
                }
                return Err(e);
            }
        };

        let old_size = self.model.size();
        let read_only = self.model.is_read_only();
        let pending = self.model.take_notifications();

        let old = mem::replace(&mut self.model, loaded.table);
        drop(old);

        // Anything the old model hadn't delivered yet still happened, so it's carried over ahead
        // of the reload itself.
        self.model.set_read_only(read_only);
        for n in pending {
            self.model.push_notification(n);
        }
        self.model.push_notification(Notification::Reloaded {
            old_size,
            new_size: self.model.size(),
        });
        self.stamp = loaded.stamp;

        log::info!(
            "reloaded {} ({} -> {} bytes)",
            job.path().display(),
            old_size,
            self.model.size()
        );
        Ok(())
    }
}

impl Drop for ModelHandle {
    fn drop(&mut self) {
        self.cancel_reload();
    }
}
