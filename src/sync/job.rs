//! Wrapper module for [`ReloadJob`]

use crate::config::Config;
use crate::error::ReloadError;
use crate::piece_table::PieceTable;
use arc_swap::ArcSwap;
use std::fs::Metadata;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::runtime::Handle;
use tokio::sync::oneshot::{self, error::TryRecvError};

/// The state of a reload
///
/// A job starts out `Loading` and ends in exactly one of `Succeeded`, `Failed`, or `Cancelled`.
/// `Idle` is only ever reported by a [`ModelHandle`] with no job in flight.
///
/// [`ModelHandle`]: super::ModelHandle
#[derive(Debug, Clone)]
pub enum JobState {
    Idle,
    Loading,
    Succeeded,
    Failed(ReloadError),
    Cancelled,
}

impl JobState {
    /// Returns whether the job has stopped running, for whatever reason
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed(_) | JobState::Cancelled
        )
    }
}

/// Identifies a particular version of a file: its length and modification time
///
/// Two stamps comparing equal is taken to mean the file hasn't changed. Platforms that don't report
/// modification times fall back to comparing lengths only.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FileStamp {
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl FileStamp {
    pub fn from_metadata(metadata: &Metadata) -> Self {
        FileStamp {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        }
    }
}

/// The result of a successful reload: the freshly-built engine, ready to be swapped in
#[derive(Debug)]
pub struct LoadedContent {
    pub table: PieceTable,
    /// The stamp of the file at the time it was opened. Not present when reading from a stream.
    pub stamp: Option<FileStamp>,
}

/// A shareable view of a running job, allowing it to be observed or cancelled from anywhere
///
/// This is what an external watchdog should hold onto; it doesn't give access to the job's result.
#[derive(Debug, Clone)]
pub struct JobStatus {
    state: Arc<ArcSwap<JobState>>,
    cancelled: Arc<AtomicBool>,
}

impl JobStatus {
    fn new() -> Self {
        JobStatus {
            state: Arc::new(ArcSwap::from_pointee(JobState::Loading)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the current state of the job
    pub fn state(&self) -> Arc<JobState> {
        self.state.load_full()
    }

    /// Requests that the job stop
    ///
    /// Cancellation is cooperative: the job notices at the next chunk boundary. A job that's
    /// cancelled after it finished loading is still never swapped in.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn set_state(&self, state: JobState) {
        self.state.store(Arc::new(state));
    }
}

/// A single reload of a model's content, running on a tokio worker
///
/// The job reads its source in chunks into a brand new [`PieceTable`], and never touches the live
/// model. Its result is delivered exactly once, to whoever holds the `ReloadJob`; swapping the new
/// table in is left to them (typically a [`ModelHandle`]).
///
/// Dropping a `ReloadJob` before its result has been received cancels it.
///
/// [`ModelHandle`]: super::ModelHandle
#[derive(Debug)]
pub struct ReloadJob {
    path: PathBuf,
    status: JobStatus,
    result: oneshot::Receiver<Result<LoadedContent, ReloadError>>,
    finished: bool,
}

impl ReloadJob {
    /// Starts reading the file at `path`
    pub fn spawn_file(runtime: &Handle, path: impl Into<PathBuf>, config: &Config) -> Self {
        let path = path.into();
        let config = config.clone();
        let job_path = path.clone();

        Self::spawn(runtime, path, move |status| async move {
            load_file(job_path, config, status).await
        })
    }

    /// Starts reading from an arbitrary stream, labelled with `path` for error reporting
    pub fn spawn_stream<R>(
        runtime: &Handle,
        path: impl Into<PathBuf>,
        reader: R,
        config: &Config,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let path = path.into();
        let config = config.clone();
        let job_path = path.clone();

        Self::spawn(runtime, path, move |status| async move {
            let mut reader = reader;
            let table = load_stream(&mut reader, &job_path, &config, &status, 0).await?;
            Ok(LoadedContent { table, stamp: None })
        })
    }

    /// (*Internal*) Spawns the task, wiring its result up to the returned job
    fn spawn<F>(runtime: &Handle, path: PathBuf, load: impl FnOnce(JobStatus) -> F) -> Self
    where
        F: Future<Output = Result<LoadedContent, ReloadError>> + Send + 'static,
    {
        let status = JobStatus::new();
        let (tx, rx) = oneshot::channel();

        log::debug!("starting reload of {}", path.display());

        let task_status = status.clone();
        let future = load(status.clone());
        let task_path = path.clone();
        runtime.spawn(async move {
            let outcome = future.await;

            task_status.set_state(match &outcome {
                Ok(_) => JobState::Succeeded,
                Err(ReloadError::Cancelled) => JobState::Cancelled,
                Err(e) => JobState::Failed(e.clone()),
            });

            if tx.send(outcome).is_err() {
                log::debug!(
                    "reload of {} finished with nobody waiting for it",
                    task_path.display()
                );
            }
        });

        ReloadJob {
            path,
            status,
            result: rx,
            finished: false,
        }
    }

    /// Returns the path this job is reading from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a handle for observing or cancelling the job
    pub fn status(&self) -> JobStatus {
        self.status.clone()
    }

    pub fn state(&self) -> Arc<JobState> {
        self.status.state()
    }

    pub fn cancel(&self) {
        self.status.cancel()
    }

    /// Waits for the job to finish, returning its result
    ///
    /// If the worker died without reporting anything (e.g. because it panicked, or the runtime
    /// shut down), this returns [`ReloadError::Lost`]. Once the result has been handed out, any
    /// further calls return [`ReloadError::AlreadyCollected`].
    pub async fn finish(&mut self) -> Result<LoadedContent, ReloadError> {
        if self.finished {
            return Err(ReloadError::AlreadyCollected);
        }

        let received = (&mut self.result).await;
        self.finished = true;
        self.received(received.unwrap_or(Err(ReloadError::Lost)))
    }

    /// Returns the job's result if it has finished, without waiting
    pub fn try_finish(&mut self) -> Option<Result<LoadedContent, ReloadError>> {
        if self.finished {
            return Some(Err(ReloadError::AlreadyCollected));
        }

        let outcome = match self.result.try_recv() {
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => Err(ReloadError::Lost),
            Ok(outcome) => outcome,
        };

        self.finished = true;
        Some(self.received(outcome))
    }

    // Applies the last-minute checks to a result from the worker
    fn received(
        &self,
        outcome: Result<LoadedContent, ReloadError>,
    ) -> Result<LoadedContent, ReloadError> {
        match outcome {
            // Cancelled after the worker's final check, but before we got here
            Ok(_) if self.status.is_cancelled() => {
                self.status.set_state(JobState::Cancelled);
                Err(ReloadError::Cancelled)
            }
            Err(ReloadError::Lost) => {
                self.status.set_state(JobState::Failed(ReloadError::Lost));
                Err(ReloadError::Lost)
            }
            outcome => outcome,
        }
    }
}

impl Drop for ReloadJob {
    fn drop(&mut self) {
        if !self.finished {
            self.status.cancel();
        }
    }
}

async fn load_file(
    path: PathBuf,
    config: Config,
    status: JobStatus,
) -> Result<LoadedContent, ReloadError> {
    let mut file = File::open(&path)
        .await
        .map_err(|e| ReloadError::io(&path, e))?;
    let metadata = file
        .metadata()
        .await
        .map_err(|e| ReloadError::io(&path, e))?;

    let stamp = FileStamp::from_metadata(&metadata);
    let size_hint = usize::try_from(metadata.len()).unwrap_or(0);
    let table = load_stream(&mut file, &path, &config, &status, size_hint).await?;

    Ok(LoadedContent {
        table,
        stamp: Some(stamp),
    })
}

/// Reads all of `reader` into a new `PieceTable`, checking for cancellation between every chunk
async fn load_stream(
    reader: &mut (impl AsyncRead + Unpin),
    path: &Path,
    config: &Config,
    status: &JobStatus,
    size_hint: usize,
) -> Result<PieceTable, ReloadError> {
    let bytes = read_chunks(reader, path, config.reload_chunk_size, status, size_hint).await?;

    log::debug!("read {} bytes from {}", bytes.len(), path.display());
    Ok(PieceTable::from_bytes(bytes).with_config(config))
}

async fn read_chunks(
    reader: &mut (impl AsyncRead + Unpin),
    path: &Path,
    chunk_size: usize,
    status: &JobStatus,
    size_hint: usize,
) -> Result<Vec<u8>, ReloadError> {
    // A zero-sized buffer would read as an immediate EOF
    let mut chunk = vec![0; chunk_size.max(1)];
    let mut bytes = Vec::with_capacity(size_hint);

    loop {
        if status.is_cancelled() {
            log::debug!(
                "reload of {} cancelled after {} bytes",
                path.display(),
                bytes.len()
            );
            return Err(ReloadError::Cancelled);
        }

        let n = reader
            .read(&mut chunk)
            .await
            .map_err(|e| ReloadError::io(path, e))?;
        if n == 0 {
            break;
        }

        log::trace!("read chunk of {} bytes from {}", n, path.display());
        bytes.extend_from_slice(&chunk[..n]);
    }

    // One last check, so that a cancellation during the final read still counts
    match status.is_cancelled() {
        true => Err(ReloadError::Cancelled),
        false => Ok(bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_across_chunks() {
        let data: Vec<u8> = (0..=255).collect();
        let status = JobStatus::new();

        let bytes = read_chunks(&mut &data[..], Path::new("mem"), 7, &status, 0)
            .await
            .unwrap();
        assert_eq!(bytes, data);
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let status = JobStatus::new();
        status.cancel();

        let result = read_chunks(&mut &b"abc"[..], Path::new("mem"), 1, &status, 0).await;
        assert!(matches!(result, Err(ReloadError::Cancelled)));
    }

    #[tokio::test]
    async fn zero_chunk_size_still_reads() {
        let status = JobStatus::new();
        let bytes = read_chunks(&mut &b"abc"[..], Path::new("mem"), 0, &status, 0)
            .await
            .unwrap();
        assert_eq!(bytes, b"abc");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dropping_job_cancels_it() {
        let (_writer, reader) = tokio::io::duplex(16);
        let job = ReloadJob::spawn_stream(&Handle::current(), "pipe", reader, &Config::default());
        let status = job.status();

        assert!(matches!(*status.state(), JobState::Loading));
        drop(job);
        assert!(status.is_cancelled());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn result_is_collected_once() {
        let mut job =
            ReloadJob::spawn_stream(&Handle::current(), "mem", &b"abc"[..], &Config::default());

        let loaded = job.finish().await.unwrap();
        assert_eq!(loaded.table.to_vec(), b"abc");

        assert!(matches!(
            job.finish().await,
            Err(ReloadError::AlreadyCollected)
        ));
        assert!(matches!(
            job.try_finish(),
            Some(Err(ReloadError::AlreadyCollected))
        ));
        // The job's own state is left alone
        assert!(matches!(*job.state(), JobState::Succeeded));
    }

    #[test]
    fn terminal_states() {
        assert!(!JobState::Idle.is_terminal());
        assert!(!JobState::Loading.is_terminal());
        assert!(JobState::Succeeded.is_terminal());
        assert!(JobState::Failed(ReloadError::Lost).is_terminal());
        assert!(JobState::Cancelled.is_terminal());
    }
}
