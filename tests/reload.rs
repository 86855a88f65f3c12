//! Reloading models from their files, in the background

use piecebuf::{ByteArrayModel, Config, JobState, ModelHandle, Notification, ReloadError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncWriteExt, ReadBuf};

/// Creates a scratch directory with a single file in it, returning both
fn scratch_file(contents: &[u8]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.bin");
    fs::write(&path, contents).unwrap();
    (dir, path)
}

async fn open(path: &Path) -> ModelHandle {
    ModelHandle::open(path, Config::default()).await.unwrap()
}

/// A reader that produces some bytes, a few at a time, and then fails
struct FailingReader {
    data: Vec<u8>,
    pos: usize,
}

impl AsyncRead for FailingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.pos >= self.data.len() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::Other,
                "device went away",
            )));
        }

        let pos = self.pos;
        let n = (self.data.len() - pos).min(buf.remaining()).min(4);
        buf.put_slice(&self.data[pos..pos + n]);
        self.pos += n;
        Poll::Ready(Ok(()))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn open_reads_whole_file() {
    let contents: Vec<u8> = (0..100_000u32).map(|i| (i % 253) as u8).collect();
    let (_dir, path) = scratch_file(&contents);

    let config = Config {
        reload_chunk_size: 1000,
        ..Config::default()
    };
    let handle = ModelHandle::open(&path, config).await.unwrap();

    assert_eq!(handle.model().to_vec(), contents);
    assert_eq!(handle.model().piece_count(), 1);
    assert!(matches!(*handle.reload_state(), JobState::Idle));
}

#[tokio::test(flavor = "multi_thread")]
async fn open_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = ModelHandle::open(dir.path().join("nope"), Config::default()).await;

    match result {
        Err(e) => assert_eq!(e.io_kind(), Some(io::ErrorKind::NotFound)),
        Ok(_) => panic!("opened a file that doesn't exist"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn reload_swaps_content() {
    let (_dir, path) = scratch_file(b"hello");
    let mut handle = open(&path).await;

    handle.model_mut().insert(5, b"!").unwrap();
    fs::write(&path, b"goodbye world").unwrap();

    let status = handle.start_read_from_file();
    assert_eq!(handle.finish_reload().await.unwrap(), true);

    assert!(matches!(*status.state(), JobState::Succeeded));
    assert!(matches!(*handle.reload_state(), JobState::Idle));
    assert_eq!(handle.model().to_vec(), b"goodbye world");
    // The new content comes with a fresh history
    assert!(!handle.model().can_undo());
    assert_eq!(
        handle.model_mut().take_notifications(),
        vec![
            Notification::Inserted { offset: 5, len: 1 },
            Notification::Reloaded {
                old_size: 6,
                new_size: 13
            },
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn nothing_to_finish() {
    let (_dir, path) = scratch_file(b"abc");
    let mut handle = open(&path).await;

    assert_eq!(handle.finish_reload().await.unwrap(), false);
    assert!(handle.poll_reload().is_none());
    assert!(!handle.cancel_reload());
}

// A file deleted out from under the model: the reload fails, and the live buffer is exactly as it
// was before
#[tokio::test(flavor = "multi_thread")]
async fn deleted_file_fails_reload() {
    let (_dir, path) = scratch_file(b"ABCDEFGH");
    let mut handle = open(&path).await;
    handle.model_mut().remove(2..4).unwrap();
    let before = handle.model().to_vec();

    fs::remove_file(&path).unwrap();
    let status = handle.start_read_from_file();
    let err = handle.finish_reload().await.unwrap_err();

    assert!(matches!(err, ReloadError::Io { .. }));
    assert_eq!(err.io_kind(), Some(io::ErrorKind::NotFound));
    assert!(matches!(
        &*status.state(),
        JobState::Failed(ReloadError::Io { .. })
    ));

    assert_eq!(handle.model().to_vec(), before);
    assert!(handle.model().can_undo());
    assert_eq!(
        handle.model_mut().take_notifications(),
        vec![Notification::Removed { offset: 2, len: 2 }]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn read_error_mid_stream() {
    let (_dir, path) = scratch_file(b"original");
    let mut handle = open(&path).await;

    let status = handle.start_read_from_stream(FailingReader {
        data: b"partial content that never finishes".to_vec(),
        pos: 0,
    });
    let err = handle.finish_reload().await.unwrap_err();

    match &err {
        ReloadError::Io { path: p, cause } => {
            assert_eq!(p, &path);
            assert_eq!(cause.kind(), io::ErrorKind::Other);
        }
        e => panic!("unexpected error {:?}", e),
    }
    assert!(matches!(&*status.state(), JobState::Failed(_)));
    assert_eq!(handle.model().to_vec(), b"original");
    assert!(handle.model_mut().take_notifications().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_reload_never_swaps() {
    let (_dir, path) = scratch_file(b"original");
    let mut handle = open(&path).await;

    let (mut writer, reader) = tokio::io::duplex(64);
    let status = handle.start_read_from_stream(reader);
    writer.write_all(b"replacement").await.unwrap();

    assert!(handle.cancel_reload());
    drop(writer);

    assert!(matches!(
        handle.finish_reload().await,
        Err(ReloadError::Cancelled)
    ));
    assert!(matches!(*status.state(), JobState::Cancelled));
    assert_eq!(handle.model().to_vec(), b"original");
    assert!(handle.model_mut().take_notifications().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn watchdog_can_cancel() {
    let (_dir, path) = scratch_file(b"original");
    let mut handle = open(&path).await;

    let (writer, reader) = tokio::io::duplex(64);
    handle.start_read_from_stream(reader);

    // Anything holding onto the status can cancel the job, not just the handle
    let watchdog = handle.job_status().unwrap();
    watchdog.cancel();
    drop(writer);

    assert!(matches!(
        handle.finish_reload().await,
        Err(ReloadError::Cancelled)
    ));
    assert_eq!(handle.model().to_vec(), b"original");
}

#[tokio::test(flavor = "multi_thread")]
async fn new_reload_supersedes_old() {
    let (_dir, path) = scratch_file(b"first");
    let mut handle = open(&path).await;

    let (_writer, reader) = tokio::io::duplex(64);
    let stalled = handle.start_read_from_stream(reader);

    fs::write(&path, b"second").unwrap();
    handle.start_read_from_file();

    assert!(stalled.is_cancelled());
    assert_eq!(handle.finish_reload().await.unwrap(), true);
    assert_eq!(handle.model().to_vec(), b"second");
}

#[tokio::test(flavor = "multi_thread")]
async fn poll_until_done() {
    let (_dir, path) = scratch_file(b"before");
    let mut handle = open(&path).await;
    fs::write(&path, b"after!!").unwrap();

    handle.start_read_from_file();
    let outcome = loop {
        if let Some(outcome) = handle.poll_reload() {
            break outcome;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    };

    outcome.unwrap();
    assert_eq!(handle.model().to_vec(), b"after!!");
    assert!(handle.poll_reload().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn reload_only_when_changed() {
    let (_dir, path) = scratch_file(b"v1");
    let mut handle = open(&path).await;

    assert_eq!(handle.reload_if_changed().unwrap(), false);

    fs::write(&path, b"version 2").unwrap();
    assert_eq!(handle.reload_if_changed().unwrap(), true);
    handle.finish_reload().await.unwrap();
    assert_eq!(handle.model().to_vec(), b"version 2");

    assert_eq!(handle.reload_if_changed().unwrap(), false);

    fs::remove_file(&path).unwrap();
    assert!(handle.reload_if_changed().is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn reload_keeps_read_only() {
    let (_dir, path) = scratch_file(b"abc");
    let mut handle = open(&path).await;
    handle.model_mut().set_read_only(true);

    fs::write(&path, b"abcdef").unwrap();
    handle.start_read_from_file();
    handle.finish_reload().await.unwrap();

    assert!(handle.model().is_read_only());
    assert_eq!(handle.model().to_vec(), b"abcdef");
}

#[tokio::test(flavor = "multi_thread")]
async fn dropping_handle_cancels() {
    let (_dir, path) = scratch_file(b"abc");
    let mut handle = open(&path).await;

    let (_writer, reader) = tokio::io::duplex(64);
    let status = handle.start_read_from_stream(reader);

    drop(handle);
    assert!(status.is_cancelled());
}
