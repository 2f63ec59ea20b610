//! # Spool Directory Transport
//!
//! A [`DataClient`] backed by a pair of directories, standing in for the
//! companion link on a desktop or dev board.
//!
//! ```text
//! <spool>/
//!   inbox/    *.json, one DataItem each, dropped in by the companion side
//!   outbox/   <path>-<millis>.json, one PutDataRequest each, written by the face
//! ```
//!
//! ## Connection
//! `connect()` creates both directories on a background task, then posts
//! `Connected` (or `ConnectionFailed`) onto the engine channel.
//!
//! ## Listening
//! While a listener is registered the inbox is polled every
//! `poll_interval`. All files found in one poll are parsed in file-name order,
//! deleted, and delivered as a single `DataChanged` batch. A file that cannot
//! be read or decoded is logged and removed so it cannot wedge the inbox.
//!
//! ## Sending
//! `put_data_item()` writes on a background task; failures are logged only.

use crate::engine::EngineEvent;
use crate::sync::{DataClient, DataEvent, DataItem, PutDataRequest, REQUEST_TIME_KEY};
use chrono::Utc;
use log::{debug, error, info, warn};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

const INBOX_DIR: &str = "inbox";
const OUTBOX_DIR: &str = "outbox";

#[derive(Error, Debug)]
pub enum SyncError {
    /// Directory or file access failed
    #[error("spool IO: {0}")]
    Io(#[from] io::Error),

    /// A spooled item is not valid JSON for its type
    #[error("spool JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct SpoolChannel {
    root: PathBuf,
    poll_interval: Duration,
    events: UnboundedSender<EngineEvent>,
    connected: Arc<AtomicBool>,
    connecting: Option<JoinHandle<()>>,
    listener: Option<JoinHandle<()>>,
}

impl SpoolChannel {
    pub fn new(root: impl Into<PathBuf>, poll_interval: Duration, events: UnboundedSender<EngineEvent>) -> Self {
        SpoolChannel {
            root: root.into(),
            poll_interval,
            events,
            connected: Arc::new(AtomicBool::new(false)),
            connecting: None,
            listener: None,
        }
    }

    pub fn inbox(&self) -> PathBuf {
        self.root.join(INBOX_DIR)
    }

    pub fn outbox(&self) -> PathBuf {
        self.root.join(OUTBOX_DIR)
    }

    fn is_connecting(&self) -> bool {
        self.connecting.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl DataClient for SpoolChannel {
    fn connect(&mut self) {
        if self.is_connected() || self.is_connecting() {
            return;
        }
        let inbox = self.inbox();
        let outbox = self.outbox();
        let connected = Arc::clone(&self.connected);
        let events = self.events.clone();
        self.connecting = Some(tokio::spawn(async move {
            let result = match tokio::fs::create_dir_all(&inbox).await {
                Ok(()) => tokio::fs::create_dir_all(&outbox).await,
                Err(e) => Err(e),
            };
            let event = match result {
                Ok(()) => {
                    connected.store(true, Ordering::SeqCst);
                    EngineEvent::Connected
                }
                Err(e) => EngineEvent::ConnectionFailed(e.to_string()),
            };
            let _ = events.send(event);
        }));
    }

    fn disconnect(&mut self) {
        if let Some(handle) = self.connecting.take() {
            handle.abort();
        }
        self.remove_listener();
        if self.connected.swap(false, Ordering::SeqCst) {
            info!("spool channel at {} disconnected", self.root.display());
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn add_listener(&mut self) {
        if self.listener.is_some() {
            return;
        }
        let inbox = self.inbox();
        let events = self.events.clone();
        let period = self.poll_interval;
        debug!("polling {} every {:?}", inbox.display(), period);
        self.listener = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                match read_inbox(&inbox).await {
                    Ok(batch) if batch.is_empty() => {}
                    Ok(batch) => {
                        if events.send(EngineEvent::DataChanged(batch)).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("failed to read spool inbox: {}", e),
                }
            }
        }));
    }

    fn remove_listener(&mut self) {
        if let Some(handle) = self.listener.take() {
            handle.abort();
        }
    }

    fn put_data_item(&mut self, request: PutDataRequest) {
        let outbox = self.outbox();
        tokio::spawn(async move {
            match write_outbox(&outbox, &request).await {
                Ok(path) => info!("sent {} as {}", request.item.path, path.display()),
                Err(e) => error!("failed to send {}: {}", request.item.path, e),
            }
        });
    }
}

impl Drop for SpoolChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}

async fn inbox_files(inbox: &Path) -> Result<Vec<PathBuf>, SyncError> {
    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(inbox).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

async fn load_item(path: &Path) -> Result<DataItem, SyncError> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// `None` for a file that could not be read or is not a valid item.
async fn parse_item(path: &Path) -> Option<DataItem> {
    match load_item(path).await {
        Ok(item) => Some(item),
        Err(e) => {
            warn!("discarding {}: {}", path.display(), e);
            None
        }
    }
}

/// Consume every `*.json` file in `inbox`, oldest name first.
///
/// Only listing the directory can fail; per-file problems are logged.
pub async fn read_inbox(inbox: &Path) -> Result<Vec<DataEvent>, SyncError> {
    let paths = inbox_files(inbox).await?;
    let mut batch = Vec::with_capacity(paths.len());
    for path in paths {
        if let Some(item) = parse_item(&path).await {
            batch.push(DataEvent::changed(item));
        }
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("failed to remove {}: {}", path.display(), e);
        }
    }
    Ok(batch)
}

/// Like [`read_inbox`] but leaves the files in place.
pub async fn peek_inbox(inbox: &Path) -> Result<Vec<DataEvent>, SyncError> {
    let mut batch = Vec::new();
    for path in inbox_files(inbox).await? {
        if let Some(item) = parse_item(&path).await {
            batch.push(DataEvent::changed(item));
        }
    }
    Ok(batch)
}

/// Write `request` into `outbox`, named after its path and request time.
pub async fn write_outbox(outbox: &Path, request: &PutDataRequest) -> Result<PathBuf, SyncError> {
    let millis = request
        .item
        .data
        .get_long(REQUEST_TIME_KEY)
        .unwrap_or_else(|_| Utc::now().timestamp_millis());
    let stem = request.item.path.trim_start_matches('/').replace('/', "-");
    let path = outbox.join(format!("{}-{}.json", stem, millis));
    let json = serde_json::to_string_pretty(request)?;
    tokio::fs::write(&path, json).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{weather_request, DataEventKind, WeatherPayload, WEATHER_PATH};
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    fn weather_json(code: i32) -> String {
        let item = DataItem {
            path: WEATHER_PATH.to_string(),
            data: WeatherPayload {
                condition_code: code,
                high: "75°".to_string(),
                low: "60°".to_string(),
            }
            .to_data_map(),
        };
        serde_json::to_string(&item).unwrap()
    }

    #[tokio::test]
    async fn test_read_inbox_consumes_in_name_order() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("002.json"), weather_json(500)).unwrap();
        std::fs::write(dir.path().join("001.json"), weather_json(800)).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let batch = read_inbox(dir.path()).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].kind, DataEventKind::Changed);
        assert_eq!(batch[0].item.data.get_int("weather-id"), Ok(800));
        assert_eq!(batch[1].item.data.get_int("weather-id"), Ok(500));

        assert!(!dir.path().join("001.json").exists());
        assert!(dir.path().join("notes.txt").exists());
        assert!(read_inbox(dir.path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_inbox_drops_unparseable_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{ not json").unwrap();
        std::fs::write(dir.path().join("good.json"), weather_json(200)).unwrap();

        let batch = read_inbox(dir.path()).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert!(!dir.path().join("bad.json").exists());
    }

    #[tokio::test]
    async fn test_read_inbox_skips_non_utf8_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("001.json"), [0xff, 0xfe, 0x00]).unwrap();
        std::fs::write(dir.path().join("002.json"), weather_json(800)).unwrap();

        let batch = read_inbox(dir.path()).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].item.data.get_int("weather-id"), Ok(800));
        assert!(!dir.path().join("001.json").exists());

        // The next poll starts clean
        assert!(read_inbox(dir.path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_entry_does_not_drop_the_batch() {
        let dir = TempDir::new().unwrap();
        // A directory named like an item cannot be read or removed as a file
        std::fs::create_dir(dir.path().join("001.json")).unwrap();
        std::fs::write(dir.path().join("002.json"), weather_json(500)).unwrap();

        let batch = read_inbox(dir.path()).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].item.data.get_int("weather-id"), Ok(500));
        assert!(!dir.path().join("002.json").exists());
    }

    #[tokio::test]
    async fn test_peek_inbox_leaves_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("001.json"), weather_json(800)).unwrap();

        assert_eq!(peek_inbox(dir.path()).await.unwrap().len(), 1);
        assert!(dir.path().join("001.json").exists());
        assert_eq!(read_inbox(dir.path()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_read_missing_inbox_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = read_inbox(&dir.path().join("nope")).await;
        assert!(matches!(result, Err(SyncError::Io(_))));
    }

    #[tokio::test]
    async fn test_write_outbox_names_file_after_request() {
        let dir = TempDir::new().unwrap();
        let path = write_outbox(dir.path(), &weather_request(1_700_000_000_000)).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "request-weather-1700000000000.json");

        let written: PutDataRequest = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, weather_request(1_700_000_000_000));
    }

    #[tokio::test]
    async fn test_channel_connects_and_delivers_batch() {
        let dir = TempDir::new().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut channel = SpoolChannel::new(dir.path(), Duration::from_millis(10), tx);

        channel.connect();
        assert_eq!(rx.recv().await, Some(EngineEvent::Connected));
        assert!(channel.is_connected());
        assert!(channel.inbox().is_dir());
        assert!(channel.outbox().is_dir());

        std::fs::write(channel.inbox().join("a.json"), weather_json(800)).unwrap();
        channel.add_listener();
        match rx.recv().await {
            Some(EngineEvent::DataChanged(batch)) => assert_eq!(batch.len(), 1),
            other => panic!("expected a data batch, got {:?}", other),
        }

        channel.disconnect();
        assert!(!channel.is_connected());
    }

    #[tokio::test]
    async fn test_connect_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut channel = SpoolChannel::new(&blocker, Duration::from_millis(10), tx);

        channel.connect();
        assert!(matches!(rx.recv().await, Some(EngineEvent::ConnectionFailed(_))));
        assert!(!channel.is_connected());
    }
}
