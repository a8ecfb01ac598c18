use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio::runtime::Runtime;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::models::{DownloadId, DownloadRequest, DownloadSnapshot, DownloadStatus, FailureReason};
use super::{DownloadError, DownloadService, Result};

const USER_AGENT: &str = concat!("media-batch-player/", env!("CARGO_PKG_VERSION"));
const COMPLETION_CAPACITY: usize = 16;

struct TransferRecord {
    snapshot: DownloadSnapshot,
    request: DownloadRequest,
    task: Option<AbortHandle>,
}

type Records = Arc<Mutex<HashMap<DownloadId, TransferRecord>>>;

/// Download queue backed by reqwest, running transfers on its own runtime.
pub struct HttpDownloadService {
    runtime: Option<Runtime>,
    client: Client,
    records: Records,
    next_id: AtomicU64,
    completions: broadcast::Sender<DownloadId>,
}

impl HttpDownloadService {
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("download-service")
            .enable_all()
            .build()
            .map_err(|e| DownloadError::Unavailable(format!("runtime: {}", e)))?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DownloadError::Unavailable(format!("http client: {}", e)))?;

        let (completions, _) = broadcast::channel(COMPLETION_CAPACITY);

        Ok(Self {
            runtime: Some(runtime),
            client,
            records: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            completions,
        })
    }

    fn validate(url: &str) -> Result<Url> {
        let parsed = Url::parse(url).map_err(|source| DownloadError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            other => Err(DownloadError::UnsupportedScheme(other.to_string())),
        }
    }
}

impl DownloadService for HttpDownloadService {
    fn enqueue(&self, request: DownloadRequest) -> Result<DownloadId> {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| DownloadError::Unavailable("service shut down".to_string()))?;
        let url = Self::validate(&request.url)?;

        if let Some(parent) = request.destination.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let id = DownloadId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(
            %id,
            metered = request.allow_over_metered,
            roaming = request.allow_over_roaming,
            mime = %request.mime_type,
            "{}: {}",
            request.title,
            request.description
        );

        {
            let mut records = lock_records(&self.records)?;
            records.insert(
                id,
                TransferRecord {
                    snapshot: DownloadSnapshot {
                        status: DownloadStatus::Pending,
                        bytes_downloaded: 0,
                        bytes_total: 0,
                    },
                    request: request.clone(),
                    task: None,
                },
            );
        }

        let handle = runtime.spawn(run_transfer(
            self.client.clone(),
            url,
            request,
            id,
            self.records.clone(),
            self.completions.clone(),
        ));

        if let Ok(mut records) = self.records.lock() {
            if let Some(record) = records.get_mut(&id) {
                record.task = Some(handle.abort_handle());
            }
        }

        info!(%id, "download enqueued");
        Ok(id)
    }

    fn query(&self, id: DownloadId) -> Result<Option<DownloadSnapshot>> {
        let records = lock_records(&self.records)?;
        Ok(records.get(&id).map(|record| record.snapshot))
    }

    fn subscribe_completions(&self) -> broadcast::Receiver<DownloadId> {
        self.completions.subscribe()
    }

    fn remove(&self, id: DownloadId) {
        let removed = match self.records.lock() {
            Ok(mut records) => records.remove(&id),
            Err(_) => None,
        };

        if let Some(record) = removed {
            if let Some(task) = record.task {
                task.abort();
            }
            if !record.snapshot.status.is_terminal() {
                discard_partial(&partial_path(&record.request.destination, id));
            }
            debug!(%id, "download removed");
        }
    }
}

impl Drop for HttpDownloadService {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn lock_records(
    records: &Records,
) -> Result<std::sync::MutexGuard<'_, HashMap<DownloadId, TransferRecord>>> {
    records
        .lock()
        .map_err(|_| DownloadError::Unavailable("download table poisoned".to_string()))
}

fn update_snapshot(records: &Records, id: DownloadId, apply: impl FnOnce(&mut DownloadSnapshot)) {
    if let Ok(mut records) = records.lock() {
        if let Some(record) = records.get_mut(&id) {
            apply(&mut record.snapshot);
        }
    }
}

/// Scratch file a transfer writes to before it is moved over `destination`.
/// Unique per download, so an aborted transfer never touches another one's
/// file or a copy already at `destination`.
fn partial_path(destination: &Path, id: DownloadId) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.part", id.0));
    destination.with_file_name(name)
}

fn discard_partial(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove partial file {}: {}", path.display(), e);
        }
    }
}

async fn run_transfer(
    client: Client,
    url: Url,
    request: DownloadRequest,
    id: DownloadId,
    records: Records,
    completions: broadcast::Sender<DownloadId>,
) {
    let partial = partial_path(&request.destination, id);
    let outcome = transfer(&client, url, &partial, id, &records).await;
    let outcome = match outcome {
        Ok(()) => tokio::fs::rename(&partial, &request.destination)
            .await
            .map_err(|e| {
                warn!(%id, "Failed to move finished file into place: {}", e);
                FailureReason::FILE_ERROR
            }),
        Err(reason) => Err(reason),
    };

    let status = match outcome {
        Ok(()) => {
            info!(%id, "download finished: {}", request.destination.display());
            DownloadStatus::Succeeded
        }
        Err(reason) => {
            warn!(%id, %reason, "download failed: {}", request.url);
            discard_partial(&partial);
            DownloadStatus::Failed(reason)
        }
    };

    update_snapshot(&records, id, |snapshot| {
        snapshot.status = status;
        if status == DownloadStatus::Succeeded && snapshot.bytes_total < snapshot.bytes_downloaded {
            snapshot.bytes_total = snapshot.bytes_downloaded;
        }
    });

    // Nobody listening is fine.
    let _ = completions.send(id);
}

async fn transfer(
    client: &Client,
    url: Url,
    partial: &Path,
    id: DownloadId,
    records: &Records,
) -> std::result::Result<(), FailureReason> {
    let response = client.get(url).send().await.map_err(|e| {
        warn!(%id, "Download request failed: {}", e);
        FailureReason::UNKNOWN
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FailureReason(u32::from(status.as_u16())));
    }

    let total = response.content_length().unwrap_or(0);
    update_snapshot(records, id, |snapshot| {
        snapshot.status = DownloadStatus::Running;
        snapshot.bytes_total = total;
    });

    let mut file = tokio::fs::File::create(partial)
        .await
        .map_err(|e| {
            warn!(%id, "Failed to create file: {}", e);
            FailureReason::FILE_ERROR
        })?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            warn!(%id, "Stream error: {}", e);
            FailureReason::HTTP_DATA_ERROR
        })?;

        file.write_all(&chunk).await.map_err(|e| {
            warn!(%id, "Write error: {}", e);
            FailureReason::FILE_ERROR
        })?;

        let len = chunk.len() as u64;
        update_snapshot(records, id, |snapshot| snapshot.bytes_downloaded += len);
    }

    file.sync_all().await.map_err(|e| {
        warn!(%id, "Failed to sync file: {}", e);
        FailureReason::FILE_ERROR
    })?;

    Ok(())
}
