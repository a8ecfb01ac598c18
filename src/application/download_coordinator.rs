use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::{
    application::scanner::Scanner,
    config::AppConfig,
    domain::{classify, AppError, BatchPhase, DownloadJob, MediaFile, MediaKind, ScanOrder},
    download_service::{
        DownloadId, DownloadRequest, DownloadService, DownloadSnapshot, DownloadStatus,
        FailureReason,
    },
    utils::{get_timestamp_millis, last_path_segment, percent},
};

/// Identifies one scheduled poll callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PollTicket {
    pub batch: u64,
    pub seq: u64,
}

/// Runs delayed poll callbacks for the coordinator.
///
/// When a scheduled ticket fires the host calls
/// [`BatchCoordinator::on_poll_tick`] with it.
pub trait PollScheduler {
    fn schedule(&mut self, ticket: PollTicket, delay: Duration);
    fn cancel(&mut self, ticket: PollTicket);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub percent: u8,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Progress(ProgressEvent),
    Notice(String),
    JobCompleted { index: usize, total: usize },
    FilesRefreshed(Vec<MediaFile>),
    PlaybackAvailability { video: bool, image: bool },
    BatchCompleted { total: usize },
    BatchFailed(AppError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub kinds: Vec<MediaKind>,
    pub force_extension_for_kind: Option<MediaKind>,
    pub poll_interval: Duration,
    pub allow_over_metered: bool,
    pub allow_over_roaming: bool,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for CoordinatorSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            kinds: config.media_kinds.clone(),
            force_extension_for_kind: config.force_extension_for_kind,
            poll_interval: config.poll_interval(),
            allow_over_metered: config.allow_over_metered,
            allow_over_roaming: config.allow_over_roaming,
        }
    }
}

/// What caused a status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckTrigger {
    Poll,
    Completion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct BatchState {
    jobs: Vec<DownloadJob>,
    index: usize,
    download_id: Option<DownloadId>,
    last_status: Option<DownloadStatus>,
    bytes_downloaded: u64,
    bytes_total: u64,
    phase: BatchPhase,
}

impl Default for BatchState {
    fn default() -> Self {
        Self {
            jobs: Vec::new(),
            index: 0,
            download_id: None,
            last_status: None,
            bytes_downloaded: 0,
            bytes_total: 0,
            phase: BatchPhase::Idle,
        }
    }
}

/// Drives a batch of downloads strictly one at a time.
///
/// All state lives here and is only touched through `&mut self`, so the
/// host decides which thread owns it.
pub struct BatchCoordinator<S: DownloadService, P: PollScheduler> {
    service: S,
    scheduler: P,
    scanner: Scanner,
    settings: CoordinatorSettings,
    state: BatchState,
    generation: u64,
    next_seq: u64,
    pending_poll: Option<PollTicket>,
    events: Vec<BatchEvent>,
}

impl<S: DownloadService, P: PollScheduler> BatchCoordinator<S, P> {
    pub fn new(service: S, scheduler: P, scanner: Scanner, settings: CoordinatorSettings) -> Self {
        Self {
            service,
            scheduler,
            scanner,
            settings,
            state: BatchState::default(),
            generation: 0,
            next_seq: 0,
            pending_poll: None,
            events: Vec::new(),
        }
    }

    pub fn phase(&self) -> BatchPhase {
        self.state.phase
    }

    #[cfg(test)]
    pub fn current_index(&self) -> usize {
        self.state.index
    }

    #[cfg(test)]
    pub fn total_jobs(&self) -> usize {
        self.state.jobs.len()
    }

    pub fn tracked_download(&self) -> Option<DownloadId> {
        self.state.download_id
    }

    #[cfg(test)]
    pub fn last_status(&self) -> Option<DownloadStatus> {
        self.state.last_status
    }

    #[cfg(test)]
    pub fn pending_poll(&self) -> Option<PollTicket> {
        self.pending_poll
    }

    #[cfg(test)]
    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn scheduler_mut(&mut self) -> &mut P {
        &mut self.scheduler
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    pub fn drain_events(&mut self) -> Vec<BatchEvent> {
        std::mem::take(&mut self.events)
    }

    /// Start a new batch. An empty list is ignored; anything else first
    /// tears down whatever batch was running.
    pub fn start(&mut self, urls: &[String]) {
        if urls.is_empty() {
            self.emit(BatchEvent::Notice("No URLs to download".to_string()));
            return;
        }

        self.reset();
        self.generation += 1;
        self.state.jobs = urls
            .iter()
            .enumerate()
            .map(|(index, url)| DownloadJob {
                url: url.clone(),
                index,
            })
            .collect();

        info!(
            batch = self.generation,
            "Starting batch of {} downloads",
            self.state.jobs.len()
        );
        self.emit(BatchEvent::PlaybackAvailability {
            video: false,
            image: false,
        });
        self.emit_progress(0, "Preparing...".to_string());
        self.start_job();
    }

    /// Cancel the pending poll and forget the batch. Safe when idle.
    pub fn shutdown(&mut self) {
        self.reset();
    }

    /// Rescan storage and report what can be played.
    pub fn refresh(&mut self) {
        let files = self.scanner.scan(ScanOrder::ByPath);
        let notice = match self.latest_file() {
            Some(name) => format!("Found: {}", name),
            None => "No files found".to_string(),
        };
        self.emit(BatchEvent::Notice(notice));

        if !self.state.phase.is_in_flight() {
            self.emit_availability(&files);
        }
        self.emit(BatchEvent::FilesRefreshed(files));
    }

    pub fn on_poll_tick(&mut self, ticket: PollTicket) {
        if self.pending_poll != Some(ticket) {
            debug!(?ticket, "Ignoring stale poll tick");
            return;
        }
        self.pending_poll = None;
        self.check_now(CheckTrigger::Poll);
    }

    /// Query the in-flight download and act on its status.
    pub fn check_now(&mut self, trigger: CheckTrigger) {
        if !self.state.phase.is_in_flight() {
            return;
        }
        let Some(id) = self.state.download_id else {
            return;
        };

        match self.service.query(id) {
            Ok(Some(snapshot)) => self.apply_snapshot(snapshot),
            Ok(None) => {
                debug!(%id, ?trigger, "No status yet");
                self.ensure_poll_scheduled();
            }
            Err(e) => {
                warn!(%id, ?trigger, "Progress query error: {}", e);
                self.ensure_poll_scheduled();
            }
        }
    }

    fn apply_snapshot(&mut self, snapshot: DownloadSnapshot) {
        self.state.last_status = Some(snapshot.status);
        self.state.bytes_downloaded = snapshot.bytes_downloaded;
        self.state.bytes_total = snapshot.bytes_total;

        let progress = percent(snapshot.bytes_downloaded, snapshot.bytes_total);
        match snapshot.status {
            DownloadStatus::Pending => {
                self.emit_progress(progress, self.item_label("Pending…"));
                self.ensure_poll_scheduled();
            }
            DownloadStatus::Running => {
                self.emit_progress(progress, self.item_label("Downloading…"));
                self.ensure_poll_scheduled();
            }
            DownloadStatus::Paused(reason) => {
                self.emit_progress(progress, self.item_label(&format!("Paused ({})", reason)));
                self.ensure_poll_scheduled();
            }
            DownloadStatus::Succeeded => self.on_job_succeeded(),
            DownloadStatus::Failed(reason) => self.on_job_failed(reason),
        }
    }

    fn on_job_succeeded(&mut self) {
        let index = self.state.index;
        let total = self.state.jobs.len();
        info!(index = index + 1, total, "Download completed");

        self.cancel_poll();
        self.state.phase = BatchPhase::Succeeded;
        self.emit_progress(100, "Completed".to_string());
        self.emit(BatchEvent::Notice(format!("Download {} completed", index + 1)));
        self.emit(BatchEvent::JobCompleted { index, total });

        let files = self.scanner.scan(ScanOrder::ByPath);

        if index + 1 < total {
            self.emit(BatchEvent::FilesRefreshed(files));
            self.state.index += 1;
            self.emit_progress(0, self.item_label("Preparing next..."));
            self.start_job();
        } else {
            self.state.phase = BatchPhase::Completed;
            self.state.download_id = None;
            self.emit_progress(100, format!("All downloads completed ({})", total));
            self.emit_availability(&files);
            self.emit(BatchEvent::FilesRefreshed(files));
            self.emit(BatchEvent::Notice("All downloads completed".to_string()));
            self.emit(BatchEvent::BatchCompleted { total });
        }
    }

    fn on_job_failed(&mut self, reason: FailureReason) {
        error!(
            index = self.state.index + 1,
            %reason,
            "Download failed"
        );
        self.emit_progress(0, format!("Failed ({})", reason));
        self.emit(BatchEvent::Notice(format!(
            "Download failed: item {}",
            self.state.index + 1
        )));
        self.fail_batch(AppError::DownloadFailed {
            index: self.state.index + 1,
            total: self.state.jobs.len(),
            reason: reason.0,
        });
    }

    fn fail_batch(&mut self, err: AppError) {
        self.cancel_poll();
        self.state.phase = BatchPhase::Failed;
        self.state.download_id = None;
        self.emit_progress(
            0,
            format!("Failed on {}/{}", self.state.index + 1, self.state.jobs.len()),
        );
        self.emit(BatchEvent::PlaybackAvailability {
            video: false,
            image: false,
        });
        self.emit(BatchEvent::BatchFailed(err));
    }

    fn start_job(&mut self) {
        self.state.phase = BatchPhase::Preparing;
        self.state.download_id = None;
        self.state.last_status = None;
        self.state.bytes_downloaded = 0;
        self.state.bytes_total = 0;

        let Some(job) = self.state.jobs.get(self.state.index).cloned() else {
            return;
        };
        let request = self.build_request(&job);
        info!(index = job.index + 1, "Starting download: {}", job.url);

        match self.service.enqueue(request) {
            Ok(id) => {
                debug!(%id, "Download submitted");
                self.state.download_id = Some(id);
                self.state.phase = BatchPhase::Downloading;
                self.schedule_poll(Duration::ZERO);
            }
            Err(e) => {
                error!("Failed to submit {}: {}", job.url, e);
                self.fail_batch(AppError::Submission {
                    index: job.index + 1,
                    total: self.state.jobs.len(),
                    message: e.to_string(),
                });
            }
        }
    }

    fn build_request(&self, job: &DownloadJob) -> DownloadRequest {
        let name = self.destination_name(&job.url);
        let classification = classify(&name);
        let kind_label = classification
            .kind
            .map(MediaKind::label)
            .unwrap_or("Media");

        DownloadRequest {
            url: job.url.clone(),
            destination: self.scanner.directory().join(&name),
            title: format!("Downloading: {}", name),
            description: format!(
                "{} {} of {}",
                kind_label,
                job.index + 1,
                self.state.jobs.len()
            ),
            mime_type: classification.mime_type.to_string(),
            allow_over_metered: self.settings.allow_over_metered,
            allow_over_roaming: self.settings.allow_over_roaming,
        }
    }

    /// File name for a URL: its last path segment, or a generated one.
    pub fn destination_name(&self, url: &str) -> String {
        let name = last_path_segment(url)
            .unwrap_or_else(|| format!("media_{}", get_timestamp_millis()));

        match self.settings.force_extension_for_kind {
            Some(kind) if classify(&name).kind != Some(kind) => {
                format!("{}.{}", name, kind.canonical_extension())
            }
            _ => name,
        }
    }

    fn item_label(&self, base: &str) -> String {
        let total = self.state.jobs.len();
        if total > 1 {
            format!("{} ({}/{})", base, self.state.index + 1, total)
        } else {
            base.to_string()
        }
    }

    fn latest_file(&self) -> Option<String> {
        self.settings
            .kinds
            .iter()
            .filter_map(|kind| self.scanner.latest(*kind))
            .max_by_key(|file| file.modified)
            .and_then(|file| file.path.file_name().map(|name| name.to_string_lossy().into_owned()))
    }

    fn emit_availability(&mut self, files: &[MediaFile]) {
        let has = |kind: MediaKind| {
            self.settings.kinds.contains(&kind) && files.iter().any(|file| file.kind == kind)
        };
        let event = BatchEvent::PlaybackAvailability {
            video: has(MediaKind::Video),
            image: has(MediaKind::Image),
        };
        self.emit(event);
    }

    fn ensure_poll_scheduled(&mut self) {
        if self.pending_poll.is_none() {
            self.schedule_poll(self.settings.poll_interval);
        }
    }

    fn schedule_poll(&mut self, delay: Duration) {
        self.cancel_poll();
        self.next_seq += 1;
        let ticket = PollTicket {
            batch: self.generation,
            seq: self.next_seq,
        };
        self.pending_poll = Some(ticket);
        self.scheduler.schedule(ticket, delay);
    }

    fn cancel_poll(&mut self) {
        if let Some(ticket) = self.pending_poll.take() {
            self.scheduler.cancel(ticket);
        }
    }

    fn reset(&mut self) {
        self.cancel_poll();
        if let Some(id) = self.state.download_id.take() {
            if self.state.phase.is_in_flight() {
                debug!(%id, "Abandoning in-flight download");
                self.service.remove(id);
            }
        }
        self.state = BatchState::default();
    }

    fn emit_progress(&mut self, percent: u8, label: String) {
        self.emit(BatchEvent::Progress(ProgressEvent { percent, label }));
    }

    fn emit(&mut self, event: BatchEvent) {
        self.events.push(event);
    }
}

impl<S: DownloadService, P: PollScheduler> Drop for BatchCoordinator<S, P> {
    fn drop(&mut self) {
        self.reset();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::download_service::{DownloadError, Result as ServiceResult};
    use std::cell::{Cell, RefCell};
    use std::collections::{HashMap, HashSet};
    use std::path::Path;
    use tokio::sync::broadcast;

    pub(crate) struct FakeService {
        pub submitted: RefCell<Vec<(DownloadId, DownloadRequest)>>,
        pub snapshots: RefCell<HashMap<DownloadId, DownloadSnapshot>>,
        pub removed: RefCell<Vec<DownloadId>>,
        pub query_errors: Cell<u32>,
        pub reject: Cell<bool>,
        next_id: Cell<u64>,
        completions: broadcast::Sender<DownloadId>,
    }

    impl FakeService {
        pub(crate) fn new() -> Self {
            let (completions, _) = broadcast::channel(4);
            Self {
                submitted: RefCell::new(Vec::new()),
                snapshots: RefCell::new(HashMap::new()),
                removed: RefCell::new(Vec::new()),
                query_errors: Cell::new(0),
                reject: Cell::new(false),
                next_id: Cell::new(100),
                completions,
            }
        }

        pub(crate) fn set(&self, id: DownloadId, status: DownloadStatus, done: u64, total: u64) {
            self.snapshots.borrow_mut().insert(
                id,
                DownloadSnapshot {
                    status,
                    bytes_downloaded: done,
                    bytes_total: total,
                },
            );
        }

        /// Mark `id` succeeded and write its destination file.
        pub(crate) fn succeed(&self, id: DownloadId) {
            let destination = self
                .submitted
                .borrow()
                .iter()
                .find(|(submitted, _)| *submitted == id)
                .map(|(_, request)| request.destination.clone())
                .unwrap();
            std::fs::create_dir_all(destination.parent().unwrap()).unwrap();
            std::fs::write(destination, b"media").unwrap();
            self.set(id, DownloadStatus::Succeeded, 5, 5);
        }

        pub(crate) fn urls(&self) -> Vec<String> {
            self.submitted
                .borrow()
                .iter()
                .map(|(_, request)| request.url.clone())
                .collect()
        }
    }

    impl DownloadService for FakeService {
        fn enqueue(&self, request: DownloadRequest) -> ServiceResult<DownloadId> {
            if self.reject.get() {
                return Err(DownloadError::Unavailable("rejected".to_string()));
            }
            let id = DownloadId(self.next_id.get());
            self.next_id.set(id.0 + 1);
            self.submitted.borrow_mut().push((id, request));
            Ok(id)
        }

        fn query(&self, id: DownloadId) -> ServiceResult<Option<DownloadSnapshot>> {
            if self.query_errors.get() > 0 {
                self.query_errors.set(self.query_errors.get() - 1);
                return Err(DownloadError::Unavailable("cursor closed".to_string()));
            }
            Ok(self.snapshots.borrow().get(&id).copied())
        }

        fn subscribe_completions(&self) -> broadcast::Receiver<DownloadId> {
            self.completions.subscribe()
        }

        fn remove(&self, id: DownloadId) {
            self.removed.borrow_mut().push(id);
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeScheduler {
        pub active: HashSet<PollTicket>,
        pub delays: Vec<Duration>,
        pub cancelled: Vec<PollTicket>,
    }

    impl PollScheduler for FakeScheduler {
        fn schedule(&mut self, ticket: PollTicket, delay: Duration) {
            self.active.insert(ticket);
            self.delays.push(delay);
        }

        fn cancel(&mut self, ticket: PollTicket) {
            self.active.remove(&ticket);
            self.cancelled.push(ticket);
        }
    }

    pub(crate) type TestCoordinator = BatchCoordinator<FakeService, FakeScheduler>;

    pub(crate) fn coordinator(dir: &Path) -> TestCoordinator {
        BatchCoordinator::new(
            FakeService::new(),
            FakeScheduler::default(),
            Scanner::new(dir, vec![MediaKind::Video, MediaKind::Image]),
            CoordinatorSettings::default(),
        )
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    /// Fire the pending poll the way the host scheduler would.
    fn tick(coordinator: &mut TestCoordinator) {
        let ticket = coordinator.pending_poll().expect("no poll scheduled");
        coordinator.scheduler_mut().active.remove(&ticket);
        coordinator.on_poll_tick(ticket);
    }

    fn last_progress(events: &[BatchEvent]) -> Option<ProgressEvent> {
        events.iter().rev().find_map(|event| match event {
            BatchEvent::Progress(progress) => Some(progress.clone()),
            _ => None,
        })
    }

    fn last_availability(events: &[BatchEvent]) -> Option<(bool, bool)> {
        events.iter().rev().find_map(|event| match event {
            BatchEvent::PlaybackAvailability { video, image } => Some((*video, *image)),
            _ => None,
        })
    }

    #[test]
    fn test_empty_batch_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut coordinator = coordinator(dir.path());

        coordinator.start(&[]);

        assert_eq!(coordinator.phase(), BatchPhase::Idle);
        assert!(coordinator.service().submitted.borrow().is_empty());
        assert!(coordinator.pending_poll().is_none());
        assert_eq!(
            coordinator.drain_events(),
            vec![BatchEvent::Notice("No URLs to download".to_string())]
        );
    }

    #[test]
    fn test_two_media_kinds_complete_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut coordinator = coordinator(dir.path());
        let batch = urls(&["https://x/a.mp4", "https://x/b.png"]);

        coordinator.start(&batch);
        assert_eq!(coordinator.phase(), BatchPhase::Downloading);
        assert_eq!(coordinator.total_jobs(), 2);
        assert_eq!(coordinator.service().urls(), urls(&["https://x/a.mp4"]));

        let first = coordinator.tracked_download().unwrap();
        coordinator.service().set(first, DownloadStatus::Running, 50, 200);
        tick(&mut coordinator);
        assert_eq!(
            last_progress(&coordinator.drain_events()),
            Some(ProgressEvent {
                percent: 25,
                label: "Downloading… (1/2)".to_string()
            })
        );
        // Job 2 is not submitted before job 1 succeeds.
        assert_eq!(coordinator.service().submitted.borrow().len(), 1);

        coordinator.service().succeed(first);
        tick(&mut coordinator);
        assert_eq!(coordinator.current_index(), 1);
        assert_eq!(coordinator.service().urls(), batch);

        let second = coordinator.tracked_download().unwrap();
        assert_ne!(first, second);
        coordinator.service().succeed(second);
        tick(&mut coordinator);

        let events = coordinator.drain_events();
        assert_eq!(coordinator.phase(), BatchPhase::Completed);
        assert!(coordinator.pending_poll().is_none());
        assert!(events.contains(&BatchEvent::BatchCompleted { total: 2 }));
        assert_eq!(last_availability(&events), Some((true, true)));
        assert_eq!(
            last_progress(&events).unwrap().label,
            "All downloads completed (2)"
        );

        let files = coordinator.scanner().scan(ScanOrder::ByPath);
        let kinds: Vec<MediaKind> = files.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![MediaKind::Video, MediaKind::Image]);
    }

    #[test]
    fn test_failure_halts_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut coordinator = coordinator(dir.path());

        coordinator.start(&urls(&["https://x/a.mp4", "https://x/b.mp4"]));
        let first = coordinator.tracked_download().unwrap();
        coordinator
            .service()
            .set(first, DownloadStatus::Failed(FailureReason(1)), 0, 0);
        tick(&mut coordinator);

        let events = coordinator.drain_events();
        assert_eq!(coordinator.phase(), BatchPhase::Failed);
        assert_eq!(coordinator.current_index(), 0);
        assert_eq!(coordinator.service().urls(), urls(&["https://x/a.mp4"]));
        assert!(coordinator.pending_poll().is_none());
        assert_eq!(last_availability(&events), Some((false, false)));
        assert_eq!(last_progress(&events).unwrap().label, "Failed on 1/2");
        assert!(events.contains(&BatchEvent::BatchFailed(AppError::DownloadFailed {
            index: 1,
            total: 2,
            reason: 1
        })));
    }

    #[test]
    fn test_submission_failure_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let mut coordinator = coordinator(dir.path());
        coordinator.service().reject.set(true);

        coordinator.start(&urls(&["https://x/a.mp4"]));

        let events = coordinator.drain_events();
        assert_eq!(coordinator.phase(), BatchPhase::Failed);
        assert!(coordinator.pending_poll().is_none());
        assert!(events
            .iter()
            .any(|event| matches!(event, BatchEvent::BatchFailed(AppError::Submission { .. }))));
    }

    #[test]
    fn test_restart_cancels_previous_poll() {
        let dir = tempfile::tempdir().unwrap();
        let mut coordinator = coordinator(dir.path());
        let batch = urls(&["https://x/a.mp4", "https://x/b.mp4"]);

        coordinator.start(&batch);
        let stale = coordinator.pending_poll().unwrap();
        let first = coordinator.tracked_download().unwrap();

        coordinator.start(&batch);

        assert_eq!(coordinator.scheduler_mut().active.len(), 1);
        assert!(coordinator.scheduler_mut().cancelled.contains(&stale));
        assert_eq!(*coordinator.service().removed.borrow(), vec![first]);
        assert_ne!(coordinator.tracked_download(), Some(first));
        assert_eq!(coordinator.current_index(), 0);

        // A late tick from the first batch changes nothing.
        let before = coordinator.pending_poll();
        coordinator.on_poll_tick(stale);
        assert_eq!(coordinator.pending_poll(), before);
    }

    #[test]
    fn test_query_errors_keep_polling() {
        let dir = tempfile::tempdir().unwrap();
        let mut coordinator = coordinator(dir.path());
        coordinator.start(&urls(&["https://x/a.mp4"]));
        coordinator.service().query_errors.set(2);

        tick(&mut coordinator);
        tick(&mut coordinator);

        assert_eq!(coordinator.phase(), BatchPhase::Downloading);
        assert!(coordinator.pending_poll().is_some());
        let delays = &coordinator.scheduler_mut().delays;
        assert_eq!(delays[0], Duration::ZERO);
        assert!(delays[1..].iter().all(|d| *d == Duration::from_millis(500)));
    }

    #[test]
    fn test_paused_and_pending_labels() {
        let dir = tempfile::tempdir().unwrap();
        let mut coordinator = coordinator(dir.path());
        coordinator.start(&urls(&["https://x/a.mp4"]));
        let id = coordinator.tracked_download().unwrap();

        coordinator.service().set(id, DownloadStatus::Pending, 0, 0);
        tick(&mut coordinator);
        assert_eq!(
            last_progress(&coordinator.drain_events()).unwrap(),
            ProgressEvent {
                percent: 0,
                label: "Pending…".to_string()
            }
        );

        coordinator.service().set(id, DownloadStatus::Paused(2), 10, 40);
        tick(&mut coordinator);
        assert_eq!(
            last_progress(&coordinator.drain_events()).unwrap(),
            ProgressEvent {
                percent: 25,
                label: "Paused (2)".to_string()
            }
        );
        assert_eq!(coordinator.last_status(), Some(DownloadStatus::Paused(2)));
    }

    #[test]
    fn test_completion_check_keeps_single_poll() {
        let dir = tempfile::tempdir().unwrap();
        let mut coordinator = coordinator(dir.path());
        coordinator.start(&urls(&["https://x/a.mp4"]));
        let id = coordinator.tracked_download().unwrap();
        coordinator.service().set(id, DownloadStatus::Running, 1, 2);

        coordinator.check_now(CheckTrigger::Completion);
        assert_eq!(coordinator.scheduler_mut().active.len(), 1);

        coordinator.service().succeed(id);
        coordinator.check_now(CheckTrigger::Completion);
        assert_eq!(coordinator.phase(), BatchPhase::Completed);
        assert!(coordinator.scheduler_mut().active.is_empty());
    }

    #[test]
    fn test_destination_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut coordinator = coordinator(dir.path());
        assert_eq!(coordinator.destination_name("https://x/b.png"), "b.png");
        assert_eq!(coordinator.destination_name("https://x/stream"), "stream");
        assert!(coordinator
            .destination_name("https://x/")
            .starts_with("media_"));

        coordinator.settings.force_extension_for_kind = Some(MediaKind::Video);
        assert_eq!(coordinator.destination_name("https://x/stream"), "stream.mp4");
        assert_eq!(coordinator.destination_name("https://x/a.MP4"), "a.MP4");
        assert!(coordinator.destination_name("https://x/").ends_with(".mp4"));
    }

    #[test]
    fn test_request_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let mut coordinator = coordinator(dir.path());
        coordinator.start(&urls(&["https://x/b.png", "https://x/a.mp4"]));

        let submitted = coordinator.service().submitted.borrow();
        let (_, request) = &submitted[0];
        assert_eq!(request.destination, dir.path().join("b.png"));
        assert_eq!(request.mime_type, "image/png");
        assert_eq!(request.title, "Downloading: b.png");
        assert_eq!(request.description, "Image 1 of 2");
        assert!(request.allow_over_metered && request.allow_over_roaming);
    }

    #[test]
    fn test_shutdown_when_idle_and_in_flight() {
        let dir = tempfile::tempdir().unwrap();
        let mut coordinator = coordinator(dir.path());
        coordinator.shutdown();
        assert_eq!(coordinator.phase(), BatchPhase::Idle);

        coordinator.start(&urls(&["https://x/a.mp4"]));
        coordinator.shutdown();
        assert_eq!(coordinator.phase(), BatchPhase::Idle);
        assert!(coordinator.pending_poll().is_none());
        assert!(coordinator.tracked_download().is_none());
        assert!(coordinator.scheduler_mut().active.is_empty());
    }

    #[test]
    fn test_refresh_reports_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip.mp4"), b"v").unwrap();
        let mut coordinator = coordinator(dir.path());

        coordinator.refresh();

        let events = coordinator.drain_events();
        assert_eq!(last_availability(&events), Some((true, false)));
        assert!(events.contains(&BatchEvent::Notice("Found: clip.mp4".to_string())));
    }
}
