use std::collections::HashMap;
use std::time::Duration;

use iced::{task, window, Subscription, Task};
use tracing::{error, info, warn};

use crate::application::{
    BatchCoordinator, CompletionBridge, CoordinatorSettings, ExternalPlayer, InAppImageViewer,
    PlaybackLauncher, PollScheduler, PollTicket, Scanner,
};
use crate::config::AppConfig;
use crate::domain::MediaKind;
use crate::download_service::{DownloadId, DownloadService, HttpDownloadService};
use crate::ui::{self, DownloadMessage, DownloadView};

type Coordinator = BatchCoordinator<HttpDownloadService, TaskScheduler>;

/// Poll scheduler backed by abortable iced tasks.
#[derive(Default)]
pub struct TaskScheduler {
    // Tasks created since the last flush, handed to the runtime by `update`.
    pending: Vec<Task<Message>>,
    handles: HashMap<PollTicket, task::Handle>,
}

impl TaskScheduler {
    fn take_tasks(&mut self) -> Task<Message> {
        Task::batch(std::mem::take(&mut self.pending))
    }

    fn fired(&mut self, ticket: PollTicket) {
        self.handles.remove(&ticket);
    }
}

impl PollScheduler for TaskScheduler {
    fn schedule(&mut self, ticket: PollTicket, delay: Duration) {
        let (task, handle) = Task::perform(tokio::time::sleep(delay), move |_| {
            Message::PollTick(ticket)
        })
        .abortable();
        self.pending.push(task);
        self.handles.insert(ticket, handle);
    }

    fn cancel(&mut self, ticket: PollTicket) {
        if let Some(handle) = self.handles.remove(&ticket) {
            handle.abort();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Home,
    Image,
}

pub struct DownloadApp {
    view: DownloadView,
    screen: Screen,
    config: AppConfig,
    coordinator: Option<Coordinator>,
    launcher: PlaybackLauncher<ExternalPlayer, InAppImageViewer>,
    bridge: CompletionBridge,
}

impl DownloadApp {
    pub fn new(config: AppConfig) -> (Self, Task<Message>) {
        let mut app = Self {
            view: DownloadView::default(),
            screen: Screen::Home,
            launcher: PlaybackLauncher::new(
                ExternalPlayer::new(config.player.clone()),
                InAppImageViewer::default(),
            ),
            coordinator: None,
            bridge: CompletionBridge::new(),
            config,
        };

        let service = match HttpDownloadService::new() {
            Ok(service) => service,
            Err(e) => {
                error!("Download service unavailable: {}", e);
                app.view.notice = format!("Downloads unavailable: {}", e);
                return (app, Task::none());
            }
        };

        let completions = app.bridge.register(service.subscribe_completions());
        let scanner = Scanner::new(
            app.config.storage_dir.clone(),
            app.config.media_kinds.clone(),
        );
        let mut coordinator = BatchCoordinator::new(
            service,
            TaskScheduler::default(),
            scanner,
            CoordinatorSettings::from(&app.config),
        );
        coordinator.refresh();
        app.coordinator = Some(coordinator);

        let listen = Task::run(completions, Message::DownloadBroadcast);
        let initial = app.flush();
        (app, Task::batch([listen, initial]))
    }

    /// Apply coordinator events to the view and collect scheduled polls.
    fn flush(&mut self) -> Task<Message> {
        let Some(coordinator) = self.coordinator.as_mut() else {
            return Task::none();
        };
        for event in coordinator.drain_events() {
            self.view.apply(&event);
        }
        coordinator.scheduler_mut().take_tasks()
    }

    fn playlist(&self, kind: MediaKind) -> Vec<std::path::PathBuf> {
        self.coordinator
            .as_ref()
            .map(|coordinator| coordinator.scanner().playlist(kind))
            .unwrap_or_default()
    }

    fn shutdown(&mut self) {
        info!("Shutting down");
        if let Some(coordinator) = self.coordinator.as_mut() {
            coordinator.shutdown();
        }
        self.bridge.unregister();
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(DownloadMessage),
    PollTick(PollTicket),
    DownloadBroadcast(DownloadId),
    CloseRequested,
}

pub fn update(app: &mut DownloadApp, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(ui_msg) => match ui_msg {
            DownloadMessage::DownloadPressed => {
                if let Some(coordinator) = app.coordinator.as_mut() {
                    coordinator.start(&app.config.urls);
                    app.view.is_downloading = coordinator.phase().is_in_flight();
                }
            }
            DownloadMessage::PlayVideoPressed => {
                let videos = app.playlist(MediaKind::Video);
                match app.launcher.launch_video_playback(&videos) {
                    Ok(true) => {}
                    Ok(false) => app.view.notice = "Please download videos first".to_string(),
                    Err(e) => {
                        warn!("{}", e);
                        app.view.notice = e.to_string();
                    }
                }
            }
            DownloadMessage::ShowImagePressed => {
                let images = app.playlist(MediaKind::Image);
                match app.launcher.launch_image_playback(&images) {
                    Ok(true) => app.screen = Screen::Image,
                    Ok(false) => app.view.notice = "Please download images first".to_string(),
                    Err(e) => {
                        warn!("{}", e);
                        app.view.notice = e.to_string();
                    }
                }
            }
            DownloadMessage::RefreshPressed => {
                if let Some(coordinator) = app.coordinator.as_mut() {
                    coordinator.refresh();
                }
            }
            DownloadMessage::CloseImagePressed => {
                app.launcher.image_frontend_mut().close();
                app.screen = Screen::Home;
            }
        },
        Message::PollTick(ticket) => {
            if let Some(coordinator) = app.coordinator.as_mut() {
                coordinator.scheduler_mut().fired(ticket);
                coordinator.on_poll_tick(ticket);
            }
        }
        Message::DownloadBroadcast(id) => {
            if let Some(coordinator) = app.coordinator.as_mut() {
                app.bridge.dispatch(coordinator, id);
            }
        }
        Message::CloseRequested => {
            app.shutdown();
            return iced::exit();
        }
    }
    app.flush()
}

pub fn view(app: &DownloadApp) -> iced::Element<'_, Message> {
    let content = match (app.screen, app.launcher.image_frontend().current()) {
        (Screen::Image, Some(loaded)) => ui::image_view(loaded),
        _ => app.view.view(),
    };
    content.map(Message::UiMessage)
}

pub fn subscription(_app: &DownloadApp) -> Subscription<Message> {
    window::close_requests().map(|_| Message::CloseRequested)
}
