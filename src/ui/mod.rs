use iced::{
    widget::{button, column, container, image, progress_bar, row, text, Space},
    ContentFit, Element, Length,
};

use crate::application::{playback::LoadedImage, BatchEvent};

/// Main view state
pub struct DownloadView {
    pub status_visible: bool,
    pub progress: u8,
    pub status_label: String,
    pub notice: String,
    pub is_downloading: bool,
    pub can_play_video: bool,
    pub can_show_image: bool,
    pub file_count: usize,
}

impl Default for DownloadView {
    fn default() -> Self {
        Self {
            status_visible: false,
            progress: 0,
            status_label: "Idle".to_string(),
            notice: String::new(),
            is_downloading: false,
            can_play_video: false,
            can_show_image: false,
            file_count: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DownloadMessage {
    DownloadPressed,
    PlayVideoPressed,
    ShowImagePressed,
    RefreshPressed,
    CloseImagePressed,
}

impl DownloadView {
    pub fn apply(&mut self, event: &BatchEvent) {
        match event {
            BatchEvent::Progress(progress) => {
                self.status_visible = true;
                self.progress = progress.percent;
                self.status_label = progress.label.clone();
            }
            BatchEvent::Notice(message) => {
                self.notice = message.clone();
            }
            BatchEvent::JobCompleted { .. } => {}
            BatchEvent::FilesRefreshed(files) => {
                self.file_count = files.len();
            }
            BatchEvent::PlaybackAvailability { video, image } => {
                self.can_play_video = *video;
                self.can_show_image = *image;
            }
            BatchEvent::BatchCompleted { .. } => {
                self.is_downloading = false;
            }
            BatchEvent::BatchFailed(err) => {
                self.is_downloading = false;
                self.notice = err.to_string();
            }
        }
    }

    fn play_label(&self) -> &'static str {
        if self.is_downloading {
            "DOWNLOADING..."
        } else if self.can_play_video {
            "PLAY VIDEO"
        } else {
            "DOWNLOAD FIRST"
        }
    }

    pub fn view(&self) -> Element<'_, DownloadMessage> {
        let buttons = row![
            button("Download")
                .on_press_maybe((!self.is_downloading).then_some(DownloadMessage::DownloadPressed))
                .padding([10, 20]),
            button(self.play_label())
                .on_press_maybe(
                    (self.can_play_video && !self.is_downloading)
                        .then_some(DownloadMessage::PlayVideoPressed)
                )
                .padding([10, 20]),
            button("Show Image")
                .on_press_maybe(
                    (self.can_show_image && !self.is_downloading)
                        .then_some(DownloadMessage::ShowImagePressed)
                )
                .padding([10, 20]),
            button("Refresh")
                .on_press(DownloadMessage::RefreshPressed)
                .padding([10, 20]),
        ]
        .spacing(10);

        let mut content = column![
            text("Media Batch Player").size(32),
            Space::new().height(Length::Fixed(20.0)),
            buttons,
        ]
        .padding(20)
        .spacing(10);

        if self.status_visible {
            content = content.push(
                column![
                    progress_bar(0.0..=100.0, f32::from(self.progress)),
                    row![
                        text(format!("{}%", self.progress)).size(14),
                        text(&self.status_label).size(14),
                    ]
                    .spacing(20),
                ]
                .spacing(5),
            );
        }

        content = content
            .push(text(&self.notice).size(14))
            .push(text(format!("{} media files on disk", self.file_count)).size(12));

        content.into()
    }
}

pub fn image_view(loaded: &LoadedImage) -> Element<'_, DownloadMessage> {
    let picture = image(loaded.handle.clone())
        .content_fit(ContentFit::Contain)
        .width(Length::Fill)
        .height(Length::Fill);

    let name = loaded
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    column![
        row![
            button("Back").on_press(DownloadMessage::CloseImagePressed),
            text(format!("{} ({}x{})", name, loaded.width, loaded.height)).size(14),
        ]
        .spacing(20),
        container(picture)
            .center_x(Length::Fill)
            .center_y(Length::Fill),
    ]
    .into()
}
