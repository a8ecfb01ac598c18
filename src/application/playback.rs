use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use iced::widget::image::Handle;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::PlayerConfig;

#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("Failed to start video player {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("Failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoPlaybackConfig {
    /// Repeat the whole list once the last item ends.
    pub loop_playlist: bool,
    pub shuffle: bool,
    pub keep_screen_on: bool,
    /// Full screen with system chrome hidden until the user reveals it.
    pub immersive: bool,
}

impl Default for VideoPlaybackConfig {
    fn default() -> Self {
        Self {
            loop_playlist: true,
            shuffle: false,
            keep_screen_on: true,
            immersive: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoPlaylist {
    pub items: Vec<PathBuf>,
    pub config: VideoPlaybackConfig,
}

pub trait VideoFrontend {
    fn play(&mut self, playlist: &VideoPlaylist) -> Result<(), PlaybackError>;
}

pub trait ImageFrontend {
    fn show(&mut self, path: &Path) -> Result<(), PlaybackError>;
}

/// Hands local media files to the playback front-ends.
pub struct PlaybackLauncher<V, I> {
    video: V,
    image: I,
    video_config: VideoPlaybackConfig,
}

impl<V: VideoFrontend, I: ImageFrontend> PlaybackLauncher<V, I> {
    pub fn new(video: V, image: I) -> Self {
        Self {
            video,
            image,
            video_config: VideoPlaybackConfig::default(),
        }
    }

    pub fn image_frontend(&self) -> &I {
        &self.image
    }

    pub fn image_frontend_mut(&mut self) -> &mut I {
        &mut self.image
    }

    /// Play every existing path, looping the whole list.
    /// Returns `Ok(false)` when there was nothing to play.
    pub fn launch_video_playback(&mut self, paths: &[PathBuf]) -> Result<bool, PlaybackError> {
        let items = existing(paths);
        if items.is_empty() {
            return Ok(false);
        }

        info!("Launching video playback of {} files", items.len());
        let playlist = VideoPlaylist {
            items,
            config: self.video_config,
        };
        self.video.play(&playlist)?;
        Ok(true)
    }

    /// Show the first existing path only.
    pub fn launch_image_playback(&mut self, paths: &[PathBuf]) -> Result<bool, PlaybackError> {
        let Some(first) = existing(paths).into_iter().next() else {
            return Ok(false);
        };

        info!("Showing image {}", first.display());
        self.image.show(&first)?;
        Ok(true)
    }
}

fn existing(paths: &[PathBuf]) -> Vec<PathBuf> {
    paths
        .iter()
        .filter(|path| {
            let exists = path.exists();
            if !exists {
                warn!("Skipping missing file {}", path.display());
            }
            exists
        })
        .cloned()
        .collect()
}

/// Video front-end that runs an external player process.
///
/// Every session gets a watcher thread that waits on the child, so a
/// player that exits is reaped right away.
#[derive(Debug)]
pub struct ExternalPlayer {
    config: PlayerConfig,
    sessions: Vec<JoinHandle<Option<ExitStatus>>>,
}

impl ExternalPlayer {
    pub fn new(config: PlayerConfig) -> Self {
        Self {
            config,
            sessions: Vec::new(),
        }
    }

    /// Number of player sessions that have not exited yet.
    pub fn running_sessions(&mut self) -> usize {
        self.sessions.retain(|session| !session.is_finished());
        self.sessions.len()
    }

    pub fn arguments(&self, playlist: &VideoPlaylist) -> Vec<String> {
        let settings = &playlist.config;
        let mut args = Vec::new();

        if settings.loop_playlist {
            args.push("--loop-playlist=inf".to_string());
        }
        args.push(if settings.shuffle { "--shuffle" } else { "--no-shuffle" }.to_string());
        if settings.keep_screen_on {
            args.push("--stop-screensaver=yes".to_string());
        }
        if settings.immersive {
            args.push("--fullscreen".to_string());
        }
        args.extend(self.config.extra_args.iter().cloned());
        args.push("--".to_string());
        args.extend(
            playlist
                .items
                .iter()
                .map(|path| path.to_string_lossy().into_owned()),
        );
        args
    }
}

impl VideoFrontend for ExternalPlayer {
    fn play(&mut self, playlist: &VideoPlaylist) -> Result<(), PlaybackError> {
        let mut child = Command::new(&self.config.program)
            .args(self.arguments(playlist))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| PlaybackError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;
        let pid = child.id();
        info!(pid, "Started {}", self.config.program);

        let program = self.config.program.clone();
        let watcher = thread::Builder::new()
            .name(format!("player-{}", pid))
            .spawn(move || match child.wait() {
                Ok(status) => {
                    info!(pid, %status, "{} exited", program);
                    Some(status)
                }
                Err(e) => {
                    warn!(pid, "Failed to wait on {}: {}", program, e);
                    None
                }
            })
            .map_err(|source| PlaybackError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;

        self.running_sessions();
        self.sessions.push(watcher);
        Ok(())
    }
}

/// Decoded image ready for display.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub handle: Handle,
}

/// Image front-end rendered inside the application window.
#[derive(Debug, Default)]
pub struct InAppImageViewer {
    current: Option<LoadedImage>,
}

impl InAppImageViewer {
    pub fn current(&self) -> Option<&LoadedImage> {
        self.current.as_ref()
    }

    pub fn close(&mut self) {
        self.current = None;
    }
}

impl ImageFrontend for InAppImageViewer {
    fn show(&mut self, path: &Path) -> Result<(), PlaybackError> {
        let decoded = image::open(path).map_err(|source| PlaybackError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();

        self.current = Some(LoadedImage {
            path: path.to_path_buf(),
            width,
            height,
            handle: Handle::from_rgba(width, height, rgba.into_raw()),
        });
        Ok(())
    }
}
