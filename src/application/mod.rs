pub mod completion_bridge;
pub mod download_coordinator;
pub mod playback;
pub mod scanner;

pub use completion_bridge::CompletionBridge;
pub use download_coordinator::{
    BatchCoordinator, BatchEvent, CoordinatorSettings, PollScheduler, PollTicket,
};
pub use playback::{ExternalPlayer, InAppImageViewer, PlaybackLauncher};
pub use scanner::Scanner;
