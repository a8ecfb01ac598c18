use futures::future::{AbortHandle, Abortable};
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::{
    application::download_coordinator::{BatchCoordinator, CheckTrigger, PollScheduler},
    download_service::{DownloadId, DownloadService},
};

/// Forwards "download complete" broadcasts to the coordinator.
///
/// The host drives the stream returned by [`CompletionBridge::register`]
/// and hands every item to [`CompletionBridge::dispatch`] on the thread
/// that owns the coordinator.
#[derive(Default)]
pub struct CompletionBridge {
    registration: Option<AbortHandle>,
}

impl CompletionBridge {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn is_registered(&self) -> bool {
        self.registration.is_some()
    }

    /// Start listening. A previous registration is dropped first.
    pub fn register(
        &mut self,
        receiver: broadcast::Receiver<DownloadId>,
    ) -> BoxStream<'static, DownloadId> {
        self.unregister();

        let completions = stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(id) => return Some((id, receiver)),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Completion listener lagged, skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        });

        let (handle, registration) = AbortHandle::new_pair();
        let completions = Abortable::new(completions, registration);
        self.registration = Some(handle);
        info!("Completion listener registered");
        completions.boxed()
    }

    /// Stop listening. Safe to call when not registered.
    pub fn unregister(&mut self) {
        if let Some(handle) = self.registration.take() {
            handle.abort();
            info!("Completion listener unregistered");
        }
    }

    /// Check the coordinator's download right away if `id` is the one it
    /// tracks. Returns whether the event was correlated.
    pub fn dispatch<S, P>(&self, coordinator: &mut BatchCoordinator<S, P>, id: DownloadId) -> bool
    where
        S: DownloadService,
        P: PollScheduler,
    {
        match coordinator.tracked_download() {
            Some(tracked) if tracked == id => {
                debug!(%id, "Completion matches tracked download");
                coordinator.check_now(CheckTrigger::Completion);
                true
            }
            tracked => {
                debug!(%id, ?tracked, "Ignoring unrelated completion");
                false
            }
        }
    }
}

impl Drop for CompletionBridge {
    fn drop(&mut self) {
        self.unregister();
    }
}
