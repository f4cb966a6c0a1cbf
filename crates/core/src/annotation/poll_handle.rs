use std::thread::JoinHandle;

use crossbeam_channel::Sender;

use crate::detection::domain::detection_provider::DetectionProvider;

/// Owned cancellation token for one running annotation loop.
///
/// Cancelling (or dropping) the handle stops the loop and joins its thread,
/// so no loop can outlive its owner.
pub struct PollHandle {
    cancel: Option<Sender<()>>,
    handle: Option<JoinHandle<Option<Box<dyn DetectionProvider>>>>,
}

impl PollHandle {
    pub(crate) fn new(
        cancel: Sender<()>,
        handle: JoinHandle<Option<Box<dyn DetectionProvider>>>,
    ) -> Self {
        Self {
            cancel: Some(cancel),
            handle: Some(handle),
        }
    }

    /// False once the loop has stopped, whether cancelled or because the
    /// video paused or ended.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the loop and waits for it to exit.
    ///
    /// Returns the detection provider for reuse. Later calls return `None`.
    pub fn cancel(&mut self) -> Option<Box<dyn DetectionProvider>> {
        // Dropping the sender disconnects the loop's cancel channel.
        self.cancel.take();
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(provider) => provider,
            Err(_) => {
                log::error!("Annotation loop panicked");
                None
            }
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        let _ = self.cancel();
    }
}
