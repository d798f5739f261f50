//! Background grab loop

use crate::camera::{Camera, FrameSize};
use crate::slot::FrameSlot;
use crate::{CaptureError, CaptureResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

/// Consecutive grab errors before the loop gives up
const MAX_GRAB_ERRORS: u32 = 10;

/// Owns the thread that moves frames from a camera into a [`FrameSlot`].
///
/// The loop checks the running flag between grabs. It stops on its own when
/// the camera is exhausted or keeps failing; in every case the slot is
/// closed so the consumer wakes up.
pub struct GrabThread {
    running: Arc<AtomicBool>,
    slot: Arc<FrameSlot>,
    handle: Option<JoinHandle<()>>,
}

impl GrabThread {
    /// Open `camera` and start grabbing. Fails without spawning when the
    /// camera can not be opened.
    pub fn spawn(
        mut camera: Box<dyn Camera>,
        slot: Arc<FrameSlot>,
        size: Option<FrameSize>,
    ) -> CaptureResult<Self> {
        camera.open()?;

        let running = Arc::new(AtomicBool::new(true));
        let handle = {
            let running = Arc::clone(&running);
            let slot = Arc::clone(&slot);
            thread::Builder::new()
                .name("grab".into())
                .spawn(move || grab_loop(camera, &slot, size, &running))
                .map_err(|e| CaptureError::Thread(e.to_string()))?
        };

        Ok(Self {
            running,
            slot,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn slot(&self) -> &Arc<FrameSlot> {
        &self.slot
    }

    /// Ask the loop to finish and wait for it
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("[GrabThread] Panicked.");
            }
        }
        self.slot.close();
    }
}

impl Drop for GrabThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn grab_loop(mut camera: Box<dyn Camera>, slot: &FrameSlot, size: Option<FrameSize>, running: &AtomicBool) {
    debug!("[GrabThread] Started.");
    let mut errors = 0;

    while running.load(Ordering::Acquire) {
        match camera.grab() {
            Ok(Some(frame)) => {
                errors = 0;
                let frame = match size {
                    Some(size) => size.fit(frame),
                    None => frame,
                };
                slot.publish(frame);
            }
            Ok(None) => {
                debug!("[GrabThread] Source exhausted.");
                break;
            }
            Err(e) => {
                errors += 1;
                warn!("[GrabThread] {}", e);
                if errors >= MAX_GRAB_ERRORS {
                    error!("[GrabThread] Giving up after {} errors.", errors);
                    break;
                }
            }
        }
    }

    running.store(false, Ordering::Release);
    if let Err(e) = camera.close() {
        warn!("[GrabThread] Close failed: {}", e);
    }
    slot.close();
    debug!("[GrabThread] Stopped.");
}
