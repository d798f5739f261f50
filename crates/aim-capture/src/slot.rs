//! Single-frame handoff between the grab thread and the consumer
//!
//! The slot holds at most one frame. Publishing over an unconsumed frame
//! replaces it, so the consumer always sees the newest frame and a slow
//! consumer never builds up a backlog.

use image::RgbImage;
use parking_lot::{Condvar, Mutex};
use std::time::Duration;
use tracing::trace;

#[derive(Default)]
struct SlotState {
    frame: Option<RgbImage>,
    closed: bool,
    published: u64,
    discarded: u64,
}

#[derive(Default)]
pub struct FrameSlot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame`, dropping any frame nobody took yet
    pub fn publish(&self, frame: RgbImage) {
        let mut state = self.state.lock();
        if state.frame.replace(frame).is_some() {
            state.discarded += 1;
            trace!("Unconsumed frame replaced.");
        }
        state.published += 1;
        self.ready.notify_one();
    }

    /// Wait for the next frame. `None` once the slot is closed and empty.
    pub fn take(&self) -> Option<RgbImage> {
        let mut state = self.state.lock();
        loop {
            if let Some(frame) = state.frame.take() {
                return Some(frame);
            }
            if state.closed {
                return None;
            }
            self.ready.wait(&mut state);
        }
    }

    /// Like [`take`](Self::take), giving up after `timeout`
    pub fn take_timeout(&self, timeout: Duration) -> Option<RgbImage> {
        let mut state = self.state.lock();
        if state.frame.is_none() && !state.closed {
            self.ready.wait_for(&mut state, timeout);
        }
        state.frame.take()
    }

    /// Wake every waiter; no further frames are expected
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn published(&self) -> u64 {
        self.state.lock().published
    }

    /// Frames replaced before anyone took them
    pub fn discarded(&self) -> u64 {
        self.state.lock().discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn frame(value: u8) -> RgbImage {
        RgbImage::from_pixel(2, 2, image::Rgb([value, 0, 0]))
    }

    #[test]
    fn test_newest_frame_wins() {
        let slot = FrameSlot::new();
        slot.publish(frame(1));
        slot.publish(frame(2));
        slot.publish(frame(3));

        assert_eq!(slot.take().unwrap().get_pixel(0, 0)[0], 3);
        assert_eq!(slot.discarded(), 2);
        assert_eq!(slot.published(), 3);
    }

    #[test]
    fn test_take_timeout_on_empty_slot() {
        let slot = FrameSlot::new();
        assert!(slot.take_timeout(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn test_close_wakes_consumer() {
        let slot = Arc::new(FrameSlot::new());
        let consumer = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || slot.take())
        };
        thread::sleep(Duration::from_millis(20));
        slot.close();
        assert!(consumer.join().unwrap().is_none());
        assert!(slot.is_closed());
    }

    #[test]
    fn test_consumer_receives_published_frame() {
        let slot = Arc::new(FrameSlot::new());
        let consumer = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || slot.take())
        };
        slot.publish(frame(7));
        assert_eq!(consumer.join().unwrap().unwrap().get_pixel(1, 1)[0], 7);
    }

    #[test]
    fn test_pending_frame_survives_close() {
        let slot = FrameSlot::new();
        slot.publish(frame(4));
        slot.close();
        assert!(slot.take().is_some());
        assert!(slot.take().is_none());
    }
}
