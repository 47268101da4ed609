//! Bounded hand-off of CPU pixel buffers from the render thread.
//!
//! The painter fills a [`PixelBuffer`] and moves it into the
//! [`PixelSourceQueue`]; the presentation consumer moves it out again and
//! hands it back with [`PixelSourceQueue::done_with_pixels`] for reuse. A
//! buffer has exactly one owner at every moment, so each frame is seen by
//! the consumer at most once.
//!
//! ```text
//!  render thread                       consumer
//!  get_unused_pixels() <-- pool <----- done_with_pixels()
//!        |                                 ^
//!        v                                 |
//!  enqueue_pixels() --> queue --> next_pixels() / get_latest_pixels()
//!                         |
//!                         +-- overflow: oldest buffer back to pool
//! ```

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::config::Settings;

/// One frame of premultiplied ARGB pixels.
#[derive(Clone, PartialEq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    scale_x: f32,
    scale_y: f32,
    pixels: Vec<u32>,
}

impl PixelBuffer {
    /// Allocate a zeroed buffer.
    pub fn new(width: u32, height: u32, scale_x: f32, scale_y: f32) -> Self {
        Self {
            width,
            height,
            scale_x,
            scale_y,
            pixels: vec![0; width as usize * height as usize],
        }
    }

    fn reshape(&mut self, width: u32, height: u32, scale_x: f32, scale_y: f32) {
        self.width = width;
        self.height = height;
        self.scale_x = scale_x;
        self.scale_y = scale_y;
        self.pixels.clear();
        self.pixels.resize(width as usize * height as usize, 0);
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Horizontal output scale.
    pub fn scale_x(&self) -> f32 {
        self.scale_x
    }

    /// Vertical output scale.
    pub fn scale_y(&self) -> f32 {
        self.scale_y
    }

    /// Pixel data, row-major.
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Mutable pixel data, row-major.
    pub fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }

    /// Pixel data as bytes (BGRA order on little-endian hosts).
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Pixel at (x, y).
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("scale", &(self.scale_x, self.scale_y))
            .finish_non_exhaustive()
    }
}

/// Queue counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    /// Buffers enqueued by the producer.
    pub enqueued: u64,
    /// Buffers handed to the consumer.
    pub delivered: u64,
    /// Buffers discarded unseen (overflow or superseded).
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct QueueState {
    queue: VecDeque<PixelBuffer>,
    pool: Vec<PixelBuffer>,
    stats: QueueStats,
    closed: bool,
}

/// Bounded queue of filled pixel buffers plus a pool of spare ones.
pub struct PixelSourceQueue {
    state: Mutex<QueueState>,
    available: Condvar,
    depth: usize,
    pool_capacity: usize,
}

impl PixelSourceQueue {
    /// Create a queue holding at most `depth` filled buffers.
    pub fn new(depth: usize, pool_capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            available: Condvar::new(),
            depth: depth.max(1),
            pool_capacity,
        }
    }

    /// Create a queue sized from settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.pixel_queue_depth, settings.pixel_pool_capacity)
    }

    /// Maximum number of filled buffers held.
    pub fn depth(&self) -> usize {
        self.depth
    }

    fn recycle(&self, state: &mut QueueState, buffer: PixelBuffer) {
        if state.pool.len() < self.pool_capacity {
            state.pool.push(buffer);
        }
    }

    /// A buffer of the requested shape, reused from the pool when possible.
    pub fn get_unused_pixels(
        &self,
        width: u32,
        height: u32,
        scale_x: f32,
        scale_y: f32,
    ) -> PixelBuffer {
        let pooled = self.state.lock().pool.pop();
        match pooled {
            Some(mut buffer) => {
                buffer.reshape(width, height, scale_x, scale_y);
                buffer
            }
            None => PixelBuffer::new(width, height, scale_x, scale_y),
        }
    }

    /// Publish a filled buffer. The oldest unconsumed buffer is dropped when full.
    pub fn enqueue_pixels(&self, buffer: PixelBuffer) {
        let mut state = self.state.lock();
        state.queue.push_back(buffer);
        state.stats.enqueued += 1;
        while state.queue.len() > self.depth {
            if let Some(stale) = state.queue.pop_front() {
                log::trace!("PixelSourceQueue: dropping unconsumed {:?}", stale);
                state.stats.dropped += 1;
                self.recycle(&mut state, stale);
            }
        }
        drop(state);
        self.available.notify_all();
    }

    /// Take the oldest filled buffer.
    pub fn next_pixels(&self) -> Option<PixelBuffer> {
        let mut state = self.state.lock();
        let buffer = state.queue.pop_front()?;
        state.stats.delivered += 1;
        Some(buffer)
    }

    /// Take the newest filled buffer; older ones are recycled unseen.
    pub fn get_latest_pixels(&self) -> Option<PixelBuffer> {
        let mut state = self.state.lock();
        let latest = state.queue.pop_back()?;
        while let Some(stale) = state.queue.pop_front() {
            state.stats.dropped += 1;
            self.recycle(&mut state, stale);
        }
        state.stats.delivered += 1;
        Some(latest)
    }

    /// Block until a buffer is available and take the oldest.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub fn wait_for_pixels(&self) -> Option<PixelBuffer> {
        let mut state = self.state.lock();
        loop {
            if let Some(buffer) = state.queue.pop_front() {
                state.stats.delivered += 1;
                return Some(buffer);
            }
            if state.closed {
                return None;
            }
            self.available.wait(&mut state);
        }
    }

    /// Return a consumed buffer for reuse.
    pub fn done_with_pixels(&self, buffer: PixelBuffer) {
        let mut state = self.state.lock();
        self.recycle(&mut state, buffer);
    }

    /// Wake blocked consumers and stop waiting for new buffers.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of filled buffers waiting.
    pub fn pending_count(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Number of spare buffers pooled.
    pub fn pooled_count(&self) -> usize {
        self.state.lock().pool.len()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> QueueStats {
        self.state.lock().stats
    }
}

impl std::fmt::Debug for PixelSourceQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PixelSourceQueue")
            .field("depth", &self.depth)
            .field("pending", &state.queue.len())
            .field("pooled", &state.pool.len())
            .field("stats", &state.stats)
            .finish()
    }
}

static_assertions::assert_impl_all!(PixelSourceQueue: Send, Sync);
static_assertions::assert_impl_all!(PixelBuffer: Send);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn filled(queue: &PixelSourceQueue, tag: u32) -> PixelBuffer {
        let mut buffer = queue.get_unused_pixels(2, 2, 1.0, 1.0);
        buffer.pixels_mut().fill(tag);
        buffer
    }

    #[test]
    fn test_fifo_order() {
        let queue = PixelSourceQueue::new(2, 3);
        queue.enqueue_pixels(filled(&queue, 1));
        queue.enqueue_pixels(filled(&queue, 2));
        assert_eq!(queue.next_pixels().unwrap().pixel(0, 0), Some(1));
        assert_eq!(queue.next_pixels().unwrap().pixel(0, 0), Some(2));
        assert!(queue.next_pixels().is_none());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let queue = PixelSourceQueue::new(2, 3);
        for tag in 1..=3 {
            queue.enqueue_pixels(filled(&queue, tag));
        }
        assert_eq!(queue.pending_count(), 2);
        assert_eq!(queue.pooled_count(), 1);
        assert_eq!(queue.next_pixels().unwrap().pixel(0, 0), Some(2));

        let stats = queue.stats();
        assert_eq!(stats.enqueued, 3);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.delivered, 1);
    }

    #[test]
    fn test_latest_recycles_older() {
        let queue = PixelSourceQueue::new(3, 3);
        for tag in 1..=3 {
            queue.enqueue_pixels(filled(&queue, tag));
        }
        let latest = queue.get_latest_pixels().unwrap();
        assert_eq!(latest.pixel(1, 1), Some(3));
        assert_eq!(queue.pending_count(), 0);
        assert_eq!(queue.pooled_count(), 2);

        queue.done_with_pixels(latest);
        assert_eq!(queue.pooled_count(), 3);
    }

    #[test]
    fn test_pool_reuses_and_reshapes() {
        let queue = PixelSourceQueue::new(2, 1);
        queue.done_with_pixels(PixelBuffer::new(8, 8, 1.0, 1.0));
        queue.done_with_pixels(PixelBuffer::new(8, 8, 1.0, 1.0));
        assert_eq!(queue.pooled_count(), 1);

        let buffer = queue.get_unused_pixels(3, 5, 2.0, 2.0);
        assert_eq!(queue.pooled_count(), 0);
        assert_eq!(buffer.pixels().len(), 15);
        assert_eq!(buffer.scale_x(), 2.0);
        assert!(buffer.pixels().iter().all(|&p| p == 0));
    }

    #[test]
    fn test_wait_for_pixels_across_threads() {
        let queue = Arc::new(PixelSourceQueue::new(2, 3));
        let consumer = {
            let queue = queue.clone();
            std::thread::spawn(move || {
                let mut seen = Vec::new();
                while let Some(buffer) = queue.wait_for_pixels() {
                    seen.push(buffer.pixel(0, 0).unwrap());
                    queue.done_with_pixels(buffer);
                }
                seen
            })
        };

        for tag in 1..=20 {
            queue.enqueue_pixels(filled(&queue, tag));
        }
        assert!(!queue.is_closed());
        queue.close();
        assert!(queue.is_closed());
        let seen = consumer.join().unwrap();

        let mut sorted = seen.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), seen.len());
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        let stats = queue.stats();
        assert_eq!(stats.delivered + stats.dropped, 20);
    }
}
