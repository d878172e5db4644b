// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Rolling frame-time storage.

/// Number of frames kept in a [`FrameWindow`] (one second at 60 Hz).
pub const FRAME_WINDOW: usize = 60;

/// A fixed-size circular buffer for storing numerical samples.
#[derive(Debug, Clone)]
pub struct RingBuffer<T, const N: usize> {
    data: [T; N],
    index: usize,
    count: usize,
}

impl<T: Default + Copy, const N: usize> RingBuffer<T, N> {
    /// Creates a new, empty ring buffer.
    pub fn new() -> Self {
        Self {
            data: [T::default(); N],
            index: 0,
            count: 0,
        }
    }

    /// Pushes a new value into the buffer, overwriting the oldest if full.
    pub fn push(&mut self, value: T) {
        self.data[self.index] = value;
        self.index = (self.index + 1) % N;
        if self.count < N {
            self.count += 1;
        }
    }

    /// Returns the number of elements currently in the buffer.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Returns `true` once `N` samples have been pushed since the last clear.
    pub fn is_full(&self) -> bool {
        self.count == N
    }

    /// Forgets every sample.
    pub fn clear(&mut self) {
        self.index = 0;
        self.count = 0;
    }

    /// Returns an iterator over the values in chronological order (oldest to newest).
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        // When not full the oldest sample sits at 0, otherwise at `index`.
        let start = if self.count < N { 0 } else { self.index };
        let (head, tail) = self.data.split_at(start);
        tail.iter().chain(head.iter()).take(self.count)
    }
}

impl<T: Default + Copy, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RingBuffer<f32, N> {
    /// Calculates the arithmetic mean of the values in the buffer.
    pub fn average(&self) -> f32 {
        if self.count == 0 {
            return 0.0;
        }
        self.iter().sum::<f32>() / self.count as f32
    }

    /// Counts the samples strictly above `threshold`.
    pub fn count_above(&self, threshold: f32) -> usize {
        self.iter().filter(|&&v| v > threshold).count()
    }
}

/// The last [`FRAME_WINDOW`] frame times of one render, in milliseconds.
#[derive(Debug, Clone, Default)]
pub struct FrameWindow {
    samples: RingBuffer<f32, FRAME_WINDOW>,
}

impl FrameWindow {
    /// Creates an empty window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one frame time.
    pub fn push(&mut self, frame_time_ms: f32) {
        // Negative or NaN timings come from broken timers; count them as instant.
        let sample = if frame_time_ms.is_finite() {
            frame_time_ms.max(0.0)
        } else {
            0.0
        };
        self.samples.push(sample);
    }

    /// Number of frames recorded.
    pub fn len(&self) -> usize {
        self.samples.count()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.samples.count() == 0
    }

    /// Returns `true` when the window holds [`FRAME_WINDOW`] frames.
    pub fn is_full(&self) -> bool {
        self.samples.is_full()
    }

    /// Drops every recorded frame.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Mean frame time in milliseconds.
    pub fn average_ms(&self) -> f32 {
        self.samples.average()
    }

    /// Effective frames per second, `1000 / mean`. An empty window or a mean
    /// of zero reports infinity.
    pub fn fps(&self) -> f32 {
        let average = self.average_ms();
        if average <= 0.0 {
            return f32::INFINITY;
        }
        1000.0 / average
    }

    /// Number of frames slower than `threshold_ms`.
    pub fn dropped_frames(&self, threshold_ms: f32) -> usize {
        self.samples.count_above(threshold_ms)
    }
}
