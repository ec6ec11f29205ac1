//! Bounded angle history for plotting

use std::collections::VecDeque;

use crate::types::OrientationState;

/// Angle channel kept in the history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryChannel {
    Yaw,
    Pitch,
    Roll,
}

impl HistoryChannel {
    pub const ALL: [HistoryChannel; 3] = [HistoryChannel::Yaw, HistoryChannel::Pitch, HistoryChannel::Roll];

    fn index(self) -> usize {
        match self {
            HistoryChannel::Yaw => 0,
            HistoryChannel::Pitch => 1,
            HistoryChannel::Roll => 2,
        }
    }
}

/// Fixed-capacity FIFO of published angles, one queue per channel
///
/// Pushing into a full channel evicts its oldest value first.
///
/// # Example
/// ```
/// use tilt_fusion::{HistoryBuffer, HistoryChannel, OrientationState};
///
/// let mut history = HistoryBuffer::new(2);
/// history.push_state(OrientationState::new(1.0, 2.0, 3.0));
/// history.push_state(OrientationState::new(4.0, 5.0, 6.0));
/// history.push_state(OrientationState::new(7.0, 8.0, 9.0));
///
/// assert_eq!(history.snapshot(HistoryChannel::Yaw), vec![4.0, 7.0]);
/// ```
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    capacity: usize,
    channels: [VecDeque<f32>; 3],
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            channels: core::array::from_fn(|_| VecDeque::with_capacity(capacity)),
        }
    }

    /// Append a value to one channel
    pub fn push(&mut self, channel: HistoryChannel, value: f32) {
        if self.capacity == 0 {
            return;
        }
        let queue = &mut self.channels[channel.index()];
        if queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(value);
    }

    /// Append one sample to all three channels in lock-step
    pub fn push_state(&mut self, state: OrientationState) {
        self.push(HistoryChannel::Yaw, state.yaw);
        self.push(HistoryChannel::Pitch, state.pitch);
        self.push(HistoryChannel::Roll, state.roll);
    }

    /// Values of a channel, oldest first
    pub fn snapshot(&self, channel: HistoryChannel) -> Vec<f32> {
        self.channels[channel.index()].iter().copied().collect()
    }

    /// Values of all three channels, indexed in [`HistoryChannel::ALL`] order
    pub fn snapshot_all(&self) -> [Vec<f32>; 3] {
        HistoryChannel::ALL.map(|channel| self.snapshot(channel))
    }

    pub fn clear(&mut self, channel: HistoryChannel) {
        self.channels[channel.index()].clear();
    }

    pub fn clear_all(&mut self) {
        for channel in HistoryChannel::ALL {
            self.clear(channel);
        }
    }

    pub fn len(&self, channel: HistoryChannel) -> usize {
        self.channels[channel.index()].len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.iter().all(VecDeque::is_empty)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Largest absolute value across all channels, never below 1
    ///
    /// Used to scale a plot's vertical axis.
    pub fn peak_magnitude(&self) -> f32 {
        self.channels
            .iter()
            .flatten()
            .fold(1.0f32, |peak, v| peak.max(v.abs()))
    }
}
