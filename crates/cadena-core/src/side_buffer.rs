//! Thread-local scratch buffers for chained intermediate storage.
//!
//! Plugins frequently need a snapshot of their input (the chain processes
//! in place) or a scratch channel for derived signals like gain curves.
//! [`SideBuffer`] hands out buffers from a per-thread free list and returns
//! them automatically when the guard drops, so acquisition is strictly
//! nested within one audio callback and buffers cannot leak.
//!
//! Steady state performs no allocation: returned buffers keep their
//! capacity and are reshaped on the next acquisition.

use core::cell::RefCell;
use core::ops::{Deref, DerefMut};

use crate::buffer::{Buffer, BufferView, ChannelLayout, ChannelPosition};

thread_local! {
    static FREE_LIST: RefCell<Vec<Buffer>> = const { RefCell::new(Vec::new()) };
}

/// Scope guard around a scratch [`Buffer`].
///
/// Dereferences to the buffer; dropping it returns the storage to the
/// thread-local pool.
#[derive(Debug)]
pub struct SideBuffer {
    buffer: Option<Buffer>,
}

impl SideBuffer {
    /// Acquire a zeroed scratch buffer with the given geometry.
    pub fn zeroed(
        frames: usize,
        leading: usize,
        trailing: usize,
        channels: usize,
        samplerate: u32,
    ) -> Self {
        let layout = match channels {
            1 => ChannelLayout::mono(),
            2 => ChannelLayout::stereo(),
            n => ChannelLayout::from_positions(vec![ChannelPosition::Mono; n])
                .unwrap_or_else(|_| ChannelLayout::mono()),
        };
        let buffer = FREE_LIST.with(|list| list.borrow_mut().pop());
        let buffer = match buffer {
            Some(mut reused) => {
                // Reshape in place; resize zeroes what it exposes but kept
                // indices retain stale values, so clear explicitly.
                if reused.channels() == channels {
                    reused.resize(frames, leading, trailing);
                    reused.set_samplerate(samplerate);
                    reused.clear();
                    reused
                } else {
                    Buffer::new(frames, leading, trailing, layout, samplerate)
                }
            }
            None => Buffer::new(frames, leading, trailing, layout, samplerate),
        };
        Self {
            buffer: Some(buffer),
        }
    }

    /// Acquire a scratch buffer holding a copy of `src` (body and edges).
    pub fn copy_of(src: &BufferView<'_>) -> Self {
        let mut side = Self::zeroed(
            src.frames(),
            src.leading(),
            src.trailing(),
            src.channels(),
            src.samplerate(),
        );
        let buffer = side.buffer.as_mut().unwrap_or_else(|| unreachable!());
        let channels = src.channels();
        let mut view = buffer.view_mut();
        for f in -(src.leading() as isize)..(src.frames() + src.trailing()) as isize {
            for c in 0..channels {
                view.set_sample(f, c, src.sample(f, c));
            }
        }
        side
    }

    /// How many buffers are currently parked in this thread's free list.
    pub fn pooled() -> usize {
        FREE_LIST.with(|list| list.borrow().len())
    }
}

impl Deref for SideBuffer {
    type Target = Buffer;

    fn deref(&self) -> &Buffer {
        self.buffer.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for SideBuffer {
    fn deref_mut(&mut self) -> &mut Buffer {
        self.buffer.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for SideBuffer {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            FREE_LIST.with(|list| list.borrow_mut().push(buffer));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ChannelLayout;

    #[test]
    fn scratch_is_zeroed() {
        {
            let mut side = SideBuffer::zeroed(64, 4, 4, 2, 48000);
            side.body_mut().fill(0.5);
        }
        // The second acquisition reuses the dirty buffer and must present
        // it clean.
        let side = SideBuffer::zeroed(64, 4, 4, 2, 48000);
        assert!(side.raw().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn drop_returns_to_pool() {
        let before = SideBuffer::pooled();
        {
            let _a = SideBuffer::zeroed(16, 0, 0, 1, 48000);
            let _b = SideBuffer::zeroed(16, 0, 0, 1, 48000);
        }
        assert!(SideBuffer::pooled() >= before);
    }

    #[test]
    fn copy_of_includes_edges() {
        let mut src = Buffer::new(8, 2, 2, ChannelLayout::mono(), 48000);
        {
            let mut view = src.view_mut();
            for f in -2_isize..10 {
                view.set_sample(f, 0, f as f32);
            }
        }
        let side = SideBuffer::copy_of(&src.view());
        let view = side.view();
        for f in -2_isize..10 {
            assert_eq!(view.sample(f, 0), f as f32);
        }
    }

    #[test]
    fn nested_acquisition_is_lifo() {
        let outer = SideBuffer::zeroed(32, 0, 0, 1, 48000);
        {
            let inner = SideBuffer::zeroed(32, 0, 0, 2, 48000);
            assert_eq!(inner.channels(), 2);
        }
        assert_eq!(outer.channels(), 1);
    }
}
