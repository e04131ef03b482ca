//! Play modes
//!
//! The player only knows three repeat modes; the app offers four play modes.
//! Shuffle is expressed as queue repeat plus a randomized visiting order that
//! the controller keeps next to the insertion-ordered queue.

use bridge_traits::NativeRepeatMode;
use core_library::PlayMode;
use rand::seq::SliceRandom;
use rand::Rng;

pub fn native_repeat_mode(mode: PlayMode) -> NativeRepeatMode {
    match mode {
        PlayMode::Order => NativeRepeatMode::Off,
        PlayMode::ListLoop => NativeRepeatMode::Queue,
        PlayMode::SingleLoop => NativeRepeatMode::Track,
        PlayMode::Shuffle => NativeRepeatMode::Queue,
    }
}

/// A permutation of queue positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShuffleOrder {
    order: Vec<usize>,
}

impl ShuffleOrder {
    pub fn new(len: usize) -> Self {
        Self::with_rng(len, &mut rand::thread_rng())
    }

    pub fn with_rng<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Self {
        let mut order: Vec<usize> = (0..len).collect();
        order.shuffle(rng);
        Self { order }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn positions(&self) -> &[usize] {
        &self.order
    }

    pub fn first(&self) -> Option<usize> {
        self.order.first().copied()
    }

    pub fn next_after(&self, index: usize) -> Option<usize> {
        let at = self.order.iter().position(|&i| i == index)?;
        Some(self.order[(at + 1) % self.order.len()])
    }

    pub fn previous_before(&self, index: usize) -> Option<usize> {
        let at = self.order.iter().position(|&i| i == index)?;
        let len = self.order.len();
        Some(self.order[(at + len - 1) % len])
    }

    /// Every position once, starting at `index` and following the order.
    pub fn rotation_from(&self, index: usize) -> Option<Vec<usize>> {
        let at = self.order.iter().position(|&i| i == index)?;
        Some(
            self.order[at..]
                .iter()
                .chain(self.order[..at].iter())
                .copied()
                .collect(),
        )
    }
}
