//! Isolation of touches from neighbouring touches.
//!
//! Clustered touches are one choppy interaction with the MA, not independent bounces, so
//! an event only counts when no other touch falls within `n_pre` candles before it or
//! `n_post` candles after it. Windows are clamped to the series bounds.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::wick_touch::{Side, TouchEvent};

/// Touch-free neighbourhood required around an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolationWindow {
    pub n_pre: usize,
    pub n_post: usize,
}

/// Whether `index` has no touch in `[index - n_pre, index)` nor in `(index, index + n_post]`.
///
/// The flag at `index` itself is not consulted.
pub fn is_isolated(touch_flags: &[bool], index: usize, n_pre: usize, n_post: usize) -> bool {
    let len = touch_flags.len();
    let pre = &touch_flags[index.saturating_sub(n_pre).min(len)..index.min(len)];
    let post_start = index.saturating_add(1).min(len);
    let post_end = index.saturating_add(n_post).saturating_add(1).min(len);
    let post = &touch_flags[post_start..post_end];

    !pre.contains(&true) && !post.contains(&true)
}

/// Per-bar touch classification for one MA series, computed once.
///
/// Keeps a prefix count of touches so each isolation query is O(1).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TouchFlags {
    sides: Vec<Option<Side>>,
    /// `prefix[i]` = number of touches in `[0, i)`
    prefix: Vec<usize>,
}

impl TouchFlags {
    pub fn from_sides(sides: Vec<Option<Side>>) -> Self {
        let mut prefix = Vec::with_capacity(sides.len() + 1);
        let mut count = 0;
        prefix.push(0);
        for side in &sides {
            count += usize::from(side.is_some());
            prefix.push(count);
        }
        Self { sides, prefix }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sides.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sides.is_empty()
    }

    #[inline]
    pub fn side(&self, index: usize) -> Option<Side> {
        self.sides.get(index).copied().flatten()
    }

    #[inline]
    pub fn is_touch(&self, index: usize) -> bool {
        self.side(index).is_some()
    }

    /// Total number of touches, isolated or not
    pub fn count(&self) -> usize {
        self.prefix.last().copied().unwrap_or(0)
    }

    /// Number of touches in `range`, clamped to the series
    #[inline]
    pub fn count_in(&self, range: Range<usize>) -> usize {
        let len = self.len();
        let end = range.end.min(len);
        let start = range.start.min(end);
        self.prefix[end] - self.prefix[start]
    }

    /// O(1) equivalent of [`is_isolated`] over these flags.
    #[inline]
    pub fn is_isolated(&self, index: usize, window: IsolationWindow) -> bool {
        let pre = index.saturating_sub(window.n_pre)..index;
        let post = index.saturating_add(1)..index.saturating_add(window.n_post).saturating_add(1);
        self.count_in(pre) == 0 && self.count_in(post) == 0
    }

    pub fn as_bools(&self) -> Vec<bool> {
        self.sides.iter().map(Option::is_some).collect()
    }

    /// Every touch, in index order
    pub fn candidates(&self) -> impl Iterator<Item = TouchEvent> + '_ {
        self.sides
            .iter()
            .enumerate()
            .filter_map(|(index, side)| side.map(|side| TouchEvent { index, side }))
    }

    /// Touches that pass the isolation window, in index order
    pub fn isolated_events(&self, window: IsolationWindow) -> impl Iterator<Item = TouchEvent> + '_ {
        self.candidates()
            .filter(move |event| self.is_isolated(event.index, window))
    }
}
