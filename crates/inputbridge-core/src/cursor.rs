//! Cursor realization and the process-wide cursor tracker.
//!
//! Turning a guest cursor resource into a host cursor is done by external
//! strategies (themed cursors, bitmap conversion, monochrome fallback). The
//! core only chains them and caches the result.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::window::Hwnd;

/// Guest cursor resource handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CursorHandle(pub u64);

/// Host cursor object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NativeCursor(pub u32);

/// Turns guest cursors into host cursors.
pub trait CursorRealizer {
    /// `None` when this strategy cannot represent the cursor.
    fn realize_cursor(&mut self, cursor: CursorHandle) -> Option<NativeCursor>;

    /// The cursor resource was destroyed.
    fn forget(&mut self, _cursor: CursorHandle) {}

    fn name(&self) -> &'static str {
        "realizer"
    }
}

/// Realizes nothing; the host falls back to its default cursor.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRealizer;

impl CursorRealizer for NullRealizer {
    fn realize_cursor(&mut self, _cursor: CursorHandle) -> Option<NativeCursor> {
        None
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

/// Tries each strategy in order and caches the first success.
#[derive(Default)]
pub struct LayeredRealizer {
    layers: Vec<Box<dyn CursorRealizer + Send>>,
    cache: HashMap<CursorHandle, NativeCursor>,
}

impl LayeredRealizer {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_layer(mut self, layer: Box<dyn CursorRealizer + Send>) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn cached(&self, cursor: CursorHandle) -> Option<NativeCursor> {
        self.cache.get(&cursor).copied()
    }
}

impl std::fmt::Debug for LayeredRealizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.layers.iter().map(|l| l.name()).collect();
        f.debug_struct("LayeredRealizer")
            .field("layers", &names)
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl CursorRealizer for LayeredRealizer {
    fn realize_cursor(&mut self, cursor: CursorHandle) -> Option<NativeCursor> {
        if let Some(native) = self.cache.get(&cursor) {
            return Some(*native);
        }
        for layer in &mut self.layers {
            if let Some(native) = layer.realize_cursor(cursor) {
                debug!(?cursor, ?native, layer = layer.name(), "cursor realized");
                self.cache.insert(cursor, native);
                return Some(native);
            }
            trace!(?cursor, layer = layer.name(), "cursor strategy declined");
        }
        None
    }

    fn forget(&mut self, cursor: CursorHandle) {
        self.cache.remove(&cursor);
        for layer in &mut self.layers {
            layer.forget(cursor);
        }
    }

    fn name(&self) -> &'static str {
        "layered"
    }
}

/// Process-wide cursor bookkeeping shared by every thread's core.
///
/// Fields are independent atomics with last-writer-wins semantics.
#[derive(Debug, Default)]
pub struct CursorTracker {
    cursor_window: AtomicU64,
    last_cursor: AtomicU64,
    last_change: AtomicU64,
}

impl CursorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Window the pointer was last over.
    pub fn cursor_window(&self) -> Hwnd {
        Hwnd(self.cursor_window.load(Ordering::Acquire))
    }

    pub fn set_cursor_window(&self, hwnd: Hwnd) {
        self.cursor_window.store(hwnd.0, Ordering::Release);
    }

    /// Cursor most recently set by any thread.
    pub fn last_cursor(&self) -> Option<CursorHandle> {
        match self.last_cursor.load(Ordering::Acquire) {
            0 => None,
            handle => Some(CursorHandle(handle)),
        }
    }

    /// Pointer moved over `hwnd` at `now`. Returns true when the window's
    /// cursor should be re-synced: the window changed or `interval_ms` has
    /// passed since the last sync.
    pub fn enter_window(&self, hwnd: Hwnd, now: u64, interval_ms: u64) -> bool {
        let prev = Hwnd(self.cursor_window.swap(hwnd.0, Ordering::AcqRel));
        self.throttle(prev != hwnd, now, interval_ms)
    }

    /// The guest selected `cursor` at `now`. Returns true when the cursor
    /// window should be told.
    pub fn set_cursor(&self, cursor: Option<CursorHandle>, now: u64, interval_ms: u64) -> bool {
        let handle = cursor.map_or(0, |c| c.0);
        let prev = self.last_cursor.swap(handle, Ordering::AcqRel);
        self.throttle(prev != handle, now, interval_ms)
    }

    fn throttle(&self, changed: bool, now: u64, interval_ms: u64) -> bool {
        let last = self.last_change.load(Ordering::Acquire);
        if changed || now.wrapping_sub(last) > interval_ms {
            self.last_change.store(now, Ordering::Release);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        known: CursorHandle,
        native: NativeCursor,
        calls: usize,
    }

    impl CursorRealizer for Fixed {
        fn realize_cursor(&mut self, cursor: CursorHandle) -> Option<NativeCursor> {
            self.calls += 1;
            (cursor == self.known).then_some(self.native)
        }
    }

    #[test]
    fn test_layers_tried_in_order() {
        let mut realizer = LayeredRealizer::new()
            .with_layer(Box::new(NullRealizer))
            .with_layer(Box::new(Fixed {
                known: CursorHandle(7),
                native: NativeCursor(0x11),
                calls: 0,
            }));
        assert_eq!(realizer.realize_cursor(CursorHandle(7)), Some(NativeCursor(0x11)));
        assert_eq!(realizer.realize_cursor(CursorHandle(8)), None);
        assert_eq!(realizer.cached(CursorHandle(7)), Some(NativeCursor(0x11)));
        realizer.forget(CursorHandle(7));
        assert_eq!(realizer.cached(CursorHandle(7)), None);
    }

    #[test]
    fn test_tracker_throttles_same_window() {
        let tracker = CursorTracker::new();
        assert!(tracker.enter_window(Hwnd(1), 1000, 100));
        assert!(!tracker.enter_window(Hwnd(1), 1050, 100));
        assert!(tracker.enter_window(Hwnd(1), 1101, 100));
        assert!(tracker.enter_window(Hwnd(2), 1102, 100));
        assert_eq!(tracker.cursor_window(), Hwnd(2));
    }

    #[test]
    fn test_tracker_cursor_change() {
        let tracker = CursorTracker::new();
        assert!(tracker.set_cursor(Some(CursorHandle(3)), 10, 100));
        assert!(!tracker.set_cursor(Some(CursorHandle(3)), 20, 100));
        assert_eq!(tracker.last_cursor(), Some(CursorHandle(3)));
        assert!(tracker.set_cursor(None, 30, 100));
        assert_eq!(tracker.last_cursor(), None);
    }
}
