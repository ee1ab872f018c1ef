//! Guest window model.
//!
//! The core never owns guest windows. It reads their style and geometry from
//! the [`WindowStore`](crate::host::WindowStore) and addresses them by [`Hwnd`].

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::event::HostWindow;
use crate::geometry::Rect;

/// Guest window handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hwnd(pub u64);

impl Hwnd {
    pub const NULL: Self = Self(0);

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// `None` for the null handle.
    pub const fn non_null(self) -> Option<Self> {
        if self.is_null() {
            None
        } else {
            Some(self)
        }
    }
}

impl std::fmt::Display for Hwnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "hwnd:{:#x}", self.0)
    }
}

bitflags! {
    /// Guest window style bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct WindowStyle: u32 {
        const MAXIMIZEBOX = 0x0001_0000;
        const MINIMIZEBOX = 0x0002_0000;
        const THICKFRAME  = 0x0004_0000;
        const SYSMENU     = 0x0008_0000;
        const BORDER      = 0x0080_0000;
        const DLGFRAME    = 0x0040_0000;
        const CAPTION     = Self::BORDER.bits() | Self::DLGFRAME.bits();
        const MAXIMIZE    = 0x0100_0000;
        const CLIPCHILDREN = 0x0200_0000;
        const DISABLED    = 0x0800_0000;
        const VISIBLE     = 0x1000_0000;
        const MINIMIZE    = 0x2000_0000;
        const CHILD       = 0x4000_0000;
        const POPUP       = 0x8000_0000;
    }
}

bitflags! {
    /// Guest extended window style bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct WindowExStyle: u32 {
        const TOPMOST     = 0x0000_0008;
        const TOOLWINDOW  = 0x0000_0080;
        const LAYOUTRTL   = 0x0040_0000;
        const NOACTIVATE  = 0x0800_0000;
    }
}

bitflags! {
    /// Class style bits relevant to window closing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ClassStyle: u32 {
        const NOCLOSE = 0x0200;
    }
}

impl WindowStyle {
    /// Has a full caption (border + dialog frame).
    pub const fn has_caption(self) -> bool {
        self.contains(Self::CAPTION)
    }

    /// Child window without the popup bit.
    pub const fn is_pure_child(self) -> bool {
        self.contains(Self::CHILD) && !self.contains(Self::POPUP)
    }
}

/// Snapshot of a guest window as seen by the window data store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowInfo {
    pub hwnd: Hwnd,
    pub style: WindowStyle,
    #[serde(default)]
    pub ex_style: WindowExStyle,
    #[serde(default)]
    pub class_style: ClassStyle,
    /// Whole window rectangle in guest screen coordinates.
    pub window_rect: Rect,
    /// Client area in guest screen coordinates.
    pub client_rect: Rect,
    /// Host window backing this guest window, if any.
    #[serde(default)]
    pub host_window: Option<HostWindow>,
    /// Embedded in a foreign host window via XEmbed.
    #[serde(default)]
    pub embedded: bool,
    /// Managed by the host window manager.
    #[serde(default)]
    pub managed: bool,
    /// Host window currently mapped.
    #[serde(default)]
    pub mapped: bool,
    /// Owned by another process (foreign host window wrapper).
    #[serde(default)]
    pub foreign: bool,
    /// Guest parent, null for top-level windows.
    #[serde(default)]
    pub parent: Hwnd,
    /// Id of the guest thread owning the window.
    #[serde(default)]
    pub thread: ThreadId,
}

impl WindowInfo {
    pub fn new(hwnd: Hwnd, style: WindowStyle, window_rect: Rect) -> Self {
        Self {
            hwnd,
            style,
            window_rect,
            client_rect: window_rect,
            ..Self::default()
        }
    }

    pub const fn is_visible(&self) -> bool {
        self.style.contains(WindowStyle::VISIBLE)
    }

    pub const fn is_minimized(&self) -> bool {
        self.style.contains(WindowStyle::MINIMIZE)
    }

    pub const fn is_maximized(&self) -> bool {
        self.style.contains(WindowStyle::MAXIMIZE)
    }

    pub const fn is_enabled(&self) -> bool {
        !self.style.contains(WindowStyle::DISABLED)
    }
}

/// Guest thread id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub u32);

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tid:{:04x}", self.0)
    }
}
