//! Process-wide clip owner registry.
//!
//! Lives in the desktop thread's [`Core`](crate::Core). Other threads never
//! touch it directly: they post [`GuestMessage::ClipCursorNotify`] to the
//! desktop window and query it with [`GuestMessage::QueryClipOwner`].
//!
//! [`GuestMessage::ClipCursorNotify`]: crate::message::GuestMessage::ClipCursorNotify
//! [`GuestMessage::QueryClipOwner`]: crate::message::GuestMessage::QueryClipOwner

use tracing::{debug, trace};

use crate::window::Hwnd;

/// Result of an ownership update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerUpdate {
    /// Recorded. `evicted` is a previous owner that must be told to reset.
    Accepted { evicted: Option<Hwnd> },
    /// A clear from a window that does not own the clip.
    Rejected,
}

/// Which capture window currently clips the pointer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipOwnerRegistry {
    owner: Hwnd,
}

impl ClipOwnerRegistry {
    pub const fn new() -> Self {
        Self { owner: Hwnd::NULL }
    }

    pub const fn owner(&self) -> Hwnd {
        self.owner
    }

    /// `from` reports that the clip owner is now `to` (null: nobody).
    pub fn update(&mut self, from: Hwnd, to: Hwnd) -> OwnerUpdate {
        if to.is_null() {
            if from != self.owner {
                trace!(%from, owner = %self.owner, "ignoring clip release from non-owner");
                return OwnerUpdate::Rejected;
            }
            debug!(%from, "clip owner released");
            self.owner = Hwnd::NULL;
            return OwnerUpdate::Accepted { evicted: None };
        }

        let prev = std::mem::replace(&mut self.owner, to);
        if prev != to {
            debug!(%prev, %to, "clip owner changed");
        }
        let evicted = prev.non_null().filter(|p| *p != to && *p != from);
        OwnerUpdate::Accepted { evicted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: Hwnd = Hwnd(0xa0);
    const B: Hwnd = Hwnd(0xb0);

    #[test]
    fn test_new_owner_evicts_previous() {
        let mut reg = ClipOwnerRegistry::new();
        assert_eq!(
            reg.update(Hwnd::NULL, A),
            OwnerUpdate::Accepted { evicted: None }
        );
        assert_eq!(
            reg.update(Hwnd::NULL, B),
            OwnerUpdate::Accepted { evicted: Some(A) }
        );
        assert_eq!(reg.owner(), B);
    }

    #[test]
    fn test_clear_from_non_owner_rejected() {
        let mut reg = ClipOwnerRegistry::new();
        reg.update(Hwnd::NULL, B);
        assert_eq!(reg.update(A, Hwnd::NULL), OwnerUpdate::Rejected);
        assert_eq!(reg.owner(), B);
        assert_eq!(
            reg.update(B, Hwnd::NULL),
            OwnerUpdate::Accepted { evicted: None }
        );
        assert_eq!(reg.owner(), Hwnd::NULL);
    }

    #[test]
    fn test_reapply_by_same_owner_is_quiet() {
        let mut reg = ClipOwnerRegistry::new();
        reg.update(Hwnd::NULL, A);
        assert_eq!(reg.update(A, A), OwnerUpdate::Accepted { evicted: None });
    }
}
