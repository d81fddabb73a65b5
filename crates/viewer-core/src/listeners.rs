//! Event listener registrations held by a viewer.

use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ListenerKind {
    Scroll,
    Resize,
    Wheel,
    Touch,
    KeyDown,
    ContextMenu,
    Copy,
}

impl ListenerKind {
    pub const ALL: [ListenerKind; 7] = [
        ListenerKind::Scroll,
        ListenerKind::Resize,
        ListenerKind::Wheel,
        ListenerKind::Touch,
        ListenerKind::KeyDown,
        ListenerKind::ContextMenu,
        ListenerKind::Copy,
    ];
}

/// Listeners currently attached. Events of a detached kind are ignored.
#[derive(Debug, Default, Clone)]
pub struct ListenerSet {
    attached: BTreeSet<ListenerKind>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach_all(&mut self) {
        self.attached.extend(ListenerKind::ALL);
    }

    /// Detach everything, returning how many listeners were removed.
    pub fn detach_all(&mut self) -> usize {
        let count = self.attached.len();
        self.attached.clear();
        count
    }

    pub fn is_attached(&self, kind: ListenerKind) -> bool {
        self.attached.contains(&kind)
    }

    pub fn len(&self) -> usize {
        self.attached.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attached.is_empty()
    }
}
