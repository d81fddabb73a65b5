//! Input events and the copy/print restriction policy.
//!
//! Restricted viewers get the context menu, copy, and save/print shortcuts
//! suppressed, and text selection disabled. This only deters casual copying:
//! the document bytes are still on the client.

use crate::layout::ScrollMetrics;
use crate::listeners::ListenerKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPolicy {
    Privileged,
    #[default]
    Restricted,
}

impl AccessPolicy {
    pub fn from_privileged(privileged: bool) -> Self {
        if privileged {
            Self::Privileged
        } else {
            Self::Restricted
        }
    }

    pub fn is_restricted(self) -> bool {
        matches!(self, Self::Restricted)
    }

    /// Whether page text may be selected.
    pub fn selection_enabled(self) -> bool {
        !self.is_restricted()
    }

    /// Default-action decision for an event under this policy.
    pub fn filter(self, event: &ViewerEvent) -> Disposition {
        if !self.is_restricted() {
            return Disposition::Allow;
        }

        match event {
            ViewerEvent::ContextMenu | ViewerEvent::Copy => Disposition::Suppress,
            ViewerEvent::KeyDown(chord) if chord.is_save_or_print() => Disposition::Suppress,
            _ => Disposition::Allow,
        }
    }
}

/// Whether the host should run the event's default action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Allow,
    Suppress,
}

impl Disposition {
    pub fn is_suppressed(self) -> bool {
        matches!(self, Self::Suppress)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    /// Cmd on macOS.
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers { ctrl: false, meta: false, shift: false, alt: false };
    pub const CTRL: Modifiers = Modifiers { ctrl: true, meta: false, shift: false, alt: false };
    pub const META: Modifiers = Modifiers { ctrl: false, meta: true, shift: false, alt: false };

    /// Ctrl or Cmd: the platform's command modifier.
    pub fn command(self) -> bool {
        self.ctrl || self.meta
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyChord {
    pub key: char,
    pub modifiers: Modifiers,
}

impl KeyChord {
    pub fn new(key: char, modifiers: Modifiers) -> Self {
        Self { key: key.to_ascii_lowercase(), modifiers }
    }

    pub fn plain(key: char) -> Self {
        Self::new(key, Modifiers::NONE)
    }

    pub fn ctrl(key: char) -> Self {
        Self::new(key, Modifiers::CTRL)
    }

    pub fn cmd(key: char) -> Self {
        Self::new(key, Modifiers::META)
    }

    pub fn is_save_or_print(&self) -> bool {
        self.modifiers.command() && matches!(self.key, 's' | 'p')
    }
}

/// Input delivered by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    ContextMenu,
    Copy,
    KeyDown(KeyChord),
    Wheel { delta_y: f32, modifiers: Modifiers },
    /// Two-finger pinch; `ratio` is the distance ratio since the last event.
    Pinch { ratio: f32 },
    Scroll(ScrollMetrics),
    Resize { viewport_width: f32, viewport_height: f32 },
}

impl ViewerEvent {
    pub fn kind(&self) -> ListenerKind {
        match self {
            Self::ContextMenu => ListenerKind::ContextMenu,
            Self::Copy => ListenerKind::Copy,
            Self::KeyDown(_) => ListenerKind::KeyDown,
            Self::Wheel { .. } => ListenerKind::Wheel,
            Self::Pinch { .. } => ListenerKind::Touch,
            Self::Scroll(_) => ListenerKind::Scroll,
            Self::Resize { .. } => ListenerKind::Resize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restricted_blocks_context_menu_and_copy() {
        let policy = AccessPolicy::Restricted;
        assert_eq!(policy.filter(&ViewerEvent::ContextMenu), Disposition::Suppress);
        assert_eq!(policy.filter(&ViewerEvent::Copy), Disposition::Suppress);
        assert!(!policy.selection_enabled());
    }

    #[test]
    fn privileged_allows_everything() {
        let policy = AccessPolicy::Privileged;
        assert_eq!(policy.filter(&ViewerEvent::ContextMenu), Disposition::Allow);
        assert_eq!(policy.filter(&ViewerEvent::Copy), Disposition::Allow);
        assert_eq!(policy.filter(&ViewerEvent::KeyDown(KeyChord::ctrl('p'))), Disposition::Allow);
        assert!(policy.selection_enabled());
    }

    #[test]
    fn restricted_blocks_save_and_print_chords() {
        let policy = AccessPolicy::Restricted;
        for chord in [KeyChord::ctrl('s'), KeyChord::ctrl('P'), KeyChord::cmd('s'), KeyChord::cmd('p')]
        {
            assert!(policy.filter(&ViewerEvent::KeyDown(chord)).is_suppressed(), "{chord:?}");
        }
    }

    #[test]
    fn restricted_allows_unrelated_keys() {
        let policy = AccessPolicy::Restricted;
        assert_eq!(policy.filter(&ViewerEvent::KeyDown(KeyChord::plain('p'))), Disposition::Allow);
        assert_eq!(policy.filter(&ViewerEvent::KeyDown(KeyChord::ctrl('f'))), Disposition::Allow);
    }

    #[test]
    fn policy_from_flag() {
        assert_eq!(AccessPolicy::from_privileged(true), AccessPolicy::Privileged);
        assert_eq!(AccessPolicy::from_privileged(false), AccessPolicy::Restricted);
        assert_eq!(AccessPolicy::default(), AccessPolicy::Restricted);
    }

    #[test]
    fn events_map_to_listener_kinds() {
        assert_eq!(ViewerEvent::Pinch { ratio: 1.1 }.kind(), ListenerKind::Touch);
        assert_eq!(ViewerEvent::Scroll(ScrollMetrics::default()).kind(), ListenerKind::Scroll);
    }
}
