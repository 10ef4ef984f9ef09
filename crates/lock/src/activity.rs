use serde::{Deserialize, Serialize};

/// A user-input event that counts as activity and defers the idle lock.
///
/// The host shell forwards these from whatever input layer it sits on; the
/// lock core only cares that one happened, the kind is kept for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityEvent {
    PointerMove,
    PointerDown,
    KeyPress,
    TouchStart,
    Scroll,
    Click,
}

impl ActivityEvent {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ActivityEvent::PointerMove => "pointer_move",
            ActivityEvent::PointerDown => "pointer_down",
            ActivityEvent::KeyPress => "key_press",
            ActivityEvent::TouchStart => "touch_start",
            ActivityEvent::Scroll => "scroll",
            ActivityEvent::Click => "click",
        }
    }

    /// Every qualifying event kind, in no particular order.
    #[must_use]
    pub const fn all() -> &'static [ActivityEvent] {
        &[
            ActivityEvent::PointerMove,
            ActivityEvent::PointerDown,
            ActivityEvent::KeyPress,
            ActivityEvent::TouchStart,
            ActivityEvent::Scroll,
            ActivityEvent::Click,
        ]
    }
}

impl std::fmt::Display for ActivityEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
