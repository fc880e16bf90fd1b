use std::fmt;

use slotpilot_core_types::Point;

/// DOM event types the agents synthesize.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum EventKind {
    MouseDown,
    MouseUp,
    Click,
    Input,
    Change,
}

impl EventKind {
    pub fn dom_type(&self) -> &'static str {
        match self {
            EventKind::MouseDown => "mousedown",
            EventKind::MouseUp => "mouseup",
            EventKind::Click => "click",
            EventKind::Input => "input",
            EventKind::Change => "change",
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(
            self,
            EventKind::MouseDown | EventKind::MouseUp | EventKind::Click
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dom_type())
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EventInit {
    pub bubbles: bool,
    pub cancelable: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SyntheticEvent {
    pub kind: EventKind,
    pub init: EventInit,
    /// `clientX`/`clientY`, only set on pointer events.
    pub client: Option<Point>,
}

impl SyntheticEvent {
    /// Bubbling, cancelable mouse event at the given viewport point.
    pub fn pointer(kind: EventKind, at: Point) -> Self {
        Self {
            kind,
            init: EventInit {
                bubbles: true,
                cancelable: true,
            },
            client: Some(at),
        }
    }

    /// Bubbling `input`/`change` style notification.
    pub fn notify(kind: EventKind) -> Self {
        Self {
            kind,
            init: EventInit {
                bubbles: true,
                cancelable: false,
            },
            client: None,
        }
    }
}
