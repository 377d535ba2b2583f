//! Message types for actor communication.
//!
//! [`InputEvent`] flows from the input actor to the render loop. [`Event`]
//! is the closed set of everything the render loop reacts to; the loop
//! has exactly one dispatcher over it.

use crate::error::StreamError;
use std::time::Instant;

/// Key codes the render loop reacts to.
///
/// A subset of crossterm's `KeyCode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A printable character.
    Char(char),
    /// Up arrow.
    Up,
    /// Down arrow.
    Down,
    /// Page Up.
    PageUp,
    /// Page Down.
    PageDown,
    /// Home key.
    Home,
    /// End key.
    End,
    /// Escape key.
    Esc,
}

/// Key modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KeyModifiers {
    /// Shift key held.
    pub shift: bool,
    /// Control key held.
    pub control: bool,
    /// Alt/Option key held.
    pub alt: bool,
}

impl KeyModifiers {
    /// No modifiers.
    pub const NONE: Self = Self {
        shift: false,
        control: false,
        alt: false,
    };

    /// Only Control held.
    pub const CONTROL: Self = Self {
        shift: false,
        control: true,
        alt: false,
    };
}

/// Events from the input thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A key was pressed.
    Key {
        /// The key code.
        code: KeyCode,
        /// Modifiers held during keypress.
        modifiers: KeyModifiers,
    },

    /// Terminal was resized.
    Resize {
        /// New width in columns.
        width: u16,
        /// New height in rows.
        height: u16,
    },

    /// Input thread encountered an error.
    Error(String),
}

/// Everything the render loop dispatches on.
#[derive(Debug)]
pub enum Event {
    /// A non-empty fragment arrived.
    Fragment(String),

    /// The fragment stream ended: gracefully (`None`) or with an error.
    StreamEnd(Option<StreamError>),

    /// The warmup delay elapsed; start fetching fragments.
    Warmup,

    /// Loader animation step.
    LoaderTick(Instant),

    /// Loader ellipsis step.
    EllipsisTick,

    /// Terminal was resized.
    Resize {
        /// New width in columns.
        width: u16,
        /// New height in rows.
        height: u16,
    },

    /// A key was pressed.
    Key {
        /// The key code.
        code: KeyCode,
        /// Modifiers held during keypress.
        modifiers: KeyModifiers,
    },
}

impl Event {
    /// Ctrl+C.
    pub const fn is_interrupt(&self) -> bool {
        matches!(
            self,
            Self::Key {
                code: KeyCode::Char('c'),
                modifiers: KeyModifiers { control: true, .. },
            }
        )
    }
}

impl From<InputEvent> for Option<Event> {
    fn from(event: InputEvent) -> Self {
        match event {
            InputEvent::Key { code, modifiers } => Some(Event::Key { code, modifiers }),
            InputEvent::Resize { width, height } => Some(Event::Resize { width, height }),
            InputEvent::Error(_) => None,
        }
    }
}
