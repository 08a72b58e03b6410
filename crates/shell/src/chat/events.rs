use std::time::Duration;

/// Auto-hide delay for a hint raised by the send button.
pub const EXPLICIT_HINT_DURATION: Duration = Duration::from_millis(2_000);
/// Auto-hide delay for a hint raised by an Enter key submit.
pub const KEYBOARD_HINT_DURATION: Duration = Duration::from_millis(5_000);

/// Which control raised a submit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerSource {
    /// Send button or programmatic send.
    Explicit,
    /// Enter key without shift.
    Keyboard,
}

impl TriggerSource {
    /// How long an empty-submit hint stays up for this trigger.
    pub const fn hint_duration(self) -> Duration {
        match self {
            Self::Explicit => EXPLICIT_HINT_DURATION,
            Self::Keyboard => KEYBOARD_HINT_DURATION,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Enter,
    Other,
}

/// Key-down forwarded from the composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyPress {
    pub key: Key,
    pub shift: bool,
}

impl KeyPress {
    pub const fn new(key: Key, shift: bool) -> Self {
        Self { key, shift }
    }

    pub const fn enter() -> Self {
        Self::new(Key::Enter, false)
    }

    pub const fn shift_enter() -> Self {
        Self::new(Key::Enter, true)
    }

    /// Enter without shift submits; everything else is text editing.
    pub const fn is_submit(&self) -> bool {
        matches!(self.key, Key::Enter) && !self.shift
    }
}

/// Events the view layer forwards into the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellEvent {
    NewSession,
    SwitchSession(usize),
    DeleteSession(usize),
    UpdateDraft(String),
    Submit(TriggerSource),
    KeyDown(KeyPress),
    DismissHint,
    ToggleTheme,
}
