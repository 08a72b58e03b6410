use std::ops::Index;

/// Placeholder title for sessions without messages.
pub const DEFAULT_SESSION_TITLE: &str = "New chat";
/// Title length, in characters, before truncation kicks in.
pub const TITLE_MAX_CHARS: usize = 32;
/// Marker appended to truncated titles.
pub const TITLE_ELLIPSIS: &str = "...";

/// One chat session: an ordered, append-only list of user messages.
///
/// Sessions carry no identifier; they are addressed by their position in a
/// [`SessionList`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    messages: Vec<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_messages(messages: Vec<String>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn first_message(&self) -> Option<&str> {
        self.messages.first().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Display title derived from the first message.
    pub fn title(&self) -> String {
        let Some(first) = self.first_message() else {
            return DEFAULT_SESSION_TITLE.to_string();
        };

        match first.char_indices().nth(TITLE_MAX_CHARS) {
            Some((cut, _)) => format!("{}{TITLE_ELLIPSIS}", &first[..cut]),
            None => first.to_string(),
        }
    }

    pub(crate) fn push(&mut self, message: String) {
        self.messages.push(message);
    }
}

/// Reason a session-list mutation was refused. Refusals leave state untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRejection {
    IndexOutOfRange { index: usize, len: usize },
    LastSession,
    EmptyMessage,
}

pub type SessionResult<T> = Result<T, SessionRejection>;

/// Non-empty, creation-ordered list of sessions (newest last).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionList {
    sessions: Vec<Session>,
}

impl Default for SessionList {
    fn default() -> Self {
        Self {
            sessions: vec![Session::new()],
        }
    }
}

impl SessionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps `sessions`, or returns `None` when the list would be empty.
    pub fn from_sessions(sessions: Vec<Session>) -> Option<Self> {
        if sessions.is_empty() {
            None
        } else {
            Some(Self { sessions })
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    // Never true.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Session> {
        self.sessions.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Session> {
        self.sessions.iter()
    }

    pub fn as_slice(&self) -> &[Session] {
        &self.sessions
    }

    pub fn titles(&self) -> Vec<String> {
        self.sessions.iter().map(Session::title).collect()
    }

    pub(crate) fn push(&mut self, session: Session) -> usize {
        self.sessions.push(session);
        self.sessions.len() - 1
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Session> {
        self.sessions.get_mut(index)
    }

    pub(crate) fn check_index(&self, index: usize) -> SessionResult<()> {
        if index < self.sessions.len() {
            Ok(())
        } else {
            Err(SessionRejection::IndexOutOfRange {
                index,
                len: self.sessions.len(),
            })
        }
    }

    /// Removes the session at `index`; the last remaining session is never removed.
    pub(crate) fn remove(&mut self, index: usize) -> SessionResult<Session> {
        self.check_index(index)?;
        if self.sessions.len() == 1 {
            return Err(SessionRejection::LastSession);
        }
        Ok(self.sessions.remove(index))
    }
}

impl Index<usize> for SessionList {
    type Output = Session;

    fn index(&self, index: usize) -> &Session {
        &self.sessions[index]
    }
}

impl<'a> IntoIterator for &'a SessionList {
    type Item = &'a Session;
    type IntoIter = std::slice::Iter<'a, Session>;

    fn into_iter(self) -> Self::IntoIter {
        self.sessions.iter()
    }
}
