use serde::{Deserialize, Serialize};
use thespis_storage::{KeyValueStore, StorageResult, encode_json, read_json};

use crate::chat::composer::MessageSink;
use crate::chat::message::{Session, SessionList, SessionRejection, SessionResult};

/// Authoritative key for the serialized session list.
pub const SESSIONS_KEY: &str = "sessions";
/// Write-only mirror of the active session's messages.
pub const MESSAGES_MIRROR_KEY: &str = "messages";
/// Write-only mirror of the active session's first message.
pub const FIRST_MESSAGE_MIRROR_KEY: &str = "firstMessage";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StoredSession {
    messages: Vec<String>,
}

#[derive(Debug, Serialize)]
struct StoredSessionRef<'a> {
    messages: &'a [String],
}

/// Decodes the persisted session list, defaulting to one empty session.
pub fn load_sessions<S>(store: &S) -> SessionList
where
    S: KeyValueStore + ?Sized,
{
    let Some(stored) = read_json::<Vec<StoredSession>, _>(store, SESSIONS_KEY) else {
        tracing::info!("no usable session list in store, starting with one empty session");
        return SessionList::default();
    };

    let sessions = stored
        .into_iter()
        .map(|session| Session::with_messages(session.messages))
        .collect();

    SessionList::from_sessions(sessions).unwrap_or_else(|| {
        tracing::warn!("stored session list was empty, starting with one empty session");
        SessionList::default()
    })
}

/// Owns the session list and the active index, persisting every mutation.
#[derive(Debug)]
pub struct SessionRepository<S> {
    store: S,
    sessions: SessionList,
    active_index: usize,
}

impl<S> SessionRepository<S>
where
    S: KeyValueStore,
{
    /// Loads sessions from `store`. The first session starts active.
    pub fn load(store: S) -> Self {
        let sessions = load_sessions(&store);
        tracing::debug!("loaded {} session(s)", sessions.len());
        Self {
            store,
            sessions,
            active_index: 0,
        }
    }

    pub fn sessions(&self) -> &SessionList {
        &self.sessions
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn active_session(&self) -> &Session {
        &self.sessions[self.active_index]
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Appends an empty session and makes it active.
    pub fn create(&mut self) -> usize {
        self.active_index = self.sessions.push(Session::new());
        tracing::info!(
            "created session {} of {}",
            self.active_index,
            self.sessions.len()
        );
        self.persist();
        self.active_index
    }

    /// Activates the session at `index`. Out-of-range indexes are refused.
    pub fn switch_to(&mut self, index: usize) -> SessionResult<usize> {
        self.sessions.check_index(index)?;
        self.active_index = index;
        self.persist();
        Ok(self.active_index)
    }

    /// Removes the session at `index` and returns the new active index.
    ///
    /// Deleting the active session moves the selection one step back (or keeps
    /// it at 0); deleting an earlier session shifts the active index down by
    /// one so the same session stays selected.
    pub fn delete_at(&mut self, index: usize) -> SessionResult<usize> {
        self.sessions.remove(index)?;

        let active = self.active_index;
        self.active_index = if index == active {
            active.saturating_sub(1)
        } else if index < active {
            active - 1
        } else {
            active
        };

        tracing::info!(
            "deleted session {index}, active session is now {} of {}",
            self.active_index,
            self.sessions.len()
        );
        self.persist();
        Ok(self.active_index)
    }

    /// Appends `text` to the active session.
    pub fn append_message(&mut self, text: impl Into<String>) -> SessionResult<()> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(SessionRejection::EmptyMessage);
        }

        let active = self.active_index;
        if let Some(session) = self.sessions.get_mut(active) {
            session.push(text);
        }
        self.persist();
        Ok(())
    }

    fn persist(&mut self) {
        if let Err(error) = self.write_snapshot() {
            // In-memory state stays authoritative for this process.
            tracing::warn!("failed to persist sessions: {error}");
        }
    }

    fn write_snapshot(&mut self) -> StorageResult<()> {
        let records = self
            .sessions
            .iter()
            .map(|session| StoredSessionRef {
                messages: session.messages(),
            })
            .collect::<Vec<_>>();
        let active = &self.sessions[self.active_index];

        // The list and both mirrors land in a single store write.
        self.store.set_many(vec![
            (SESSIONS_KEY, encode_json(SESSIONS_KEY, &records)?),
            (
                MESSAGES_MIRROR_KEY,
                encode_json(MESSAGES_MIRROR_KEY, active.messages())?,
            ),
            (
                FIRST_MESSAGE_MIRROR_KEY,
                active.first_message().unwrap_or_default().to_string(),
            ),
        ])
    }
}

impl<S> MessageSink for SessionRepository<S>
where
    S: KeyValueStore,
{
    fn deliver(&mut self, text: String) {
        if let Err(rejection) = self.append_message(text) {
            tracing::debug!("message append refused: {rejection:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use thespis_storage::{JsonFileStore, MemoryStore};

    use super::*;

    fn repository_with(sessions: &[&[&str]]) -> SessionRepository<MemoryStore> {
        let mut repository = SessionRepository::load(MemoryStore::new());
        for (index, messages) in sessions.iter().enumerate() {
            if index > 0 {
                repository.create();
            }
            for message in *messages {
                repository.append_message(*message).unwrap();
            }
        }
        repository
    }

    fn first_messages(repository: &SessionRepository<MemoryStore>) -> Vec<String> {
        repository
            .sessions()
            .iter()
            .map(|session| session.first_message().unwrap_or_default().to_string())
            .collect()
    }

    fn assert_invariants(repository: &SessionRepository<MemoryStore>) {
        assert!(repository.sessions().len() >= 1);
        assert!(repository.active_index() < repository.sessions().len());
    }

    #[test]
    fn missing_data_loads_one_empty_session() {
        let repository = SessionRepository::load(MemoryStore::new());
        assert_eq!(repository.sessions().len(), 1);
        assert!(repository.active_session().is_empty());
        assert_eq!(repository.active_index(), 0);
    }

    #[test]
    fn malformed_data_loads_one_empty_session() {
        for raw in [
            "not json",
            "{}",
            "[]",
            r#"[{"messages": "hello"}]"#,
            r#"[{"messages": [], "title": "extra"}]"#,
            r#"[{"msgs": []}]"#,
        ] {
            let store: MemoryStore = [(SESSIONS_KEY, raw)].into_iter().collect();
            let repository = SessionRepository::load(store);
            assert_eq!(repository.sessions(), &SessionList::default(), "input: {raw}");
        }
    }

    #[test]
    fn persisted_list_round_trips() {
        let repository = repository_with(&[&["hello", "again"], &[], &["third"]]);
        let expected = repository.sessions().clone();

        let reloaded = SessionRepository::load(repository.into_store());
        assert_eq!(reloaded.sessions(), &expected);
    }

    #[test]
    fn mirrors_track_active_session() {
        let mut repository = repository_with(&[&["first", "second"], &[]]);
        assert_eq!(
            repository.store().get(MESSAGES_MIRROR_KEY).as_deref(),
            Some("[]")
        );
        assert_eq!(
            repository.store().get(FIRST_MESSAGE_MIRROR_KEY).as_deref(),
            Some("")
        );

        repository.switch_to(0).unwrap();
        assert_eq!(
            repository.store().get(MESSAGES_MIRROR_KEY).as_deref(),
            Some(r#"["first","second"]"#)
        );
        assert_eq!(
            repository.store().get(FIRST_MESSAGE_MIRROR_KEY).as_deref(),
            Some("first")
        );
    }

    #[test]
    fn mirrors_are_ignored_on_load() {
        let store: MemoryStore = [
            (MESSAGES_MIRROR_KEY, r#"["stale"]"#),
            (FIRST_MESSAGE_MIRROR_KEY, "stale"),
        ]
        .into_iter()
        .collect();
        let repository = SessionRepository::load(store);
        assert!(repository.active_session().is_empty());
    }

    #[test]
    fn create_appends_and_activates() {
        let mut repository = repository_with(&[&["a"]]);
        assert_eq!(repository.create(), 1);
        assert_eq!(repository.sessions().len(), 2);
        assert_eq!(repository.active_index(), 1);
        assert!(repository.active_session().is_empty());
    }

    #[test]
    fn switch_rejects_out_of_range_index() {
        let mut repository = repository_with(&[&["a"], &["b"]]);
        assert_eq!(
            repository.switch_to(5),
            Err(SessionRejection::IndexOutOfRange { index: 5, len: 2 })
        );
        assert_eq!(repository.active_index(), 1);

        assert_eq!(repository.switch_to(0), Ok(0));
        assert_eq!(repository.active_session().first_message(), Some("a"));
    }

    #[test]
    fn deleting_active_last_session_selects_previous() {
        let mut repository = repository_with(&[&["A"], &["B"], &["C"]]);
        assert_eq!(repository.active_index(), 2);

        assert_eq!(repository.delete_at(2), Ok(1));
        assert_eq!(first_messages(&repository), vec!["A", "B"]);
        assert_invariants(&repository);
    }

    #[test]
    fn deleting_after_active_keeps_active() {
        let mut repository = repository_with(&[&["A"], &["B"], &["C"]]);
        repository.switch_to(0).unwrap();

        assert_eq!(repository.delete_at(1), Ok(0));
        assert_eq!(first_messages(&repository), vec!["A", "C"]);
    }

    #[test]
    fn deleting_before_active_shifts_active_down() {
        let mut repository = repository_with(&[&["A"], &["B"], &["C"]]);
        assert_eq!(repository.delete_at(0), Ok(1));
        assert_eq!(repository.active_session().first_message(), Some("C"));
    }

    #[test]
    fn deleting_first_active_session_stays_at_zero() {
        let mut repository = repository_with(&[&["A"], &["B"]]);
        repository.switch_to(0).unwrap();

        assert_eq!(repository.delete_at(0), Ok(0));
        assert_eq!(first_messages(&repository), vec!["B"]);
    }

    #[test]
    fn last_session_is_never_deleted() {
        let mut repository = repository_with(&[&["A"]]);
        assert_eq!(repository.delete_at(0), Err(SessionRejection::LastSession));
        assert_eq!(first_messages(&repository), vec!["A"]);
        assert_eq!(repository.active_index(), 0);
    }

    #[test]
    fn out_of_range_delete_is_a_no_op() {
        let mut repository = repository_with(&[&["A"], &["B"]]);
        assert!(repository.delete_at(7).is_err());
        assert_eq!(first_messages(&repository), vec!["A", "B"]);
        assert_eq!(repository.active_index(), 1);
    }

    #[test]
    fn empty_message_is_refused() {
        let mut repository = repository_with(&[&[]]);
        assert_eq!(
            repository.append_message("   "),
            Err(SessionRejection::EmptyMessage)
        );
        assert!(repository.active_session().is_empty());
    }

    #[test]
    fn invariants_hold_across_mixed_operations() {
        let mut repository = SessionRepository::load(MemoryStore::new());
        let script: [(u8, usize); 12] = [
            (0, 0),
            (0, 0),
            (2, 1),
            (1, 9),
            (2, 0),
            (2, 0),
            (2, 0),
            (0, 0),
            (1, 1),
            (2, 1),
            (1, 0),
            (2, 3),
        ];
        for (operation, index) in script {
            match operation {
                0 => {
                    repository.create();
                }
                1 => {
                    let _ = repository.switch_to(index);
                }
                _ => {
                    let _ = repository.delete_at(index);
                }
            }
            assert_invariants(&repository);
        }
    }

    #[derive(Debug, Default)]
    struct CountingStore {
        inner: MemoryStore,
        single_writes: usize,
        batched_writes: usize,
    }

    impl KeyValueStore for CountingStore {
        fn get(&self, key: &str) -> Option<String> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: String) -> StorageResult<()> {
            self.single_writes += 1;
            self.inner.set(key, value)
        }

        fn set_many(&mut self, entries: Vec<(&str, String)>) -> StorageResult<()> {
            self.batched_writes += 1;
            for (key, value) in entries {
                self.inner.set(key, value)?;
            }
            Ok(())
        }
    }

    #[test]
    fn each_mutation_is_one_store_write() {
        let mut repository = SessionRepository::load(CountingStore::default());
        repository.append_message("hi").unwrap();
        repository.create();
        repository.switch_to(0).unwrap();
        repository.delete_at(1).unwrap();

        let store = repository.store();
        assert_eq!(store.batched_writes, 4);
        assert_eq!(store.single_writes, 0);
        assert_eq!(store.get(FIRST_MESSAGE_MIRROR_KEY).as_deref(), Some("hi"));
        assert_eq!(store.get(MESSAGES_MIRROR_KEY).as_deref(), Some(r#"["hi"]"#));
    }

    #[test]
    fn failed_store_writes_still_advance_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let store = JsonFileStore::open(blocker.join("local_storage.json"));
        let mut repository = SessionRepository::load(store);

        assert_eq!(repository.append_message("hi"), Ok(()));
        assert_eq!(repository.create(), 1);
        assert_eq!(repository.sessions().len(), 2);
        assert_eq!(repository.sessions()[0].messages(), ["hi".to_string()]);

        assert_eq!(repository.delete_at(0), Ok(0));
        assert_eq!(repository.sessions().len(), 1);
        assert!(repository.active_session().is_empty());
        assert!(!blocker.join("local_storage.json").exists());
    }
}
