use futures::future::OptionFuture;
use thespis_storage::{JsonFileStore, KeyValueStore};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::chat::composer::{Composer, HINT_TEXT, KeyOutcome, SubmitOutcome, TimerToken};
use crate::chat::events::{KeyPress, ShellEvent, TriggerSource};
use crate::chat::metrics::{LineMetrics, TextMetrics};
use crate::chat::repository::SessionRepository;
use crate::settings::state::{ShellSettings, ThemeMode};

/// One row of the session list as the view renders it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub title: String,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HintView {
    pub visible: bool,
    pub expires_at: Option<Instant>,
    pub text: &'static str,
}

/// Everything the view layer needs to render one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub sessions: Vec<SessionView>,
    pub active_index: usize,
    pub draft: String,
    pub hint: HintView,
    pub composer_height: f32,
    pub theme: ThemeMode,
}

/// Explicit owner of the chat shell state: one repository, one composer.
pub struct ChatShell<S, M> {
    repository: SessionRepository<S>,
    composer: Composer<M>,
    theme: ThemeMode,
}

impl ChatShell<JsonFileStore, LineMetrics> {
    /// Opens the file-backed store and layout model named by `settings`.
    pub fn from_settings(settings: &ShellSettings) -> Self {
        tracing::info!("opening chat store at {:?}", settings.store_path);
        Self::new(
            JsonFileStore::open(settings.store_path.clone()),
            settings.composer.line_metrics(),
            settings.theme_mode,
        )
    }
}

impl<S, M> ChatShell<S, M>
where
    S: KeyValueStore,
    M: TextMetrics,
{
    pub fn new(store: S, metrics: M, theme: ThemeMode) -> Self {
        Self {
            repository: SessionRepository::load(store),
            composer: Composer::new(metrics),
            theme,
        }
    }

    pub fn repository(&self) -> &SessionRepository<S> {
        &self.repository
    }

    pub fn composer(&self) -> &Composer<M> {
        &self.composer
    }

    pub fn theme(&self) -> ThemeMode {
        self.theme
    }

    pub fn new_session(&mut self) -> usize {
        let index = self.repository.create();
        self.composer.clear();
        index
    }

    pub fn switch_session(&mut self, index: usize) -> usize {
        match self.repository.switch_to(index) {
            Ok(active) => {
                self.composer.clear();
                active
            }
            Err(rejection) => {
                tracing::debug!("switch to session {index} refused: {rejection:?}");
                self.repository.active_index()
            }
        }
    }

    pub fn delete_session(&mut self, index: usize) -> usize {
        let previous_active = self.repository.active_index();
        match self.repository.delete_at(index) {
            Ok(active) => {
                // The draft belongs to the session being viewed.
                if index == previous_active {
                    self.composer.clear();
                }
                active
            }
            Err(rejection) => {
                tracing::debug!("delete of session {index} refused: {rejection:?}");
                previous_active
            }
        }
    }

    pub fn update_draft(&mut self, text: impl Into<String>) {
        self.composer.update_draft(text);
    }

    pub fn submit(&mut self, source: TriggerSource) -> SubmitOutcome {
        self.composer.submit(source, Instant::now(), &mut self.repository)
    }

    pub fn key_down(&mut self, key: KeyPress) -> KeyOutcome {
        self.composer.key_down(key, Instant::now(), &mut self.repository)
    }

    pub fn dismiss_hint(&mut self) -> bool {
        self.composer.dismiss_hint()
    }

    pub fn fire_hint_timer(&mut self, token: TimerToken) -> bool {
        self.composer.fire_timer(token)
    }

    pub fn toggle_theme(&mut self) -> ThemeMode {
        self.theme = self.theme.toggled();
        tracing::debug!("theme switched to {}", self.theme.name());
        self.theme
    }

    /// Routes one view event to the matching operation.
    pub fn apply(&mut self, event: ShellEvent) {
        match event {
            ShellEvent::NewSession => {
                self.new_session();
            }
            ShellEvent::SwitchSession(index) => {
                self.switch_session(index);
            }
            ShellEvent::DeleteSession(index) => {
                self.delete_session(index);
            }
            ShellEvent::UpdateDraft(text) => self.update_draft(text),
            ShellEvent::Submit(source) => {
                self.submit(source);
            }
            ShellEvent::KeyDown(key) => {
                self.key_down(key);
            }
            ShellEvent::DismissHint => {
                self.dismiss_hint();
            }
            ShellEvent::ToggleTheme => {
                self.toggle_theme();
            }
        }
    }

    pub fn view_state(&self) -> ViewState {
        let hint = self.composer.hint();
        ViewState {
            sessions: self
                .repository
                .sessions()
                .iter()
                .map(|session| SessionView {
                    title: session.title(),
                    messages: session.messages().to_vec(),
                })
                .collect(),
            active_index: self.repository.active_index(),
            draft: self.composer.draft().to_string(),
            hint: HintView {
                visible: hint.is_visible(),
                expires_at: hint.deadline(),
                text: HINT_TEXT,
            },
            composer_height: self.composer.height(),
            theme: self.theme,
        }
    }

    /// Tears the shell down and hands back the store.
    pub fn shutdown(mut self) -> S {
        self.composer.dispose();
        self.repository.into_store()
    }

    /// Drives the shell until `events` closes.
    ///
    /// Events and hint deadlines are handled one at a time on the calling
    /// task. The deadline future is rebuilt from the composer's current timer
    /// on every turn, so a cancelled or superseded timer never fires. A fresh
    /// snapshot is published on `view` after every turn.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<ShellEvent>,
        view: watch::Sender<ViewState>,
    ) -> S {
        view.send_replace(self.view_state());

        loop {
            let deadline: OptionFuture<_> = self
                .composer
                .pending_timer()
                .map(|(token, deadline)| async move {
                    tokio::time::sleep_until(deadline).await;
                    token
                })
                .into();

            tokio::select! {
                biased;
                event = events.recv() => match event {
                    Some(event) => self.apply(event),
                    None => break,
                },
                Some(token) = deadline => {
                    self.fire_hint_timer(token);
                }
            }

            view.send_replace(self.view_state());
        }

        tracing::debug!("event channel closed, shutting down chat shell");
        self.shutdown()
    }
}
