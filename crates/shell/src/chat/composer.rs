use tokio::time::Instant;

use crate::chat::events::{Key, KeyPress, TriggerSource};
use crate::chat::metrics::TextMetrics;

/// Upper bound for the auto-grown composer height.
pub const MAX_HEIGHT: f32 = 192.0;
/// Baseline used when the single-line height cannot be measured.
pub const FALLBACK_BASELINE_HEIGHT: f32 = 48.0;
pub const HINT_TEXT: &str = "Try asking Thespis a question";

/// Receives messages accepted by the composer.
pub trait MessageSink {
    fn deliver(&mut self, text: String);
}

impl MessageSink for Vec<String> {
    fn deliver(&mut self, text: String) {
        self.push(text);
    }
}

/// Identifies one scheduling of the hint timer.
///
/// Every `arm` mints a fresh token, so a callback carrying an older token is
/// recognizably stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

/// One-shot, cancellable deadline with at most one pending schedule.
#[derive(Debug, Default)]
pub struct HintTimer {
    generation: u64,
    armed: Option<(TimerToken, Instant)>,
}

impl HintTimer {
    /// Schedules `deadline`, replacing (and thereby cancelling) any pending one.
    pub fn arm(&mut self, deadline: Instant) -> TimerToken {
        self.generation = self.generation.wrapping_add(1);
        let token = TimerToken(self.generation);
        self.armed = Some((token, deadline));
        token
    }

    /// Cancels the pending schedule. Returns whether one existed.
    pub fn cancel(&mut self) -> bool {
        self.armed.take().is_some()
    }

    pub fn pending(&self) -> Option<(TimerToken, Instant)> {
        self.armed
    }

    /// Consumes the pending schedule if `token` is still current.
    pub fn fire(&mut self, token: TimerToken) -> bool {
        match self.armed {
            Some((armed, _)) if armed == token => {
                self.armed = None;
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintState {
    Hidden,
    Visible { deadline: Instant },
}

impl HintState {
    pub fn is_visible(&self) -> bool {
        matches!(self, Self::Visible { .. })
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self {
            Self::Visible { deadline } => Some(*deadline),
            Self::Hidden => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The trimmed draft was handed to the sink and the composer was reset.
    Sent,
    /// The draft was blank; the hint is showing until `deadline`.
    HintShown { deadline: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Submitted(SubmitOutcome),
    NewlineInserted,
    Ignored,
}

/// Draft text, auto-grow height, and the empty-submit hint.
pub struct Composer<M> {
    metrics: M,
    draft: String,
    baseline_height: f32,
    height: f32,
    timer: HintTimer,
}

impl<M> Composer<M>
where
    M: TextMetrics,
{
    /// Builds a composer, capturing the single-line baseline height once.
    pub fn new(metrics: M) -> Self {
        let measured = metrics.content_height("");
        let baseline_height = if measured.is_finite() && measured > 0.0 {
            measured.min(MAX_HEIGHT)
        } else {
            tracing::debug!(
                "composer baseline unmeasurable ({measured}), using {FALLBACK_BASELINE_HEIGHT}"
            );
            FALLBACK_BASELINE_HEIGHT
        };

        Self {
            metrics,
            draft: String::new(),
            baseline_height,
            height: baseline_height,
            timer: HintTimer::default(),
        }
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn baseline_height(&self) -> f32 {
        self.baseline_height
    }

    pub fn hint(&self) -> HintState {
        match self.timer.pending() {
            Some((_, deadline)) => HintState::Visible { deadline },
            None => HintState::Hidden,
        }
    }

    pub fn pending_timer(&self) -> Option<(TimerToken, Instant)> {
        self.timer.pending()
    }

    /// Replaces the draft and recomputes the height. Non-blank text hides the hint.
    pub fn update_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
        self.height = clamp_height(
            self.metrics.content_height(&self.draft),
            self.baseline_height,
        );

        if !self.draft.trim().is_empty() && self.timer.cancel() {
            tracing::debug!("hint hidden by typing");
        }
    }

    /// Empties the draft and returns to the baseline height.
    pub fn clear(&mut self) {
        self.draft.clear();
        self.height = self.baseline_height;
    }

    /// Sends the trimmed draft, or shows the hint when it is blank.
    pub fn submit<K>(&mut self, source: TriggerSource, now: Instant, sink: &mut K) -> SubmitOutcome
    where
        K: MessageSink + ?Sized,
    {
        let trimmed = self.draft.trim();
        if trimmed.is_empty() {
            let deadline = now + source.hint_duration();
            self.timer.arm(deadline);
            tracing::debug!("empty submit via {source:?}, hint shown");
            return SubmitOutcome::HintShown { deadline };
        }

        sink.deliver(trimmed.to_string());
        self.clear();
        SubmitOutcome::Sent
    }

    pub fn key_down<K>(&mut self, key: KeyPress, now: Instant, sink: &mut K) -> KeyOutcome
    where
        K: MessageSink + ?Sized,
    {
        if key.is_submit() {
            return KeyOutcome::Submitted(self.submit(TriggerSource::Keyboard, now, sink));
        }

        if key.shift && matches!(key.key, Key::Enter) {
            let mut next = std::mem::take(&mut self.draft);
            next.push('\n');
            self.update_draft(next);
            return KeyOutcome::NewlineInserted;
        }

        KeyOutcome::Ignored
    }

    /// Hides the hint on user request. A hidden hint stays hidden.
    pub fn dismiss_hint(&mut self) -> bool {
        self.timer.cancel()
    }

    /// Timer callback. Stale tokens are ignored.
    pub fn fire_timer(&mut self, token: TimerToken) -> bool {
        let fired = self.timer.fire(token);
        if fired {
            tracing::debug!("hint deadline elapsed");
        }
        fired
    }

    /// Hides the hint when its deadline is at or before `now`.
    pub fn expire_due(&mut self, now: Instant) -> bool {
        match self.timer.pending() {
            Some((token, deadline)) if deadline <= now => self.fire_timer(token),
            _ => false,
        }
    }

    /// Tears the composer down, cancelling any pending timer.
    pub fn dispose(&mut self) {
        self.timer.cancel();
        self.clear();
    }
}

/// Clamps measured content height to `[baseline, MAX_HEIGHT]`.
///
/// The cap wins over a baseline that is itself above it.
pub fn clamp_height(content_height: f32, baseline_height: f32) -> f32 {
    let floor = baseline_height.min(MAX_HEIGHT);
    if !content_height.is_finite() {
        return floor;
    }
    content_height.min(MAX_HEIGHT).max(floor)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::chat::metrics::LineMetrics;

    fn composer() -> Composer<LineMetrics> {
        Composer::new(LineMetrics::default())
    }

    #[test]
    fn baseline_falls_back_when_unmeasurable() {
        assert_eq!(Composer::new(|_: &str| 0.0_f32).baseline_height(), 48.0);
        assert_eq!(Composer::new(|_: &str| f32::NAN).baseline_height(), 48.0);
        assert_eq!(Composer::new(|_: &str| 40.0_f32).baseline_height(), 40.0);
    }

    #[test]
    fn oversized_baseline_is_held_at_cap() {
        let mut composer = Composer::new(|text: &str| -> f32 { 300.0 + text.len() as f32 });
        assert_eq!(composer.baseline_height(), MAX_HEIGHT);
        assert_eq!(composer.height(), MAX_HEIGHT);

        composer.update_draft("x".repeat(400));
        assert_eq!(composer.height(), MAX_HEIGHT);

        composer.clear();
        assert_eq!(composer.height(), MAX_HEIGHT);
    }

    #[test]
    fn tall_content_is_capped() {
        let mut composer = Composer::new(|text: &str| -> f32 { if text.is_empty() { 48.0 } else { 500.0 } });
        composer.update_draft("a very long draft");
        assert_eq!(composer.height(), 192.0);
    }

    #[test]
    fn short_content_never_drops_below_baseline() {
        let mut composer = Composer::new(|text: &str| -> f32 { if text.is_empty() { 48.0 } else { 20.0 } });
        composer.update_draft("hi");
        assert_eq!(composer.height(), 48.0);
    }

    #[test]
    fn height_follows_wrapped_lines() {
        let mut composer = composer();
        composer.update_draft("one\ntwo\nthree");
        assert_eq!(composer.height(), 3.0 * 24.0 + 24.0);

        composer.update_draft("one");
        assert_eq!(composer.height(), 48.0);

        composer.update_draft("line\n".repeat(20));
        assert_eq!(composer.height(), MAX_HEIGHT);
    }

    #[test]
    fn submit_sends_trimmed_draft_and_resets() {
        let mut composer = composer();
        let mut sent = Vec::<String>::new();
        composer.update_draft("  hello there \n");

        let outcome = composer.submit(TriggerSource::Explicit, Instant::now(), &mut sent);

        assert_eq!(outcome, SubmitOutcome::Sent);
        assert_eq!(sent, vec!["hello there".to_string()]);
        assert_eq!(composer.draft(), "");
        assert_eq!(composer.height(), composer.baseline_height());
        assert_eq!(composer.hint(), HintState::Hidden);
    }

    #[test]
    fn blank_submit_shows_hint_without_sending() {
        let mut composer = composer();
        let mut sent = Vec::<String>::new();
        let now = Instant::now();
        composer.update_draft("   ");

        let outcome = composer.submit(TriggerSource::Explicit, now, &mut sent);

        let deadline = now + Duration::from_millis(2_000);
        assert_eq!(outcome, SubmitOutcome::HintShown { deadline });
        assert_eq!(composer.hint(), HintState::Visible { deadline });
        assert!(sent.is_empty());
        assert_eq!(composer.draft(), "   ");
    }

    #[test]
    fn explicit_hint_expires_after_two_seconds() {
        let mut composer = composer();
        let now = Instant::now();
        composer.submit(TriggerSource::Explicit, now, &mut Vec::<String>::new());

        assert!(!composer.expire_due(now + Duration::from_millis(1_999)));
        assert!(composer.hint().is_visible());
        assert!(composer.expire_due(now + Duration::from_millis(2_000)));
        assert_eq!(composer.hint(), HintState::Hidden);
    }

    #[test]
    fn enter_hint_expires_after_five_seconds() {
        let mut composer = composer();
        let now = Instant::now();

        let outcome = composer.key_down(KeyPress::enter(), now, &mut Vec::<String>::new());
        let deadline = now + Duration::from_millis(5_000);
        assert_eq!(
            outcome,
            KeyOutcome::Submitted(SubmitOutcome::HintShown { deadline })
        );

        assert!(!composer.expire_due(now + Duration::from_millis(4_999)));
        assert!(composer.expire_due(deadline));
    }

    #[test]
    fn typing_hides_hint_immediately() {
        for source in [TriggerSource::Explicit, TriggerSource::Keyboard] {
            let mut composer = composer();
            composer.submit(source, Instant::now(), &mut Vec::<String>::new());

            composer.update_draft(" ");
            assert!(composer.hint().is_visible(), "whitespace keeps the hint");

            composer.update_draft("h");
            assert_eq!(composer.hint(), HintState::Hidden);
            assert!(composer.pending_timer().is_none());
        }
    }

    #[test]
    fn reshowing_hint_supersedes_previous_timer() {
        let mut composer = composer();
        let now = Instant::now();
        composer.submit(TriggerSource::Explicit, now, &mut Vec::<String>::new());
        let (first_token, _) = composer.pending_timer().unwrap();

        let later = now + Duration::from_millis(1_500);
        composer.submit(TriggerSource::Keyboard, later, &mut Vec::<String>::new());

        assert!(!composer.fire_timer(first_token));
        assert!(!composer.expire_due(now + Duration::from_millis(2_000)));
        assert_eq!(
            composer.hint(),
            HintState::Visible {
                deadline: later + Duration::from_millis(5_000)
            }
        );
    }

    #[test]
    fn dismiss_is_idempotent() {
        let mut composer = composer();
        composer.submit(TriggerSource::Explicit, Instant::now(), &mut Vec::<String>::new());

        assert!(composer.dismiss_hint());
        assert_eq!(composer.hint(), HintState::Hidden);
        assert!(!composer.dismiss_hint());
        assert_eq!(composer.hint(), HintState::Hidden);
    }

    #[test]
    fn shift_enter_inserts_newline() {
        let mut composer = composer();
        let mut sent = Vec::<String>::new();
        composer.update_draft("first");

        let outcome = composer.key_down(KeyPress::shift_enter(), Instant::now(), &mut sent);

        assert_eq!(outcome, KeyOutcome::NewlineInserted);
        assert_eq!(composer.draft(), "first\n");
        assert_eq!(composer.height(), 2.0 * 24.0 + 24.0);
        assert!(sent.is_empty());
    }

    #[test]
    fn enter_with_text_sends() {
        let mut composer = composer();
        let mut sent = Vec::<String>::new();
        composer.update_draft("ping");

        let outcome = composer.key_down(KeyPress::enter(), Instant::now(), &mut sent);

        assert_eq!(outcome, KeyOutcome::Submitted(SubmitOutcome::Sent));
        assert_eq!(sent, vec!["ping".to_string()]);
    }

    #[test]
    fn other_keys_are_ignored() {
        let mut composer = composer();
        let outcome = composer.key_down(
            KeyPress::new(Key::Other, true),
            Instant::now(),
            &mut Vec::<String>::new(),
        );
        assert_eq!(outcome, KeyOutcome::Ignored);
    }

    #[test]
    fn dispose_cancels_pending_timer() {
        let mut composer = composer();
        composer.submit(TriggerSource::Keyboard, Instant::now(), &mut Vec::<String>::new());
        let (token, _) = composer.pending_timer().unwrap();

        composer.dispose();

        assert!(composer.pending_timer().is_none());
        assert!(!composer.fire_timer(token));
    }

    #[test]
    fn clamp_handles_degenerate_input() {
        assert_eq!(clamp_height(f32::INFINITY, 48.0), 48.0);
        assert_eq!(clamp_height(100.0, 48.0), 100.0);
        assert_eq!(clamp_height(100.0, 250.0), MAX_HEIGHT);
        assert_eq!(clamp_height(f32::NAN, 250.0), MAX_HEIGHT);
    }
}
