pub mod composer;
/// Event contracts between the view layer and the shell.
pub mod events;
/// Session and session-list domain types.
pub mod message;
pub mod metrics;
pub mod repository;

pub use composer::{
    Composer, HintState, HintTimer, KeyOutcome, MessageSink, SubmitOutcome, TimerToken,
};
pub use events::{Key, KeyPress, ShellEvent, TriggerSource};
pub use message::{Session, SessionList, SessionRejection, SessionResult};
pub use metrics::{LineMetrics, TextMetrics};
pub use repository::SessionRepository;
