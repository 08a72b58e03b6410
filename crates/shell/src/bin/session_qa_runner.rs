use std::env;
use std::path::Path;
use std::time::Duration;

use snafu::{OptionExt, ResultExt, Snafu};
use tokio::time::Instant;

use thespis::ChatShell;
use thespis::chat::composer::{Composer, HintState, MAX_HEIGHT, SubmitOutcome};
use thespis::chat::events::{KeyPress, TriggerSource};
use thespis::chat::message::{DEFAULT_SESSION_TITLE, Session, SessionRejection};
use thespis::chat::metrics::LineMetrics;
use thespis::chat::repository::{SESSIONS_KEY, SessionRepository};
use thespis::settings::state::SettingsStore;
use thespis_storage::{JsonFileStore, KeyValueStore};

#[derive(Debug, Clone)]
struct RunnerArgs {
    scenario: Scenario,
    store_path: Option<String>,
    settings_path: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Scenario {
    DefaultLoad,
    MalformedLoad,
    SessionCrud,
    LastSessionGuard,
    RoundTrip,
    TitleDerivation,
    HeightClamp,
    HintTiming,
    SettingsShell,
    All,
}

impl Scenario {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "default_load" => Some(Self::DefaultLoad),
            "malformed_load" => Some(Self::MalformedLoad),
            "session_crud" => Some(Self::SessionCrud),
            "last_session_guard" => Some(Self::LastSessionGuard),
            "round_trip" => Some(Self::RoundTrip),
            "title_derivation" => Some(Self::TitleDerivation),
            "height_clamp" => Some(Self::HeightClamp),
            "hint_timing" => Some(Self::HintTiming),
            "settings_shell" => Some(Self::SettingsShell),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::DefaultLoad => "default_load",
            Self::MalformedLoad => "malformed_load",
            Self::SessionCrud => "session_crud",
            Self::LastSessionGuard => "last_session_guard",
            Self::RoundTrip => "round_trip",
            Self::TitleDerivation => "title_derivation",
            Self::HeightClamp => "height_clamp",
            Self::HintTiming => "hint_timing",
            Self::SettingsShell => "settings_shell",
            Self::All => "all",
        }
    }
}

#[derive(Debug, Snafu)]
enum RunnerError {
    #[snafu(display("missing required --scenario argument"))]
    MissingScenario { stage: &'static str },
    #[snafu(display("missing value for argument '{arg}'"))]
    MissingArgumentValue {
        stage: &'static str,
        arg: &'static str,
    },
    #[snafu(display("unknown scenario '{raw}'"))]
    UnknownScenario { stage: &'static str, raw: String },
    #[snafu(display("unknown argument '{raw}'"))]
    UnknownArgument { stage: &'static str, raw: String },
    #[snafu(display("missing required --store argument for scenario '{scenario}'"))]
    MissingStorePath {
        stage: &'static str,
        scenario: &'static str,
    },
    #[snafu(display("scenario '{scenario}' failed: {reason}"))]
    ScenarioFailed {
        stage: &'static str,
        scenario: &'static str,
        reason: String,
    },
    #[snafu(display("file operation failed at '{path}': {source}"))]
    FileIo {
        stage: &'static str,
        path: String,
        source: std::io::Error,
    },
}

type RunnerResult<T> = Result<T, RunnerError>;

fn main() {
    tracing_subscriber::fmt::init();

    if let Err(error) = run() {
        println!("runner_ok=false");
        eprintln!("runner_error={error}");
        std::process::exit(1);
    }
}

fn run() -> RunnerResult<()> {
    let args = parse_args(env::args().skip(1))?;
    println!("scenario={}", args.scenario.name());
    if let Some(store_path) = args.store_path.as_deref() {
        println!("store_path={store_path}");
    }
    if let Some(settings_path) = args.settings_path.as_deref() {
        println!("settings_path={settings_path}");
    }

    match args.scenario {
        Scenario::DefaultLoad => run_default_load(require_store_path(&args, "default_load")?),
        Scenario::MalformedLoad => {
            run_malformed_load(require_store_path(&args, "malformed_load")?)
        }
        Scenario::SessionCrud => run_session_crud(require_store_path(&args, "session_crud")?),
        Scenario::LastSessionGuard => {
            run_last_session_guard(require_store_path(&args, "last_session_guard")?)
        }
        Scenario::RoundTrip => run_round_trip(require_store_path(&args, "round_trip")?),
        Scenario::TitleDerivation => run_title_derivation(),
        Scenario::HeightClamp => run_height_clamp(),
        Scenario::HintTiming => run_hint_timing(),
        Scenario::SettingsShell => run_settings_shell(
            require_store_path(&args, "settings_shell")?,
            args.settings_path.as_deref(),
        ),
        Scenario::All => run_all(args.store_path.as_deref(), args.settings_path.as_deref()),
    }
}

fn parse_args(args: impl IntoIterator<Item = String>) -> RunnerResult<RunnerArgs> {
    let mut scenario = None;
    let mut store_path = None;
    let mut settings_path = None;
    let mut pending = args.into_iter();

    while let Some(argument) = pending.next() {
        match argument.as_str() {
            "--scenario" => {
                let value = pending.next().context(MissingArgumentValueSnafu {
                    stage: "parse-args-scenario-value",
                    arg: "--scenario",
                })?;

                let parsed = Scenario::parse(&value).context(UnknownScenarioSnafu {
                    stage: "parse-args-scenario",
                    raw: value,
                })?;
                scenario = Some(parsed);
            }
            "--store" => {
                let value = pending.next().context(MissingArgumentValueSnafu {
                    stage: "parse-args-store-value",
                    arg: "--store",
                })?;
                store_path = Some(value);
            }
            "--settings" => {
                let value = pending.next().context(MissingArgumentValueSnafu {
                    stage: "parse-args-settings-value",
                    arg: "--settings",
                })?;
                settings_path = Some(value);
            }
            _ => {
                return UnknownArgumentSnafu {
                    stage: "parse-args",
                    raw: argument,
                }
                .fail();
            }
        }
    }

    Ok(RunnerArgs {
        scenario: scenario.context(MissingScenarioSnafu {
            stage: "parse-args-scenario-required",
        })?,
        store_path,
        settings_path,
    })
}

fn run_all(store_path: Option<&str>, settings_path: Option<&str>) -> RunnerResult<()> {
    run_title_derivation()?;
    run_height_clamp()?;
    run_hint_timing()?;

    if let Some(path) = store_path {
        run_default_load(path)?;
        run_malformed_load(path)?;
        run_session_crud(path)?;
        run_last_session_guard(path)?;
        run_round_trip(path)?;
        run_settings_shell(path, settings_path)?;
    }

    println!("all_passed=true");
    Ok(())
}

fn run_default_load(store_path: &str) -> RunnerResult<()> {
    reset_store_file(store_path)?;
    let repository = SessionRepository::load(JsonFileStore::open(store_path));

    let single_empty = repository.sessions().len() == 1 && repository.active_session().is_empty();
    println!("default_single_empty_session={single_empty}");
    ensure(single_empty, "default_load", "fresh store did not yield one empty session")?;

    println!("runner_ok=true");
    Ok(())
}

fn run_malformed_load(store_path: &str) -> RunnerResult<()> {
    reset_store_file(store_path)?;
    let mut store = JsonFileStore::open(store_path);
    store
        .set(SESSIONS_KEY, r#"{"sessions": "not a list"}"#.to_string())
        .map_err(|error| scenario_failed("malformed_load", error.to_string()))?;

    let repository = SessionRepository::load(JsonFileStore::open(store_path));
    let defaulted = repository.sessions().len() == 1 && repository.active_session().is_empty();
    println!("malformed_defaulted={defaulted}");
    ensure(defaulted, "malformed_load", "malformed session data was trusted")?;

    println!("runner_ok=true");
    Ok(())
}

fn run_session_crud(store_path: &str) -> RunnerResult<()> {
    reset_store_file(store_path)?;
    let mut repository = SessionRepository::load(JsonFileStore::open(store_path));

    for label in ["A", "B", "C"] {
        if label != "A" {
            repository.create();
        }
        repository
            .append_message(label)
            .map_err(|rejection| scenario_failed("session_crud", format!("{rejection:?}")))?;
    }

    let active_after_delete = repository
        .delete_at(2)
        .map_err(|rejection| scenario_failed("session_crud", format!("{rejection:?}")))?;
    println!("delete_active_last_active={active_after_delete}");
    ensure(
        active_after_delete == 1 && first_messages(&repository) == ["A", "B"],
        "session_crud",
        "deleting the active last session did not select its predecessor",
    )?;

    repository
        .switch_to(0)
        .map_err(|rejection| scenario_failed("session_crud", format!("{rejection:?}")))?;
    let out_of_range = repository.switch_to(9);
    println!("switch_out_of_range_refused={}", out_of_range.is_err());
    ensure(
        out_of_range.is_err() && repository.active_index() == 0,
        "session_crud",
        "out-of-range switch changed state",
    )?;

    let active_after_other_delete = repository
        .delete_at(1)
        .map_err(|rejection| scenario_failed("session_crud", format!("{rejection:?}")))?;
    println!("delete_after_active_active={active_after_other_delete}");
    ensure(
        active_after_other_delete == 0 && first_messages(&repository) == ["A"],
        "session_crud",
        "deleting a later session moved the active index",
    )?;

    println!("runner_ok=true");
    Ok(())
}

fn run_last_session_guard(store_path: &str) -> RunnerResult<()> {
    reset_store_file(store_path)?;
    let mut repository = SessionRepository::load(JsonFileStore::open(store_path));
    repository
        .append_message("only")
        .map_err(|rejection| scenario_failed("last_session_guard", format!("{rejection:?}")))?;

    let refused = repository.delete_at(0) == Err(SessionRejection::LastSession);
    println!("last_session_refused={refused}");
    ensure(
        refused && first_messages(&repository) == ["only"],
        "last_session_guard",
        "the last session was deleted",
    )?;

    println!("runner_ok=true");
    Ok(())
}

fn run_round_trip(store_path: &str) -> RunnerResult<()> {
    reset_store_file(store_path)?;
    let mut repository = SessionRepository::load(JsonFileStore::open(store_path));
    repository
        .append_message("first line\nsecond line")
        .map_err(|rejection| scenario_failed("round_trip", format!("{rejection:?}")))?;
    repository.create();
    repository.create();
    repository
        .append_message("tabs\tand \"quotes\"")
        .map_err(|rejection| scenario_failed("round_trip", format!("{rejection:?}")))?;
    let expected = repository.sessions().clone();

    let reloaded = SessionRepository::load(JsonFileStore::open(store_path));
    let round_trip = reloaded.sessions() == &expected;
    println!("round_trip={round_trip}");
    ensure(round_trip, "round_trip", "reloaded sessions differ from persisted ones")?;

    println!("runner_ok=true");
    Ok(())
}

fn run_title_derivation() -> RunnerResult<()> {
    let long_title = Session::with_messages(vec!["x".repeat(40)]).title();
    let empty_title = Session::new().title();
    println!("long_title={long_title}");
    println!("empty_title={empty_title}");

    ensure(
        long_title == format!("{}...", "x".repeat(32)) && empty_title == DEFAULT_SESSION_TITLE,
        "title_derivation",
        "titles were not derived from the first message",
    )?;

    println!("runner_ok=true");
    Ok(())
}

fn run_height_clamp() -> RunnerResult<()> {
    let mut tall = Composer::new(|text: &str| -> f32 { if text.is_empty() { 48.0 } else { 500.0 } });
    tall.update_draft("tall");
    let mut short = Composer::new(|text: &str| -> f32 { if text.is_empty() { 48.0 } else { 12.0 } });
    short.update_draft("s");
    println!("tall_height={}", tall.height());
    println!("short_height={}", short.height());

    ensure(
        tall.height() == MAX_HEIGHT && short.height() == short.baseline_height(),
        "height_clamp",
        "composer height escaped [baseline, cap]",
    )?;

    println!("runner_ok=true");
    Ok(())
}

fn run_hint_timing() -> RunnerResult<()> {
    let mut sink = Vec::<String>::new();
    let now = Instant::now();

    let mut explicit = Composer::new(LineMetrics::default());
    explicit.submit(TriggerSource::Explicit, now, &mut sink);
    let explicit_ok = !explicit.expire_due(now + Duration::from_millis(1_999))
        && explicit.expire_due(now + Duration::from_millis(2_000));

    let mut keyboard = Composer::new(LineMetrics::default());
    keyboard.key_down(KeyPress::enter(), now, &mut sink);
    let keyboard_ok = !keyboard.expire_due(now + Duration::from_millis(4_999))
        && keyboard.expire_due(now + Duration::from_millis(5_000));

    let mut typed = Composer::new(LineMetrics::default());
    let shown = typed.submit(TriggerSource::Keyboard, now, &mut sink);
    typed.update_draft("a");
    let typing_ok =
        matches!(shown, SubmitOutcome::HintShown { .. }) && typed.hint() == HintState::Hidden;

    println!("explicit_hint_2000ms={explicit_ok}");
    println!("keyboard_hint_5000ms={keyboard_ok}");
    println!("typing_hides_hint={typing_ok}");
    ensure(
        explicit_ok && keyboard_ok && typing_ok && sink.is_empty(),
        "hint_timing",
        "hint deadlines did not match their trigger source",
    )?;

    println!("runner_ok=true");
    Ok(())
}

fn run_settings_shell(store_path: &str, settings_path: Option<&str>) -> RunnerResult<()> {
    reset_store_file(store_path)?;
    let settings_store = match settings_path {
        Some(path) => SettingsStore::new(path.into()),
        None => SettingsStore::load(),
    };
    println!("settings_file={}", settings_store.config_path().display());

    // The runner never touches the configured chat store.
    let mut settings = (*settings_store.settings()).clone();
    settings.store_path = store_path.into();

    let mut shell = ChatShell::from_settings(&settings);
    let baseline = shell.view_state().composer_height;
    shell.update_draft("from settings");
    shell.submit(TriggerSource::Explicit);
    let store = shell.shutdown();

    let reopened = SessionRepository::load(JsonFileStore::open(store.path()));
    let persisted = reopened.active_session().first_message() == Some("from settings");
    println!("theme={}", settings.theme_mode.name());
    println!("baseline_height={baseline}");
    println!("persisted={persisted}");

    ensure(
        baseline > 0.0 && baseline <= MAX_HEIGHT,
        "settings_shell",
        "configured baseline escaped the height cap",
    )?;
    ensure(
        persisted,
        "settings_shell",
        "message did not reach the configured store",
    )?;

    println!("runner_ok=true");
    Ok(())
}

fn first_messages(repository: &SessionRepository<JsonFileStore>) -> Vec<String> {
    repository
        .sessions()
        .iter()
        .map(|session| session.first_message().unwrap_or_default().to_string())
        .collect()
}

fn reset_store_file(store_path: &str) -> RunnerResult<()> {
    let path = Path::new(store_path);
    if path.exists() {
        std::fs::remove_file(path).context(FileIoSnafu {
            stage: "reset-store-file",
            path: store_path.to_string(),
        })?;
    }
    Ok(())
}

fn ensure(condition: bool, scenario: &'static str, reason: &str) -> RunnerResult<()> {
    if condition {
        return Ok(());
    }

    ScenarioFailedSnafu {
        stage: "scenario-assert",
        scenario,
        reason: reason.to_string(),
    }
    .fail()
}

fn scenario_failed(scenario: &'static str, reason: String) -> RunnerError {
    RunnerError::ScenarioFailed {
        stage: "scenario-step",
        scenario,
        reason,
    }
}

fn require_store_path<'a>(
    args: &'a RunnerArgs,
    scenario: &'static str,
) -> RunnerResult<&'a str> {
    args.store_path.as_deref().context(MissingStorePathSnafu {
        stage: "require-store-path",
        scenario,
    })
}
