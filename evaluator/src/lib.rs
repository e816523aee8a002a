pub mod config;
pub mod error;
pub mod navigation;
pub mod report;
pub mod runner;
pub mod session;
pub mod sink;
pub mod stabilizer;
pub mod suite;

pub use config::{ChatSelectors, EvalConfig, Locator, Selectors, SinkConfig, Timeouts};
pub use error::{
    ConfigError, RunError, RunResult, SessionError, SessionResult, SinkError, SinkResult,
    SuiteError,
};
pub use navigation::{detect_state, PageState};
pub use report::{recommendations, worst_items, write_report};
pub use runner::{ItemOutcome, PerItemResult, RunOutcome, Runner};
pub use session::{login, BrowserSession, ChatSurface, Credentials};
pub use sink::SinkClient;
pub use stabilizer::{await_stable_answer, StabilizedAnswer, StabilizerSettings};
pub use suite::{load_suite, SuiteItem};
