#![forbid(unsafe_code)]

pub mod error;
pub mod sessions;
pub mod sink;
pub mod timer;

pub use assess_core::Clock;
pub use sessions as session;

pub use error::AssessmentError;
pub use sink::{ChannelSink, RepositorySink, ResultSink, SinkError};
pub use timer::{ExpiryFuture, ManualTimer, TimerHandle, TimerService, TokioTimer};

pub use sessions::{
    AssessmentEngine, AssessmentSession, QuestionTicket, SessionProgress, SessionPrompt,
    SessionRegistry, SessionStep,
};
