mod engine;
mod progress;
mod registry;
mod session;

// Public API of the session subsystem.
pub use crate::error::AssessmentError;
pub use engine::AssessmentEngine;
pub use progress::SessionProgress;
pub use registry::SessionRegistry;
pub use session::{AssessmentSession, QuestionTicket, SessionPrompt, SessionStep};
