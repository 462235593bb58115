mod ids;
mod module;
mod question;
mod response;
mod result;
mod roadmap;
mod session;
mod summary;

pub use ids::{ModuleId, ParseIdError, QuestionId, SessionId};

pub use module::{Lesson, Module, ModuleError, check_lessons};
pub use question::{DifficultyRank, Question, QuestionError};
pub use response::Response;
pub use result::{LearningCategory, LessonResult, LessonResultError, PaceBand};
pub use roadmap::{Roadmap, RoadmapPhase};
pub use session::{AssessmentOutcome, SessionPhase, SessionState, SessionStateError};
pub use summary::{AssessmentSummary, DifficultyBreakdown};
