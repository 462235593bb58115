#![forbid(unsafe_code)]

pub mod assessment;
pub mod error;
pub mod model;
pub mod roadmap;
pub mod settings;
pub mod time;

pub use assessment::{LessonAssessment, LessonAssessmentError, LessonState, LessonStep};
pub use error::Error;
pub use roadmap::RoadmapSynthesizer;
pub use settings::{AssessmentSettings, PhaseEstimate, SettingsError};
pub use time::Clock;
