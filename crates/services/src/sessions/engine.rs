use std::sync::Arc;

use assess_core::model::{Module, ModuleId};
use assess_core::{AssessmentSettings, Clock};
use storage::repository::QuestionBank;

use super::session::{AssessmentSession, SessionDeps, SessionStep};
use crate::error::AssessmentError;
use crate::sink::ResultSink;
use crate::timer::TimerService;

/// Wires the question bank, timer and result sink into new sessions.
///
/// Sessions started from the same engine share only these collaborators.
#[derive(Clone)]
pub struct AssessmentEngine {
    deps: SessionDeps,
}

impl AssessmentEngine {
    #[must_use]
    pub fn new(
        bank: Arc<dyn QuestionBank>,
        timer: Arc<dyn TimerService>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            deps: SessionDeps {
                clock: Clock::default(),
                bank,
                timer,
                sink,
                settings: AssessmentSettings::default(),
            },
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.deps.clock = clock;
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: AssessmentSettings) -> Self {
        self.deps.settings = settings;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &AssessmentSettings {
        &self.deps.settings
    }

    /// A fresh session awaiting module selection.
    #[must_use]
    pub fn new_session(&self) -> AssessmentSession {
        AssessmentSession::new(Arc::new(self.deps.clone()))
    }

    /// Create a session and select `module_id` in one step.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError` from [`AssessmentSession::select_module`].
    pub async fn start_session(
        &self,
        module_id: ModuleId,
    ) -> Result<(AssessmentSession, SessionStep), AssessmentError> {
        let session = self.new_session();
        let step = session.select_module(module_id).await?;
        Ok((session, step))
    }

    /// Modules available for assessment.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::Storage` if the catalog cannot be read.
    pub async fn list_modules(&self) -> Result<Vec<Module>, AssessmentError> {
        self.deps
            .bank
            .list_modules()
            .await
            .map_err(|e| AssessmentError::from_bank(e, || "module list".to_owned()))
    }
}
