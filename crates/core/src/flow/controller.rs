use std::time::Duration;

use super::config::{FlowConfig, FlowConfigError};
use super::reducer::{FlowError, FlowEvent, TrackingCommand, reduce};
use super::screen::Screen;
use super::state::{FlowProgress, FlowState};

/// What the caller has to do after a successful event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlowOutput {
    pub commands: Vec<TrackingCommand>,
    pub advance_after: Option<Duration>,
}

/// Owns a validated config and the current state; applies events through `reduce`.
#[derive(Debug, Clone)]
pub struct QuizFlow {
    config: FlowConfig,
    state: FlowState,
}

impl Default for QuizFlow {
    fn default() -> Self {
        Self {
            config: FlowConfig::default(),
            state: FlowState::new(),
        }
    }
}

impl QuizFlow {
    /// # Errors
    ///
    /// Returns `FlowConfigError` if the config is inconsistent.
    pub fn new(config: FlowConfig) -> Result<Self, FlowConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            state: FlowState::new(),
        })
    }

    /// Applies one event. On error the state is unchanged.
    ///
    /// # Errors
    ///
    /// Returns `FlowError` when the event is not valid on the current screen.
    pub fn apply(&mut self, event: FlowEvent) -> Result<FlowOutput, FlowError> {
        let transition = reduce(&self.config, &self.state, event)?;
        self.state = transition.state;
        Ok(FlowOutput {
            commands: transition.commands,
            advance_after: transition.advance_after,
        })
    }

    #[must_use]
    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> &FlowState {
        &self.state
    }

    #[must_use]
    pub fn screen(&self) -> Screen {
        self.state.screen()
    }

    #[must_use]
    pub fn progress(&self) -> FlowProgress {
        self.state.progress(&self.config)
    }

    #[must_use]
    pub fn is_multi_select(&self) -> bool {
        self.state.screen() == Screen::Question && self.config.is_multi_select(self.state.question())
    }
}
