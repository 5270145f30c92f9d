mod config;
mod controller;
mod reducer;
mod screen;
mod state;

pub use config::{
    Checkpoint, DEFAULT_ADVANCE_DELAY_MS, DEFAULT_QUESTION_COUNT, EmailCapture, FlowConfig,
    FlowConfigError,
};
pub use controller::{FlowOutput, QuizFlow};
pub use reducer::{FlowError, FlowEvent, TrackingCommand, Transition, reduce};
pub use screen::{Interstitial, Screen};
pub use state::{ContactDetails, FlowProgress, FlowState};
