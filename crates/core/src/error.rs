use thiserror::Error;

use crate::flow::{FlowConfigError, FlowError};
use crate::model::{AnswersError, LeadStatusError, SessionIdError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    SessionId(#[from] SessionIdError),
    #[error(transparent)]
    Answers(#[from] AnswersError),
    #[error(transparent)]
    LeadStatus(#[from] LeadStatusError),
    #[error(transparent)]
    Flow(#[from] FlowError),
    #[error(transparent)]
    FlowConfig(#[from] FlowConfigError),
}
