pub mod answers;
mod ids;
mod lead;
mod record;

pub use answers::{AnswerValue, AnswersError, QuizAnswers, compare_question_keys};
pub use ids::{
    MAX_SESSION_ID_LEN, SERVER_SESSION_ID, SESSION_ID_PREFIX, SessionId, SessionIdError,
};
pub use lead::{LeadStatus, LeadStatusError};
pub use record::{INITIAL_DROP_OFF_PAGE, SessionRecord, SessionSave, SubmissionDraft};
