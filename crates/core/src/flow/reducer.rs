use std::time::Duration;

use thiserror::Error;

use crate::model::SubmissionDraft;

use super::config::{EmailCapture, FlowConfig};
use super::screen::Screen;
use super::state::FlowState;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Rejections from the reducer. The state is left untouched when one is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FlowError {
    #[error("flow has not been started")]
    NotStarted,

    #[error("flow was already started")]
    AlreadyStarted,

    #[error("{event} is not valid on the {screen} screen")]
    UnexpectedEvent { screen: Screen, event: &'static str },

    #[error("a submission is still in flight")]
    Busy,

    #[error("no submission is in flight")]
    NotSubmitting,

    #[error("question {0} takes a single answer")]
    NotMultiSelect(usize),

    #[error("question {0} takes several answers")]
    NotSingleSelect(usize),

    #[error("answer option cannot be empty")]
    EmptyOption,

    #[error("select at least one option")]
    EmptySelection,

    #[error("email address is invalid")]
    InvalidEmail,

    #[error("privacy consent is required")]
    ConsentRequired,

    #[error("name cannot be empty")]
    EmptyName,

    #[error("already at the first question")]
    AtStart,
}

//
// ─── EVENTS & COMMANDS ─────────────────────────────────────────────────────────
//

/// User interactions (and settled saves) that drive the funnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    /// Page load: the funnel starts on the first question.
    Start,
    /// Click on an option of a single-select question.
    SelectOption(String),
    /// Click on an option of a multi-select question.
    ToggleOption(String),
    /// Commit the current multi-select choices.
    ContinueMulti,
    /// "Continue" on an interstitial or post-quiz page.
    Continue,
    SubmitEmail {
        email: String,
        privacy_consent: bool,
        marketing_consent: bool,
    },
    SubmitName(String),
    /// The in-flight contact save finished; `saved` is false when it failed.
    SubmissionSettled { saved: bool },
    /// "Get My Plan" on the selling page.
    GetMyPlan,
    Back,
}

impl FlowEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            FlowEvent::Start => "start",
            FlowEvent::SelectOption(_) => "select_option",
            FlowEvent::ToggleOption(_) => "toggle_option",
            FlowEvent::ContinueMulti => "continue_multi",
            FlowEvent::Continue => "continue",
            FlowEvent::SubmitEmail { .. } => "submit_email",
            FlowEvent::SubmitName(_) => "submit_name",
            FlowEvent::SubmissionSettled { .. } => "submission_settled",
            FlowEvent::GetMyPlan => "get_my_plan",
            FlowEvent::Back => "back",
        }
    }
}

/// Best-effort persistence requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingCommand {
    CreateSession,
    UpdateDropOff(String),
    MarkLead,
    SaveSubmission(SubmissionDraft),
}

/// Result of applying one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: FlowState,
    pub commands: Vec<TrackingCommand>,
    /// Delay the UI should wait before showing the new screen (auto-advance).
    pub advance_after: Option<Duration>,
}

//
// ─── REDUCER ───────────────────────────────────────────────────────────────────
//

/// Maps `(state, event)` to the next state plus the tracking it requires.
///
/// # Errors
///
/// Returns `FlowError` when the event is not allowed in the current state.
pub fn reduce(
    config: &FlowConfig,
    state: &FlowState,
    event: FlowEvent,
) -> Result<Transition, FlowError> {
    let mut next = state.clone();
    let mut commands = Vec::new();
    let mut advance_after = None;

    match event {
        FlowEvent::Start => {
            if state.started {
                return Err(FlowError::AlreadyStarted);
            }
            next.started = true;
            commands.push(TrackingCommand::CreateSession);
        }
        _ if !state.started => return Err(FlowError::NotStarted),
        FlowEvent::SubmissionSettled { .. } => {
            if !state.submitting {
                return Err(FlowError::NotSubmitting);
            }
            let target = match state.screen {
                Screen::Email => Screen::Name,
                Screen::Name => Screen::Scratch,
                screen => {
                    return Err(FlowError::UnexpectedEvent {
                        screen,
                        event: "submission_settled",
                    });
                }
            };
            next.submitting = false;
            enter(config, &mut next, target, &mut commands);
        }
        _ if state.submitting => return Err(FlowError::Busy),
        FlowEvent::SelectOption(option) => {
            let question = current_question(state, "select_option")?;
            if config.is_multi_select(question) {
                return Err(FlowError::NotSingleSelect(question));
            }
            let option = non_empty(&option).ok_or(FlowError::EmptyOption)?;
            next.answers.record(question, option);
            if advance_from_question(config, &mut next, &mut commands) {
                advance_after = Some(config.advance_delay());
            }
        }
        FlowEvent::ToggleOption(option) => {
            let question = current_question(state, "toggle_option")?;
            if !config.is_multi_select(question) {
                return Err(FlowError::NotMultiSelect(question));
            }
            let option = non_empty(&option).ok_or(FlowError::EmptyOption)?;
            if let Some(pos) = next.selection.iter().position(|o| o == option) {
                next.selection.remove(pos);
            } else {
                next.selection.push(option.to_owned());
            }
        }
        FlowEvent::ContinueMulti => {
            let question = current_question(state, "continue_multi")?;
            if !config.is_multi_select(question) {
                return Err(FlowError::NotMultiSelect(question));
            }
            if state.selection.is_empty() {
                return Err(FlowError::EmptySelection);
            }
            next.answers.record(question, state.selection.clone());
            advance_from_question(config, &mut next, &mut commands);
        }
        FlowEvent::Continue => {
            let screen = state.screen;
            if screen.resumes_quiz() {
                resume_quiz(config, &mut next, &mut commands);
            } else if let Some(target) = screen.continues_to() {
                enter(config, &mut next, target, &mut commands);
            } else {
                return Err(FlowError::UnexpectedEvent {
                    screen,
                    event: "continue",
                });
            }
        }
        FlowEvent::SubmitEmail {
            email,
            privacy_consent,
            marketing_consent,
        } => {
            expect_screen(state, Screen::Email, "submit_email")?;
            let email = validate_email(&email)?;
            if !privacy_consent {
                return Err(FlowError::ConsentRequired);
            }
            next.contact.email = Some(email.to_owned());
            next.contact.privacy_consent = privacy_consent;
            next.contact.marketing_consent = marketing_consent;
            match config.email_capture {
                EmailCapture::Immediate => {
                    let draft = next.submission_draft().ok_or(FlowError::InvalidEmail)?;
                    next.submitting = true;
                    commands.push(TrackingCommand::SaveSubmission(draft));
                }
                EmailCapture::Deferred => enter(config, &mut next, Screen::Name, &mut commands),
            }
        }
        FlowEvent::SubmitName(name) => {
            expect_screen(state, Screen::Name, "submit_name")?;
            let name = non_empty(&name).ok_or(FlowError::EmptyName)?;
            next.contact.name = Some(name.to_owned());
            let draft = next.submission_draft().ok_or(FlowError::InvalidEmail)?;
            next.submitting = true;
            commands.push(TrackingCommand::SaveSubmission(draft));
        }
        FlowEvent::GetMyPlan => {
            expect_screen(state, Screen::Selling, "get_my_plan")?;
            next.lead = true;
            commands.push(TrackingCommand::MarkLead);
        }
        FlowEvent::Back => go_back(config, &mut next, &mut commands)?,
    }

    Ok(Transition {
        state: next,
        commands,
        advance_after,
    })
}

fn current_question(state: &FlowState, event: &'static str) -> Result<usize, FlowError> {
    expect_screen(state, Screen::Question, event)?;
    Ok(state.question)
}

fn expect_screen(state: &FlowState, screen: Screen, event: &'static str) -> Result<(), FlowError> {
    if state.screen == screen {
        Ok(())
    } else {
        Err(FlowError::UnexpectedEvent {
            screen: state.screen,
            event,
        })
    }
}

fn non_empty(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn validate_email(raw: &str) -> Result<&str, FlowError> {
    let email = non_empty(raw).ok_or(FlowError::InvalidEmail)?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(FlowError::InvalidEmail),
    }
}

fn enter(
    config: &FlowConfig,
    next: &mut FlowState,
    screen: Screen,
    commands: &mut Vec<TrackingCommand>,
) {
    next.screen = screen;
    if screen == Screen::Question {
        next.restore_selection(config);
    } else {
        next.selection.clear();
    }
    commands.push(TrackingCommand::UpdateDropOff(next.drop_off_label()));
}

/// Leaves the held question: checkpoint page, end of quiz, or the next question.
///
/// Returns true when the next question is shown (the auto-advance case).
fn advance_from_question(
    config: &FlowConfig,
    next: &mut FlowState,
    commands: &mut Vec<TrackingCommand>,
) -> bool {
    if let Some(page) = config.checkpoint_after(next.question) {
        enter(config, next, page.screen(), commands);
        return false;
    }
    resume_quiz(config, next, commands)
}

fn resume_quiz(
    config: &FlowConfig,
    next: &mut FlowState,
    commands: &mut Vec<TrackingCommand>,
) -> bool {
    if next.question >= config.last_question() {
        enter(config, next, Screen::PersonalPlan, commands);
        return false;
    }
    next.question += 1;
    enter(config, next, Screen::Question, commands);
    true
}

fn go_back(
    config: &FlowConfig,
    next: &mut FlowState,
    commands: &mut Vec<TrackingCommand>,
) -> Result<(), FlowError> {
    let target = match next.screen {
        Screen::Question => {
            if next.question == 0 {
                return Err(FlowError::AtStart);
            }
            next.question -= 1;
            checkpoint_or_question(config, next.question)
        }
        // Interstitials hold the checkpoint question, so going back simply shows it again.
        screen if screen.resumes_quiz() => Screen::Question,
        Screen::PersonalPlan => {
            next.question = config.last_question();
            checkpoint_or_question(config, next.question)
        }
        screen => screen.chain_predecessor().ok_or(FlowError::UnexpectedEvent {
            screen,
            event: "back",
        })?,
    };
    enter(config, next, target, commands);
    Ok(())
}

/// Screen shown when stepping back onto `question`: its checkpoint page if it has one.
fn checkpoint_or_question(config: &FlowConfig, question: usize) -> Screen {
    config
        .checkpoint_after(question)
        .map_or(Screen::Question, |page| page.screen())
}
