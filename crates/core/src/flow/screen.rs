use serde::{Deserialize, Serialize};
use std::fmt;

/// The one screen the funnel is showing.
///
/// Exactly one variant is active at a time, so "teaser and email both visible"
/// cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    /// A quiz question; which one is tracked by the held question index.
    Question,
    Teaser,
    End,
    UserProfile,
    PersonalPlan,
    Magic,
    Email,
    Name,
    Scratch,
    /// Terminal sales page carrying the "Get My Plan" button.
    Selling,
}

impl Screen {
    /// Label written to `drop_off_page` when this screen is entered.
    ///
    /// Questions are numbered from 1 (`question_1` is the first question).
    #[must_use]
    pub fn drop_off_label(self, question: usize) -> String {
        match self {
            Screen::Question => format!("question_{}", question + 1),
            other => format!("{}_page", other.slug()),
        }
    }

    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            Screen::Question => "question",
            Screen::Teaser => "teaser",
            Screen::End => "end",
            Screen::UserProfile => "user_profile",
            Screen::PersonalPlan => "personal_plan",
            Screen::Magic => "magic",
            Screen::Email => "email",
            Screen::Name => "name",
            Screen::Scratch => "scratch",
            Screen::Selling => "selling",
        }
    }

    /// Interstitials shown at a checkpoint; continuing resumes the quiz.
    #[must_use]
    pub fn resumes_quiz(self) -> bool {
        matches!(self, Screen::Teaser | Screen::End | Screen::UserProfile)
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Screen::Selling)
    }

    /// Successor in the post-quiz chain, for screens advanced by a plain "continue".
    ///
    /// Email and name advance through their own submit events instead.
    #[must_use]
    pub(crate) fn continues_to(self) -> Option<Screen> {
        match self {
            Screen::PersonalPlan => Some(Screen::Magic),
            Screen::Magic => Some(Screen::Email),
            Screen::Scratch => Some(Screen::Selling),
            _ => None,
        }
    }

    /// Predecessor in the post-quiz chain; mirror image of the forward order.
    #[must_use]
    pub(crate) fn chain_predecessor(self) -> Option<Screen> {
        match self {
            Screen::Magic => Some(Screen::PersonalPlan),
            Screen::Email => Some(Screen::Magic),
            Screen::Name => Some(Screen::Email),
            Screen::Scratch => Some(Screen::Name),
            Screen::Selling => Some(Screen::Scratch),
            _ => None,
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Interstitial pages that can be attached to a question checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interstitial {
    Teaser,
    End,
    UserProfile,
}

impl Interstitial {
    #[must_use]
    pub fn screen(self) -> Screen {
        match self {
            Interstitial::Teaser => Screen::Teaser,
            Interstitial::End => Screen::End,
            Interstitial::UserProfile => Screen::UserProfile,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_one_based_for_questions() {
        assert_eq!(Screen::Question.drop_off_label(0), "question_1");
        assert_eq!(Screen::Question.drop_off_label(2), "question_3");
        assert_eq!(Screen::UserProfile.drop_off_label(16), "user_profile_page");
        assert_eq!(Screen::Selling.drop_off_label(19), "selling_page");
    }

    #[test]
    fn back_chain_mirrors_forward_chain() {
        let forward = [
            Screen::PersonalPlan,
            Screen::Magic,
            Screen::Email,
            Screen::Name,
            Screen::Scratch,
            Screen::Selling,
        ];
        for pair in forward.windows(2) {
            assert_eq!(pair[1].chain_predecessor(), Some(pair[0]));
        }
        assert_eq!(Screen::PersonalPlan.chain_predecessor(), None);
    }
}
