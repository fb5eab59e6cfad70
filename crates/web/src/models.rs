//! View models for the page templates.
//! Typed structs the templates render; lookup logic lives in `common::lookup`.

use common::lookup::{
    LookupOutcome, ScoreCard, EMPTY_INPUT_MESSAGE, FOUND_MESSAGE, NOT_FOUND_MESSAGE,
};

/// Content of the result region under the form. At most one of the fields is set.
#[derive(Debug, Default)]
pub struct ResultView {
    /// Yellow banner: empty input
    pub warning: Option<String>,
    /// Red banner: unknown wallet or no data
    pub error: Option<String>,
    /// Green block: wallet found
    pub card: Option<CardView>,
}

#[derive(Debug)]
pub struct CardView {
    pub headline: String,
    pub card: ScoreCard,
}

impl ResultView {
    pub fn unavailable(message: String) -> Self {
        Self {
            error: Some(message),
            ..Self::default()
        }
    }
}

impl From<&LookupOutcome<'_>> for ResultView {
    fn from(outcome: &LookupOutcome<'_>) -> Self {
        match outcome {
            LookupOutcome::EmptyInput => Self {
                warning: Some(EMPTY_INPUT_MESSAGE.to_string()),
                ..Self::default()
            },
            LookupOutcome::Found { address, record } => Self {
                card: Some(CardView {
                    headline: FOUND_MESSAGE.to_string(),
                    card: ScoreCard::from_record(address, record),
                }),
                ..Self::default()
            },
            LookupOutcome::NotFound { .. } => Self {
                error: Some(NOT_FOUND_MESSAGE.to_string()),
                ..Self::default()
            },
        }
    }
}
