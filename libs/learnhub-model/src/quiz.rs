//! Quiz answer options are persisted as JSON array text in a single column.

use crate::entities::Quiz;
use crate::ModelError;

pub fn encode_options(options: &[String]) -> String {
    serde_json::to_string(options).unwrap_or_else(|_| "[]".to_string())
}

pub fn decode_options(raw: &str) -> Result<Vec<String>, ModelError> {
    serde_json::from_str::<Vec<String>>(raw).map_err(|err| ModelError::InvalidOptions(err.to_string()))
}

/// Checks that the options decode, are non-empty, and that the correct answer
/// indexes into them.
pub fn validate_quiz(quiz: &Quiz) -> Result<(), ModelError> {
    let options = decode_options(&quiz.options)?;
    if options.is_empty() {
        return Err(ModelError::InvalidOptions("no answer options".into()));
    }
    if quiz.correct_answer as usize >= options.len() {
        return Err(ModelError::AnswerOutOfRange {
            index: quiz.correct_answer,
            len: options.len(),
        });
    }
    Ok(())
}

impl Quiz {
    pub fn options(&self) -> Result<Vec<String>, ModelError> {
        decode_options(&self.options)
    }

    /// Points awarded for answering with `selected`.
    pub fn grade(&self, selected: u32) -> u32 {
        if selected == self.correct_answer {
            self.points
        } else {
            0
        }
    }
}
