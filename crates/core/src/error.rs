use thiserror::Error;

use crate::grading::GradingError;
use crate::model::{QuestionError, QuizError, SessionStateError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Session(#[from] SessionStateError),
    #[error(transparent)]
    Grading(#[from] GradingError),
}
