mod answer;
mod countdown;
mod ids;
mod integrity;
mod question;
mod session;
mod submission;

pub use ids::{ParseIdError, QuestionId, QuizId, SessionId};

pub use answer::{AnswerSlot, AnswerStore};
pub use countdown::{Countdown, Tick};
pub use integrity::{
    EnvironmentSignal, Incident, IntegrityEvent, IntegrityEventKind, IntegrityLog, KeyCombo,
    SignalDisposition, classify,
};
pub use question::{Question, QuestionError, QuestionKind, Quiz, QuizError};
pub use session::{
    LockedMode, Session, SessionSnapshot, SessionState, SessionStateError, SubmitOutcome,
    SubmitTrigger, TickOutcome,
};
pub use submission::{
    GradeReport, Provenance, QuestionGrade, QuestionOutcome, SubmissionPayload, SubmissionResult,
    SubmittedAnswer,
};
