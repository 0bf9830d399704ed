pub mod classifier;
pub mod counter;
pub mod form;
pub mod geometry;
pub mod session;
pub mod types;

pub use classifier::classify;
pub use counter::{RepCounter, RepUpdate};
pub use form::{validate, FormVerdict};
pub use session::AnalysisSession;
pub use types::{supported_exercises, ExerciseType, FrameResult, Phase, SessionResult};
