pub mod quiz_step;
pub mod step_ctx;
pub mod time_budget;

pub use quiz_step::{QuizStepFlow, StepOutcome};
pub use step_ctx::StepCtx;
pub use time_budget::TimeBudget;
