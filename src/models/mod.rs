pub mod context;
pub mod page;
pub mod plan;
pub mod record;

pub use context::{IngestedDataContext, RawRecord, Table};
pub use page::{AnswerMeta, PageLink, QuizPage};
pub use plan::{AnswerType, DataSourceDescriptor, Plan, SourceFormat, SourceKind};
pub use record::{QuizStepRecord, SubmissionResponse};
