pub mod answer_synthesizer;
pub mod data_ingestor;
pub mod llm_service;
pub mod plan_interpreter;
pub mod secret_code;
pub mod submission;
pub mod tabular;

pub use answer_synthesizer::{AnswerSynthesizer, PreviewLimits};
pub use data_ingestor::{DataSourceIngestor, HttpDownloader, ResourceDownloader};
pub use llm_service::{CodeSynthesizer, LlmService, Planner, SynthesisRequest};
pub use plan_interpreter::{interpret_plan, resolve_plan_urls, resolve_url};
pub use submission::{AnswerSubmitter, Submission, SubmissionClient};
