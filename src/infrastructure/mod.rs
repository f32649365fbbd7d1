pub mod js_executor;

pub use js_executor::{Evaluator, ExecutionBindings, JsExecutor, ALLOWED_FACILITIES};
