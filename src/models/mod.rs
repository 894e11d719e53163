pub mod document;
pub mod loaders;
pub mod mcq;
pub mod model_candidate;
pub mod processing_result;

pub use document::Document;
pub use loaders::{load_text_document, load_text_documents, LoadedText};
pub use mcq::{Mcq, McqError, OPTION_COUNT};
pub use model_candidate::{InvocationParams, ModelCandidate, PromptTemplate, Task};
pub use processing_result::{ProcessingResult, MCQ_COUNT};
