pub mod text_loader;

pub use text_loader::{load_text_document, load_text_documents, normalize_whitespace, LoadedText};
