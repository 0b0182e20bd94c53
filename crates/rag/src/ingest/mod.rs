//! Document ingestion: PDF extraction, chunking and indexing.

pub mod chunker;
pub mod pdf;
pub mod pipeline;

pub use chunker::chunk_text;
pub use pdf::{load_pdf, PdfPage};
pub use pipeline::{ingest_folder, IngestConfig};
