mod document;
mod extract;
mod markers;

pub use document::{Corpus, DirectoryCorpus, Document, LoadedCorpus};
pub use extract::GraphExtractor;
pub use markers::DEFAULT_LINK_PREFIX;
