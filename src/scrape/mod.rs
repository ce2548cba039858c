mod extractor;
mod fetcher;
mod normalizer;

pub use extractor::{Candidate, Extractor};
pub use fetcher::PageFetcher;
pub use normalizer::Normalizer;
