pub mod arxiv;

pub use arxiv::{ArxivId, find_arxiv_token, strip_version};
