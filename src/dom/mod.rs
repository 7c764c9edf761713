pub mod element;
pub mod processor;
pub mod text;

pub use element::{ElementSummary, TreeLinks};
pub use processor::HtmlCapabilities;
