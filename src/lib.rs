pub mod browser;
pub mod core;
pub mod dom;
pub mod errors;
pub mod generator;
pub mod query;
pub mod testing;
pub mod types;

#[cfg(feature = "chrome")]
pub use browser::ChromeSource;
pub use browser::{FileSource, HtmlSource, InlineSource, LoadedPage};
pub use core::{BrowserConfig, Config, DomCapabilities, GeneratorConfig, Viewport};
pub use dom::{ElementSummary, HtmlCapabilities};
pub use errors::{Result, SelectorError};
pub use generator::{generate_selector, GenerateOptions, GeneratedSelector, SelectorGenerator};
pub use query::{parse_selector, query_selector_all, QueryEngine};
pub use types::SelectorReport;
