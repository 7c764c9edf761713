pub mod config;
pub mod dom;

pub use config::{BrowserConfig, Config, GeneratorConfig, Viewport};
pub use dom::{AccessibleName, AriaState, AriaStateValue, DomCapabilities, ElementText};
