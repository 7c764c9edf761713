use crate::errors::{Result, SelectorError};
use crate::generator::{generate_selector, GenerateOptions, GeneratedSelector};
use crate::query::query_selector_all;
use crate::dom::HtmlCapabilities;
use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};

pub struct TestHelper;

impl TestHelper {
    pub fn parse(source: &str) -> Html {
        Html::parse_document(source)
    }

    /// All elements matching a plain CSS selector, in document order.
    pub fn find_all<'a>(html: &'a Html, css: &str) -> Result<Vec<ElementRef<'a>>> {
        let selector = Selector::parse(css).map_err(|e| SelectorError::invalid_selector(css, format!("{:?}", e)))?;
        Ok(html.select(&selector).collect())
    }

    pub fn find<'a>(html: &'a Html, css: &str) -> Result<ElementRef<'a>> {
        Self::find_all(html, css)?
            .into_iter()
            .next()
            .ok_or_else(|| SelectorError::ElementNotFound(css.to_string()))
    }

    pub fn generate(html: &Html, css: &str, options: &GenerateOptions) -> Result<GeneratedSelector> {
        let target = Self::find(html, css)?;
        generate_selector(html, target, options)
    }

    /// Generates a selector for the element at `css` and checks that querying
    /// it again selects exactly that element.
    pub fn generate_and_verify(html: &Html, css: &str, options: &GenerateOptions) -> Result<GeneratedSelector> {
        let target = Self::find(html, css)?;
        let generated = generate_selector(html, target, options)?;
        let caps = HtmlCapabilities::new(html);
        let requeried = query_selector_all(html, &caps, options.root, &generated.selector, &options.config)?;
        if requeried != generated.elements || requeried != vec![target.id()] {
            return Err(SelectorError::ElementNotFound(format!(
                "\"{}\" does not single out {}",
                generated.selector, css
            )));
        }
        Ok(generated)
    }

    pub fn query(html: &Html, selector: &str) -> Result<Vec<NodeId>> {
        let caps = HtmlCapabilities::new(html);
        query_selector_all(html, &caps, None, selector, &Default::default())
    }

    pub fn ids_of(elements: &[ElementRef<'_>]) -> Vec<NodeId> {
        elements.iter().map(|e| e.id()).collect()
    }
}
