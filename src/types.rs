use crate::dom::ElementSummary;
use crate::generator::GeneratedSelector;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};

/// Serializable outcome of one generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorReport {
    pub source: String,
    pub target: ElementSummary,
    pub selector: String,
    pub score: u64,
    pub unique: bool,
    pub matches: Vec<ElementSummary>,
    pub generated_at: DateTime<Utc>,
}

impl SelectorReport {
    pub fn new(source: impl Into<String>, html: &Html, target: ElementRef<'_>, generated: &GeneratedSelector) -> Self {
        let matches = generated
            .elements
            .iter()
            .filter_map(|id| html.tree.get(*id))
            .filter_map(ElementRef::wrap)
            .map(ElementSummary::from_element)
            .collect();
        Self {
            source: source.into(),
            target: ElementSummary::from_element(target),
            selector: generated.selector.clone(),
            score: generated.score,
            unique: generated.is_unique(),
            matches,
            generated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{generate_selector, GenerateOptions};
    use scraper::Selector;

    #[test]
    fn test_report_serializes() {
        let html = Html::parse_document(r#"<button data-testid="go">Go</button>"#);
        let button = html.select(&Selector::parse("button").unwrap()).next().unwrap();
        let generated = generate_selector(&html, button, &GenerateOptions::default()).unwrap();

        let report = SelectorReport::new("inline", &html, button, &generated);
        assert!(report.unique);
        assert_eq!(report.matches.len(), 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["selector"], "internal:testid=[data-testid=\"go\"i]");
        assert_eq!(json["target"]["tag_name"], "button");
        assert!(json["generated_at"].is_string());
    }
}
