use ego_tree::NodeId;

use super::escape::{escape_for_attribute_selector, escape_for_text_selector};

// Base costs, lower is better.
pub const TEST_ID: u64 = 1;
pub const OTHER_TEST_ID: u64 = 2;
pub const TEST_ID_LIKE_CSS: u64 = 3;
pub const IFRAME_BY_ATTRIBUTE: u64 = 10;

pub const BEGIN_PENALIZED: u64 = 50;
pub const TEXT: u64 = 100;
pub const PLACEHOLDER: u64 = 120;
pub const ROLE_WITH_NAME: u64 = 140;
pub const ALT_TEXT: u64 = 160;
pub const TITLE: u64 = 200;
pub const END_PENALIZED: u64 = 300;

pub const PARENT_HOP: u64 = 300;
pub const CSS_ID: u64 = 500;
pub const CSS_OTHER_ID: u64 = 505;
pub const ROLE_WITHOUT_NAME: u64 = 510;
pub const CSS_INPUT_TYPE_NAME: u64 = 520;
pub const CSS_TAG_NAME: u64 = 530;
pub const NTH: u64 = 10_000;
pub const CSS_FALLBACK: u64 = 10_000_000;

pub const EXACT_PENALTY: u64 = 5;
pub const NTH_BUCKET_SIZE: usize = 4;
pub const NTH_BUCKET_PENALTY: u64 = 1_000;
pub const NTH_MAX_BUCKET: usize = 8;
pub const MAX_LENGTH_PENALTY: u64 = 10;

/// Adds the exact-match penalty and, inside the penalized band, a penalty
/// that grows with the matched value's length.
pub fn penalized_score(base: u64, value: &str, exact: bool) -> u64 {
    let mut score = base;
    if exact {
        score += EXACT_PENALTY;
    }
    if score > BEGIN_PENALIZED && score < END_PENALIZED {
        let length = value.chars().count() as u64;
        score += MAX_LENGTH_PENALTY.min(length / 10);
    }
    score
}

/// Either CSS text or a structural path computed only when rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CssSource {
    Literal(String),
    Deferred(NodeId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleQuery {
    pub role: String,
    pub name: Option<String>,
    pub exact: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    TestId {
        attribute: String,
        value: String,
        exact: bool,
    },
    Attribute {
        name: String,
        value: String,
        exact: bool,
    },
    Css(CssSource),
    Role(RoleQuery),
    Text {
        text: String,
        exact: bool,
    },
    Nth {
        index: usize,
        total: usize,
    },
    ParentPath {
        hops: usize,
    },
    Scope,
}

/// One atomic matching strategy with its cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub score: u64,
}

impl Token {
    pub fn test_id(attribute: &str, value: &str, exact: bool) -> Self {
        Self {
            score: if exact { TEST_ID + EXACT_PENALTY } else { TEST_ID },
            kind: TokenKind::TestId {
                attribute: attribute.to_string(),
                value: value.to_string(),
                exact,
            },
        }
    }

    pub fn attribute(name: &str, value: &str, exact: bool, base: u64) -> Self {
        Self {
            score: penalized_score(base, value, exact),
            kind: TokenKind::Attribute {
                name: name.to_string(),
                value: value.to_string(),
                exact,
            },
        }
    }

    pub fn css(selector: impl Into<String>, score: u64) -> Self {
        Self {
            kind: TokenKind::Css(CssSource::Literal(selector.into())),
            score,
        }
    }

    pub fn deferred_css(element: NodeId) -> Self {
        Self {
            kind: TokenKind::Css(CssSource::Deferred(element)),
            score: CSS_FALLBACK,
        }
    }

    pub fn role(role: &str) -> Self {
        Self {
            kind: TokenKind::Role(RoleQuery {
                role: role.to_string(),
                name: None,
                exact: false,
            }),
            score: ROLE_WITHOUT_NAME,
        }
    }

    pub fn role_with_name(role: &str, name: &str, exact: bool) -> Self {
        Self {
            score: penalized_score(ROLE_WITH_NAME, name, exact),
            kind: TokenKind::Role(RoleQuery {
                role: role.to_string(),
                name: Some(name.to_string()),
                exact,
            }),
        }
    }

    pub fn text(text: &str, exact: bool) -> Self {
        Self {
            score: penalized_score(TEXT, text, exact),
            kind: TokenKind::Text {
                text: text.to_string(),
                exact,
            },
        }
    }

    /// Positional index. The cost rises in buckets of four indices, capped.
    pub fn nth(index: usize, total: usize) -> Self {
        let bucket = (index / NTH_BUCKET_SIZE).min(NTH_MAX_BUCKET) as u64;
        Self {
            kind: TokenKind::Nth { index, total },
            score: NTH + NTH_BUCKET_PENALTY * bucket,
        }
    }

    pub fn parent_path(hops: usize) -> Self {
        Self {
            kind: TokenKind::ParentPath { hops },
            score: PARENT_HOP * hops as u64,
        }
    }

    pub fn scope() -> Self {
        Self {
            kind: TokenKind::Scope,
            score: 0,
        }
    }

    /// Whether the token is plain CSS, as opposed to an engine-prefixed segment.
    pub fn is_css(&self) -> bool {
        matches!(self.kind, TokenKind::Css(_))
    }

    /// Renders the token as one `>>` segment. Deferred CSS has no text until
    /// it is materialised, so it renders as `None`.
    pub fn render(&self) -> Option<String> {
        let rendered = match &self.kind {
            TokenKind::TestId {
                attribute,
                value,
                exact,
            } => format!(
                "internal:testid=[{}={}]",
                attribute,
                escape_for_attribute_selector(value, *exact)
            ),
            TokenKind::Attribute { name, value, exact } => format!(
                "internal:attr=[{}={}]",
                name,
                escape_for_attribute_selector(value, *exact)
            ),
            TokenKind::Css(CssSource::Literal(css)) => css.clone(),
            TokenKind::Css(CssSource::Deferred(_)) => return None,
            TokenKind::Role(query) => match &query.name {
                Some(name) => format!(
                    "internal:role={}[name={}]",
                    query.role,
                    escape_for_attribute_selector(name, query.exact)
                ),
                None => format!("internal:role={}", query.role),
            },
            TokenKind::Text { text, exact } => {
                format!("internal:text={}", escape_for_text_selector(text, *exact))
            }
            TokenKind::Nth { index, .. } => format!("nth={}", index),
            TokenKind::ParentPath { hops } => vec![".."; (*hops).max(1)].join("/"),
            TokenKind::Scope => ":scope".to_string(),
        };
        Some(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_each_kind() {
        assert_eq!(
            Token::test_id("data-testid", "submit", false).render().unwrap(),
            "internal:testid=[data-testid=\"submit\"i]"
        );
        assert_eq!(
            Token::attribute("placeholder", "Email", true, PLACEHOLDER).render().unwrap(),
            "internal:attr=[placeholder=\"Email\"s]"
        );
        assert_eq!(Token::role("button").render().unwrap(), "internal:role=button");
        assert_eq!(
            Token::role_with_name("button", "Save", false).render().unwrap(),
            "internal:role=button[name=\"Save\"i]"
        );
        assert_eq!(
            Token::text("Welcome", false).render().unwrap(),
            "internal:text=\"Welcome\"i"
        );
        assert_eq!(Token::nth(3, 5).render().unwrap(), "nth=3");
        assert_eq!(Token::parent_path(3).render().unwrap(), "../../..");
        assert_eq!(Token::css("#main", CSS_ID).render().unwrap(), "#main");
        assert_eq!(Token::scope().render().unwrap(), ":scope");
    }

    #[test]
    fn test_deferred_css_does_not_render() {
        let html = scraper::Html::parse_fragment("<p></p>");
        let token = Token::deferred_css(html.tree.root().id());
        assert_eq!(token.score, CSS_FALLBACK);
        assert!(token.render().is_none());
    }

    #[test]
    fn test_scores() {
        assert_eq!(Token::text("Welcome", false).score, TEXT);
        assert_eq!(Token::text("Welcome", true).score, TEXT + EXACT_PENALTY);
        let long = "x".repeat(250);
        assert_eq!(Token::text(&long, false).score, TEXT + MAX_LENGTH_PENALTY);
        assert_eq!(Token::text(&"y".repeat(35), false).score, TEXT + 3);
        // Outside the penalized band lengths are free.
        assert_eq!(Token::attribute("data-test", &long, false, OTHER_TEST_ID).score, OTHER_TEST_ID);
    }

    #[test]
    fn test_nth_buckets() {
        assert_eq!(Token::nth(0, 2).score, NTH);
        assert_eq!(Token::nth(3, 20).score, NTH);
        assert_eq!(Token::nth(4, 20).score, NTH + NTH_BUCKET_PENALTY);
        assert_eq!(Token::nth(13, 20).score, NTH + 3 * NTH_BUCKET_PENALTY);
        assert_eq!(Token::nth(500, 600).score, NTH + 8 * NTH_BUCKET_PENALTY);
    }
}
