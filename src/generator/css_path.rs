use super::escape::{css_escape, make_selector_for_id};
use super::token::{Token, CSS_FALLBACK};
use crate::dom::element::{child_elements, non_empty_attr, tag_name};
use crate::query::QueryEngine;
use ego_tree::NodeId;
use scraper::Selector;
use tracing::trace;

/// Structural CSS path from the scope down to `target`, built level by level
/// from ids, class prefixes and sibling positions. The first level at which
/// the path already lands on the target ends the walk. When the final path
/// still matches several elements an `nth=` token is appended.
pub fn css_fallback(engine: &QueryEngine<'_>, target: NodeId) -> Vec<Token> {
    let index = engine.index();
    let scope = index.scope();
    let mut suffix: Vec<String> = Vec::new();
    let mut current = index.element(target);

    while let Some(element) = current {
        if element.id() == scope {
            break;
        }
        let mut level_token: Option<String> = None;

        if let Some(id) = non_empty_attr(element, "id") {
            let token = make_selector_for_id(id);
            if let Some(path) = lands_on_target(engine, &token, &suffix, target) {
                return strict(engine, path, target);
            }
            level_token = Some(token);
        }

        let parent = index.parent_element(element.id());
        let classes: Vec<&str> = element.value().classes().collect();
        for i in 0..classes.len() {
            let token: String = classes[..=i].iter().map(|c| format!(".{}", css_escape(c))).collect();
            if let Some(path) = lands_on_target(engine, &token, &suffix, target) {
                return strict(engine, path, target);
            }
            if level_token.is_none() {
                // Good enough for this level if it singles the element out among its siblings.
                let unique_among_siblings = match (parent, Selector::parse(&token)) {
                    (Some(parent), Ok(selector)) => child_elements(parent).filter(|c| selector.matches(c)).count() == 1,
                    _ => false,
                };
                if unique_among_siblings {
                    level_token = Some(token);
                }
            }
        }

        let sibling = index.sibling_token(element.id()).to_string();
        if let Some(path) = lands_on_target(engine, &sibling, &suffix, target) {
            return strict(engine, path, target);
        }
        suffix.insert(0, level_token.unwrap_or(sibling));
        current = parent;
    }

    strict(engine, suffix.join(" > "), target)
}

/// The path `prefix > suffix…` when its first match in scope is the target.
fn lands_on_target(engine: &QueryEngine<'_>, prefix: &str, suffix: &[String], target: NodeId) -> Option<String> {
    let path = std::iter::once(prefix.to_string())
        .chain(suffix.iter().cloned())
        .collect::<Vec<_>>()
        .join(" > ");
    match engine.query_within(engine.index().scope(), &path) {
        Ok(matches) if matches.first() == Some(&target) => Some(path),
        Ok(_) => None,
        Err(err) => {
            trace!("skipping css path \"{}\": {}", path, err);
            None
        }
    }
}

fn strict(engine: &QueryEngine<'_>, path: String, target: NodeId) -> Vec<Token> {
    let matches = query_from_scope(engine, &path);
    if let Some(position) = matches.iter().position(|m| *m == target) {
        return with_position(Token::css(path, CSS_FALLBACK), position, matches.len());
    }

    // Combinators see the parser's parent pointers, which can disagree with
    // the child links after misnested markup. A bare tag never looks upwards.
    trace!("css path \"{}\" misses its target, falling back to tag position", path);
    let Some(element) = engine.index().element(target) else {
        return vec![Token::css(path, CSS_FALLBACK)];
    };
    let tag = css_escape(&tag_name(element));
    let matches = query_from_scope(engine, &tag);
    match matches.iter().position(|m| *m == target) {
        Some(position) => with_position(Token::css(tag, CSS_FALLBACK), position, matches.len()),
        None => vec![Token::css(path, CSS_FALLBACK)],
    }
}

fn query_from_scope(engine: &QueryEngine<'_>, css: &str) -> Vec<NodeId> {
    engine
        .query_within(engine.index().scope(), css)
        .map(|m| m.as_ref().clone())
        .unwrap_or_default()
}

fn with_position(css: Token, position: usize, total: usize) -> Vec<Token> {
    if total > 1 {
        vec![css, Token::nth(position, total)]
    } else {
        vec![css]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GeneratorConfig;
    use crate::dom::HtmlCapabilities;
    use crate::generator::index::ElementIndex;
    use scraper::Html;

    fn fallback_for(source: &str, css: &str) -> Vec<String> {
        let html = Html::parse_document(source);
        let caps = HtmlCapabilities::new(&html);
        let engine = QueryEngine::new(ElementIndex::build(
            &html,
            &caps,
            html.tree.root().id(),
            &GeneratorConfig::default(),
        ));
        let target = html.select(&Selector::parse(css).unwrap()).next().unwrap().id();
        let tokens = css_fallback(&engine, target);

        let rendered: Vec<String> = tokens.iter().filter_map(Token::render).collect();
        let matches = engine.query_all(&rendered.join(" >> ")).unwrap();
        assert_eq!(matches, vec![target]);
        rendered
    }

    #[test]
    fn test_id_ends_the_walk() {
        assert_eq!(fallback_for("<div id='app'><span>x</span></div>", "#app"), vec!["#app"]);
    }

    #[test]
    fn test_unique_class() {
        assert_eq!(
            fallback_for("<ul><li class='item'>a</li><li class='item active'>b</li></ul>", ".active"),
            vec![".item.active"]
        );
    }

    #[test]
    fn test_sibling_position() {
        assert_eq!(
            fallback_for("<ul><li>a</li><li>b</li><li>c</li></ul>", "li:nth-child(3)"),
            vec!["li:nth-child(3)"]
        );
    }

    #[test]
    fn test_path_through_parent() {
        let path = fallback_for(
            "<div id='left'><p>a</p></div><div id='right'><p>b</p></div>",
            "#right p",
        );
        assert_eq!(path, vec!["#right > p"]);
    }

    #[test]
    fn test_misnested_markup_still_reaches_target() {
        let source = "<a href='#1'><div><h2>A</h2><p>B</p><p>C</p><span>D</span><a href='#2'>x</a></div></a><p>E</p>";
        let html = Html::parse_document(source);
        let caps = HtmlCapabilities::new(&html);
        let engine = QueryEngine::new(ElementIndex::build(
            &html,
            &caps,
            html.tree.root().id(),
            &GeneratorConfig::default(),
        ));
        let elements: Vec<NodeId> = engine
            .index()
            .links()
            .subtree(html.tree.root().id())
            .iter()
            .copied()
            .filter(|id| {
                engine
                    .index()
                    .element(*id)
                    .map(|e| !matches!(e.value().name(), "html" | "head" | "body"))
                    .unwrap_or(false)
            })
            .collect();
        assert!(elements.len() >= 8);
        for id in elements {
            let rendered: Vec<String> = css_fallback(&engine, id)
                .iter()
                .filter_map(Token::render)
                .collect();
            let matches = engine.query_all(&rendered.join(" >> ")).unwrap();
            assert_eq!(matches, vec![id], "{}", rendered.join(" >> "));
        }
    }
}
