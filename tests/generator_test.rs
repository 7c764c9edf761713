use ragent_selectors::dom::TreeLinks;
use ragent_selectors::testing::TestHelper;
use ragent_selectors::{generate_selector, GenerateOptions, GeneratorConfig, SelectorError};
use scraper::ElementRef;

fn generate(source: &str, css: &str) -> String {
    let html = TestHelper::parse(source);
    TestHelper::generate_and_verify(&html, css, &GenerateOptions::default())
        .unwrap()
        .selector
}

#[test]
fn test_unique_test_id() {
    assert_eq!(
        generate(r#"<div><button data-testid="submit">Go</button></div>"#, "button"),
        "internal:testid=[data-testid=\"submit\"i]"
    );
}

#[test]
fn test_custom_test_id_attribute() {
    let html = TestHelper::parse(r#"<button data-pw="go">Go</button><button data-pw="stop">Go</button>"#);
    let options = GenerateOptions::default().test_id_attribute("data-pw");
    let generated = TestHelper::generate_and_verify(&html, "[data-pw=stop]", &options).unwrap();
    assert_eq!(generated.selector, "internal:testid=[data-pw=\"stop\"i]");
}

#[test]
fn test_distinct_text_beats_position() {
    assert_eq!(
        generate(r#"<div class="row">A</div><div class="row">B</div>"#, ".row:nth-child(2)"),
        "internal:text=\"B\"i"
    );
}

#[test]
fn test_identical_rows_use_position() {
    let html = TestHelper::parse(r#"<div class="row">X</div><div class="row">X</div><div class="row">X</div>"#);
    for (k, css) in [".row:nth-child(1)", ".row:nth-child(2)", ".row:nth-child(3)"].iter().enumerate() {
        let generated = TestHelper::generate_and_verify(&html, css, &GenerateOptions::default()).unwrap();
        assert_eq!(generated.selector, format!("internal:text=\"X\"i >> nth={}", k));
    }
}

#[test]
fn test_placeholder_over_structure() {
    assert_eq!(
        generate(r#"<form><input placeholder="Email"></form>"#, "input"),
        "internal:attr=[placeholder=\"Email\"i]"
    );
}

#[test]
fn test_unique_heading_text() {
    assert_eq!(
        generate(r#"<section><h2>Welcome</h2><p>Glad you are here</p></section>"#, "h2"),
        "internal:text=\"Welcome\"i"
    );
}

#[test]
fn test_guid_like_id() {
    assert_eq!(generate(r#"<div id="a1b2c3d4"></div><div></div>"#, "#a1b2c3d4"), "#a1b2c3d4");
}

#[test]
fn test_exact_text_when_lax_is_ambiguous() {
    let html = TestHelper::parse(r#"<button>Log in</button><button>Log in now</button>"#);
    let first = TestHelper::generate_and_verify(&html, "button:first-child", &GenerateOptions::default()).unwrap();
    assert_eq!(first.selector, "internal:text=\"Log in\"s");
    assert_eq!(first.score, 105);

    let second = TestHelper::generate_and_verify(&html, "button:nth-child(2)", &GenerateOptions::default()).unwrap();
    assert_eq!(second.selector, "internal:text=\"Log in now\"i");
}

#[test]
fn test_chaining_through_test_id_container() {
    assert_eq!(
        generate(
            r#"<section data-testid="billing"><button>Save</button></section>
               <section data-testid="shipping"><button>Save</button></section>"#,
            "[data-testid=billing] button",
        ),
        "internal:testid=[data-testid=\"billing\"i] >> internal:text=\"Save\"i"
    );
}

#[test]
fn test_cheaper_strategy_never_scores_worse() {
    let plain = TestHelper::parse(r#"<button>Close</button><button>Close</button>"#);
    let before = TestHelper::generate_and_verify(&plain, "button:nth-child(2)", &GenerateOptions::default()).unwrap();

    let tagged = TestHelper::parse(r#"<button>Close</button><button data-testid="close-2">Close</button>"#);
    let after = TestHelper::generate_and_verify(&tagged, "button:nth-child(2)", &GenerateOptions::default()).unwrap();

    assert!(before.selector.contains("nth=1"));
    assert!(after.score < before.score);
    assert_eq!(after.selector, "internal:testid=[data-testid=\"close-2\"i]");
}

#[test]
fn test_role_with_accessible_name() {
    assert_eq!(
        generate(
            r#"<button aria-label="Close">x</button><button aria-label="Open">x</button>"#,
            "button:first-child",
        ),
        "internal:role=button[name=\"Close\"i]"
    );
}

#[test]
fn test_parent_hop_from_sibling_text() {
    assert_eq!(
        generate(
            r#"<ul><li><span>Apple</span> <button>Remove</button></li><li><span>Pear</span> <button>Remove</button></li></ul>"#,
            "li:first-child button",
        ),
        "internal:text=\"Apple\"i >> .. >> internal:text=\"Remove\"i"
    );
}

#[test]
fn test_generation_is_deterministic() {
    let html = TestHelper::parse(
        r#"<ul><li>Pear <button>Remove</button></li><li>Pear <button>Remove</button></li></ul>"#,
    );
    let options = GenerateOptions::default();
    let first = TestHelper::generate(&html, "li:nth-child(2) button", &options).unwrap();
    let second = TestHelper::generate(&html, "li:nth-child(2) button", &options).unwrap();
    assert_eq!(first, second);
}

const STORE: &str = r#"
<header>
  <nav><a href="/">Home</a><a href="/docs">Docs</a><a href="/docs">Docs</a></nav>
</header>
<main>
  <section data-testid="cart">
    <h2>Cart</h2>
    <ul>
      <li>Apple <button>Remove</button></li>
      <li>Pear <button>Remove</button></li>
      <li>Pear <button>Remove</button></li>
    </ul>
  </section>
  <form>
    <label>Name <input name="name"></label>
    <input type="password" placeholder="Password">
    <select name="size"><option>S</option><option>M</option></select>
    <textarea></textarea>
    <button type="submit">Send</button>
  </form>
  <div id="a1b2c3d4"><span hidden>ghost</span><img alt="Logo" src="logo.png"></div>
  <p>Shipping is free for orders over fifty euros, except for bulky items and deliveries to islands or remote areas.</p>
  <div><div><div><span>deep</span></div></div></div>
</main>
"#;

#[test]
fn test_every_element_gets_a_unique_selector() {
    let html = TestHelper::parse(STORE);
    let elements = TestHelper::find_all(&html, "body *").unwrap();
    assert!(elements.len() > 20);

    for options in [
        GenerateOptions::default(),
        GenerateOptions::default().omit_internal_engines(true),
    ] {
        for element in &elements {
            let generated = generate_selector(&html, *element, &options).unwrap();
            assert_eq!(
                generated.elements,
                vec![element.id()],
                "\"{}\" does not single out <{}>",
                generated.selector,
                element.value().name()
            );
            if options.config.omit_internal_engines {
                assert!(!generated.selector.contains("internal:"), "{}", generated.selector);
            }
        }
    }
}

#[test]
fn test_omit_internal_engines_uses_css() {
    let html = TestHelper::parse(r#"<button data-testid="go">Go</button><ul><li>a</li><li>a</li></ul>"#);
    let options = GenerateOptions::default().omit_internal_engines(true);

    let button = TestHelper::generate_and_verify(&html, "button", &options).unwrap();
    assert_eq!(button.selector, "[data-testid=\"go\"]");

    let item = TestHelper::generate_and_verify(&html, "li:nth-child(2)", &options).unwrap();
    assert_eq!(item.selector, "li >> nth=1");
}

#[test]
fn test_root_bounds_uniqueness() {
    let html = TestHelper::parse(r#"<div id="one"><p>Hi</p></div><div id="two"><p>Hi</p></div>"#);
    let root = TestHelper::find(&html, "#two").unwrap();
    let options = GenerateOptions::default().root(root);

    let generated = TestHelper::generate_and_verify(&html, "#two p", &options).unwrap();
    assert_eq!(generated.selector, "internal:text=\"Hi\"i");

    let outside = TestHelper::find(&html, "#one p").unwrap();
    assert!(matches!(
        generate_selector(&html, outside, &options),
        Err(SelectorError::TargetOutsideScope)
    ));
}

#[test]
fn test_omit_text_from_target() {
    let html = TestHelper::parse(r#"<button id="save-btn">Save</button><button>Cancel</button>"#);
    let button = TestHelper::find(&html, "#save-btn").unwrap();
    let options = GenerateOptions::default().omit_text_from(button);

    let generated = TestHelper::generate_and_verify(&html, "#save-btn", &options).unwrap();
    assert_eq!(generated.selector, "#save-btn");
    assert!(!generated.selector.contains("Save"));
}

#[test]
fn test_retarget_for_action() {
    let html = TestHelper::parse(
        r#"<button data-testid="buy"><span>Buy now</span></button>
           <label for="email">Email address</label><input id="email" type="email">
           <label>Remember me <input type="checkbox"></label>"#,
    );
    let options = GenerateOptions::default().retarget_for_action(true);

    let span = TestHelper::find(&html, "button span").unwrap();
    let generated = generate_selector(&html, span, &options).unwrap();
    assert_eq!(generated.selector, "internal:testid=[data-testid=\"buy\"i]");
    assert_eq!(generated.elements, vec![TestHelper::find(&html, "button").unwrap().id()]);

    let label = TestHelper::find(&html, "label[for]").unwrap();
    let generated = generate_selector(&html, label, &options).unwrap();
    assert_eq!(generated.elements, vec![TestHelper::find(&html, "#email").unwrap().id()]);

    let wrapping = TestHelper::find(&html, "label:not([for])").unwrap();
    let generated = generate_selector(&html, wrapping, &options).unwrap();
    assert_eq!(
        generated.elements,
        vec![TestHelper::find(&html, "input[type=checkbox]").unwrap().id()]
    );

    // Form controls are never moved.
    let input = TestHelper::find(&html, "#email").unwrap();
    let generated = generate_selector(&html, input, &options).unwrap();
    assert_eq!(generated.elements, vec![input.id()]);
}

#[test]
fn test_retarget_for_text() {
    let html = TestHelper::parse(
        r#"<button data-testid="buy"><span>Buy</span></button>
           <button data-testid="sell"><span>Buy</span></button>"#,
    );
    let options = GenerateOptions::default().retarget_for_text(true);
    let generated = TestHelper::generate_and_verify(&html, "[data-testid=sell] span", &options).unwrap();
    assert_eq!(
        generated.selector,
        "internal:testid=[data-testid=\"sell\"i] >> internal:text=\"Buy\"i"
    );
}

#[test]
fn test_retarget_for_text_names_the_link() {
    let html = TestHelper::parse(r#"<p><span>Docs</span></p><a href="/docs"><span>Docs</span></a>"#);

    let plain = TestHelper::generate_and_verify(&html, "a span", &GenerateOptions::default()).unwrap();
    assert_eq!(plain.selector, "internal:role=link >> internal:text=\"Docs\"i");

    let options = GenerateOptions::default().retarget_for_text(true);
    let retargeted = TestHelper::generate_and_verify(&html, "a span", &options).unwrap();
    assert_eq!(
        retargeted.selector,
        "internal:role=link[name=\"Docs\"i] >> internal:text=\"Docs\"i"
    );
    assert_ne!(plain.selector, retargeted.selector);
    assert!(retargeted.score < plain.score);
}

const MISNESTED: &str = r##"
<a data-testid="t1" href="#1"><div><h2>A</h2><p title="T0">B</p><p>C</p><span>D</span><a data-testid="t2" href="#2">x</a></div></a>
<h2>A</h2>
"##;

fn elements_by_child_links(html: &scraper::Html) -> Vec<ElementRef<'_>> {
    let links = TreeLinks::build(html.tree.root());
    links
        .subtree(html.tree.root().id())
        .iter()
        .filter_map(|id| html.tree.get(*id).and_then(ElementRef::wrap))
        .filter(|e| !matches!(e.value().name(), "html" | "head" | "body"))
        .collect()
}

#[test]
fn test_misnested_markup_gets_unique_selectors() {
    let html = TestHelper::parse(MISNESTED);
    let elements = elements_by_child_links(&html);
    assert!(elements.len() >= 8);

    for options in [
        GenerateOptions::default(),
        GenerateOptions::default().omit_internal_engines(true),
    ] {
        for element in &elements {
            let generated = generate_selector(&html, *element, &options).unwrap();
            assert_eq!(
                generated.elements,
                vec![element.id()],
                "\"{}\" does not single out <{}>",
                generated.selector,
                element.value().name()
            );
        }
    }
}

#[test]
fn test_parent_step_follows_child_links() {
    let html = TestHelper::parse(MISNESTED);
    let titled = TestHelper::query(&html, "internal:attr=[title=\"T0\"i]").unwrap();
    assert_eq!(titled.len(), 1);

    let expected: Vec<_> = elements_by_child_links(&html)
        .into_iter()
        .filter(|e| e.children().any(|c| c.id() == titled[0]))
        .map(|e| e.id())
        .collect();
    assert_eq!(expected.len(), 1);
    assert_eq!(
        TestHelper::query(&html, "internal:attr=[title=\"T0\"i] >> ..").unwrap(),
        expected
    );
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let html = TestHelper::parse("<p>x</p>");
    let target = TestHelper::find(&html, "p").unwrap();
    let mut config = GeneratorConfig::default();
    config.test_id_attribute_name = "data test".to_string();
    assert!(matches!(
        generate_selector(&html, target, &GenerateOptions::new(config)),
        Err(SelectorError::ConfigurationError(_))
    ));
}
