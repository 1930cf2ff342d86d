//! WASM tests using wasm_bindgen_test
//!
//! Run with: wasm-pack test --headless --chrome --features wasm

#![cfg(all(target_arch = "wasm32", feature = "wasm"))]

use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;
use web_sys::{Document, HtmlElement, HtmlImageElement};

use progressive::wasm::ProgressiveLoader;
use progressive::web::{self, WebPage};
use progressive::{LoaderState, MarkupConfig, Options, Page};

// Configure tests to run in browser environment
wasm_bindgen_test_configure!(run_in_browser);

fn document() -> Document {
    web_sys::window().unwrap().document().unwrap()
}

/// Append an `<img>` candidate to the body at the given offset from the top.
fn append_image(top: &str, full: &str, small: Option<&str>) -> HtmlImageElement {
    let doc = document();
    let img: HtmlImageElement = doc.create_element("img").unwrap().dyn_into().unwrap();
    img.set_class_name("progressive__img progressive--not-loaded");
    img.set_attribute("data-progressive", full).unwrap();
    if let Some(small) = small {
        img.set_attribute("data-progressive-sm", small).unwrap();
    }
    let style = img.style();
    style.set_property("display", "block").unwrap();
    style.set_property("position", "absolute").unwrap();
    style.set_property("top", top).unwrap();
    style.set_property("width", "10px").unwrap();
    style.set_property("height", "10px").unwrap();
    doc.body().unwrap().append_child(&img).unwrap();
    img
}

// ============================================================================
// WebPage
// ============================================================================

#[wasm_bindgen_test]
fn test_web_page_queries_candidates() {
    let img = append_image("0px", "data:image/gif;base64,R0lGODlhAQABAAAAACw=", None);
    let page = WebPage::from_window().unwrap();

    let found = page.query_candidates(&MarkupConfig::default());
    assert!(found.iter().any(|el| el == img.unchecked_ref::<web_sys::Element>()));
    assert!(!page.is_hidden(img.unchecked_ref()));
    assert_eq!(page.parent(img.unchecked_ref()), None, "body is the last ancestor");

    img.remove();
}

#[wasm_bindgen_test]
fn test_web_page_hidden_element() {
    let img = append_image("0px", "/a.jpg", None);
    let html: &HtmlElement = img.unchecked_ref();
    html.style().set_property("display", "none").unwrap();

    let page = WebPage::from_window().unwrap();
    assert!(page.is_hidden(img.unchecked_ref()));

    img.remove();
}

#[wasm_bindgen_test]
fn test_web_page_background_image() {
    let doc = document();
    let div: HtmlElement = doc.create_element("div").unwrap().dyn_into().unwrap();
    doc.body().unwrap().append_child(&div).unwrap();

    let mut page = WebPage::from_window().unwrap();
    page.set_background_image(div.unchecked_ref(), "/hero.jpg");
    let value = div.style().get_property_value("background-image").unwrap();
    assert!(value.contains("/hero.jpg"), "got {}", value);

    div.remove();
}

#[wasm_bindgen_test]
fn test_web_page_viewport_is_positive() {
    let viewport = WebPage::from_window().unwrap().viewport();
    assert!(viewport.width > 0.0);
    assert!(viewport.height > 0.0);
}

// ============================================================================
// ProgressiveLoader
// ============================================================================

#[wasm_bindgen_test]
fn test_init_rejects_invalid_options() {
    assert!(ProgressiveLoader::init(r#"{"markup": {"prefix": ""}}"#, None, None, None).is_err());
    assert!(ProgressiveLoader::init("{not json", None, None, None).is_err());
}

#[wasm_bindgen_test]
fn test_init_with_empty_page_completes() {
    let loader = ProgressiveLoader::init(r#"{"markup": {"prefix": "unused"}}"#, None, None, None).unwrap();
    assert_eq!(loader.state(), "completed");
    assert!(!loader.check());
}

#[wasm_bindgen_test]
fn test_render_after_drop_listeners_stays_deactivated() {
    let far = append_image("100000px", "/far.jpg", None);
    let loader = ProgressiveLoader::init(r#"{"throttle": 10}"#, None, None, None).unwrap();
    assert_eq!(loader.state(), "active");

    loader.drop_listeners();
    assert_eq!(loader.state(), "deactivated");

    let near = append_image("0px", "/near.jpg", None);
    assert_eq!(loader.render(), 1);
    assert_eq!(loader.state(), "deactivated", "render must not re-attach listeners");

    loader.drop_listeners();
    far.remove();
    near.remove();
}

// ============================================================================
// Shared loader
// ============================================================================

#[wasm_bindgen_test]
fn test_peek_state_while_borrowed() {
    let loader = web::create(Options::default()).unwrap();
    assert_eq!(web::peek_state(&loader), Some(LoaderState::Idle));

    let guard = loader.borrow_mut();
    assert_eq!(web::peek_state(&loader), None);
    drop(guard);

    assert_eq!(web::drive(&loader, |l| l.state()), Some(LoaderState::Idle));
}
