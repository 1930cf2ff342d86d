//! Viewport visibility test for candidate elements.

use crate::page::Page;

/// Check if an element is currently (at least partially) visible.
///
/// The test is vertical only:
/// 1. Hidden elements (no rendered box) are never visible.
/// 2. Every ancestor below the document body must not clip the element away,
///    which covers nested scroll containers.
/// 3. The element's top must be within the root viewport's client height.
pub fn in_view<P: Page>(page: &P, element: &P::Element) -> bool {
    if page.is_hidden(element) {
        return false;
    }

    let rect = page.bounding_rect(element);

    // The body never clips: `parent` stops below it, so content taller than
    // the body's box still counts against the viewport alone.
    let mut ancestor = page.parent(element);
    while let Some(node) = ancestor {
        let clip = page.bounding_rect(&node);
        if !rect.overlaps_vertically(&clip) {
            log::trace!("{:?} clipped by ancestor {:?}", element, node);
            return false;
        }
        ancestor = page.parent(&node);
    }

    rect.top() <= page.viewport().height
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarkupConfig;
    use crate::geometry::Rect;
    use crate::sim::{MemoryPage, NodeSpec};

    fn page() -> MemoryPage {
        MemoryPage::new(800.0, 600.0)
    }

    fn image(rect: Rect) -> NodeSpec {
        NodeSpec::image(&MarkupConfig::default(), rect, "/full.jpg", None)
    }

    #[test]
    fn test_element_in_viewport() {
        let mut page = page();
        let el = page.append(page.body(), image(Rect::new(0.0, 100.0, 200.0, 100.0)));
        assert!(in_view(&page, &el));
    }

    #[test]
    fn test_element_below_fold() {
        let mut page = page();
        let el = page.append(page.body(), image(Rect::new(0.0, 900.0, 200.0, 100.0)));
        assert!(!in_view(&page, &el));

        page.scroll_window_to(400.0);
        assert!(in_view(&page, &el));
    }

    #[test]
    fn test_top_exactly_at_client_height_is_visible() {
        let mut page = page();
        let el = page.append(page.body(), image(Rect::new(0.0, 600.0, 200.0, 100.0)));
        assert!(in_view(&page, &el));
    }

    #[test]
    fn test_hidden_element_never_visible() {
        let mut page = page();
        let el = page.append(page.body(), image(Rect::new(0.0, 0.0, 200.0, 100.0)).hidden());
        assert!(!in_view(&page, &el));
    }

    #[test]
    fn test_hidden_ancestor_hides_element() {
        let mut page = page();
        let wrapper =
            page.append(page.body(), NodeSpec::container(Rect::new(0.0, 0.0, 800.0, 600.0)).hidden());
        let el = page.append(wrapper, image(Rect::new(0.0, 0.0, 200.0, 100.0)));
        assert!(!in_view(&page, &el));
    }

    #[test]
    fn test_clipped_by_scroll_container() {
        let mut page = page();
        let scroller = page.append(page.body(), NodeSpec::container(Rect::new(0.0, 0.0, 800.0, 300.0)));
        let el = page.append(scroller, image(Rect::new(0.0, 500.0, 200.0, 100.0)));

        // Inside the viewport, but below the container's visible area
        assert!(!in_view(&page, &el));

        page.scroll_container_to(scroller, 300.0);
        assert!(in_view(&page, &el));

        // Scrolled past: the element's bottom is above the container's top
        page.scroll_container_to(scroller, 600.0);
        assert!(!in_view(&page, &el));
    }

    #[test]
    fn test_above_viewport_but_unclipped_is_visible() {
        // Only the element's top is compared against the viewport, so
        // elements scrolled past stay visible.
        let mut page = page();
        let el = page.append(page.body(), image(Rect::new(0.0, 0.0, 200.0, 100.0)));
        page.scroll_window_to(1000.0);
        assert!(in_view(&page, &el));
    }

    #[test]
    fn test_body_box_does_not_clip() {
        let mut page = page();
        let el = page.append(page.body(), image(Rect::new(0.0, 2000.0, 200.0, 100.0)));
        assert_eq!(page.parent(&el), None);

        // Body box is now -1500..-900, far above the element at 500
        page.scroll_window_to(1500.0);
        assert!(!page.bounding_rect(&el).overlaps_vertically(&page.bounding_rect(&page.body())));
        assert!(in_view(&page, &el));
    }
}
