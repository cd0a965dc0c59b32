use super::*;

/// Lazy image fallback. Active only when both native intersection
/// observation and native image lazy loading are absent; either one present
/// means the browser already covers this and the component does no work.
/// The polyfill rides the runtime's own observation registry.
pub(crate) fn wire(page: &mut Page) -> Result<()> {
    if page.capabilities.intersection_observer || page.capabilities.native_lazy_loading {
        return Ok(());
    }

    for image in page.dom.query_selector_all(r#"img[loading="lazy"]"#)? {
        page.observe(image, 0.0, WatchPurpose::LazyImage);
    }
    Ok(())
}

impl Page {
    /// One-shot pending-to-loaded transition: promote the staged source and
    /// stop observing. Falls back to the live source when nothing is staged.
    pub(crate) fn activate_lazy_image(&mut self, image: NodeId) -> Result<()> {
        let staged = self.dom.attr(image, "data-src");
        let source = match staged {
            Some(src) => src,
            None => self.dom.attr(image, "src").unwrap_or_default(),
        };
        self.dom.set_attr(image, "src", &source)?;
        Ok(())
    }
}
