use super::*;

/// Reduced-motion adjustment: one read of the preference at enhancement
/// time. Preference changes mid-session are not tracked.
pub(crate) fn wire(page: &mut Page) -> Result<()> {
    if !page.capabilities.prefers_reduced_motion {
        return Ok(());
    }
    let Some(root) = page.dom.document_element() else {
        return Ok(());
    };
    page.dom.set_style_property(root, "scroll-behavior", "auto")
}
