use super::*;

const SMOOTH_PAGE: &str = r#"
    <html style='scroll-behavior: smooth; color: black'>
    <body>
      <main><p id='copy'>Calm pages for calm readers.</p></main>
    </body>
    </html>
"#;

fn reduced_motion_options() -> Options {
    let mut options = Options::default();
    options.capabilities.prefers_reduced_motion = true;
    options
}

#[test]
fn preference_forces_instant_scrolling() -> Result<()> {
    let page = Page::from_html_with(SMOOTH_PAGE, reduced_motion_options())?;
    assert_eq!(
        page.style_property("html", "scroll-behavior")?.as_deref(),
        Some("auto")
    );
    Ok(())
}

#[test]
fn other_inline_declarations_survive_the_override() -> Result<()> {
    let page = Page::from_html_with(SMOOTH_PAGE, reduced_motion_options())?;
    assert_eq!(page.style_property("html", "color")?.as_deref(), Some("black"));
    Ok(())
}

#[test]
fn no_preference_leaves_the_root_untouched() -> Result<()> {
    let page = Page::from_html(SMOOTH_PAGE)?;
    assert_eq!(
        page.style_property("html", "scroll-behavior")?.as_deref(),
        Some("smooth")
    );
    Ok(())
}

#[test]
fn root_without_inline_style_gains_only_the_override() -> Result<()> {
    let page = Page::from_html_with("<html><body></body></html>", reduced_motion_options())?;
    assert_eq!(
        page.style_property("html", "scroll-behavior")?.as_deref(),
        Some("auto")
    );
    assert_eq!(
        page.attr("html", "style")?.as_deref(),
        Some("scroll-behavior: auto;")
    );
    Ok(())
}

#[test]
fn fragment_without_html_tag_uses_first_element_as_root() -> Result<()> {
    let page = Page::from_html_with("<div id='app'></div>", reduced_motion_options())?;
    assert_eq!(
        page.style_property("#app", "scroll-behavior")?.as_deref(),
        Some("auto")
    );
    Ok(())
}

#[test]
fn empty_document_is_tolerated() -> Result<()> {
    let page = Page::from_html_with("", reduced_motion_options())?;
    assert_eq!(page.pending_timers(), 0);
    Ok(())
}
