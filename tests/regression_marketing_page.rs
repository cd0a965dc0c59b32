use page_enhancer::{
    Capabilities, FeedbackKind, Options, Page, RecordingReporter, Result,
};

const MARKETING_PAGE: &str = r#"
<!DOCTYPE html>
<html style='scroll-behavior: smooth'>
<body>
  <nav>
    <button id='nav-toggle' aria-expanded='false'>Menu</button>
    <ul id='nav-menu'>
      <li><a id='nav-platform' href='#platform'>Platform</a></li>
      <li><a id='nav-donate' href='https://donate.example.org/riverbend'>Donate</a></li>
    </ul>
  </nav>
  <main>
    <section id='hero'>
      <h1>Riverbend for City Council</h1>
      <a id='cta-volunteer' href='/volunteer'>Join the team</a>
    </section>
    <section id='platform'><p>Issues we care about.</p></section>
    <section id='gallery'>
      <img id='event-photo' loading='lazy' src='placeholder.png' data-src='rally.jpg'>
    </section>
    <form id='form-yard-signs' action='https://forms.example/f/signs' data-track='yard_sign_request'>
      <div class='row'>
        <input id='signs-name' name='name' required>
        <span class='error-msg'></span>
      </div>
      <div class='row'>
        <input id='signs-phone' name='phone' type='tel'>
        <span class='error-msg'></span>
      </div>
      <button id='signs-send' type='submit'>Request signs</button>
      <p id='signs-feedback' class='form-feedback'></p>
    </form>
    <form id='form-contact' action='https://forms.example/f/contact' data-track='campaign_contact'>
      <div class='row'>
        <input id='contact-email' name='email' type='email' required>
        <span class='error-msg'></span>
      </div>
      <button id='contact-send' type='submit'>Send</button>
      <p id='contact-feedback' class='form-feedback'></p>
    </form>
  </main>
</body>
</html>
"#;

fn recording_page(capabilities: Capabilities) -> Result<(Page, RecordingReporter)> {
    let reporter = RecordingReporter::new();
    let options = Options {
        capabilities,
        reporter: Some(Box::new(reporter.clone())),
        ..Options::default()
    };
    let page = Page::from_html_with(MARKETING_PAGE, options)?;
    Ok((page, reporter))
}

#[test]
fn full_visit_walks_every_component() -> Result<()> {
    let (mut page, reporter) = recording_page(Capabilities::default())?;

    // Open the menu, follow a menu link: the menu collapses and the click
    // is reported.
    page.click("#nav-toggle")?;
    page.assert_attr("#nav-toggle", "aria-expanded", "true")?;
    page.assert_class("#nav-menu", "active", true)?;

    page.click("#nav-platform")?;
    page.assert_attr("#nav-toggle", "aria-expanded", "false")?;
    page.assert_class("#nav-menu", "active", false)?;
    assert_eq!(reporter.count("link_click"), 1);
    let click = reporter.last().unwrap();
    assert_eq!(click.params.get("link_url"), Some("#platform"));
    assert_eq!(click.params.get("link_type"), Some("internal"));

    // Scroll the page: each section reports once.
    page.set_bounds("#hero", 0, 700)?;
    page.set_bounds("#platform", 900, 600)?;
    page.set_bounds("#gallery", 1_700, 600)?;
    page.scroll_to(800)?;
    page.scroll_to(1_600)?;
    page.scroll_to(0)?;
    page.scroll_to(1_600)?;
    assert_eq!(reporter.count("section_view"), 3);

    // A bad yard-sign request is rejected with per-field messages.
    page.type_text("#signs-phone", "12345")?;
    page.click("#signs-send")?;
    page.assert_text("#signs-feedback", "Please fix the errors above.")?;
    page.assert_class("#signs-feedback", "error", true)?;
    page.assert_text(
        "#form-yard-signs .row .error-msg",
        "This field is required.",
    )?;
    assert!(page.native_submissions().is_empty());

    // Fixing both fields lets the submission through exactly once.
    page.type_text("#signs-name", "Jordan Doe")?;
    page.type_text("#signs-phone", "555-123-4567")?;
    page.click("#signs-send")?;

    assert!(page.is_disabled("#signs-send")?);
    page.assert_text("#signs-send", "Submitting...")?;
    assert_eq!(page.native_submissions().len(), 1);
    assert_eq!(page.native_submissions()[0].form_id, "form-yard-signs");

    // The capture-phase observer saw both attempts; the form handler only
    // reported the accepted one.
    assert_eq!(reporter.count("form_submit"), 3);

    // The second form is untouched by the first one's guard.
    page.type_text("#contact-email", "jordan@example.com")?;
    page.click("#contact-send")?;
    assert_eq!(page.native_submissions().len(), 2);
    assert_eq!(page.native_submissions()[1].form_id, "form-contact");

    // Default capabilities include native lazy loading, so the fallback
    // left the image alone.
    page.assert_attr("#event-photo", "src", "placeholder.png")?;

    // No reduced-motion preference: the inline smooth scrolling stands.
    assert_eq!(
        page.style_property("html", "scroll-behavior")?.as_deref(),
        Some("smooth")
    );
    Ok(())
}

#[test]
fn constrained_browser_gets_fallbacks_instead_of_observers() -> Result<()> {
    let capabilities = Capabilities {
        intersection_observer: false,
        native_lazy_loading: false,
        prefers_reduced_motion: true,
    };
    let (mut page, reporter) = recording_page(capabilities)?;

    // Reduced motion is honored at enhancement time.
    assert_eq!(
        page.style_property("html", "scroll-behavior")?.as_deref(),
        Some("auto")
    );

    // Section tracking needs the observer capability.
    page.set_bounds("#hero", 0, 700)?;
    page.scroll_to(0)?;
    assert_eq!(reporter.count("section_view"), 0);

    // The lazy fallback runs without it.
    page.set_bounds("#event-photo", 1_800, 400)?;
    page.assert_attr("#event-photo", "src", "placeholder.png")?;
    page.scroll_to(1_500)?;
    page.assert_attr("#event-photo", "src", "rally.jpg")?;
    Ok(())
}

#[test]
fn feedback_lifecycle_matches_the_five_second_clear() -> Result<()> {
    let (mut page, _reporter) = recording_page(Capabilities::default())?;

    page.show_form_feedback("#form-contact", FeedbackKind::Success, "Thanks! We got it.")?;
    page.assert_text("#contact-feedback", "Thanks! We got it.")?;
    page.assert_class("#contact-feedback", "success", true)?;

    page.advance_time(4_999)?;
    page.assert_text("#contact-feedback", "Thanks! We got it.")?;
    page.advance_time(1)?;
    page.assert_text("#contact-feedback", "")?;

    // The other form's feedback region was never touched.
    page.assert_text("#signs-feedback", "")?;
    Ok(())
}

#[test]
fn guard_survives_repeated_submissions_across_components() -> Result<()> {
    let (mut page, reporter) = recording_page(Capabilities::default())?;

    page.type_text("#contact-email", "jordan@example.com")?;
    page.submit("#form-contact")?;
    page.submit("#form-contact")?;
    page.submit("#form-contact")?;

    assert_eq!(page.native_submissions().len(), 1);

    // Capture-phase tracking sees every attempt; the handler reported only
    // the first.
    assert_eq!(reporter.count("form_submit"), 4);

    // Nav state is unaffected by any of it.
    page.assert_attr("#nav-toggle", "aria-expanded", "false")?;
    page.assert_class("#nav-menu", "active", false)?;
    Ok(())
}
