use super::*;
use std::cell::RefCell;
use std::rc::Rc;

/// Injected reporting interface. The page never probes an ambient global:
/// when no reporter is supplied, [`NoopReporter`] stands in and every call
/// is a silent no-op.
pub trait Reporter {
    fn report(&mut self, name: &str, params: &EventParams);
}

/// Ordered key/value record handed to the reporter. Order is the order the
/// parameters were attached; the `transport_type=beacon` delivery hint is
/// always first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventParams {
    entries: Vec<(String, String)>,
}

impl EventParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: &str, value: impl Into<String>) {
        self.entries.push((key.to_string(), value.into()));
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub(crate) fn extend(&mut self, other: EventParams) {
        self.entries.extend(other.entries);
    }
}

impl fmt::Display for EventParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (key, value)) in self.entries.iter().enumerate() {
            if idx > 0 {
                write!(f, " ")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn report(&mut self, _name: &str, _params: &EventParams) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedEvent {
    pub name: String,
    pub params: EventParams,
}

/// Test reporter. Clones share one event log, so a handle kept outside the
/// page observes everything the page reports.
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    events: Rc<RefCell<Vec<ReportedEvent>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReportedEvent> {
        self.events.borrow().clone()
    }

    pub fn take_events(&self) -> Vec<ReportedEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn count(&self, name: &str) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| event.name == name)
            .count()
    }

    pub fn last(&self) -> Option<ReportedEvent> {
        self.events.borrow().last().cloned()
    }
}

impl Reporter for RecordingReporter {
    fn report(&mut self, name: &str, params: &EventParams) {
        self.events.borrow_mut().push(ReportedEvent {
            name: name.to_string(),
            params: params.clone(),
        });
    }
}

pub(crate) const LINK_TEXT_MAX_CHARS: usize = 120;
pub(crate) const SECTION_VIEW_THRESHOLD: f64 = 0.25;

/// Internal iff the href begins with a path separator, a fragment marker,
/// a mail-to scheme, or a telephone scheme.
pub(crate) fn link_type(href: &str) -> &'static str {
    let internal = href.starts_with('/')
        || href.starts_with('#')
        || href.starts_with("mailto:")
        || href.starts_with("tel:");
    if internal { "internal" } else { "external" }
}

pub(crate) fn is_untrackable_href(href: &str) -> bool {
    href.is_empty() || href == "#" || href.starts_with("javascript:")
}

pub(crate) fn wire(page: &mut Page) -> Result<()> {
    let document = page.dom.root;
    page.add_listener(document, "click", false, Handler::TrackLinkClick);
    // Capture phase, so tracking observes the submit before (and regardless
    // of) the form handler's own verdict on it.
    page.add_listener(document, "submit", true, Handler::TrackFormSubmit);

    if page.capabilities.intersection_observer {
        for section in page.dom.query_selector_all("section[id]")? {
            page.observe(section, SECTION_VIEW_THRESHOLD, WatchPurpose::SectionView);
        }
    }

    Ok(())
}

impl Page {
    pub(crate) fn track_link_click(&mut self, target: NodeId) -> Result<()> {
        let Some(link) = self.dom.closest(target, "a[href]")? else {
            return Ok(());
        };
        let href = self.dom.attr(link, "href").unwrap_or_default();
        if is_untrackable_href(&href) {
            return Ok(());
        }

        let mut text = self.dom.text_content(link);
        if text.is_empty() {
            text = self.dom.attr(link, "aria-label").unwrap_or_default();
        }
        let text = clip_chars(text.trim(), LINK_TEXT_MAX_CHARS);

        let params = EventParams::new()
            .with("link_text", text)
            .with("link_url", href.clone())
            .with("link_type", link_type(&href));
        self.track_event("link_click", params);
        Ok(())
    }

    pub(crate) fn track_form_submit_capture(&mut self, target: NodeId) -> Result<()> {
        let Some(track_name) = self.dom.attr(target, "data-track") else {
            return Ok(());
        };
        let action = self.dom.attr(target, "action").unwrap_or_default();
        let params = EventParams::new()
            .with("form_name", track_name)
            .with("form_action", action);
        self.track_event("form_submit", params);
        Ok(())
    }

    pub(crate) fn track_section_view(&mut self, section: NodeId) -> Result<()> {
        // Seen-once latch: a section reports at most once per page load.
        if !self.seen_sections.insert(section) {
            return Ok(());
        }
        let id = self.dom.attr(section, "id").unwrap_or_default();
        let params = EventParams::new().with("section", id);
        self.track_event("section_view", params);
        Ok(())
    }

    pub(crate) fn track_event(&mut self, name: &str, params: EventParams) {
        let mut merged = EventParams::new().with("transport_type", "beacon");
        merged.extend(params);
        self.trace_line(format!("[report] name={name} {merged}"));
        self.reporter.report(name, &merged);
    }
}
