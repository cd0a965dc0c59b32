//! Deterministic runtime for static marketing-page enhancements.
//!
//! The crate models the five self-contained behaviors a small marketing
//! site layers over its markup — a mobile navigation toggle, validated
//! contact forms, click/submit/scroll analytics, a lazy-image fallback, and
//! a reduced-motion adjustment — and drives them over an in-process DOM
//! with synthetic events, a virtual clock, and modeled viewport
//! intersection. Everything is deterministic: no real browser, no real
//! network, no wall clock.
//!
//! ```
//! use page_enhancer::Page;
//!
//! let html = r#"
//!     <nav>
//!       <button id='nav-toggle' aria-expanded='false'>Menu</button>
//!       <ul id='nav-menu'><li><a href='/about'>About</a></li></ul>
//!     </nav>
//! "#;
//! let mut page = Page::from_html(html)?;
//! page.click("#nav-toggle")?;
//! page.assert_attr("#nav-toggle", "aria-expanded", "true")?;
//! page.assert_class("#nav-menu", "active", true)?;
//! # Ok::<(), page_enhancer::Error>(())
//! ```

use std::collections::{HashMap, HashSet};
use std::error::Error as StdError;
use std::fmt;

mod analytics;
mod dom;
mod forms;
mod lazy;
mod motion;
mod nav;
mod observer;
mod selector;


pub use analytics::{EventParams, NoopReporter, RecordingReporter, ReportedEvent, Reporter};
pub use forms::FeedbackKind;

use dom::*;
use forms::{FormUnit, Validator, FEEDBACK_BASE_CLASS};
use nav::NavToggle;
use observer::*;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    HtmlParse(String),
    Runtime(String),
    PageStructure(String),
    SelectorNotFound(String),
    UnsupportedSelector(String),
    TypeMismatch {
        selector: String,
        expected: String,
        actual: String,
    },
    AssertionFailed {
        selector: String,
        expected: String,
        actual: String,
        dom_snippet: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HtmlParse(msg) => write!(f, "html parse error: {msg}"),
            Self::Runtime(msg) => write!(f, "runtime error: {msg}"),
            Self::PageStructure(msg) => write!(f, "page structure error: {msg}"),
            Self::SelectorNotFound(selector) => write!(f, "selector not found: {selector}"),
            Self::UnsupportedSelector(selector) => write!(f, "unsupported selector: {selector}"),
            Self::TypeMismatch {
                selector,
                expected,
                actual,
            } => write!(
                f,
                "type mismatch for {selector}: expected {expected}, actual {actual}"
            ),
            Self::AssertionFailed {
                selector,
                expected,
                actual,
                dom_snippet,
            } => write!(
                f,
                "assertion failed for {selector}: expected {expected}, actual {actual}, snippet {dom_snippet}"
            ),
        }
    }
}

impl StdError for Error {}

/// Browser capability probes, injected instead of sniffed from globals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub intersection_observer: bool,
    pub native_lazy_loading: bool,
    pub prefers_reduced_motion: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            intersection_observer: true,
            native_lazy_loading: true,
            prefers_reduced_motion: false,
        }
    }
}

/// One enhanced form: the element id it is looked up by, and the logical
/// name attached to its analytics events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormConfig {
    pub id: String,
    pub name: String,
}

impl FormConfig {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

/// Page structure the enhancements bind to. The defaults are the marketing
/// page's fixed ids; anything absent from the document leaves the matching
/// component inert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhanceConfig {
    pub nav_toggle_id: String,
    pub nav_menu_id: String,
    pub forms: Vec<FormConfig>,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            nav_toggle_id: "nav-toggle".to_string(),
            nav_menu_id: "nav-menu".to_string(),
            forms: vec![
                FormConfig::new("form-yard-signs", "yard_sign_request"),
                FormConfig::new("form-contact", "campaign_contact"),
            ],
        }
    }
}

/// Construction-time injection points. A missing reporter degrades to
/// [`NoopReporter`].
pub struct Options {
    pub capabilities: Capabilities,
    pub config: EnhanceConfig,
    pub reporter: Option<Box<dyn Reporter>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            capabilities: Capabilities::default(),
            config: EnhanceConfig::default(),
            reporter: None,
        }
    }
}

/// One hand-off to the external form transport. The runtime records the
/// hand-off and goes no further; building the request is the backend's
/// business.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeSubmission {
    pub form_id: String,
    pub action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Handler {
    NavToggle,
    NavMenuLink,
    NavOutsideClose,
    FieldValidate,
    FormSubmit { form: usize },
    TrackLinkClick,
    TrackFormSubmit,
}

#[derive(Debug, Clone, Copy)]
struct ListenerEntry {
    target: NodeId,
    event: &'static str,
    capture: bool,
    handler: Handler,
}

#[derive(Debug, Clone)]
struct EventState {
    event_type: String,
    target: NodeId,
    current_target: NodeId,
    default_prevented: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerCallback {
    ClearFeedback { feedback: NodeId },
}

#[derive(Debug, Clone, Copy)]
struct ScheduledTask {
    id: i64,
    due_at: i64,
    order: i64,
    callback: TimerCallback,
}

/// The page under enhancement: DOM, listeners, virtual clock, viewport
/// model, and the injected reporter. Constructing one parses the document
/// and wires all five components, in the order the original script ran.
pub struct Page {
    pub(crate) dom: Dom,
    listeners: Vec<ListenerEntry>,
    task_queue: Vec<ScheduledTask>,
    now_ms: i64,
    next_timer_id: i64,
    next_task_order: i64,
    pub(crate) capabilities: Capabilities,
    pub(crate) config: EnhanceConfig,
    pub(crate) reporter: Box<dyn Reporter>,
    pub(crate) viewport: Viewport,
    pub(crate) bounds: HashMap<NodeId, Bounds>,
    pub(crate) watches: Vec<Watch>,
    pub(crate) nav: Option<NavToggle>,
    pub(crate) forms: Vec<FormUnit>,
    pub(crate) validator: Validator,
    pub(crate) seen_sections: HashSet<NodeId>,
    native_submissions: Vec<NativeSubmission>,
    trace: bool,
    trace_logs: Vec<String>,
    trace_log_limit: usize,
    trace_to_stderr: bool,
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("now_ms", &self.now_ms)
            .field("next_timer_id", &self.next_timer_id)
            .finish_non_exhaustive()
    }
}

impl Page {
    pub fn from_html(html: &str) -> Result<Self> {
        Self::from_html_with(html, Options::default())
    }

    pub fn from_html_with(html: &str, options: Options) -> Result<Self> {
        let dom = parse_html(html)?;
        let mut page = Self {
            dom,
            listeners: Vec::new(),
            task_queue: Vec::new(),
            now_ms: 0,
            next_timer_id: 1,
            next_task_order: 0,
            capabilities: options.capabilities,
            config: options.config,
            reporter: options
                .reporter
                .unwrap_or_else(|| Box::new(NoopReporter)),
            viewport: Viewport::default(),
            bounds: HashMap::new(),
            watches: Vec::new(),
            nav: None,
            forms: Vec::new(),
            validator: Validator::new()?,
            seen_sections: HashSet::new(),
            native_submissions: Vec::new(),
            trace: false,
            trace_logs: Vec::new(),
            trace_log_limit: 10_000,
            trace_to_stderr: true,
        };

        nav::wire(&mut page)?;
        forms::wire(&mut page)?;
        analytics::wire(&mut page)?;
        lazy::wire(&mut page)?;
        motion::wire(&mut page)?;

        // Observers report initially-visible targets without any scroll.
        page.deliver_intersections()?;
        Ok(page)
    }

    // ----- tracing -----

    pub fn enable_trace(&mut self, enabled: bool) {
        self.trace = enabled;
    }

    pub fn set_trace_stderr(&mut self, enabled: bool) {
        self.trace_to_stderr = enabled;
    }

    pub fn take_trace_logs(&mut self) -> Vec<String> {
        std::mem::take(&mut self.trace_logs)
    }

    pub(crate) fn trace_line(&mut self, line: String) {
        if !self.trace {
            return;
        }
        if self.trace_to_stderr {
            eprintln!("{line}");
        }
        self.trace_logs.push(line);
        while self.trace_logs.len() > self.trace_log_limit {
            self.trace_logs.remove(0);
        }
    }

    // ----- interactions -----

    pub fn click(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if self.dom.disabled(target) {
            return Ok(());
        }
        let event = self.dispatch_event(target, "click")?;
        if event.default_prevented {
            return Ok(());
        }
        // A submit button's default action is submitting its form.
        if self.is_submit_button(target) {
            if let Some(form) = self.dom.find_ancestor_by_tag(target, "form") {
                self.dispatch_submit(form)?;
            }
        }
        Ok(())
    }

    pub fn type_text(&mut self, selector: &str, text: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if self.dom.disabled(target) || self.dom.readonly(target) {
            return Ok(());
        }

        let tag = self
            .dom
            .tag_name(target)
            .ok_or_else(|| Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "input or textarea".into(),
                actual: "non-element".into(),
            })?
            .to_ascii_lowercase();

        if tag != "input" && tag != "textarea" {
            return Err(Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "input or textarea".into(),
                actual: tag,
            });
        }

        self.dom.set_value(target, text)?;
        self.dispatch_event(target, "input")?;
        Ok(())
    }

    pub fn change(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        self.dispatch_event(target, "change")?;
        Ok(())
    }

    pub fn blur(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        self.dispatch_event(target, "blur")?;
        Ok(())
    }

    /// Dispatches a submit on the selected form (or the selected element's
    /// owning form), then runs the native default action unless a handler
    /// prevented it.
    pub fn submit(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let form = self.resolve_form(target).ok_or_else(|| Error::TypeMismatch {
            selector: selector.to_string(),
            expected: "form or form control".into(),
            actual: self
                .dom
                .tag_name(target)
                .unwrap_or("non-element")
                .to_string(),
        })?;
        self.dispatch_submit(form)
    }

    /// Sets a form's feedback region, the way the submission backend's
    /// response handler would. A success classification auto-clears after
    /// five seconds of virtual time.
    pub fn show_form_feedback(
        &mut self,
        selector: &str,
        kind: FeedbackKind,
        message: &str,
    ) -> Result<()> {
        let target = self.select_one(selector)?;
        let form = self.resolve_form(target).ok_or_else(|| Error::TypeMismatch {
            selector: selector.to_string(),
            expected: "form or form control".into(),
            actual: self
                .dom
                .tag_name(target)
                .unwrap_or("non-element")
                .to_string(),
        })?;
        self.render_form_feedback(form, kind, message)
    }

    /// Forms handed to the external transport, in hand-off order.
    pub fn native_submissions(&self) -> &[NativeSubmission] {
        &self.native_submissions
    }

    pub(crate) fn record_native_submission(&mut self, form: NodeId) {
        let form_id = self.dom.attr(form, "id").unwrap_or_default();
        let action = self.dom.attr(form, "action").unwrap_or_default();
        self.trace_line(format!("[transport] form=#{form_id} action={action}"));
        self.native_submissions.push(NativeSubmission { form_id, action });
    }

    fn is_submit_button(&self, node: NodeId) -> bool {
        let is_button = self
            .dom
            .tag_name(node)
            .map(|tag| tag.eq_ignore_ascii_case("button"))
            .unwrap_or(false);
        if !is_button {
            return false;
        }
        matches!(self.dom.attr(node, "type").as_deref(), None | Some("submit"))
    }

    fn resolve_form(&self, node: NodeId) -> Option<NodeId> {
        if self
            .dom
            .tag_name(node)
            .map(|tag| tag.eq_ignore_ascii_case("form"))
            .unwrap_or(false)
        {
            return Some(node);
        }
        self.dom.find_ancestor_by_tag(node, "form")
    }

    fn dispatch_submit(&mut self, form: NodeId) -> Result<()> {
        let event = self.dispatch_event(form, "submit")?;
        if !event.default_prevented {
            self.record_native_submission(form);
        }
        Ok(())
    }

    // ----- virtual clock -----

    pub fn now_ms(&self) -> i64 {
        self.now_ms
    }

    pub fn advance_time(&mut self, delta_ms: i64) -> Result<()> {
        if delta_ms < 0 {
            return Err(Error::Runtime(
                "advance_time requires non-negative milliseconds".into(),
            ));
        }
        let from = self.now_ms;
        self.now_ms = self.now_ms.saturating_add(delta_ms);
        let ran = self.run_timer_queue(Some(self.now_ms), false)?;
        self.trace_line(format!(
            "[timer] advance delta_ms={} from={} to={} ran_due={}",
            delta_ms, from, self.now_ms, ran
        ));
        Ok(())
    }

    pub fn advance_time_to(&mut self, target_ms: i64) -> Result<()> {
        if target_ms < self.now_ms {
            return Err(Error::Runtime(format!(
                "advance_time_to requires target >= now_ms (target={target_ms}, now_ms={})",
                self.now_ms
            )));
        }
        let from = self.now_ms;
        self.now_ms = target_ms;
        let ran = self.run_timer_queue(Some(self.now_ms), false)?;
        self.trace_line(format!(
            "[timer] advance_to from={} to={} ran_due={}",
            from, self.now_ms, ran
        ));
        Ok(())
    }

    /// Runs every scheduled task, advancing the clock to each one's due
    /// time.
    pub fn flush(&mut self) -> Result<()> {
        let from = self.now_ms;
        let ran = self.run_timer_queue(None, true)?;
        self.trace_line(format!(
            "[timer] flush from={} to={} ran={}",
            from, self.now_ms, ran
        ));
        Ok(())
    }

    pub fn pending_timers(&self) -> usize {
        self.task_queue.len()
    }

    pub(crate) fn schedule_timeout(&mut self, delay_ms: i64, callback: TimerCallback) -> i64 {
        let id = self.next_timer_id;
        self.next_timer_id += 1;
        let order = self.next_task_order;
        self.next_task_order += 1;
        let due_at = self.now_ms.saturating_add(delay_ms.max(0));
        self.task_queue.push(ScheduledTask {
            id,
            due_at,
            order,
            callback,
        });
        self.trace_line(format!(
            "[timer] schedule id={id} delay_ms={delay_ms} due_at={due_at}"
        ));
        id
    }

    fn run_timer_queue(&mut self, due_limit: Option<i64>, advance_clock: bool) -> Result<usize> {
        let mut ran = 0usize;
        while let Some(next_idx) = self.next_task_index(due_limit) {
            ran += 1;
            let task = self.task_queue.remove(next_idx);
            if advance_clock && task.due_at > self.now_ms {
                self.now_ms = task.due_at;
            }
            self.execute_timer_task(task)?;
        }
        Ok(ran)
    }

    fn next_task_index(&self, due_limit: Option<i64>) -> Option<usize> {
        self.task_queue
            .iter()
            .enumerate()
            .filter(|(_, task)| due_limit.map(|limit| task.due_at <= limit).unwrap_or(true))
            .min_by_key(|(_, task)| (task.due_at, task.order))
            .map(|(idx, _)| idx)
    }

    fn execute_timer_task(&mut self, task: ScheduledTask) -> Result<()> {
        self.trace_line(format!(
            "[timer] run id={} due_at={} now_ms={}",
            task.id, task.due_at, self.now_ms
        ));
        match task.callback {
            TimerCallback::ClearFeedback { feedback } => {
                self.dom.set_class_name(feedback, FEEDBACK_BASE_CLASS)?;
                self.dom.set_text_content(feedback, "")?;
            }
        }
        Ok(())
    }

    // ----- viewport and geometry -----

    /// Places an element in document coordinates. Observed elements without
    /// bounds never intersect.
    pub fn set_bounds(&mut self, selector: &str, top: i64, height: i64) -> Result<()> {
        let target = self.select_one(selector)?;
        self.bounds.insert(target, Bounds { top, height });
        self.deliver_intersections()
    }

    pub fn scroll_to(&mut self, y: i64) -> Result<()> {
        self.viewport.scroll_y = y;
        self.deliver_intersections()
    }

    pub fn set_viewport_height(&mut self, height: i64) -> Result<()> {
        self.viewport.height = height;
        self.deliver_intersections()
    }

    // ----- event dispatch -----

    pub(crate) fn add_listener(
        &mut self,
        target: NodeId,
        event: &'static str,
        capture: bool,
        handler: Handler,
    ) {
        self.listeners.push(ListenerEntry {
            target,
            event,
            capture,
            handler,
        });
    }

    fn dispatch_event(&mut self, target: NodeId, event_type: &str) -> Result<EventState> {
        let mut event = EventState {
            event_type: event_type.to_string(),
            target,
            current_target: target,
            default_prevented: false,
        };
        self.trace_line(format!(
            "[event] type={event_type} target={}",
            self.node_label(target)
        ));

        let mut path = Vec::new();
        let mut cursor = Some(target);
        while let Some(node) = cursor {
            path.push(node);
            cursor = self.dom.parent(node);
        }
        path.reverse();

        // Capture phase, document downward.
        if path.len() >= 2 {
            for node in &path[..path.len() - 1] {
                event.current_target = *node;
                self.invoke_listeners(*node, &mut event, true)?;
            }
        }

        // Target phase: capture listeners first, then bubble listeners.
        event.current_target = target;
        self.invoke_listeners(target, &mut event, true)?;
        self.invoke_listeners(target, &mut event, false)?;

        // Bubble phase, back up to the document.
        if path.len() >= 2 {
            for node in path[..path.len() - 1].iter().rev() {
                event.current_target = *node;
                self.invoke_listeners(*node, &mut event, false)?;
            }
        }

        Ok(event)
    }

    fn invoke_listeners(
        &mut self,
        node: NodeId,
        event: &mut EventState,
        capture: bool,
    ) -> Result<()> {
        let handlers: Vec<Handler> = self
            .listeners
            .iter()
            .filter(|entry| {
                entry.target == node && entry.capture == capture && entry.event == event.event_type
            })
            .map(|entry| entry.handler)
            .collect();
        for handler in handlers {
            self.invoke_handler(handler, event)?;
        }
        Ok(())
    }

    fn invoke_handler(&mut self, handler: Handler, event: &mut EventState) -> Result<()> {
        match handler {
            Handler::NavToggle => {
                event.default_prevented = true;
                self.nav_toggle_click()
            }
            Handler::NavMenuLink => self.nav_collapse(),
            Handler::NavOutsideClose => self.nav_outside_click(event.target),
            Handler::FieldValidate => {
                self.apply_field_validation(event.current_target)?;
                Ok(())
            }
            Handler::FormSubmit { form } => {
                event.default_prevented = true;
                self.handle_form_submit(form)
            }
            Handler::TrackLinkClick => self.track_link_click(event.target),
            Handler::TrackFormSubmit => self.track_form_submit_capture(event.target),
        }
    }

    // ----- queries and assertions -----

    pub fn text(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        Ok(self.dom.text_content(target))
    }

    pub fn value(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        self.dom.value(target)
    }

    pub fn attr(&self, selector: &str, name: &str) -> Result<Option<String>> {
        let target = self.select_one(selector)?;
        Ok(self.dom.attr(target, name))
    }

    pub fn has_class(&self, selector: &str, class_name: &str) -> Result<bool> {
        let target = self.select_one(selector)?;
        Ok(self.dom.has_class(target, class_name))
    }

    pub fn is_disabled(&self, selector: &str) -> Result<bool> {
        let target = self.select_one(selector)?;
        Ok(self.dom.disabled(target))
    }

    pub fn style_property(&self, selector: &str, name: &str) -> Result<Option<String>> {
        let target = self.select_one(selector)?;
        Ok(self.dom.style_property(target, name))
    }

    pub fn assert_text(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.text_content(target);
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual,
                dom_snippet: self.node_snippet(target),
            });
        }
        Ok(())
    }

    pub fn assert_value(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.value(target)?;
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual,
                dom_snippet: self.node_snippet(target),
            });
        }
        Ok(())
    }

    pub fn assert_attr(&self, selector: &str, name: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.attr(target, name);
        if actual.as_deref() != Some(expected) {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual: actual.unwrap_or_else(|| "<missing>".to_string()),
                dom_snippet: self.node_snippet(target),
            });
        }
        Ok(())
    }

    pub fn assert_class(&self, selector: &str, class_name: &str, expected: bool) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.has_class(target, class_name);
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: format!("class {class_name:?} present: {expected}"),
                actual: format!("class {class_name:?} present: {actual}"),
                dom_snippet: self.node_snippet(target),
            });
        }
        Ok(())
    }

    pub fn assert_exists(&self, selector: &str) -> Result<()> {
        let _ = self.select_one(selector)?;
        Ok(())
    }

    pub fn dump_dom(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        Ok(self.dom.dump_node(target))
    }

    fn select_one(&self, selector: &str) -> Result<NodeId> {
        self.dom
            .query_selector(selector)?
            .ok_or_else(|| Error::SelectorNotFound(selector.to_string()))
    }

    fn node_snippet(&self, node_id: NodeId) -> String {
        truncate_chars(&self.dom.dump_node(node_id), 200)
    }

    pub(crate) fn node_label(&self, node_id: NodeId) -> String {
        if let Some(id) = self.dom.attr(node_id, "id") {
            return format!("#{id}");
        }
        match self.dom.tag_name(node_id) {
            Some(tag) => format!("<{tag}>"),
            None => "document".to_string(),
        }
    }
}
