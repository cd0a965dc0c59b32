use super::*;

pub(crate) const MSG_REQUIRED: &str = "This field is required.";
pub(crate) const MSG_EMAIL: &str = "Please enter a valid email address.";
pub(crate) const MSG_PHONE: &str = "Please enter a valid phone number.";
pub(crate) const MSG_FIX_ERRORS: &str = "Please fix the errors above.";
pub(crate) const SUBMITTING_LABEL: &str = "Submitting...";
pub(crate) const FEEDBACK_BASE_CLASS: &str = "form-feedback";
pub(crate) const INVALID_ROW_CLASS: &str = "is-invalid";
pub(crate) const FEEDBACK_CLEAR_MS: i64 = 5_000;

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";
const PHONE_PATTERN: &str = r"^[\d\s\-\+\(\)]{10,}$";

/// Classification written into the feedback region's class attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    Success,
    Error,
}

impl FeedbackKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// One enhanced form: its wired fields and the submission guard. The guard
/// latches on the first accepted submission and is never reset; the page is
/// expected to navigate away or the backend to answer.
#[derive(Debug, Clone)]
pub(crate) struct FormUnit {
    pub(crate) form: NodeId,
    pub(crate) name: String,
    pub(crate) fields: Vec<NodeId>,
    pub(crate) submitting: bool,
}

#[derive(Debug)]
pub(crate) struct Validator {
    email: fancy_regex::Regex,
    phone: fancy_regex::Regex,
}

impl Validator {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            email: compile_pattern(EMAIL_PATTERN)?,
            phone: compile_pattern(PHONE_PATTERN)?,
        })
    }

    /// Field rules in order; the first failing rule supplies the message.
    /// Typed rules only apply to non-empty values, so they never stack with
    /// the required rule.
    pub(crate) fn check(&self, dom: &Dom, field: NodeId) -> Result<Option<&'static str>> {
        let element = dom
            .element(field)
            .ok_or_else(|| Error::Runtime("validated field is not an element".into()))?;
        let value = element.value.clone();
        let field_type = element.attrs.get("type").cloned().unwrap_or_default();

        if element.required && value.trim().is_empty() {
            return Ok(Some(MSG_REQUIRED));
        }

        if field_type == "email" && !value.is_empty() && !self.matches(&self.email, &value)? {
            return Ok(Some(MSG_EMAIL));
        }

        if field_type == "tel" && !value.is_empty() {
            let stripped: String = value.chars().filter(|ch| !ch.is_whitespace()).collect();
            if !self.matches(&self.phone, &stripped)? {
                return Ok(Some(MSG_PHONE));
            }
        }

        Ok(None)
    }

    fn matches(&self, regex: &fancy_regex::Regex, value: &str) -> Result<bool> {
        regex
            .is_match(value)
            .map_err(|err| Error::Runtime(format!("validation regex failed: {err}")))
    }
}

fn compile_pattern(pattern: &str) -> Result<fancy_regex::Regex> {
    fancy_regex::Regex::new(pattern)
        .map_err(|err| Error::Runtime(format!("invalid validation pattern {pattern:?}: {err}")))
}

pub(crate) fn wire(page: &mut Page) -> Result<()> {
    let configs = page.config.forms.clone();
    for config in configs {
        let Some(form) = page.dom.by_id(&config.id) else {
            continue;
        };

        let fields = page.dom.query_selector_all_from(form, "input, textarea")?;
        let index = page.forms.len();
        page.forms.push(FormUnit {
            form,
            name: config.name,
            fields: fields.clone(),
            submitting: false,
        });

        for field in fields {
            page.add_listener(field, "blur", false, Handler::FieldValidate);
            page.add_listener(field, "change", false, Handler::FieldValidate);
        }
        page.add_listener(form, "submit", false, Handler::FormSubmit { form: index });
    }
    Ok(())
}

impl Page {
    /// Validates one field and renders the result into its row: the
    /// `is-invalid` class and the `.error-msg` text mirror exactly the
    /// current verdict. Returns the validity.
    pub(crate) fn apply_field_validation(&mut self, field: NodeId) -> Result<bool> {
        let message = self.validator.check(&self.dom, field)?;

        // The row container is a hard structural dependency of the page.
        let row = self.dom.closest(field, ".row")?.ok_or_else(|| {
            Error::PageStructure(format!(
                "validated field {} has no .row container",
                self.node_label(field)
            ))
        })?;
        let error_slot = self.dom.query_selector_from(row, ".error-msg")?;

        match message {
            None => {
                self.dom.remove_class(row, INVALID_ROW_CLASS)?;
                if let Some(slot) = error_slot {
                    self.dom.set_text_content(slot, "")?;
                }
                Ok(true)
            }
            Some(message) => {
                self.dom.add_class(row, INVALID_ROW_CLASS)?;
                if let Some(slot) = error_slot {
                    self.dom.set_text_content(slot, message)?;
                }
                Ok(false)
            }
        }
    }

    pub(crate) fn handle_form_submit(&mut self, index: usize) -> Result<()> {
        let fields = self.forms[index].fields.clone();
        let form = self.forms[index].form;

        let mut all_valid = true;
        for field in fields {
            if !self.apply_field_validation(field)? {
                all_valid = false;
            }
        }

        if !all_valid {
            self.render_form_feedback(form, FeedbackKind::Error, MSG_FIX_ERRORS)?;
            return Ok(());
        }

        // Double-submit guard: discarded silently, no user feedback.
        if self.forms[index].submitting {
            return Ok(());
        }
        self.forms[index].submitting = true;

        let submit_button = self
            .dom
            .query_selector_from(form, "button[type=submit]")?
            .ok_or_else(|| {
                Error::PageStructure(format!(
                    "form {} has no submit button",
                    self.node_label(form)
                ))
            })?;
        self.dom.set_disabled(submit_button, true)?;
        self.dom.set_text_content(submit_button, SUBMITTING_LABEL)?;

        let name = self.forms[index].name.clone();
        let action = self.dom.attr(form, "action").unwrap_or_default();
        let params = EventParams::new()
            .with("form_name", name)
            .with("form_action", action);
        self.track_event("form_submit", params);

        self.record_native_submission(form);
        Ok(())
    }

    pub(crate) fn render_form_feedback(
        &mut self,
        form: NodeId,
        kind: FeedbackKind,
        message: &str,
    ) -> Result<()> {
        let Some(feedback) = self
            .dom
            .query_selector_from(form, ".form-feedback")?
        else {
            return Ok(());
        };

        self.dom.set_text_content(feedback, message)?;
        self.dom
            .set_class_name(feedback, &format!("{FEEDBACK_BASE_CLASS} {}", kind.as_str()))?;

        // Fire-and-forget: the timer is never canceled, so a clear scheduled
        // here can stomp a message rendered later. Matches the page's
        // observable behavior.
        if kind == FeedbackKind::Success {
            self.schedule_timeout(FEEDBACK_CLEAR_MS, TimerCallback::ClearFeedback { feedback });
        }
        Ok(())
    }
}
