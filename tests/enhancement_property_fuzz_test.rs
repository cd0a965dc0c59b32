use page_enhancer::{Page, Result};
use proptest::collection::vec;
use proptest::prelude::*;
use proptest::test_runner::{FileFailurePersistence, TestCaseError, TestCaseResult};

const ENHANCEMENT_PROPTEST_REGRESSION_FILE: &str =
    "tests/proptest-regressions/enhancement_property_fuzz_test.txt";
const DEFAULT_ENHANCEMENT_PROPTEST_CASES: u32 = 128;

const FUZZ_PAGE: &str = r#"
<nav>
  <button id='nav-toggle' aria-expanded='false'>Menu</button>
  <ul id='nav-menu'>
    <li><a id='nav-about' href='/about'>About</a></li>
  </ul>
  <span id='nav-brand'>Riverbend</span>
</nav>
<main>
  <p id='outside'>Campaign copy.</p>
  <form id='form-contact' action='https://forms.example/f/contact'>
    <div id='row-name' class='row'>
      <input id='contact-name' name='name' required>
      <span class='error-msg'></span>
    </div>
    <div id='row-email' class='row'>
      <input id='contact-email' name='email' type='email'>
      <span class='error-msg'></span>
    </div>
    <div id='row-phone' class='row'>
      <input id='contact-phone' name='phone' type='tel'>
      <span class='error-msg'></span>
    </div>
    <button id='contact-send' type='submit'>Send</button>
    <p id='contact-feedback' class='form-feedback'></p>
  </form>
</main>
"#;

#[derive(Clone, Debug)]
enum VisitorAction {
    ClickToggle,
    ClickMenuLink,
    ClickBrand,
    ClickOutside,
    TypeName(String),
    TypeEmail(String),
    TypePhone(String),
    BlurEmail,
    BlurPhone,
    SubmitForm,
    ClickSend,
    AdvanceTime(i64),
}

fn env_proptest_cases(var_name: &str, default_cases: u32) -> u32 {
    std::env::var(var_name)
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default_cases)
}

fn enhancement_proptest_cases() -> u32 {
    std::env::var("PAGE_ENHANCER_ENHANCEMENT_PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or_else(|| {
            env_proptest_cases(
                "PAGE_ENHANCER_PROPTEST_CASES",
                DEFAULT_ENHANCEMENT_PROPTEST_CASES,
            )
        })
}

fn field_text_strategy() -> BoxedStrategy<String> {
    vec(
        prop_oneof![
            Just('a'),
            Just('b'),
            Just('z'),
            Just('0'),
            Just('5'),
            Just('9'),
            Just('@'),
            Just('.'),
            Just(' '),
            Just('-'),
            Just('+'),
            Just('('),
            Just(')'),
        ],
        0..=14,
    )
    .prop_map(|chars| chars.into_iter().collect())
    .boxed()
}

fn visitor_action_strategy() -> BoxedStrategy<VisitorAction> {
    prop_oneof![
        3 => Just(VisitorAction::ClickToggle),
        1 => Just(VisitorAction::ClickMenuLink),
        1 => Just(VisitorAction::ClickBrand),
        2 => Just(VisitorAction::ClickOutside),
        3 => field_text_strategy().prop_map(VisitorAction::TypeName),
        3 => field_text_strategy().prop_map(VisitorAction::TypeEmail),
        3 => field_text_strategy().prop_map(VisitorAction::TypePhone),
        2 => Just(VisitorAction::BlurEmail),
        2 => Just(VisitorAction::BlurPhone),
        2 => Just(VisitorAction::SubmitForm),
        2 => Just(VisitorAction::ClickSend),
        1 => (0i64..=6_000).prop_map(VisitorAction::AdvanceTime),
    ]
    .boxed()
}

fn visitor_action_sequence_strategy() -> BoxedStrategy<Vec<VisitorAction>> {
    vec(visitor_action_strategy(), 1..=32).boxed()
}

fn run_action(page: &mut Page, action: &VisitorAction) -> Result<()> {
    match action {
        VisitorAction::ClickToggle => page.click("#nav-toggle"),
        VisitorAction::ClickMenuLink => page.click("#nav-about"),
        VisitorAction::ClickBrand => page.click("#nav-brand"),
        VisitorAction::ClickOutside => page.click("#outside"),
        VisitorAction::TypeName(value) => page.type_text("#contact-name", value),
        VisitorAction::TypeEmail(value) => page.type_text("#contact-email", value),
        VisitorAction::TypePhone(value) => page.type_text("#contact-phone", value),
        VisitorAction::BlurEmail => page.blur("#contact-email"),
        VisitorAction::BlurPhone => page.blur("#contact-phone"),
        VisitorAction::SubmitForm => page.submit("#form-contact"),
        VisitorAction::ClickSend => page.click("#contact-send"),
        VisitorAction::AdvanceTime(delta) => page.advance_time(*delta),
    }
}

/// Model of the required rule: a trimmed-empty value fails.
fn model_name_valid(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Model of the email rule: optional, and non-empty values need a single
/// `@` with a dotted remainder, no whitespace anywhere.
fn model_email_valid(value: &str) -> bool {
    if value.is_empty() {
        return true;
    }
    let Some((local, rest)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || rest.is_empty() {
        return false;
    }
    if value.chars().filter(|ch| *ch == '@').count() != 1 {
        return false;
    }
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    rest.char_indices()
        .any(|(idx, ch)| ch == '.' && idx > 0 && idx + 1 < rest.len())
}

/// Model of the phone rule: optional; the whitespace-stripped value must be
/// ten or more characters drawn from digits and phone punctuation.
fn model_phone_valid(value: &str) -> bool {
    if value.is_empty() {
        return true;
    }
    let stripped: Vec<char> = value.chars().filter(|ch| !ch.is_whitespace()).collect();
    stripped.len() >= 10
        && stripped
            .iter()
            .all(|ch| ch.is_ascii_digit() || matches!(ch, '-' | '+' | '(' | ')'))
}

fn check_nav_agreement(page: &Page, step: usize, action: &VisitorAction) -> TestCaseResult {
    let aria = page
        .attr("#nav-toggle", "aria-expanded")
        .map_err(|err| TestCaseError::fail(format!("{err:?}")))?;
    let active = page
        .has_class("#nav-menu", "active")
        .map_err(|err| TestCaseError::fail(format!("{err:?}")))?;
    prop_assert_eq!(
        aria.as_deref() == Some("true"),
        active,
        "aria-expanded and menu class diverged after step {}: {:?}",
        step,
        action
    );
    Ok(())
}

fn assert_visit_sequence_is_stable(actions: &[VisitorAction]) -> TestCaseResult {
    let mut page = Page::from_html(FUZZ_PAGE)
        .map_err(|err| TestCaseError::fail(format!("{err:?}")))?;

    let mut name = String::new();
    let mut email = String::new();
    let mut phone = String::new();
    let mut submitted = false;

    for (step, action) in actions.iter().enumerate() {
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            run_action(&mut page, action)
        }));

        match outcome {
            Err(_) => {
                prop_assert!(
                    false,
                    "action panicked at step {step}: {action:?}, actions={actions:?}"
                );
            }
            Ok(Err(error)) => {
                prop_assert!(
                    false,
                    "action returned error at step {step}: {action:?}, error={error:?}, actions={actions:?}"
                );
            }
            Ok(Ok(())) => {}
        }

        // Mirror the typed values; disabled controls never apply here.
        match action {
            VisitorAction::TypeName(value) => name = value.clone(),
            VisitorAction::TypeEmail(value) => email = value.clone(),
            VisitorAction::TypePhone(value) => phone = value.clone(),
            VisitorAction::SubmitForm | VisitorAction::ClickSend => {
                let send_disabled = page
                    .is_disabled("#contact-send")
                    .map_err(|err| TestCaseError::fail(format!("{err:?}")))?;
                let all_valid = model_name_valid(&name)
                    && model_email_valid(&email)
                    && model_phone_valid(&phone);
                // A click on the disabled button never reaches the form.
                let attempted = !(matches!(action, VisitorAction::ClickSend) && submitted);
                if attempted && all_valid && !submitted {
                    submitted = true;
                }
                prop_assert_eq!(
                    send_disabled,
                    submitted,
                    "send button state diverged after step {}: {:?}",
                    step,
                    action
                );
            }
            _ => {}
        }

        // Hard invariant: at most one hand-off to the transport, ever.
        prop_assert!(
            page.native_submissions().len() <= 1,
            "transport handed more than one submission after step {}: {:?}",
            step,
            action
        );
        prop_assert_eq!(
            page.native_submissions().len(),
            usize::from(submitted),
            "submission count diverged after step {}: {:?}",
            step,
            action
        );

        if matches!(action, VisitorAction::BlurEmail) {
            let marked_invalid = page
                .has_class("#row-email", "is-invalid")
                .map_err(|err| TestCaseError::fail(format!("{err:?}")))?;
            prop_assert_eq!(
                marked_invalid,
                !model_email_valid(&email),
                "email validation diverged after step {}: {:?}",
                step,
                action
            );
        }

        check_nav_agreement(&page, step, action)?;
    }

    Ok(())
}

fn assert_validation_matches_model(
    name: &str,
    email: &str,
    phone: &str,
) -> TestCaseResult {
    let mut page = Page::from_html(FUZZ_PAGE)
        .map_err(|err| TestCaseError::fail(format!("{err:?}")))?;

    for (selector, value) in [
        ("#contact-name", name),
        ("#contact-email", email),
        ("#contact-phone", phone),
    ] {
        page.type_text(selector, value)
            .map_err(|err| TestCaseError::fail(format!("{err:?}")))?;
        page.blur(selector)
            .map_err(|err| TestCaseError::fail(format!("{err:?}")))?;
    }

    let cases = [
        ("#row-name", model_name_valid(name), name),
        ("#row-email", model_email_valid(email), email),
        ("#row-phone", model_phone_valid(phone), phone),
    ];
    for (row_selector, expected_valid, value) in cases {
        let marked_invalid = page
            .has_class(row_selector, "is-invalid")
            .map_err(|err| TestCaseError::fail(format!("{err:?}")))?;
        prop_assert_eq!(
            marked_invalid,
            !expected_valid,
            "validation diverged from model for {} with value {:?}",
            row_selector,
            value
        );
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: enhancement_proptest_cases(),
        failure_persistence: Some(Box::new(
            FileFailurePersistence::Direct(ENHANCEMENT_PROPTEST_REGRESSION_FILE),
        )),
        .. ProptestConfig::default()
    })]

    #[test]
    fn visitor_action_sequences_keep_invariants(actions in visitor_action_sequence_strategy()) {
        assert_visit_sequence_is_stable(&actions)?;
    }

    #[test]
    fn field_validation_matches_the_model(
        name in field_text_strategy(),
        email in field_text_strategy(),
        phone in field_text_strategy(),
    ) {
        assert_validation_matches_model(&name, &email, &phone)?;
    }
}
