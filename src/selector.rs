use super::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SelectorAttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
    StartsWith { key: String, value: String },
    EndsWith { key: String, value: String },
    Contains { key: String, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SelectorStep {
    pub(crate) tag: Option<String>,
    pub(crate) universal: bool,
    pub(crate) id: Option<String>,
    pub(crate) classes: Vec<String>,
    pub(crate) attrs: Vec<SelectorAttrCondition>,
}

impl SelectorStep {
    pub(crate) fn id_only(&self) -> Option<&str> {
        if !self.universal && self.tag.is_none() && self.classes.is_empty() && self.attrs.is_empty()
        {
            self.id.as_deref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SelectorCombinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorPart {
    pub(crate) step: SelectorStep,
    // Relation to previous (left) selector part.
    pub(crate) combinator: Option<SelectorCombinator>,
}

/// Fast path: a selector list consisting of exactly one bare `#id` step.
pub(crate) fn groups_id_only(groups: &[Vec<SelectorPart>]) -> Option<&str> {
    match groups {
        [chain] => match chain.as_slice() {
            [part] => part.step.id_only(),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn parse_selector_groups(selector: &str) -> Result<Vec<Vec<SelectorPart>>> {
    let groups = split_selector_groups(selector)?;
    let mut parsed = Vec::with_capacity(groups.len());
    for group in groups {
        parsed.push(parse_selector_chain(&group)?);
    }
    Ok(parsed)
}

pub(crate) fn split_selector_groups(selector: &str) -> Result<Vec<String>> {
    let mut groups = Vec::new();
    let mut current = String::new();
    let mut bracket_depth = 0usize;

    for ch in selector.chars() {
        match ch {
            '[' => {
                bracket_depth += 1;
                current.push(ch);
            }
            ']' => {
                if bracket_depth == 0 {
                    return Err(Error::UnsupportedSelector(selector.into()));
                }
                bracket_depth -= 1;
                current.push(ch);
            }
            ',' if bracket_depth == 0 => {
                let trimmed = current.trim();
                if trimmed.is_empty() {
                    return Err(Error::UnsupportedSelector(selector.into()));
                }
                groups.push(trimmed.to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    if bracket_depth != 0 {
        return Err(Error::UnsupportedSelector(selector.into()));
    }

    let trimmed = current.trim();
    if trimmed.is_empty() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }
    groups.push(trimmed.to_string());
    Ok(groups)
}

pub(crate) fn parse_selector_chain(selector: &str) -> Result<Vec<SelectorPart>> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }

    let tokens = tokenize_selector(selector)?;
    let mut steps = Vec::new();
    let mut pending_combinator: Option<SelectorCombinator> = None;

    for token in tokens {
        if token == ">" {
            if pending_combinator.is_some() || steps.is_empty() {
                return Err(Error::UnsupportedSelector(selector.into()));
            }
            pending_combinator = Some(SelectorCombinator::Child);
            continue;
        }

        let step = parse_selector_step(&token)?;
        let combinator = if steps.is_empty() {
            None
        } else {
            Some(
                pending_combinator
                    .take()
                    .unwrap_or(SelectorCombinator::Descendant),
            )
        };
        steps.push(SelectorPart { step, combinator });
    }

    if steps.is_empty() || pending_combinator.is_some() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }

    Ok(steps)
}

pub(crate) fn tokenize_selector(selector: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut bracket_depth = 0usize;

    for ch in selector.chars() {
        match ch {
            '[' => {
                bracket_depth += 1;
                current.push(ch);
            }
            ']' => {
                if bracket_depth == 0 {
                    return Err(Error::UnsupportedSelector(selector.into()));
                }
                bracket_depth -= 1;
                current.push(ch);
            }
            '>' if bracket_depth == 0 => {
                if !current.trim().is_empty() {
                    tokens.push(current.trim().to_string());
                }
                current.clear();
                tokens.push(">".to_string());
            }
            ch if ch.is_ascii_whitespace() && bracket_depth == 0 => {
                if !current.trim().is_empty() {
                    tokens.push(current.trim().to_string());
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    if bracket_depth != 0 {
        return Err(Error::UnsupportedSelector(selector.into()));
    }
    if !current.trim().is_empty() {
        tokens.push(current.trim().to_string());
    }
    if tokens.is_empty() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }
    Ok(tokens)
}

pub(crate) fn parse_selector_step(part: &str) -> Result<SelectorStep> {
    let mut step = SelectorStep::default();
    let bytes = part.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'*' => {
                if step.tag.is_some() || step.universal || i != 0 {
                    return Err(Error::UnsupportedSelector(part.into()));
                }
                step.universal = true;
                i += 1;
            }
            b'#' => {
                let (ident, next) = parse_selector_ident(part, i + 1)
                    .ok_or_else(|| Error::UnsupportedSelector(part.into()))?;
                if step.id.is_some() {
                    return Err(Error::UnsupportedSelector(part.into()));
                }
                step.id = Some(ident);
                i = next;
            }
            b'.' => {
                let (ident, next) = parse_selector_ident(part, i + 1)
                    .ok_or_else(|| Error::UnsupportedSelector(part.into()))?;
                step.classes.push(ident);
                i = next;
            }
            b'[' => {
                let (condition, next) = parse_selector_attr_condition(part, i)?;
                step.attrs.push(condition);
                i = next;
            }
            b':' => {
                // Pseudo-classes are outside this runtime's selector subset.
                return Err(Error::UnsupportedSelector(part.into()));
            }
            _ => {
                if step.tag.is_some() || step.universal || i != 0 {
                    return Err(Error::UnsupportedSelector(part.into()));
                }
                let (ident, next) = parse_selector_ident(part, i)
                    .ok_or_else(|| Error::UnsupportedSelector(part.into()))?;
                step.tag = Some(ident.to_ascii_lowercase());
                i = next;
            }
        }
    }

    if step.tag.is_none()
        && !step.universal
        && step.id.is_none()
        && step.classes.is_empty()
        && step.attrs.is_empty()
    {
        return Err(Error::UnsupportedSelector(part.into()));
    }

    Ok(step)
}

pub(crate) fn parse_selector_ident(src: &str, start: usize) -> Option<(String, usize)> {
    let bytes = src.as_bytes();
    let mut i = start;
    while i < bytes.len() && is_selector_ident_char(bytes[i]) {
        i += 1;
    }
    if i == start {
        return None;
    }
    Some((src.get(start..i)?.to_string(), i))
}

pub(crate) fn is_selector_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_')
}

pub(crate) fn parse_selector_attr_condition(
    src: &str,
    start: usize,
) -> Result<(SelectorAttrCondition, usize)> {
    let bytes = src.as_bytes();
    let mut i = start;
    if bytes.get(i) != Some(&b'[') {
        return Err(Error::UnsupportedSelector(src.into()));
    }
    i += 1;

    let name_start = i;
    while i < bytes.len() && is_selector_attr_name_char(bytes[i]) {
        i += 1;
    }
    let key = src
        .get(name_start..i)
        .ok_or_else(|| Error::UnsupportedSelector(src.into()))?
        .to_ascii_lowercase();
    if key.is_empty() {
        return Err(Error::UnsupportedSelector(src.into()));
    }

    if bytes.get(i) == Some(&b']') {
        return Ok((SelectorAttrCondition::Exists { key }, i + 1));
    }

    let op = match (bytes.get(i), bytes.get(i + 1)) {
        (Some(b'='), _) => {
            i += 1;
            b'='
        }
        (Some(b'^'), Some(b'=')) => {
            i += 2;
            b'^'
        }
        (Some(b'$'), Some(b'=')) => {
            i += 2;
            b'$'
        }
        (Some(b'*'), Some(b'=')) => {
            i += 2;
            b'*'
        }
        _ => return Err(Error::UnsupportedSelector(src.into())),
    };

    let (value, next) = parse_selector_attr_value(src, i)?;
    if src.as_bytes().get(next) != Some(&b']') {
        return Err(Error::UnsupportedSelector(src.into()));
    }

    let condition = match op {
        b'=' => SelectorAttrCondition::Eq { key, value },
        b'^' => SelectorAttrCondition::StartsWith { key, value },
        b'$' => SelectorAttrCondition::EndsWith { key, value },
        b'*' => SelectorAttrCondition::Contains { key, value },
        _ => return Err(Error::UnsupportedSelector(src.into())),
    };
    Ok((condition, next + 1))
}

pub(crate) fn is_selector_attr_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':')
}

pub(crate) fn parse_selector_attr_value(src: &str, start: usize) -> Result<(String, usize)> {
    let bytes = src.as_bytes();
    let mut i = start;
    if matches!(bytes.get(i), Some(b'\'') | Some(b'"')) {
        let quote = bytes[i];
        i += 1;
        let value_start = i;
        while i < bytes.len() && bytes[i] != quote {
            i += 1;
        }
        if i >= bytes.len() {
            return Err(Error::UnsupportedSelector(src.into()));
        }
        let value = src
            .get(value_start..i)
            .ok_or_else(|| Error::UnsupportedSelector(src.into()))?
            .to_string();
        return Ok((value, i + 1));
    }

    let value_start = i;
    while i < bytes.len() && bytes[i] != b']' {
        i += 1;
    }
    let value = src
        .get(value_start..i)
        .ok_or_else(|| Error::UnsupportedSelector(src.into()))?
        .to_string();
    Ok((value, i))
}

pub(crate) fn node_matches(dom: &Dom, node: NodeId, groups: &[Vec<SelectorPart>]) -> bool {
    groups.iter().any(|chain| chain_matches(dom, node, chain))
}

fn chain_matches(dom: &Dom, node: NodeId, chain: &[SelectorPart]) -> bool {
    let Some((last, rest)) = chain.split_last() else {
        return false;
    };
    if !step_matches(dom, node, &last.step) {
        return false;
    }
    match last.combinator {
        None => true,
        Some(SelectorCombinator::Child) => match dom.parent(node) {
            Some(parent) if dom.element(parent).is_some() => chain_matches(dom, parent, rest),
            _ => false,
        },
        Some(SelectorCombinator::Descendant) => {
            let mut cursor = dom.parent(node);
            while let Some(ancestor) = cursor {
                if dom.element(ancestor).is_some() && chain_matches(dom, ancestor, rest) {
                    return true;
                }
                cursor = dom.parent(ancestor);
            }
            false
        }
    }
}

fn step_matches(dom: &Dom, node: NodeId, step: &SelectorStep) -> bool {
    let Some(element) = dom.element(node) else {
        return false;
    };

    if let Some(tag) = &step.tag {
        if !element.tag_name.eq_ignore_ascii_case(tag) {
            return false;
        }
    }

    if let Some(id) = &step.id {
        if element.attrs.get("id") != Some(id) {
            return false;
        }
    }

    for class_name in &step.classes {
        if !dom::has_class(element, class_name) {
            return false;
        }
    }

    for condition in &step.attrs {
        let matched = match condition {
            SelectorAttrCondition::Exists { key } => element.attrs.contains_key(key),
            SelectorAttrCondition::Eq { key, value } => {
                element.attrs.get(key).map(String::as_str) == Some(value.as_str())
            }
            SelectorAttrCondition::StartsWith { key, value } => element
                .attrs
                .get(key)
                .map(|v| v.starts_with(value.as_str()))
                .unwrap_or(false),
            SelectorAttrCondition::EndsWith { key, value } => element
                .attrs
                .get(key)
                .map(|v| v.ends_with(value.as_str()))
                .unwrap_or(false),
            SelectorAttrCondition::Contains { key, value } => element
                .attrs
                .get(key)
                .map(|v| v.contains(value.as_str()))
                .unwrap_or(false),
        };
        if !matched {
            return false;
        }
    }

    true
}
