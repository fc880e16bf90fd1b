//! CSS selector and absolute XPath subset understood by the memory DOM.
//!
//! Selectors: `tag`, `*`, `#id`, `.class`, `[attr]`, `[attr="value"]`,
//! descendant and `>` combinators, and `,` groups.

use crate::errors::DomError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Step {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attrs: Vec<AttrCond>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AttrCond {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Part {
    pub step: Step,
    /// Relation to the part on the left.
    pub combinator: Option<Combinator>,
}

pub(crate) type Chain = Vec<Part>;

pub(crate) fn parse_groups(selector: &str) -> Result<Vec<Chain>, DomError> {
    let mut groups = Vec::new();
    for group in split_outside_brackets(selector, ',') {
        groups.push(parse_chain(selector, group.trim())?);
    }
    if groups.is_empty() {
        return Err(DomError::invalid_selector(selector, "empty selector"));
    }
    Ok(groups)
}

fn parse_chain(full: &str, selector: &str) -> Result<Chain, DomError> {
    if selector.is_empty() {
        return Err(DomError::invalid_selector(full, "empty selector group"));
    }
    let mut parts: Chain = Vec::new();
    let mut pending: Option<Combinator> = None;
    for token in tokenize(selector) {
        if token == ">" {
            if pending.is_some() || parts.is_empty() {
                return Err(DomError::invalid_selector(full, "dangling `>`"));
            }
            pending = Some(Combinator::Child);
            continue;
        }
        let step = parse_step(full, &token)?;
        let combinator = if parts.is_empty() {
            None
        } else {
            Some(pending.take().unwrap_or(Combinator::Descendant))
        };
        parts.push(Part { step, combinator });
    }
    if parts.is_empty() || pending.is_some() {
        return Err(DomError::invalid_selector(full, "incomplete selector"));
    }
    Ok(parts)
}

fn split_outside_brackets(selector: &str, sep: char) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (idx, ch) in selector.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, c) if c == sep && depth == 0 => {
                out.push(&selector[start..idx]);
                start = idx + ch.len_utf8();
            }
            _ => {}
        }
    }
    out.push(&selector[start..]);
    out
}

fn tokenize(selector: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for ch in selector.chars() {
        if let Some(q) = quote {
            current.push(ch);
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' if depth > 0 => {
                quote = Some(ch);
                current.push(ch);
            }
            '[' => {
                depth += 1;
                current.push(ch);
            }
            ']' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            c if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            '>' if depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(">".to_string());
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'
}

fn read_ident(chars: &[char], mut pos: usize) -> (String, usize) {
    let start = pos;
    while pos < chars.len() && is_ident_char(chars[pos]) {
        pos += 1;
    }
    (chars[start..pos].iter().collect(), pos)
}

fn parse_step(full: &str, token: &str) -> Result<Step, DomError> {
    let chars: Vec<char> = token.chars().collect();
    let mut step = Step::default();
    let mut pos = 0;
    if chars.first() == Some(&'*') {
        pos = 1;
    } else if chars.first().map(|c| is_ident_char(*c)).unwrap_or(false) {
        let (tag, next) = read_ident(&chars, 0);
        step.tag = Some(tag.to_ascii_lowercase());
        pos = next;
    }
    while pos < chars.len() {
        match chars[pos] {
            '#' => {
                let (id, next) = read_ident(&chars, pos + 1);
                if id.is_empty() {
                    return Err(DomError::invalid_selector(full, "empty id"));
                }
                step.id = Some(id);
                pos = next;
            }
            '.' => {
                let (class, next) = read_ident(&chars, pos + 1);
                if class.is_empty() {
                    return Err(DomError::invalid_selector(full, "empty class"));
                }
                step.classes.push(class);
                pos = next;
            }
            '[' => {
                let (cond, next) = parse_attr(full, &chars, pos + 1)?;
                step.attrs.push(cond);
                pos = next;
            }
            other => {
                return Err(DomError::invalid_selector(
                    full,
                    format!("unsupported character `{other}`"),
                ))
            }
        }
    }
    Ok(step)
}

fn parse_attr(full: &str, chars: &[char], pos: usize) -> Result<(AttrCond, usize), DomError> {
    let (name, mut pos) = read_ident(chars, pos);
    if name.is_empty() {
        return Err(DomError::invalid_selector(full, "empty attribute name"));
    }
    match chars.get(pos) {
        Some(']') => Ok((AttrCond { name, value: None }, pos + 1)),
        Some('=') => {
            pos += 1;
            let value = match chars.get(pos) {
                Some(q @ ('"' | '\'')) => {
                    let q = *q;
                    let start = pos + 1;
                    let end = chars[start..]
                        .iter()
                        .position(|c| *c == q)
                        .map(|offset| start + offset)
                        .ok_or_else(|| DomError::invalid_selector(full, "unterminated quote"))?;
                    pos = end + 1;
                    chars[start..end].iter().collect::<String>()
                }
                _ => {
                    let (raw, next) = read_ident(chars, pos);
                    pos = next;
                    raw
                }
            };
            if chars.get(pos) != Some(&']') {
                return Err(DomError::invalid_selector(full, "expected `]`"));
            }
            Ok((
                AttrCond {
                    name,
                    value: Some(value),
                },
                pos + 1,
            ))
        }
        _ => Err(DomError::invalid_selector(
            full,
            "unsupported attribute operator",
        )),
    }
}

/// One `/tag[n]` segment of an absolute XPath; `index` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct XPathStep {
    pub tag: String,
    pub index: usize,
}

pub(crate) fn parse_xpath(path: &str) -> Result<Vec<XPathStep>, DomError> {
    let Some(rest) = path.strip_prefix('/') else {
        return Err(DomError::invalid_selector(path, "xpath must be absolute"));
    };
    let mut steps = Vec::new();
    for segment in rest.split('/') {
        let (tag, index) = match segment.split_once('[') {
            Some((tag, tail)) => {
                let raw = tail
                    .strip_suffix(']')
                    .ok_or_else(|| DomError::invalid_selector(path, "expected `]`"))?;
                let index: usize = raw
                    .parse()
                    .map_err(|_| DomError::invalid_selector(path, "non-numeric index"))?;
                if index == 0 {
                    return Err(DomError::invalid_selector(path, "indices start at 1"));
                }
                (tag, index)
            }
            None => (segment, 1),
        };
        if tag.is_empty() || !tag.chars().all(is_ident_char) {
            return Err(DomError::invalid_selector(path, "unsupported step"));
        }
        steps.push(XPathStep {
            tag: tag.to_ascii_lowercase(),
            index,
        });
    }
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_compound_attribute_selector() {
        let groups = parse_groups(
            r#"button.btn.btn-primary[data-bs-dismiss="modal"][onclick="return onTermsAgree();"]"#,
        )
        .unwrap();
        assert_eq!(groups.len(), 1);
        let step = &groups[0][0].step;
        assert_eq!(step.tag.as_deref(), Some("button"));
        assert_eq!(step.classes, vec!["btn", "btn-primary"]);
        assert_eq!(step.attrs[1].value.as_deref(), Some("return onTermsAgree();"));
    }

    #[test]
    fn parses_combinators_and_groups() {
        let groups = parse_groups("form .mb-3 > label, #x_listbox .k-item").unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 3);
        assert_eq!(groups[0][1].combinator, Some(Combinator::Descendant));
        assert_eq!(groups[0][2].combinator, Some(Combinator::Child));
        assert_eq!(groups[1][0].step.id.as_deref(), Some("x_listbox"));
    }

    #[test]
    fn rejects_pseudo_classes() {
        assert!(matches!(
            parse_groups("a:hover"),
            Err(DomError::InvalidSelector { .. })
        ));
        assert!(parse_groups("div >").is_err());
    }

    #[test]
    fn parses_absolute_xpath() {
        let steps = parse_xpath("/html/body/main/div/div[2]/button").unwrap();
        assert_eq!(steps.len(), 6);
        assert_eq!(steps[4], XPathStep { tag: "div".into(), index: 2 });
        assert!(parse_xpath("//button").is_err());
        assert!(parse_xpath("/html/body/div[0]").is_err());
    }
}
