//! `$NAME` / `${NAME}` placeholder substitution for packaging templates.
//!
//! `$$` is an escaped dollar sign. Strict substitution rejects unknown or
//! malformed placeholders; permissive substitution leaves them untouched so
//! shell syntax in a PKGBUILD (`$pkgdir`, `${srcdir}`) survives rendering.
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder ${{{name}}}")]
    UnknownPlaceholder { name: String },
    #[error("invalid placeholder at line {line}, column {column}")]
    InvalidPlaceholder { line: usize, column: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Strict,
    Permissive,
}

/// Values bound to placeholder names.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: BTreeMap<String, String>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

fn placeholder_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"\$(?:(?P<escaped>\$)|(?P<named>[_A-Za-z][_A-Za-z0-9]*)|\{(?P<braced>[_A-Za-z][_A-Za-z0-9]*)\}|(?P<invalid>))",
        )
        .expect("regex for template placeholders")
    })
}

/// Render `template` against `bindings`.
pub fn substitute(
    template: &str,
    bindings: &Bindings,
    mode: Mode,
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in placeholder_regex().captures_iter(template) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&template[last..whole.start()]);
        last = whole.end();
        out.push_str(&expand(&caps, template, whole.start(), bindings, mode)?);
    }
    out.push_str(&template[last..]);
    Ok(out)
}

fn expand(
    caps: &Captures<'_>,
    template: &str,
    offset: usize,
    bindings: &Bindings,
    mode: Mode,
) -> Result<String, TemplateError> {
    let whole = &caps[0];
    if caps.name("escaped").is_some() {
        return Ok("$".to_string());
    }
    if let Some(name) = caps.name("named").or_else(|| caps.name("braced")) {
        return match (bindings.get(name.as_str()), mode) {
            (Some(value), _) => Ok(value.to_string()),
            (None, Mode::Permissive) => Ok(whole.to_string()),
            (None, Mode::Strict) => Err(TemplateError::UnknownPlaceholder {
                name: name.as_str().to_string(),
            }),
        };
    }
    match mode {
        Mode::Permissive => Ok(whole.to_string()),
        Mode::Strict => {
            let (line, column) = line_and_column(template, offset);
            Err(TemplateError::InvalidPlaceholder { line, column })
        }
    }
}

fn line_and_column(text: &str, offset: usize) -> (usize, usize) {
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(idx) => before[idx + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg_bindings() -> Bindings {
        Bindings::new()
            .with("PKGVER", "1.2.3")
            .with("SHA256SUM", "abc123")
    }

    #[test]
    fn braced_and_bare_placeholders_resolve() {
        let rendered = substitute(
            "pkgver=${PKGVER}\nsum=$SHA256SUM\n",
            &pkg_bindings(),
            Mode::Strict,
        )
        .expect("render");
        assert_eq!(rendered, "pkgver=1.2.3\nsum=abc123\n");
    }

    #[test]
    fn double_dollar_is_an_escape() {
        let rendered = substitute("cost $$5 ${PKGVER}", &pkg_bindings(), Mode::Strict)
            .expect("render");
        assert_eq!(rendered, "cost $5 1.2.3");
    }

    #[test]
    fn strict_mode_rejects_unknown_placeholder() {
        let err = substitute("Release: ${RELEASE}\n", &pkg_bindings(), Mode::Strict)
            .expect_err("unknown placeholder");
        assert_eq!(
            err,
            TemplateError::UnknownPlaceholder {
                name: "RELEASE".to_string()
            }
        );
    }

    #[test]
    fn strict_mode_rejects_invalid_placeholder_with_position() {
        let err = substitute("ok\nprice: $5\n", &pkg_bindings(), Mode::Strict)
            .expect_err("invalid placeholder");
        assert_eq!(err, TemplateError::InvalidPlaceholder { line: 2, column: 8 });
    }

    #[test]
    fn permissive_mode_keeps_unknown_placeholders_verbatim() {
        let template = "cd \"$srcdir/${pkgname}\"\npkgver=${PKGVER}\nprice $5 ${ broken\n";
        let rendered =
            substitute(template, &pkg_bindings(), Mode::Permissive).expect("render");
        assert_eq!(
            rendered,
            "cd \"$srcdir/${pkgname}\"\npkgver=1.2.3\nprice $5 ${ broken\n"
        );
    }

    #[test]
    fn rendering_is_deterministic() {
        let template = "sha256sums=('${SHA256SUM}')\npkgver=${PKGVER}\n";
        let first = substitute(template, &pkg_bindings(), Mode::Permissive).expect("render");
        let second = substitute(template, &pkg_bindings(), Mode::Permissive).expect("render");
        assert_eq!(first, second);
    }
}
