//! Path pattern compilation and matching.
//!
//! A [`PathSpec`] is what a route is registered with: a string using the
//! token grammar below, a [`Regex`], or a list of either. [`PathPattern::compile`]
//! turns it into a single regular expression plus the ordered list of
//! parameter keys its capture groups produce.
//!
//! String grammar:
//!
//! | Token | Meaning |
//! |---|---|
//! | `:name` | one path segment, captured as `name` |
//! | `:name(re)` | a capture using a custom expression |
//! | `:name?` | an optional segment, including its leading `/` |
//! | `:name*` | the segment plus any following path |
//! | `.:name` | a format suffix (`/:file.:ext`) |
//! | `*` | any characters, including `/`, captured positionally |
//! | `(re)` | a bare group, captured positionally |
//! | `\x` | the character `x` taken literally |
//!
//! Unless the pattern is strict, one trailing slash is optional. Patterns
//! compiled with `end: false` match a prefix of the path that ends at a
//! segment boundary; the matched prefix is reported in [`PathMatch::path`].

use std::collections::HashSet;
use std::fmt;
use std::fmt::Write as _;

use percent_encoding::percent_decode_str;
use regex::Regex;

use junction_core::{JunctionError, JunctionResult};

use super::params::{ParamKey, Params};

/// A path specification as given at registration.
#[derive(Debug, Clone)]
pub enum PathSpec {
    /// A string using the token grammar.
    Text(String),
    /// A regular expression used as-is.
    Regex(Regex),
    /// Alternatives; the first one that matches wins.
    List(Vec<PathSpec>),
}

impl fmt::Display for PathSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Regex(regex) => write!(f, "/{}/", regex.as_str()),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for PathSpec {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for PathSpec {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&String> for PathSpec {
    fn from(text: &String) -> Self {
        Self::Text(text.clone())
    }
}

impl From<Regex> for PathSpec {
    fn from(regex: Regex) -> Self {
        Self::Regex(regex)
    }
}

impl<T: Into<Self>> From<Vec<T>> for PathSpec {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Self>, const N: usize> From<[T; N]> for PathSpec {
    fn from(items: [T; N]) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

/// Options controlling how a [`PathSpec`] is compiled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternOptions {
    /// Match letter case exactly.
    pub case_sensitive: bool,
    /// Require trailing slashes to match exactly.
    pub strict: bool,
    /// Require the whole path to match rather than a prefix.
    pub end: bool,
}

impl PatternOptions {
    /// Options for a route: whole-path matching.
    pub const fn route(case_sensitive: bool, strict: bool) -> Self {
        Self {
            case_sensitive,
            strict,
            end: true,
        }
    }

    /// Options for middleware and mounts: non-strict prefix matching.
    pub const fn prefix(case_sensitive: bool) -> Self {
        Self {
            case_sensitive,
            strict: false,
            end: false,
        }
    }
}

/// What a capture group of the compiled expression stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Param(ParamKey),
    /// The segment boundary after a prefix match; not part of the prefix.
    Boundary,
}

#[derive(Debug, Clone)]
enum Matcher {
    /// `/` as a prefix matches every path and consumes nothing.
    Root,
    /// `*` matches every path and captures all of it.
    Star,
    Regex(Regex),
}

/// A successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    /// The matched portion of the path.
    pub path: String,
    /// The decoded parameters.
    pub params: Params,
}

/// A compiled path specification.
#[derive(Debug, Clone)]
pub struct PathPattern {
    spec: PathSpec,
    matcher: Matcher,
    slots: Vec<Slot>,
}

impl PathPattern {
    /// Compiles a path specification.
    ///
    /// # Errors
    ///
    /// Returns [`JunctionError::InvalidPattern`] if the resulting expression
    /// does not compile, a string repeats a parameter name, or a list is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use junction_http::routing::{PathPattern, PathSpec, PatternOptions};
    ///
    /// let pattern = PathPattern::compile(
    ///     PathSpec::from("/user/:user/:op?"),
    ///     PatternOptions::route(false, false),
    /// ).unwrap();
    ///
    /// let m = pattern.matches("/user/tj/edit").unwrap().unwrap();
    /// assert_eq!(m.params.get("user"), Some("tj"));
    /// assert_eq!(m.params.get("op"), Some("edit"));
    ///
    /// let m = pattern.matches("/user/tj").unwrap().unwrap();
    /// assert_eq!(m.params.get("op"), None);
    /// ```
    pub fn compile(spec: PathSpec, options: PatternOptions) -> JunctionResult<Self> {
        if let PathSpec::Text(text) = &spec {
            if text == "/" && !options.end {
                return Ok(Self {
                    spec,
                    matcher: Matcher::Root,
                    slots: Vec::new(),
                });
            }
            if text == "*" {
                return Ok(Self {
                    spec,
                    matcher: Matcher::Star,
                    slots: vec![Slot::Param(ParamKey::Index(0))],
                });
            }
        }

        let mut slots = Vec::new();
        let source = expression(&spec, options, &mut slots)?;
        let source = if options.case_sensitive || matches!(spec, PathSpec::Regex(_)) {
            source
        } else {
            format!("(?i){source}")
        };
        let regex = Regex::new(&source)
            .map_err(|e| JunctionError::InvalidPattern(format!("{spec}: {e}")))?;

        Ok(Self {
            spec,
            matcher: Matcher::Regex(regex),
            slots,
        })
    }

    /// Returns the specification this pattern was compiled from.
    pub const fn spec(&self) -> &PathSpec {
        &self.spec
    }

    /// Returns the compiled expression, if the pattern uses one.
    pub fn regex(&self) -> Option<&Regex> {
        match &self.matcher {
            Matcher::Regex(regex) => Some(regex),
            Matcher::Root | Matcher::Star => None,
        }
    }

    /// Returns the parameter keys in capture order.
    pub fn keys(&self) -> impl Iterator<Item = &ParamKey> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Param(key) => Some(key),
            Slot::Boundary => None,
        })
    }

    /// Matches `path`, decoding captured values.
    ///
    /// Returns `Ok(None)` when the path does not match.
    ///
    /// # Errors
    ///
    /// Returns [`JunctionError::BadRequest`] if a captured value contains a
    /// malformed percent-escape.
    pub fn matches(&self, path: &str) -> JunctionResult<Option<PathMatch>> {
        let regex = match &self.matcher {
            Matcher::Root => {
                return Ok(Some(PathMatch {
                    path: String::new(),
                    params: Params::new(),
                }))
            }
            Matcher::Star => {
                let mut params = Params::new();
                params.insert(0, decode_param(path)?);
                return Ok(Some(PathMatch {
                    path: path.to_string(),
                    params,
                }));
            }
            Matcher::Regex(regex) => regex,
        };

        let Some(captures) = regex.captures(path) else {
            return Ok(None);
        };
        let Some(whole) = captures.get(0) else {
            return Ok(None);
        };

        let mut end = whole.end();
        let mut params = Params::new();
        for (i, slot) in self.slots.iter().enumerate() {
            let Some(group) = captures.get(i + 1) else {
                continue;
            };
            match slot {
                Slot::Boundary => end -= group.len(),
                Slot::Param(key) => params.insert(key.clone(), decode_param(group.as_str())?),
            }
        }

        Ok(Some(PathMatch {
            path: path[whole.start()..end].to_string(),
            params,
        }))
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.spec)
    }
}

/// Percent-decodes a captured value.
///
/// `+` is left alone. A `%` not followed by two hex digits, or escapes that
/// decode to invalid UTF-8, are rejected.
///
/// # Errors
///
/// Returns [`JunctionError::BadRequest`] naming the offending value.
pub fn decode_param(value: &str) -> JunctionResult<String> {
    if !value.contains('%') {
        return Ok(value.to_string());
    }
    let failed = || JunctionError::BadRequest(format!("Failed to decode param '{value}'"));

    let bytes = value.as_bytes();
    for (i, byte) in bytes.iter().enumerate() {
        if *byte == b'%' {
            let well_formed = bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit);
            if !well_formed {
                return Err(failed());
            }
        }
    }

    percent_decode_str(value)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| failed())
}

fn expression(spec: &PathSpec, options: PatternOptions, slots: &mut Vec<Slot>) -> JunctionResult<String> {
    match spec {
        PathSpec::Text(text) => translate(text, options, slots),
        PathSpec::Regex(regex) => {
            let mut positional = 0;
            for name in regex.capture_names().skip(1) {
                let key = name.map_or_else(
                    || {
                        positional += 1;
                        ParamKey::Index(positional - 1)
                    },
                    |name| ParamKey::Name(name.to_string()),
                );
                slots.push(Slot::Param(key));
            }
            Ok(regex.as_str().to_string())
        }
        PathSpec::List(items) => {
            if items.is_empty() {
                return Err(JunctionError::InvalidPattern("empty path list".into()));
            }
            let alternatives = items
                .iter()
                .map(|item| expression(item, options, slots))
                .collect::<JunctionResult<Vec<_>>>()?;
            Ok(format!("(?:{})", alternatives.join("|")))
        }
    }
}

/// A `:name` token and its modifiers.
#[derive(Debug)]
struct Token {
    slash: bool,
    format: bool,
    name: String,
    capture: Option<String>,
    star: bool,
    optional: bool,
}

/// Parses a token starting at `start`, returning it and the index after it.
fn parse_token(chars: &[char], start: usize) -> Option<(Token, usize)> {
    let mut i = start;
    let slash = chars.get(i) == Some(&'/');
    if slash {
        i += 1;
    }
    let format = chars.get(i) == Some(&'.');
    if format {
        i += 1;
    }
    if chars.get(i) != Some(&':') {
        return None;
    }
    i += 1;

    let name_start = i;
    while chars.get(i).is_some_and(|c| c.is_ascii_alphanumeric() || *c == '_') {
        i += 1;
    }
    if i == name_start {
        return None;
    }
    let name: String = chars[name_start..i].iter().collect();

    let mut capture = None;
    if chars.get(i) == Some(&'(') {
        if let Some(len) = chars[i..].iter().position(|c| *c == ')') {
            capture = Some(chars[i + 1..i + len].iter().collect());
            i += len + 1;
        }
    }
    let star = chars.get(i) == Some(&'*');
    if star {
        i += 1;
    }
    let optional = chars.get(i) == Some(&'?');
    if optional {
        i += 1;
    }

    Some((
        Token {
            slash,
            format,
            name,
            capture,
            star,
            optional,
        },
        i,
    ))
}

fn translate(text: &str, options: PatternOptions, slots: &mut Vec<Slot>) -> JunctionResult<String> {
    let mut chars: Vec<char> = text.chars().collect();
    if !options.strict {
        if !text.ends_with('/') {
            chars.push('/');
        }
        chars.push('?');
    }

    let mut out = String::from("^");
    let mut positional = 0;
    let mut names = HashSet::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            out.push('\\');
            if let Some(next) = chars.get(i + 1) {
                out.push(*next);
            }
            i += 2;
            continue;
        }
        if c == '/' && chars.get(i + 1) == Some(&'(') {
            out.push_str("\\/(?:");
            i += 2;
            continue;
        }
        if let Some((token, next)) = parse_token(&chars, i) {
            if !names.insert(token.name.clone()) {
                return Err(JunctionError::InvalidPattern(format!(
                    "{text}: parameter \"{}\" appears more than once",
                    token.name
                )));
            }
            emit_token(token, &mut out, slots, &mut positional);
            i = next;
            continue;
        }
        emit_plain(c, chars.get(i + 1).copied(), &mut out, slots, &mut positional);
        i += 1;
    }

    if options.end {
        out.push('$');
    } else if !out.ends_with('/') {
        out.push_str("(\\/|$)");
        slots.push(Slot::Boundary);
    }
    Ok(out)
}

fn emit_token(token: Token, out: &mut String, slots: &mut Vec<Slot>, positional: &mut usize) {
    let slash = if token.slash { "\\/" } else { "" };
    let format = if token.format { "\\." } else { "" };

    if !token.optional {
        out.push_str(slash);
    }
    out.push_str("(?:");
    out.push_str(format);
    if token.optional {
        out.push_str(slash);
    }

    slots.push(Slot::Param(ParamKey::Name(token.name)));
    if let Some(capture) = token.capture {
        out.push('(');
        let inner: Vec<char> = capture.chars().collect();
        let mut i = 0;
        while i < inner.len() {
            if inner[i] == '\\' {
                out.push('\\');
                if let Some(next) = inner.get(i + 1) {
                    out.push(*next);
                }
                i += 2;
                continue;
            }
            emit_plain(inner[i], inner.get(i + 1).copied(), out, slots, positional);
            i += 1;
        }
        out.push(')');
    } else {
        let _ = write!(out, "([^\\/{format}]+?)");
    }

    if token.star {
        let _ = write!(out, "((?:[\\/{format}].+?)?)");
        slots.push(Slot::Param(ParamKey::Index(*positional)));
        *positional += 1;
    }

    out.push(')');
    if token.optional {
        out.push('?');
    }
}

fn emit_plain(c: char, next: Option<char>, out: &mut String, slots: &mut Vec<Slot>, positional: &mut usize) {
    match c {
        '*' => {
            out.push_str("(.*)");
            slots.push(Slot::Param(ParamKey::Index(*positional)));
            *positional += 1;
        }
        '(' => {
            out.push('(');
            if next != Some('?') {
                slots.push(Slot::Param(ParamKey::Index(*positional)));
                *positional += 1;
            }
        }
        '/' => out.push_str("\\/"),
        '.' => out.push_str("\\."),
        other => out.push(other),
    }
}
