//! Filter escaping and `{placeholder}` templates
//!
//! Templates are parsed once when the configuration is loaded, so rendering a
//! template while validating a login can never fail.

use std::fmt;
use thiserror::Error;

/// Escape a value for inclusion in a directory search filter.
///
/// Replaces `*`, `(`, `)`, `\` and NUL with their `\XX` hex escapes in a single pass
/// over the input. Already-escaped input is not recognised: escaping `\2A` again
/// yields `\5C2A`.
pub fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '*' => escaped.push_str("\\2A"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\\' => escaped.push_str("\\5C"),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Named value that can be substituted into a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    /// The (escaped) login name
    Username,
    /// The resolved distinguished name of the user
    UserDn,
}

impl Placeholder {
    pub fn name(&self) -> &'static str {
        match self {
            Placeholder::Username => "username",
            Placeholder::UserDn => "userdn",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "username" => Some(Placeholder::Username),
            "userdn" => Some(Placeholder::UserDn),
            _ => None,
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder '{{{0}}}'")]
    UnknownPlaceholder(String),

    #[error("placeholder {0} is not available here")]
    NotAllowed(Placeholder),

    #[error("unbalanced '{brace}' at offset {offset}")]
    UnbalancedBrace { brace: char, offset: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Placeholder),
}

/// A parsed `{placeholder}` template. `{{` and `}}` stand for literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse `source`, accepting only the placeholders listed in `allowed`.
    pub fn parse(source: &str, allowed: &[Placeholder]) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((offset, ch)) = chars.next() {
            match ch {
                '{' if chars.peek().map(|&(_, c)| c) == Some('{') => {
                    chars.next();
                    literal.push('{');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, '{')) | None => {
                                return Err(TemplateError::UnbalancedBrace { brace: '{', offset });
                            }
                            Some((_, c)) => name.push(c),
                        }
                    }
                    let placeholder = Placeholder::from_name(&name)
                        .ok_or(TemplateError::UnknownPlaceholder(name))?;
                    if !allowed.contains(&placeholder) {
                        return Err(TemplateError::NotAllowed(placeholder));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(placeholder));
                }
                '}' if chars.peek().map(|&(_, c)| c) == Some('}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(TemplateError::UnbalancedBrace { brace: '}', offset }),
                _ => literal.push(ch),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Substitute placeholders. A placeholder without a value is rendered as written.
    pub fn render(&self, values: &Substitutions<'_>) -> String {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(placeholder) => match values.get(*placeholder) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&placeholder.to_string()),
                },
            }
        }
        out
    }

    /// The template text as configured
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Values available to a template at render time
#[derive(Debug, Clone, Copy, Default)]
pub struct Substitutions<'a> {
    username: Option<&'a str>,
    userdn: Option<&'a str>,
}

impl<'a> Substitutions<'a> {
    pub fn new(username: &'a str) -> Self {
        Self {
            username: Some(username),
            userdn: None,
        }
    }

    pub fn with_userdn(mut self, userdn: &'a str) -> Self {
        self.userdn = Some(userdn);
        self
    }

    pub fn get(&self, placeholder: Placeholder) -> Option<&'a str> {
        match placeholder {
            Placeholder::Username => self.username,
            Placeholder::UserDn => self.userdn,
        }
    }
}
