//! Mustache-style rendering of scaffolded template files
//!
//! Only files ending in [`TEMPLATE_FILE_EXT`] are rendered. Placeholders whose
//! variable is missing or `null` are written back exactly as they appear in the
//! source, so templates may carry placeholders meant for a later tool (or for
//! another generation mode) without them being deleted.
//!
//! Supported tags: `{{name}}`, `{{{name}}}`, `{{&name}}`, dotted names, the
//! implicit iterator `{{.}}`, sections `{{#name}}…{{/name}}`, inverted sections
//! `{{^name}}…{{/name}}` and comments `{{! … }}`. Values are inserted verbatim
//! (no HTML escaping): the output is source code, not markup.

use crate::error::RenderError;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::ops::Range;
use tracing::debug;

/// Extension marking a file as a template
pub const TEMPLATE_FILE_EXT: &str = ".tpl";

/// Variable map used for rendering
pub type Variables = Map<String, Value>;

/// Opening and closing tag delimiters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiters {
    pub open: &'static str,
    pub close: &'static str,
}

pub const DEFAULT_DELIMITERS: Delimiters = Delimiters {
    open: "{{",
    close: "}}",
};

/// Delimiters used by templates published before the mustache switch
pub const LEGACY_DELIMITERS: Delimiters = Delimiters {
    open: "{%",
    close: "%}",
};

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Variable(String),
    Section {
        name: String,
        inverted: bool,
        children: Vec<Token>,
    },
    Comment,
}

/// A parsed node and the byte range of the source it was read from
#[derive(Debug, Clone, PartialEq)]
struct Token {
    node: Node,
    span: Range<usize>,
}

/// A parsed template
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    tokens: Vec<Token>,
    preserve_unresolved: bool,
}

impl Template {
    pub fn parse(source: &str, delimiters: Delimiters) -> Result<Self, RenderError> {
        Ok(Self {
            source: source.to_string(),
            tokens: Parser::new(source, delimiters).parse()?,
            preserve_unresolved: false,
        })
    }

    /// Write variable tags that cannot be resolved back as their exact source
    /// text instead of dropping them
    ///
    /// The lookup happens at render time, so inside a list section each item
    /// decides for itself.
    pub fn preserve_unresolved(mut self) -> Self {
        self.preserve_unresolved = true;
        self
    }

    pub fn render(&self, variables: &Variables) -> String {
        let mut out = String::with_capacity(self.source.len());
        let mut stack = vec![Scope::Root(variables)];
        self.render_tokens(&self.tokens, &mut stack, &mut out);
        out
    }

    fn render_tokens<'v>(&self, tokens: &[Token], stack: &mut Vec<Scope<'v>>, out: &mut String) {
        for token in tokens {
            match &token.node {
                Node::Text(text) => out.push_str(text),
                Node::Comment => {}
                Node::Variable(name) => match resolve(stack, name) {
                    Some(value) if !value.is_null() => out.push_str(&to_text(value)),
                    _ if self.preserve_unresolved => out.push_str(&self.source[token.span.clone()]),
                    _ => {}
                },
                Node::Section {
                    name,
                    inverted,
                    children,
                } => {
                    let value = resolve(stack, name);
                    let truthy = value.is_some_and(is_truthy);
                    if *inverted {
                        if !truthy {
                            self.render_tokens(children, stack, out);
                        }
                        continue;
                    }
                    match value {
                        Some(Value::Array(items)) => {
                            for item in items {
                                stack.push(Scope::Value(item));
                                self.render_tokens(children, stack, out);
                                stack.pop();
                            }
                        }
                        Some(value) if truthy => {
                            stack.push(Scope::Value(value));
                            self.render_tokens(children, stack, out);
                            stack.pop();
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}

/// Render `source`, dropping tags whose variable is missing
pub fn render(
    source: &str,
    variables: &Variables,
    delimiters: Delimiters,
) -> Result<String, RenderError> {
    Ok(Template::parse(source, delimiters)?.render(variables))
}

/// Render `source`, keeping tags whose variable is missing or null verbatim
pub fn render_preserving_unresolved(
    source: &str,
    variables: &Variables,
    delimiters: Delimiters,
) -> Result<String, RenderError> {
    Ok(Template::parse(source, delimiters)?
        .preserve_unresolved()
        .render(variables))
}

/// Render the contents of a scaffolded file
///
/// Non-template files are returned unchanged (byte-identical), which keeps
/// binary assets intact.
pub fn render_template_file_data<'a>(
    file_name: &str,
    raw: &'a [u8],
    variables: &Variables,
) -> Result<Cow<'a, [u8]>, RenderError> {
    if !file_name.ends_with(TEMPLATE_FILE_EXT) {
        return Ok(Cow::Borrowed(raw));
    }

    let text = String::from_utf8_lossy(raw);
    let rendered = render_preserving_unresolved(&text, variables, DEFAULT_DELIMITERS)?;

    // Second pass for older templates; a parse failure there means the
    // content merely looks like a legacy tag, so the first pass stands.
    let rendered = match render_preserving_unresolved(&rendered, variables, LEGACY_DELIMITERS) {
        Ok(legacy) => legacy,
        Err(err) => {
            debug!(file = file_name, error = %err, "skipping legacy delimiter pass");
            rendered
        }
    };

    Ok(Cow::Owned(rendered.into_bytes()))
}

/// Render a scaffolded file name and strip the template extension
pub fn render_template_file_name(
    file_name: &str,
    variables: &Variables,
) -> Result<String, RenderError> {
    let rendered = render(file_name, variables, DEFAULT_DELIMITERS)?;
    Ok(match rendered.strip_suffix(TEMPLATE_FILE_EXT) {
        Some(stripped) => stripped.to_string(),
        None => rendered,
    })
}

struct Parser<'s> {
    source: &'s str,
    delimiters: Delimiters,
}

struct OpenSection {
    name: String,
    inverted: bool,
    start: usize,
    parent: Vec<Token>,
}

impl<'s> Parser<'s> {
    fn new(source: &'s str, delimiters: Delimiters) -> Self {
        Self { source, delimiters }
    }

    fn parse(&self) -> Result<Vec<Token>, RenderError> {
        let source = self.source;
        let mut tokens: Vec<Token> = Vec::new();
        let mut open_sections: Vec<OpenSection> = Vec::new();
        let mut text_start = 0;
        let mut pos = 0;

        while let Some(offset) = source[pos..].find(self.delimiters.open) {
            let tag_start = pos + offset;
            let after_open = tag_start + self.delimiters.open.len();

            let (sigil, body_start, closing) = match source[after_open..].chars().next() {
                Some('{') => (Some('{'), after_open + 1, format!("}}{}", self.delimiters.close)),
                Some(c @ ('&' | '#' | '^' | '/' | '!' | '=' | '>')) => {
                    (Some(c), after_open + 1, self.delimiters.close.to_string())
                }
                _ => (None, after_open, self.delimiters.close.to_string()),
            };

            let body_len = source[body_start..]
                .find(&closing)
                .ok_or(RenderError::UnclosedTag {
                    position: tag_start,
                })?;
            let name = source[body_start..body_start + body_len].trim().to_string();
            let tag_end = body_start + body_len + closing.len();

            if matches!(sigil, Some('=' | '>')) {
                return Err(RenderError::UnsupportedTag {
                    sigil: sigil.unwrap_or_default(),
                    position: tag_start,
                });
            }
            if name.is_empty() && sigil != Some('!') {
                return Err(RenderError::EmptyTag {
                    position: tag_start,
                });
            }

            let is_block = matches!(sigil, Some('#' | '^' | '/' | '!'));
            let (text_end, next) = match is_block
                .then(|| self.standalone_bounds(text_start, tag_start, tag_end))
                .flatten()
            {
                Some(bounds) => bounds,
                None => (tag_start, tag_end),
            };

            if text_end > text_start {
                tokens.push(Token {
                    node: Node::Text(source[text_start..text_end].to_string()),
                    span: text_start..text_end,
                });
            }

            match sigil {
                Some('#' | '^') => open_sections.push(OpenSection {
                    name,
                    inverted: sigil == Some('^'),
                    start: tag_start,
                    parent: std::mem::take(&mut tokens),
                }),
                Some('/') => {
                    let open = open_sections.pop().ok_or_else(|| RenderError::UnopenedSection {
                        name: name.clone(),
                        position: tag_start,
                    })?;
                    if open.name != name {
                        return Err(RenderError::MismatchedSection {
                            expected: open.name,
                            found: name,
                            position: tag_start,
                        });
                    }
                    let children = std::mem::replace(&mut tokens, open.parent);
                    tokens.push(Token {
                        node: Node::Section {
                            name,
                            inverted: open.inverted,
                            children,
                        },
                        span: open.start..tag_end,
                    });
                }
                Some('!') => tokens.push(Token {
                    node: Node::Comment,
                    span: tag_start..tag_end,
                }),
                _ => tokens.push(Token {
                    node: Node::Variable(name),
                    span: tag_start..tag_end,
                }),
            }

            pos = next;
            text_start = next;
        }

        if let Some(open) = open_sections.pop() {
            return Err(RenderError::UnclosedSection {
                name: open.name,
                position: open.start,
            });
        }

        if text_start < source.len() {
            tokens.push(Token {
                node: Node::Text(source[text_start..].to_string()),
                span: text_start..source.len(),
            });
        }

        Ok(tokens)
    }

    /// For a block tag alone on its line, return where the preceding text ends
    /// and where parsing resumes so the whole line is dropped from the output
    fn standalone_bounds(
        &self,
        text_start: usize,
        tag_start: usize,
        tag_end: usize,
    ) -> Option<(usize, usize)> {
        let source = self.source;
        let line_start = source[..tag_start].rfind('\n').map_or(0, |i| i + 1);
        if line_start < text_start {
            // another tag precedes this one on the same line
            return None;
        }
        if !source[line_start..tag_start]
            .chars()
            .all(|c| c == ' ' || c == '\t')
        {
            return None;
        }

        let rest = &source[tag_end..];
        let line_len = rest.find('\n').map_or(rest.len(), |i| i + 1);
        if !rest[..line_len].chars().all(char::is_whitespace) {
            return None;
        }

        Some((line_start, tag_end + line_len))
    }
}

/// One level of the lookup stack
#[derive(Clone, Copy)]
enum Scope<'a> {
    Root(&'a Variables),
    Value(&'a Value),
}

impl<'a> Scope<'a> {
    fn get(self, key: &str) -> Option<&'a Value> {
        match self {
            Scope::Root(map) => map.get(key),
            Scope::Value(value) => value.get(key),
        }
    }

    fn current(self) -> Option<&'a Value> {
        match self {
            Scope::Root(_) => None,
            Scope::Value(value) => Some(value),
        }
    }
}

fn resolve<'a>(stack: &[Scope<'a>], name: &str) -> Option<&'a Value> {
    if name == "." {
        return stack.last().and_then(|scope| scope.current());
    }

    let mut parts = name.split('.');
    let first = parts.next()?;
    let mut value = stack.iter().rev().find_map(|scope| scope.get(first))?;
    for part in parts {
        value = value.get(part)?;
    }
    Some(value)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Number(_) | Value::Object(_) => true,
    }
}

fn to_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::Null => Cow::Borrowed(""),
        Value::String(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}
