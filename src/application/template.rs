// Placeholder templates with `[[ ]]` delimiters
//
// LaTeX claims `{}`, `%` and `$`, so tags use double square brackets:
//
//   [[title]]                      substitution
//   [[if description]]..[[else]]..[[end]]
//   [[each panels]]..[[id]]..[[end]]
//
// Inside `each`, the item's fields shadow the outer ones.
use std::collections::HashMap;

const OPEN: &str = "[[";
const CLOSE: &str = "]]";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("line {line}: unclosed tag, missing \"]]\"")]
    UnclosedTag { line: usize },

    #[error("line {line}: empty tag")]
    EmptyTag { line: usize },

    #[error("line {line}: invalid tag \"{tag}\"")]
    InvalidTag { line: usize, tag: String },

    #[error("line {line}: \"else\" outside of an if block")]
    UnexpectedElse { line: usize },

    #[error("line {line}: \"end\" without a matching block")]
    UnexpectedEnd { line: usize },

    #[error("line {line}: \"{keyword}\" block is never closed")]
    UnclosedBlock { line: usize, keyword: &'static str },

    #[error("unknown field \"{0}\"")]
    UnknownField(String),

    #[error("field \"{0}\" is not a list")]
    NotAList(String),

    #[error("field \"{0}\" is a list and can only be used with \"each\" or \"if\"")]
    NotText(String),
}

#[derive(Debug, Clone)]
pub enum Value {
    Text(String),
    Bool(bool),
    List(Vec<Scope>),
}

impl Value {
    fn is_truthy(&self) -> bool {
        match self {
            Value::Text(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            Value::List(items) => !items.is_empty(),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Named values a template is rendered against.
#[derive(Debug, Clone, Default)]
pub struct Scope(HashMap<&'static str, Value>);

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.0.insert(name, value.into());
        self
    }

    pub fn with_list(mut self, name: &'static str, items: Vec<Scope>) -> Self {
        self.0.insert(name, Value::List(items));
        self
    }

    fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Field(String),
    If {
        field: String,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
    Each {
        field: String,
        body: Vec<Node>,
    },
}

enum Tag<'a> {
    Field(&'a str),
    If(&'a str),
    Each(&'a str),
    Else,
    End,
}

/// A block being parsed, with the line it was opened on.
enum Frame {
    If {
        line: usize,
        field: String,
        then: Vec<Node>,
        in_else: bool,
    },
    Each {
        line: usize,
        field: String,
    },
}

#[derive(Debug, Clone)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        // (open block, nodes collected so far at that depth)
        let mut stack: Vec<(Frame, Vec<Node>)> = Vec::new();
        let mut current: Vec<Node> = Vec::new();
        let mut rest = source;
        let mut line = 1;

        while let Some(start) = rest.find(OPEN) {
            let (text, after_open) = rest.split_at(start);
            push_text(&mut current, text);
            line += text.matches('\n').count();

            let after_open = &after_open[OPEN.len()..];
            let end = after_open.find(CLOSE).ok_or(TemplateError::UnclosedTag { line })?;
            let raw = &after_open[..end];
            rest = &after_open[end + CLOSE.len()..];

            match parse_tag(raw, line)? {
                Tag::Field(name) => current.push(Node::Field(name.to_string())),
                Tag::If(name) => {
                    let frame = Frame::If {
                        line,
                        field: name.to_string(),
                        then: Vec::new(),
                        in_else: false,
                    };
                    stack.push((frame, std::mem::take(&mut current)));
                }
                Tag::Each(name) => {
                    let frame = Frame::Each {
                        line,
                        field: name.to_string(),
                    };
                    stack.push((frame, std::mem::take(&mut current)));
                }
                Tag::Else => match stack.last_mut() {
                    Some((Frame::If { then, in_else, .. }, _)) if !*in_else => {
                        *then = std::mem::take(&mut current);
                        *in_else = true;
                    }
                    _ => return Err(TemplateError::UnexpectedElse { line }),
                },
                Tag::End => {
                    let (frame, mut parent) =
                        stack.pop().ok_or(TemplateError::UnexpectedEnd { line })?;
                    let block = std::mem::take(&mut current);
                    parent.push(match frame {
                        Frame::If {
                            field,
                            then,
                            in_else,
                            ..
                        } => {
                            if in_else {
                                Node::If {
                                    field,
                                    then,
                                    otherwise: block,
                                }
                            } else {
                                Node::If {
                                    field,
                                    then: block,
                                    otherwise: Vec::new(),
                                }
                            }
                        }
                        Frame::Each { field, .. } => Node::Each { field, body: block },
                    });
                    current = parent;
                }
            }

            line += raw.matches('\n').count();
        }
        push_text(&mut current, rest);

        if let Some((frame, _)) = stack.pop() {
            return Err(match frame {
                Frame::If { line, .. } => TemplateError::UnclosedBlock { line, keyword: "if" },
                Frame::Each { line, .. } => TemplateError::UnclosedBlock { line, keyword: "each" },
            });
        }

        Ok(Self { nodes: current })
    }

    pub fn render(&self, scope: &Scope) -> Result<String, TemplateError> {
        let mut out = String::new();
        render_nodes(&self.nodes, &mut vec![scope], &mut out)?;
        Ok(out)
    }
}

fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if !text.is_empty() {
        nodes.push(Node::Text(text.to_string()));
    }
}

fn parse_tag(raw: &str, line: usize) -> Result<Tag<'_>, TemplateError> {
    let words: Vec<&str> = raw.split_whitespace().collect();
    let invalid = || TemplateError::InvalidTag {
        line,
        tag: raw.trim().to_string(),
    };

    let tag = match words.as_slice() {
        [] => return Err(TemplateError::EmptyTag { line }),
        ["else"] => Tag::Else,
        ["end"] => Tag::End,
        ["if", name] => Tag::If(*name),
        ["each", name] => Tag::Each(*name),
        [name] => Tag::Field(*name),
        _ => return Err(invalid()),
    };

    match tag {
        Tag::Field(name) | Tag::If(name) | Tag::Each(name) if !is_identifier(name) => Err(invalid()),
        Tag::Field("if" | "each") => Err(invalid()),
        tag => Ok(tag),
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn lookup<'a>(scopes: &[&'a Scope], name: &str) -> Result<&'a Value, TemplateError> {
    scopes
        .iter()
        .rev()
        .find_map(|s| s.get(name))
        .ok_or_else(|| TemplateError::UnknownField(name.to_string()))
}

fn render_nodes<'a>(
    nodes: &[Node],
    scopes: &mut Vec<&'a Scope>,
    out: &mut String,
) -> Result<(), TemplateError> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Field(name) => match lookup(scopes, name)? {
                Value::Text(s) => out.push_str(s),
                Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
                Value::List(_) => return Err(TemplateError::NotText(name.clone())),
            },
            Node::If {
                field,
                then,
                otherwise,
            } => {
                let branch = if lookup(scopes, field)?.is_truthy() {
                    then
                } else {
                    otherwise
                };
                render_nodes(branch, scopes, out)?;
            }
            Node::Each { field, body } => {
                let Value::List(items) = lookup(scopes, field)? else {
                    return Err(TemplateError::NotAList(field.clone()));
                };
                for item in items {
                    scopes.push(item);
                    let rendered = render_nodes(body, scopes, out);
                    scopes.pop();
                    rendered?;
                }
            }
        }
    }
    Ok(())
}
