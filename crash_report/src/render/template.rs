//! Strict report templates
//!
//! A small mustache-style language over [`SafeValue`]:
//!
//! - `{{ path.to.value }}` prints a value
//! - `{{#each path}} ... {{else}} ... {{/each}}` iterates a list or map,
//!   exposing `this`, `@index` and `@key`
//! - `{{#if path}} ... {{else}} ... {{/if}}` tests truthiness
//! - `{{! comment }}` is dropped
//!
//! Every string in a `SafeValue` is already escaped or sanitized, so printing
//! never needs a raw mode. Lists and maps print as compact JSON. Unknown
//! variables are errors rather than blanks.

use super::report::SafeValue;
use crate::config::compile_time::render::MAX_TEMPLATE_SIZE;
use crate::html::SafeHtml;
use crate::logging::codes;
use std::borrow::Cow;
use std::fs;
use std::path::Path;

const BUILTIN_TEMPLATE: &str = include_str!("../../templates/report.html");

/// Deepest allowed block nesting
const MAX_NESTING: usize = 32;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TemplateError {
    #[error("Failed to load template {path}: {message}")]
    Load { path: String, message: String },

    #[error("Template {path} is too large: {size} bytes (limit {limit})")]
    TooLarge { path: String, size: u64, limit: u64 },

    #[error("Template syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("Unknown template variable: {path}")]
    MissingVariable { path: String },

    #[error("Template value is not iterable: {path}")]
    NotIterable { path: String },

    #[error("Template value cannot be printed: {path}")]
    NotPrintable { path: String },
}

impl TemplateError {
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            TemplateError::Load { .. } | TemplateError::TooLarge { .. } => {
                codes::render::TEMPLATE_LOAD_FAILURE
            }
            TemplateError::Syntax { .. } => codes::render::TEMPLATE_SYNTAX,
            TemplateError::MissingVariable { .. }
            | TemplateError::NotIterable { .. }
            | TemplateError::NotPrintable { .. } => codes::render::TEMPLATE_RENDER,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Var(String),
    Each {
        path: String,
        body: Vec<Node>,
        empty: Vec<Node>,
    },
    If {
        path: String,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BlockKind {
    Root,
    Each,
    If,
}

impl BlockKind {
    fn name(&self) -> &'static str {
        match self {
            BlockKind::Root => "template",
            BlockKind::Each => "each",
            BlockKind::If => "if",
        }
    }
}

struct OpenBlock {
    kind: BlockKind,
    path: String,
    line: usize,
    nodes: Vec<Node>,
    otherwise: Option<Vec<Node>>,
}

impl OpenBlock {
    fn new(kind: BlockKind, path: &str, line: usize) -> Self {
        Self {
            kind,
            path: path.to_string(),
            line,
            nodes: Vec::new(),
            otherwise: None,
        }
    }

    fn push(&mut self, node: Node) {
        match &mut self.otherwise {
            Some(nodes) => nodes.push(node),
            None => self.nodes.push(node),
        }
    }

    fn into_node(self) -> Node {
        let otherwise = self.otherwise.unwrap_or_default();
        match self.kind {
            BlockKind::Each => Node::Each {
                path: self.path,
                body: self.nodes,
                empty: otherwise,
            },
            _ => Node::If {
                path: self.path,
                then: self.nodes,
                otherwise,
            },
        }
    }
}

/// A parsed template
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    name: String,
    nodes: Vec<Node>,
}

impl Template {
    /// The report template compiled into the crate
    pub fn builtin() -> Result<Self, TemplateError> {
        Self::parse("builtin", BUILTIN_TEMPLATE)
    }

    /// Load and parse a template file, refusing files over `MAX_TEMPLATE_SIZE`
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let display = path.display().to_string();
        let metadata = fs::metadata(path).map_err(|e| TemplateError::Load {
            path: display.clone(),
            message: e.to_string(),
        })?;
        if metadata.len() > MAX_TEMPLATE_SIZE {
            return Err(TemplateError::TooLarge {
                path: display,
                size: metadata.len(),
                limit: MAX_TEMPLATE_SIZE,
            });
        }
        let source = fs::read_to_string(path).map_err(|e| TemplateError::Load {
            path: display.clone(),
            message: e.to_string(),
        })?;
        Self::parse(&display, &source)
    }

    pub fn parse(name: &str, source: &str) -> Result<Self, TemplateError> {
        let mut stack = vec![OpenBlock::new(BlockKind::Root, "", 1)];
        let mut rest = source;
        let mut line = 1;

        while let Some(open) = rest.find("{{") {
            let (text, after) = rest.split_at(open);
            if !text.is_empty() {
                push_node(&mut stack, Node::Text(text.to_string()));
            }
            line += text.matches('\n').count();

            let close = after.find("}}").ok_or_else(|| syntax(line, "unterminated tag"))?;
            let tag = after[2..close].trim();
            line += after[..close].matches('\n').count();
            rest = &after[close + 2..];

            if tag.starts_with('!') {
                continue;
            }

            if let Some(path) = tag.strip_prefix("#each ") {
                open_block(&mut stack, BlockKind::Each, path, line)?;
            } else if let Some(path) = tag.strip_prefix("#if ") {
                open_block(&mut stack, BlockKind::If, path, line)?;
            } else if tag == "else" {
                let top = stack.last_mut().ok_or_else(|| syntax(line, "unbalanced blocks"))?;
                if top.kind == BlockKind::Root || top.otherwise.is_some() {
                    return Err(syntax(line, "unexpected {{else}}"));
                }
                top.otherwise = Some(Vec::new());
            } else if let Some(name) = tag.strip_prefix('/') {
                close_block(&mut stack, name.trim(), line)?;
            } else {
                validate_path(tag, line)?;
                push_node(&mut stack, Node::Var(tag.to_string()));
            }
        }

        if !rest.is_empty() {
            push_node(&mut stack, Node::Text(rest.to_string()));
        }

        match stack.pop() {
            Some(root) if root.kind == BlockKind::Root => Ok(Self {
                name: name.to_string(),
                nodes: root.nodes,
            }),
            Some(block) => Err(syntax(
                block.line,
                &format!("{{{{#{} {}}}}} is never closed", block.kind.name(), block.path),
            )),
            None => Err(syntax(line, "unbalanced blocks")),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn render(&self, data: &SafeValue) -> Result<String, TemplateError> {
        let mut out = String::new();
        let mut scopes = vec![Scope {
            this: data,
            index: None,
            key: None,
        }];
        render_nodes(&self.nodes, &mut scopes, &mut out)?;
        Ok(out)
    }
}

fn syntax(line: usize, message: &str) -> TemplateError {
    TemplateError::Syntax {
        line,
        message: message.to_string(),
    }
}

fn push_node(stack: &mut [OpenBlock], node: Node) {
    if let Some(top) = stack.last_mut() {
        top.push(node);
    }
}

fn open_block(
    stack: &mut Vec<OpenBlock>,
    kind: BlockKind,
    path: &str,
    line: usize,
) -> Result<(), TemplateError> {
    if stack.len() > MAX_NESTING {
        return Err(syntax(line, "blocks are nested too deeply"));
    }
    let path = path.trim();
    validate_path(path, line)?;
    stack.push(OpenBlock::new(kind, path, line));
    Ok(())
}

fn close_block(stack: &mut Vec<OpenBlock>, name: &str, line: usize) -> Result<(), TemplateError> {
    let expected = match name {
        "each" => BlockKind::Each,
        "if" => BlockKind::If,
        other => return Err(syntax(line, &format!("unknown closing tag {{{{/{}}}}}", other))),
    };
    match stack.last() {
        Some(top) if top.kind == expected => {}
        Some(top) => {
            return Err(syntax(
                line,
                &format!("{{{{/{}}}}} closes {{{{#{}}}}}", name, top.kind.name()),
            ))
        }
        None => return Err(syntax(line, "unbalanced blocks")),
    }
    if let Some(block) = stack.pop() {
        push_node(stack, block.into_node());
    }
    Ok(())
}

fn validate_path(path: &str, line: usize) -> Result<(), TemplateError> {
    let valid = !path.is_empty()
        && path
            .split('.')
            .all(|segment| {
                !segment.is_empty()
                    && segment
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '@')
            });
    if valid {
        Ok(())
    } else {
        Err(syntax(line, &format!("invalid variable name '{}'", path)))
    }
}

struct Scope<'a> {
    this: &'a SafeValue,
    index: Option<usize>,
    key: Option<&'a SafeHtml>,
}

fn missing(path: &str) -> TemplateError {
    TemplateError::MissingVariable {
        path: path.to_string(),
    }
}

fn resolve<'a>(path: &str, scopes: &[Scope<'a>]) -> Result<Cow<'a, SafeValue>, TemplateError> {
    let innermost = scopes.last().ok_or_else(|| missing(path))?;
    match path {
        "@index" => {
            let index = innermost.index.ok_or_else(|| missing(path))?;
            return Ok(Cow::Owned(SafeValue::Int(i64::try_from(index).unwrap_or(i64::MAX))));
        }
        "@key" => {
            let key = innermost.key.ok_or_else(|| missing(path))?;
            return Ok(Cow::Owned(SafeValue::Html(key.clone())));
        }
        _ => {}
    }

    let mut segments = path.split('.');
    let first = segments.next().unwrap_or_default();
    let mut current = if first == "this" {
        innermost.this
    } else {
        // Innermost scope that defines the name wins
        scopes
            .iter()
            .rev()
            .find_map(|scope| scope.this.get(first))
            .ok_or_else(|| missing(path))?
    };

    for segment in segments {
        current = current.get(segment).ok_or_else(|| missing(path))?;
    }
    Ok(Cow::Borrowed(current))
}

fn render_nodes<'a>(
    nodes: &[Node],
    scopes: &mut Vec<Scope<'a>>,
    out: &mut String,
) -> Result<(), TemplateError> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Var(path) => match &*resolve(path, scopes)? {
                SafeValue::Null => {}
                SafeValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
                SafeValue::Int(i) => out.push_str(&i.to_string()),
                SafeValue::Float(f) => out.push_str(&f.to_string()),
                SafeValue::Html(html) => out.push_str(html.as_str()),
                composite @ (SafeValue::List(_) | SafeValue::Map(_)) => {
                    // Strings inside are already escaped
                    let json = serde_json::to_string(composite)
                        .map_err(|_| TemplateError::NotPrintable { path: path.clone() })?;
                    out.push_str(&json);
                }
            },
            Node::If {
                path,
                then,
                otherwise,
            } => {
                let branch = if resolve(path, scopes)?.is_truthy() {
                    then
                } else {
                    otherwise
                };
                render_nodes(branch, scopes, out)?;
            }
            Node::Each { path, body, empty } => {
                let value = match resolve(path, scopes)? {
                    Cow::Borrowed(value) => value,
                    Cow::Owned(_) => {
                        return Err(TemplateError::NotIterable { path: path.clone() })
                    }
                };
                let rendered = match value {
                    SafeValue::Null => 0,
                    SafeValue::List(items) => {
                        for (index, item) in items.iter().enumerate() {
                            scopes.push(Scope {
                                this: item,
                                index: Some(index),
                                key: None,
                            });
                            let result = render_nodes(body, scopes, out);
                            scopes.pop();
                            result?;
                        }
                        items.len()
                    }
                    SafeValue::Map(entries) => {
                        for (index, (key, item)) in entries.iter().enumerate() {
                            scopes.push(Scope {
                                this: item,
                                index: Some(index),
                                key: Some(key),
                            });
                            let result = render_nodes(body, scopes, out);
                            scopes.pop();
                            result?;
                        }
                        entries.len()
                    }
                    _ => return Err(TemplateError::NotIterable { path: path.clone() }),
                };
                if rendered == 0 {
                    render_nodes(empty, scopes, out)?;
                }
            }
        }
    }
    Ok(())
}
