//! Resource classification
//!
//! Turns an operation type and raw command text into a resource kind and a
//! concrete target. Pure and synchronous; every extraction rule is a separate
//! function so each can be tested on its own.
//!
//! Known limitations: only the first output redirection is honoured, and
//! quoted paths are not unquoted (the quote characters stay in the token).

use crate::models::ResourceKind;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static REDIRECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">{1,2}\s*([^\s>|&;]+)").expect("valid redirect regex"));

static UPDATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*UPDATE\s+([A-Za-z_][A-Za-z0-9_]*)\s+SET\s+.+?\s+WHERE\s+(.+)$")
        .expect("valid update regex")
});

static DELETE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*DELETE\s+FROM\s+([A-Za-z_][A-Za-z0-9_]*)\s+WHERE\s+(.+)$")
        .expect("valid delete regex")
});

/// Runtime flags whose value is the following token (`docker stop -t 10 web`)
const CONTAINER_VALUE_FLAGS: &[&str] = &[
    "-t",
    "--time",
    "--timeout",
    "-s",
    "--signal",
    "--detach-keys",
    "--checkpoint",
    "--checkpoint-dir",
];

/// Concrete thing an operation acts on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum Target {
    File { path: String },
    Container { name: String },
    Rows { table: String, predicate: String },
    Unknown { reason: String },
}

impl Target {
    pub fn unknown(reason: impl Into<String>) -> Self {
        Self::Unknown {
            reason: reason.into(),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown { .. })
    }
}

/// Result of classifying one command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub kind: Option<ResourceKind>,
    pub target: Target,
}

/// Classify a command; never fails
pub fn classify(operation_type: &str, command: &str) -> Classification {
    let kind = ResourceKind::from_operation_type(operation_type);

    let target = match kind {
        Some(ResourceKind::File) => file_target(command),
        Some(ResourceKind::Container) => container_name(command)
            .map(|name| Target::Container { name })
            .unwrap_or_else(|| Target::unknown("no container name after the runtime verb")),
        Some(ResourceKind::DatabaseRow) => sql_target(operation_type, command),
        None => Target::unknown(format!("unrecognised operation type '{}'", operation_type)),
    };

    Classification { kind, target }
}

fn file_target(command: &str) -> Target {
    redirect_target(command)
        .or_else(|| copy_move_destination(command))
        .or_else(|| delete_target(command))
        .map(|path| Target::File { path })
        .unwrap_or_else(|| Target::unknown("no file path found in command"))
}

fn sql_target(operation_type: &str, command: &str) -> Target {
    let parsed = match operation_type {
        "sql_update" => parse_update(command),
        "sql_delete" => parse_delete(command),
        other => return Target::unknown(format!("no row capture for '{}'", other)),
    };

    parsed
        .map(|(table, predicate)| Target::Rows { table, predicate })
        .unwrap_or_else(|| Target::unknown("statement has no table or WHERE clause"))
}

/// First `>` or `>>` redirection target
pub fn redirect_target(command: &str) -> Option<String> {
    REDIRECT_RE
        .captures(command)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Destination of a `cp` or `mv` (last positional argument)
pub fn copy_move_destination(command: &str) -> Option<String> {
    let args = command_args(command, &["cp", "mv"])?;
    if args.len() < 2 {
        return None;
    }
    args.last().map(|arg| arg.to_string())
}

/// Target of an `rm` (first positional argument)
pub fn delete_target(command: &str) -> Option<String> {
    command_args(command, &["rm"])?
        .first()
        .map(|arg| arg.to_string())
}

/// First positional argument after the runtime verb (`docker stop web` -> `web`)
pub fn container_name(command: &str) -> Option<String> {
    let mut tokens = command.split_whitespace();

    tokens
        .by_ref()
        .find(|token| is_program(token, &["docker", "podman"]))?;

    // Skip management subcommands such as `docker container stop`
    let mut verb = tokens.next()?;
    if verb == "container" {
        verb = tokens.next()?;
    }
    if verb.starts_with('-') {
        return None;
    }

    while let Some(token) = tokens.next() {
        if CONTAINER_VALUE_FLAGS.contains(&token) {
            tokens.next();
            continue;
        }
        if token.starts_with('-') {
            continue;
        }
        let name = token.trim_end_matches(';');
        return (!name.is_empty()).then(|| name.to_string());
    }
    None
}

/// Table and predicate of an `UPDATE ... SET ... WHERE ...`
///
/// Only the first statement of the command is considered.
pub fn parse_update(command: &str) -> Option<(String, String)> {
    let caps = UPDATE_RE.captures(first_statement(command))?;
    Some((caps[1].to_string(), clean_predicate(&caps[2])?))
}

/// Table and predicate of a `DELETE FROM ... WHERE ...`
///
/// Only the first statement of the command is considered.
pub fn parse_delete(command: &str) -> Option<(String, String)> {
    let caps = DELETE_RE.captures(first_statement(command))?;
    Some((caps[1].to_string(), clean_predicate(&caps[2])?))
}

/// Text up to the first `;` that is not inside a quoted literal or identifier
pub fn first_statement(sql: &str) -> &str {
    let mut quote: Option<char> = None;
    for (index, c) in sql.char_indices() {
        match (quote, c) {
            (None, '\'' | '"' | '`') => quote = Some(c),
            (Some(open), _) if c == open => quote = None,
            (None, ';') => return sql[..index].trim(),
            _ => {}
        }
    }
    sql.trim()
}

fn clean_predicate(raw: &str) -> Option<String> {
    let predicate = raw.trim();
    (!predicate.is_empty()).then(|| predicate.to_string())
}

/// Whether a token invokes one of `programs`, with or without a directory prefix
fn is_program(token: &str, programs: &[&str]) -> bool {
    let name = token.rsplit('/').next().unwrap_or(token);
    programs.contains(&name)
}

/// Positional arguments of the first `programs` invocation in a shell line
fn command_args<'a>(command: &'a str, programs: &[&str]) -> Option<Vec<&'a str>> {
    let mut tokens = command.split_whitespace();

    tokens.by_ref().find(|token| is_program(token, programs))?;

    let args = tokens
        .take_while(|token| !matches!(*token, ";" | "&&" | "||" | "|"))
        .filter(|token| !token.starts_with('-'))
        .map(|token| token.trim_end_matches(';'))
        .filter(|token| !token.is_empty())
        .collect();

    Some(args)
}
