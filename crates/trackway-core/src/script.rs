//! Route script front end: text to statements to a compiled [`Route`].
//!
//! # Passes
//!
//! 1. **Split** -- lines become expressions with their source location.
//! 2. **Resolve** -- namespaces, prefixes, indices and track positions are
//!    resolved. Every statement is tagged with the track position in effect.
//! 3. **Sort** -- statements are stably sorted by track position, so commands
//!    written out of order still land in their block.
//! 4. **Interpret** -- each `Track.*` statement runs through the dispatch
//!    table against one [`ParseContext`].
//! 5. **Build** -- [`build_route`] finalizes the blocks.
//!
//! Preprocessing (`$If`, `$Include`, `$Rnd`, `$Sub`, `$Chr`) belongs to the
//! loader and must already be expanded.

use tracing::{debug, info, warn};

use crate::builder::build_route;
use crate::cancel::{self, CancelFlag};
use crate::catalog::Catalog;
use crate::command::{Invocation, TrackCommand, dispatch};
use crate::context::{ParseContext, ParserOptions};
use crate::diagnostics::{CollectingSink, Diagnostic, DiagnosticSink, Severity, SourceLocation};
use crate::element::Route;
use crate::units::{parse_i32_legacy, parse_length_strict};

/// Expressions between cancellation checks.
const CANCEL_STRIDE: usize = 256;

/// Namespaces whose commands are accepted and handled elsewhere.
const IGNORED_NAMESPACES: &[&str] = &[
    "", "options", "route", "train", "structure", "texture", "cycle", "signal",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("compilation was cancelled")]
    Cancelled,
}

/// One route file ready to compile.
#[derive(Debug, Clone, Copy)]
pub struct CompileInput<'a> {
    pub file: &'a str,
    pub source: &'a str,
    pub options: &'a ParserOptions,
    pub catalog: &'a Catalog,
}

impl<'a> CompileInput<'a> {
    pub fn new(
        file: &'a str,
        source: &'a str,
        options: &'a ParserOptions,
        catalog: &'a Catalog,
    ) -> Self {
        Self {
            file,
            source,
            options,
            catalog,
        }
    }
}

// ---------------------------------------------------------------------------
// Splitting
// ---------------------------------------------------------------------------

/// Raw expression text with the location of its first character.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub text: String,
    pub line: usize,
    pub column: usize,
}

/// Byte offset of the first `;` at parenthesis level 0, stopping at `=`.
fn rw_comment_start(line: &str) -> Option<usize> {
    let mut level = 0i32;
    for (i, c) in line.char_indices() {
        match c {
            '(' => level += 1,
            ')' => level -= 1,
            '=' => return None,
            ';' if level == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

/// Splits source text into trimmed, non-empty expressions.
///
/// CSV lines split on `,`. RW lines split on `@`, lose their `;` comments and
/// everything before the first `[section]` or `$` line is description.
pub fn split_expressions(source: &str, is_rw: bool) -> Vec<Expression> {
    let separator = if is_rw { '@' } else { ',' };
    let mut out = Vec::new();
    let mut in_description = is_rw;
    for (n, raw) in source.lines().enumerate() {
        let mut line = raw;
        if is_rw {
            if in_description {
                let t = line.trim_start();
                if t.starts_with('[') || t.starts_with('$') {
                    in_description = false;
                } else {
                    continue;
                }
            }
            if let Some(i) = rw_comment_start(line) {
                line = &line[..i];
            }
        }
        let mut level = 0i32;
        let mut start = 0;
        let mut push = |from: usize, to: usize| {
            let piece = &line[from..to];
            let text = piece.trim();
            if text.is_empty() || text.starts_with(';') {
                return;
            }
            let lead = piece.len() - piece.trim_start().len();
            out.push(Expression {
                text: text.to_string(),
                line: n + 1,
                column: line[..from + lead].chars().count() + 1,
            });
        };
        for (i, c) in line.char_indices() {
            match c {
                '(' => level += 1,
                ')' => level -= 1,
                c if c == separator && level <= 0 => {
                    push(start, i);
                    start = i + c.len_utf8();
                }
                _ => {}
            }
        }
        push(start, line.len());
    }
    out
}

// ---------------------------------------------------------------------------
// Resolving
// ---------------------------------------------------------------------------

/// Problem found while separating a command from its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SplitProblem {
    UnclosedParenthesis,
    TrailingSemicolon,
}

/// Separates `Command args`, `Command(args)` and `Command(indices) args`.
fn separate(text: &str) -> (String, Option<String>, Vec<SplitProblem>) {
    let mut problems = Vec::new();
    let mut level = 0i32;
    let mut split = None;
    let mut groups: Vec<(usize, usize)> = Vec::new();
    let mut open = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' => {
                if level == 0 {
                    open = i;
                }
                level += 1;
            }
            ')' => {
                level -= 1;
                if level == 0 {
                    groups.push((open, i));
                }
            }
            c if c.is_whitespace() && level == 0 => {
                split = Some(i);
                break;
            }
            _ => {}
        }
    }

    let (mut command, arguments) = if let Some(i) = split {
        (text[..i].to_string(), Some(text[i..].trim().to_string()))
    } else if level > 0 {
        problems.push(SplitProblem::UnclosedParenthesis);
        match text.find('(') {
            Some(i) => (text[..i].to_string(), Some(text[i + 1..].to_string())),
            None => (text.to_string(), None),
        }
    } else {
        match groups.last() {
            // a group closing the expression holds the arguments
            Some(&(a, b)) if b + 1 == text.len() => {
                (text[..a].to_string(), Some(text[a + 1..b].to_string()))
            }
            _ => (text.to_string(), None),
        }
    };
    if command.ends_with(';') {
        problems.push(SplitProblem::TrailingSemicolon);
        while command.ends_with(';') {
            command.pop();
        }
    }
    (command.trim().to_string(), arguments, problems)
}

/// Splits an argument list, trimming each argument and dropping a trailing
/// empty one.
fn split_arguments(arguments: &str, is_rw: bool) -> Vec<String> {
    let mut args: Vec<String> = arguments
        .split(|c| c == ';' || (is_rw && c == ','))
        .map(|a| a.trim().to_string())
        .collect();
    if args.last().is_some_and(String::is_empty) {
        args.pop();
    }
    args
}

/// Removes `.Void` in any letter case.
fn strip_void(command: &str) -> String {
    let lower = command.to_ascii_lowercase();
    let mut out = String::with_capacity(command.len());
    let mut i = 0;
    while let Some(j) = lower[i..].find(".void") {
        out.push_str(&command[i..i + j]);
        i += j + ".void".len();
    }
    out.push_str(&command[i..]);
    out
}

/// Splits `Name(a;b)` into the name and its index values.
fn split_indices(command: &str) -> Result<(String, [Option<i32>; 2]), String> {
    let Some(open) = command.find('(') else {
        return Ok((command.to_string(), [None, None]));
    };
    let inner = command[open + 1..].trim_end_matches(')');
    let mut indices = [None, None];
    for (slot, part) in indices.iter_mut().zip(inner.split(';')) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        *slot = Some(parse_i32_legacy(part).ok_or_else(|| part.to_string())?);
    }
    Ok((command[..open].trim().to_string(), indices))
}

/// `X=Y` becomes `X Y`. Bare numbers in cycle and signal sections name the
/// ground or signal slot.
fn convert_rw(text: &str, section: &str) -> String {
    let Some(eq) = text.find('=') else {
        return text.to_string();
    };
    let (left, right) = (text[..eq].trim(), text[eq + 1..].trim());
    if parse_i32_legacy(left).is_some() && left.chars().all(|c| c.is_ascii_digit()) {
        match section {
            "cycle" => return format!(".Ground({left}) {right}"),
            "signal" => return format!(".Void({left}) {right}"),
            _ => {}
        }
    }
    format!("{left} {right}")
}

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Position,
    Command {
        command: TrackCommand,
        args: Vec<String>,
        indices: [Option<i32>; 2],
    },
}

#[derive(Debug, Clone, PartialEq)]
struct Statement {
    position: f64,
    location: SourceLocation,
    action: Action,
}

/// Resolves expressions into positioned track statements.
struct Resolver<'a> {
    options: &'a ParserOptions,
    file: &'a str,
    sink: &'a mut dyn DiagnosticSink,
    with_prefix: String,
    section: String,
    position: f64,
}

impl Resolver<'_> {
    fn report(&mut self, severity: Severity, location: &SourceLocation, message: String) {
        self.sink.emit(Diagnostic {
            severity,
            file_not_found: false,
            message,
            location: location.clone(),
        });
    }

    fn resolve(&mut self, e: &Expression) -> Option<Statement> {
        let location = SourceLocation::new(self.file, e.line, e.column);
        let is_rw = self.options.is_rw;
        let mut text = e.text.clone();

        if is_rw {
            if text.starts_with('[') && text.ends_with(']') {
                let name = text[1..text.len() - 1].trim().to_ascii_lowercase();
                self.section = match name.as_str() {
                    "object" => "structure".to_string(),
                    "railway" => "track".to_string(),
                    _ => name,
                };
                return None;
            }
            text = convert_rw(&text, &self.section);
        }

        let (command, arguments, problems) = separate(&text);
        for p in problems {
            let message = match p {
                SplitProblem::UnclosedParenthesis => {
                    format!("Invalid parenthesis structure in {command}")
                }
                SplitProblem::TrailingSemicolon => {
                    format!("Superfluous semicolon found at the end of command {command}")
                }
            };
            self.report(Severity::Error, &location, message);
        }
        let args = arguments
            .as_deref()
            .map(|a| split_arguments(a, is_rw))
            .unwrap_or_default();

        if command.eq_ignore_ascii_case("with") {
            self.with_prefix = args.first().cloned().unwrap_or_default().to_ascii_lowercase();
            return None;
        }

        // track positions
        if (!is_rw || self.section == "track")
            && let Some(p) = parse_length_strict(&command, &self.options.unit_of_length)
        {
            if !args.is_empty() {
                self.report(
                    Severity::Error,
                    &location,
                    format!("A track position must not contain any arguments in {command}"),
                );
            } else if p < 0.0 {
                self.report(
                    Severity::Error,
                    &location,
                    "Negative track position encountered".to_string(),
                );
            } else {
                self.position = p;
                return Some(Statement {
                    position: p,
                    location,
                    action: Action::Position,
                });
            }
            return None;
        }

        let mut command = if command.starts_with('.') {
            format!("{}{command}", self.with_prefix)
        } else if is_rw && !self.section.is_empty() {
            format!("{}.{command}", self.section)
        } else {
            command
        };
        command = strip_void(&command);

        let (name, indices) = match split_indices(&command) {
            Ok(v) => v,
            Err(bad) => {
                self.report(
                    Severity::Error,
                    &location,
                    format!("Invalid index {bad} in {command}"),
                );
                return None;
            }
        };

        let lower = name.to_ascii_lowercase();
        let (namespace, bare) = lower.split_once('.').unwrap_or(("", lower.as_str()));
        if namespace == "track" {
            return match TrackCommand::from_name(bare) {
                Some(command) => Some(Statement {
                    position: self.position,
                    location,
                    action: Action::Command {
                        command,
                        args,
                        indices,
                    },
                }),
                None => {
                    self.report(
                        Severity::Error,
                        &location,
                        format!("The command {name} is not supported"),
                    );
                    None
                }
            };
        }
        if !IGNORED_NAMESPACES.contains(&namespace) {
            self.report(
                Severity::Warning,
                &location,
                format!("The command {name} is not supported"),
            );
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Compiling
// ---------------------------------------------------------------------------

/// Compiles one route file. Diagnostics end up in [`Route::diagnostics`].
pub fn compile(input: &CompileInput<'_>, cancel: Option<&CancelFlag>) -> Result<Route, CompileError> {
    let options = input.options;
    let mut sink = CollectingSink::new();

    let expressions = split_expressions(input.source, options.is_rw);
    debug!(file = input.file, expressions = expressions.len(), "split route source");

    let mut statements: Vec<Statement> = {
        let mut resolver = Resolver {
            options,
            file: input.file,
            sink: &mut sink,
            with_prefix: String::new(),
            section: String::new(),
            position: 0.0,
        };
        expressions.iter().filter_map(|e| resolver.resolve(e)).collect()
    };
    statements.sort_by(|a, b| a.position.total_cmp(&b.position));

    let data = {
        let mut ctx = ParseContext::new(options, input.catalog, &mut sink);
        for (n, s) in statements.iter().enumerate() {
            if n % CANCEL_STRIDE == 0 && cancel::requested(cancel) {
                warn!(file = input.file, statement = n, "route compile cancelled");
                return Err(CompileError::Cancelled);
            }
            if s.position != ctx.track_position() {
                ctx.set_track_position(s.position);
            }
            if let Action::Command {
                command,
                args,
                indices,
            } = &s.action
            {
                ctx.location = s.location.clone();
                dispatch(&mut ctx, &Invocation::new(*command, args).with_indices(*indices));
            }
        }
        ctx.data
    };

    let mut route = build_route(data, options, input.catalog, &mut sink, cancel)?;
    route.diagnostics = sink.into_diagnostics();
    info!(
        file = input.file,
        statements = statements.len(),
        errors = route
            .diagnostics
            .iter()
            .filter(|d| d.severity >= Severity::Error)
            .count(),
        "route compiled"
    );
    Ok(route)
}

/// Compiles several independent files, in parallel with the `parallel`
/// feature.
pub fn compile_many(
    inputs: &[CompileInput<'_>],
    cancel: Option<&CancelFlag>,
) -> Vec<Result<Route, CompileError>> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        inputs.par_iter().map(|i| compile(i, cancel)).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        inputs.iter().map(|i| compile(i, cancel)).collect()
    }
}
