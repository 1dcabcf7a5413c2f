//! Minimal reader for plan files written as CMake `set()` calls.
//!
//! Only the command-invocation grammar is supported: identifiers followed by
//! a parenthesised argument list, `#` line comments, double-quoted arguments
//! and `;`-separated list values. Commands other than `set` are skipped.

use crate::load::PlanLoadError;
use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SetCall {
    pub name: String,
    pub values: Vec<String>,
    pub line: usize,
}

pub(crate) fn parse_set_calls(text: &str) -> Result<Vec<SetCall>, PlanLoadError> {
    let mut calls = Vec::new();
    let mut chars = text.chars().peekable();
    let mut line = 1usize;

    while let Some(c) = chars.next() {
        match c {
            '\n' => line += 1,
            '#' => skip_comment(&mut chars, &mut line),
            c if c.is_whitespace() => {}
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = line;
                let mut ident = String::from(c);
                while let Some(&n) = chars.peek() {
                    if n.is_ascii_alphanumeric() || n == '_' {
                        ident.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                while matches!(chars.peek(), Some(' ') | Some('\t')) {
                    chars.next();
                }
                if chars.next() != Some('(') {
                    return Err(PlanLoadError::Syntax {
                        line: start,
                        message: format!("expected '(' after '{}'", ident),
                    });
                }

                let args = parse_args(&mut chars, &mut line, start)?;
                if !ident.eq_ignore_ascii_case("set") {
                    continue;
                }
                let mut args = args.into_iter();
                let Some(name) = args.next() else {
                    return Err(PlanLoadError::Syntax {
                        line: start,
                        message: "set() without a variable name".to_string(),
                    });
                };
                let values = args
                    .flat_map(|arg| {
                        arg.split(';')
                            .filter(|piece| !piece.is_empty())
                            .map(str::to_string)
                            .collect::<Vec<_>>()
                    })
                    .collect();
                calls.push(SetCall {
                    name,
                    values,
                    line: start,
                });
            }
            other => {
                return Err(PlanLoadError::Syntax {
                    line,
                    message: format!("unexpected character '{}'", other),
                });
            }
        }
    }

    Ok(calls)
}

fn skip_comment(chars: &mut Peekable<Chars<'_>>, line: &mut usize) {
    for c in chars.by_ref() {
        if c == '\n' {
            *line += 1;
            break;
        }
    }
}

fn parse_args(
    chars: &mut Peekable<Chars<'_>>,
    line: &mut usize,
    start: usize,
) -> Result<Vec<String>, PlanLoadError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;

    loop {
        let Some(c) = chars.next() else {
            return Err(PlanLoadError::Syntax {
                line: start,
                message: "unterminated command invocation".to_string(),
            });
        };
        match c {
            ')' => {
                if in_arg {
                    args.push(current);
                }
                return Ok(args);
            }
            '"' => {
                current.push_str(&parse_quoted(chars, line)?);
                in_arg = true;
            }
            '#' => {
                flush(&mut args, &mut current, &mut in_arg);
                skip_comment(chars, line);
            }
            '\n' => {
                *line += 1;
                flush(&mut args, &mut current, &mut in_arg);
            }
            c if c.is_whitespace() => flush(&mut args, &mut current, &mut in_arg),
            c => {
                current.push(c);
                in_arg = true;
            }
        }
    }
}

fn flush(args: &mut Vec<String>, current: &mut String, in_arg: &mut bool) {
    if *in_arg {
        args.push(std::mem::take(current));
        *in_arg = false;
    }
}

fn parse_quoted(chars: &mut Peekable<Chars<'_>>, line: &mut usize) -> Result<String, PlanLoadError> {
    let start = *line;
    let mut out = String::new();
    while let Some(c) = chars.next() {
        match c {
            '"' => return Ok(out),
            '\\' => match chars.next() {
                Some(escaped) => out.push(escaped),
                None => break,
            },
            '\n' => {
                *line += 1;
                out.push('\n');
            }
            c => out.push(c),
        }
    }
    Err(PlanLoadError::Syntax {
        line: start,
        message: "unterminated quoted argument".to_string(),
    })
}
