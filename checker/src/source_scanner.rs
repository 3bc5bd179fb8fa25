// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

// Just enough lexing of C-like source to tell code from comments. Nothing here understands
// the language; the only goal is that "//" inside a string literal or a block comment
// does not get mistaken for a directive, and that a sink call inside a comment is ignored.

use mirai_annotations::precondition;

/// One physical line, split into its code and its trailing line comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedLine<'a> {
    /// The code part of the line. Block comments are replaced by a single space,
    /// string and character literals are kept verbatim.
    pub code: String,
    /// The text following "//", if the line has a line comment.
    pub comment: Option<&'a str>,
}

/// Splits lines into code and comments. The scanner remembers whether the previous
/// line ended inside a block comment, so lines must be fed in order.
#[derive(Debug, Default)]
pub struct LineScanner {
    in_block_comment: bool,
}

impl LineScanner {
    pub fn new() -> LineScanner {
        LineScanner::default()
    }

    pub fn scan<'a>(&mut self, line: &'a str) -> ScannedLine<'a> {
        let mut code = String::with_capacity(line.len());
        let mut quote: Option<char> = None;
        let mut chars = line.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if self.in_block_comment {
                if c == '*' && chars.peek().map(|(_, n)| *n) == Some('/') {
                    chars.next();
                    self.in_block_comment = false;
                    code.push(' ');
                }
                continue;
            }
            if let Some(q) = quote {
                code.push(c);
                if c == '\\' {
                    if let Some((_, escaped)) = chars.next() {
                        code.push(escaped);
                    }
                } else if c == q {
                    quote = None;
                }
                continue;
            }
            match c {
                '/' if chars.peek().map(|(_, n)| *n) == Some('/') => {
                    return ScannedLine {
                        code,
                        comment: Some(&line[i + 2..]),
                    };
                }
                '/' if chars.peek().map(|(_, n)| *n) == Some('*') => {
                    chars.next();
                    self.in_block_comment = true;
                }
                '\'' if is_digit_separator(&code, &line[i + 1..]) => code.push(c),
                '"' | '\'' => {
                    quote = Some(c);
                    code.push(c);
                }
                _ => code.push(c),
            }
        }
        ScannedLine {
            code,
            comment: None,
        }
    }
}

/// Finds the parenthesis that closes a call whose argument list is already open to
/// `depth` levels. Returns the byte offset of the closing parenthesis within `code`,
/// or None if the argument list continues past the end of `code`, in which case
/// `depth` has been updated so that scanning can resume on the next line.
pub fn find_closing_paren(code: &str, depth: &mut usize) -> Option<usize> {
    precondition!(*depth > 0);
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in code.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' if is_digit_separator(&code[..i], &code[i + 1..]) => {}
            '"' | '\'' => quote = Some(c),
            '(' => *depth += 1,
            ')' => {
                *depth -= 1;
                if *depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Returns true if byte offset `pos` of `code` is not inside a string or character literal.
pub fn is_outside_literals(code: &str, pos: usize) -> bool {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in code.char_indices().take_while(|(i, _)| *i < pos) {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' && is_digit_separator(&code[..i], &code[i + 1..]) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None => {}
        }
    }
    quote.is_none()
}

/// Returns true if an apostrophe between `before` and `after` separates the digits of a
/// numeric literal, as in `1'000` or `0xFF'FF`, rather than opening a character literal.
pub fn is_digit_separator(before: &str, after: &str) -> bool {
    let token = before
        .rsplit(|c: char| !(c.is_ascii_alphanumeric() || c == '\'' || c == '.'))
        .next()
        .unwrap_or_default();
    let digit_before = token.chars().last().map_or(false, |c| c.is_ascii_hexdigit());
    let digit_after = after.chars().next().map_or(false, |c| c.is_ascii_hexdigit());
    token.starts_with(|c: char| c.is_ascii_digit()) && digit_before && digit_after
}
