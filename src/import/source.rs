//! Splitting lattice files into statements.
//!
//! elegant ends a statement at the end of a line unless the line ends in
//! `&`, and starts comments with `!`. MAD-X ends statements with `;` and
//! knows `!`, `//` and `/* ... */` comments.

/// One statement and the line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Source {
    pub line: usize,
    pub text: String,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Split {
    pub statements: Vec<Source>,
    /// From a leading `! TITLE: ...` comment, the form elegant files are
    /// exported with.
    pub title: Option<String>,
}

pub(crate) fn elegant(text: &str) -> Split {
    let mut out = Split::default();
    let mut pending: Option<Source> = None;

    for (i, raw) in text.lines().enumerate() {
        let line = i + 1;
        let (code, comment) = strip_comment(raw);
        if out.title.is_none()
            && out.statements.is_empty()
            && pending.is_none()
            && let Some(title) = comment.and_then(title_comment)
        {
            out.title = Some(title);
        }

        let code = code.trim();
        let (code, continued) = match code.strip_suffix('&') {
            Some(code) => (code, true),
            None => (code, false),
        };
        if !code.is_empty() {
            let part = pending.get_or_insert_with(|| Source {
                line,
                text: String::new(),
            });
            part.text.push_str(code);
            part.text.push(' ');
        }
        if !continued && let Some(done) = pending.take() {
            out.statements.push(finish(done));
        }
    }
    if let Some(done) = pending {
        out.statements.push(finish(done));
    }
    out
}

pub(crate) fn madx(text: &str) -> Split {
    let mut out = Split::default();
    let mut current = String::new();
    let mut start = 1;
    let mut line = 1;
    let mut quote: Option<char> = None;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            current.push(c);
            if c == q {
                quote = None;
            } else if c == '\n' {
                line += 1;
            }
            continue;
        }

        match c {
            '!' => skip_line(&mut chars),
            '/' if chars.peek() == Some(&'/') => skip_line(&mut chars),
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                for c in chars.by_ref() {
                    if c == '\n' {
                        line += 1;
                    }
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            ';' => {
                let text = std::mem::take(&mut current);
                if !text.trim().is_empty() {
                    out.statements.push(finish(Source { line: start, text }));
                }
            }
            '\n' => {
                line += 1;
                if !current.is_empty() {
                    current.push(' ');
                }
            }
            c if c.is_whitespace() && current.is_empty() => {}
            c => {
                if current.is_empty() {
                    start = line;
                }
                if c == '"' || c == '\'' {
                    quote = Some(c);
                }
                current.push(c);
            }
        }
    }
    if !current.trim().is_empty() {
        out.statements.push(finish(Source {
            line: start,
            text: current,
        }));
    }
    out
}

/// Deepest bracket nesting outside of quotes.
pub(crate) fn nesting(text: &str) -> usize {
    let mut depth = 0usize;
    let mut deepest = 0;
    let mut quote = None;
    for c in text.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(' | '{') => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            (None, ')' | '}') => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    deepest
}

fn finish(source: Source) -> Source {
    Source {
        line: source.line,
        text: source.text.trim().to_string(),
    }
}

fn skip_line(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    while chars.next_if(|c| *c != '\n').is_some() {}
}

/// Split off a `!` comment that is not inside quotes.
fn strip_comment(line: &str) -> (&str, Option<&str>) {
    let mut quote = None;
    for (i, c) in line.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '!') => return (&line[..i], Some(&line[i + 1..])),
            _ => {}
        }
    }
    (line, None)
}

fn title_comment(comment: &str) -> Option<String> {
    let comment = comment.trim();
    let prefix = comment.get(..6)?;
    prefix
        .eq_ignore_ascii_case("TITLE:")
        .then(|| comment[6..].trim().to_string())
}
