/// A single import string literal in a Go source file: the import path and
/// the byte range of the literal's contents (quotes excluded), enough to
/// splice a replacement without disturbing the rest of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpan {
    pub path: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, PartialEq)]
enum Token<'a> {
    Word(&'a str),
    Str(ImportSpan),
    Punct(char),
}

/// Scans the header of a Go source file and returns every import string.
/// Import declarations can only precede other top-level declarations, so
/// scanning stops at the first token that is neither `import` nor part of
/// an import declaration. Files without a package clause yield nothing.
pub fn scan_imports(source: &str) -> Vec<ImportSpan> {
    let mut pos = 0usize;
    let mut spans = Vec::new();

    match next_token(source, &mut pos) {
        Some(Token::Word("package")) => {}
        _ => return spans,
    }
    // package name
    if next_token(source, &mut pos).is_none() {
        return spans;
    }

    loop {
        let checkpoint = pos;
        match next_token(source, &mut pos) {
            Some(Token::Word("import")) => scan_import_decl(source, &mut pos, &mut spans),
            Some(Token::Punct(';')) => continue,
            _ => {
                pos = checkpoint;
                break;
            }
        }
    }
    spans
}

fn scan_import_decl(source: &str, pos: &mut usize, spans: &mut Vec<ImportSpan>) {
    match next_token(source, pos) {
        Some(Token::Punct('(')) => loop {
            match next_token(source, pos) {
                None | Some(Token::Punct(')')) => break,
                Some(Token::Str(span)) => spans.push(span),
                Some(Token::Punct(';')) => continue,
                // alias: identifier, `_` (a Word) or `.`
                Some(Token::Word(_)) | Some(Token::Punct('.')) => {
                    if let Some(Token::Str(span)) = next_token(source, pos) {
                        spans.push(span);
                    }
                }
                Some(Token::Punct(_)) => {}
            }
        },
        Some(Token::Str(span)) => spans.push(span),
        Some(Token::Word(_)) | Some(Token::Punct('.')) => {
            if let Some(Token::Str(span)) = next_token(source, pos) {
                spans.push(span);
            }
        }
        _ => {}
    }
}

fn next_token<'a>(source: &'a str, pos: &mut usize) -> Option<Token<'a>> {
    skip_trivia(source, pos);
    let rest = &source[*pos..];
    let first = rest.chars().next()?;

    match first {
        '"' => {
            let start = *pos + 1;
            let mut i = start;
            let bytes = source.as_bytes();
            while i < bytes.len() && bytes[i] != b'"' {
                if bytes[i] == b'\\' {
                    i += 2;
                } else {
                    i += 1;
                }
            }
            let end = i.min(bytes.len());
            *pos = (end + 1).min(bytes.len());
            Some(Token::Str(ImportSpan {
                path: source[start..end].to_string(),
                start,
                end,
            }))
        }
        '`' => {
            let start = *pos + 1;
            let end = source[start..].find('`').map_or(source.len(), |i| start + i);
            *pos = (end + 1).min(source.len());
            Some(Token::Str(ImportSpan {
                path: source[start..end].to_string(),
                start,
                end,
            }))
        }
        c if c.is_alphanumeric() || c == '_' => {
            let start = *pos;
            let mut end = start;
            for ch in source[start..].chars() {
                if ch.is_alphanumeric() || ch == '_' {
                    end += ch.len_utf8();
                } else {
                    break;
                }
            }
            *pos = end;
            Some(Token::Word(&source[start..end]))
        }
        c => {
            *pos += c.len_utf8();
            Some(Token::Punct(c))
        }
    }
}

fn skip_trivia(source: &str, pos: &mut usize) {
    loop {
        let rest = &source[*pos..];
        let Some(first) = rest.chars().next() else {
            return;
        };
        if first.is_whitespace() {
            *pos += first.len_utf8();
            continue;
        }
        if rest.starts_with("//") {
            match rest.find('\n') {
                Some(i) => *pos += i + 1,
                None => *pos = source.len(),
            }
            continue;
        }
        if rest.starts_with("/*") {
            match rest[2..].find("*/") {
                Some(i) => *pos += i + 4,
                None => *pos = source.len(),
            }
            continue;
        }
        return;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(source: &str) -> Vec<String> {
        scan_imports(source).into_iter().map(|s| s.path).collect()
    }

    #[test]
    fn single_import() {
        let src = "package main\n\nimport \"fmt\"\n\nfunc main() {}\n";
        assert_eq!(paths(src), vec!["fmt"]);
    }

    #[test]
    fn grouped_imports_with_aliases() {
        let src = r#"package main

import (
	"fmt"
	renamed "example.com/dep/sub"
	_ "example.com/driver"
	. "example.com/dot"
)

func main() {}
"#;
        assert_eq!(
            paths(src),
            vec![
                "fmt",
                "example.com/dep/sub",
                "example.com/driver",
                "example.com/dot"
            ]
        );
    }

    #[test]
    fn multiple_import_decls() {
        let src = "package p\n\nimport \"a.com/x\"\nimport y \"b.com/y\"\n\nvar v = 1\n";
        assert_eq!(paths(src), vec!["a.com/x", "b.com/y"]);
    }

    #[test]
    fn raw_string_import() {
        let src = "package p\n\nimport `example.com/raw`\n";
        assert_eq!(paths(src), vec!["example.com/raw"]);
    }

    #[test]
    fn comments_are_skipped() {
        let src = r#"// Package p does things.
//go:build linux

/* block
   comment */
package p

import (
	// inline comment
	"example.com/dep" // trailing
)
"#;
        assert_eq!(paths(src), vec!["example.com/dep"]);
    }

    #[test]
    fn stops_before_other_declarations() {
        // string literals past the import section must not be collected
        let src = r#"package p

import "example.com/dep"

const greeting = "example.com/not-an-import"

func f() string { return "also.not/an/import" }
"#;
        assert_eq!(paths(src), vec!["example.com/dep"]);
    }

    #[test]
    fn no_imports_yields_nothing() {
        assert!(paths("package p\n\nfunc f() {}\n").is_empty());
        assert!(paths("not a go file").is_empty());
        assert!(paths("").is_empty());
    }

    #[test]
    fn spans_point_at_literal_contents() {
        let src = "package p\n\nimport \"example.com/dep\"\n";
        let spans = scan_imports(src);
        assert_eq!(spans.len(), 1);
        assert_eq!(&src[spans[0].start..spans[0].end], "example.com/dep");
    }
}
