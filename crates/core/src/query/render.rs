//! Text rendering of a single match.

use std::io::{self, Write};
use std::ops::Range;

use termcolor::{Ansi, Color, ColorSpec, WriteColor};

use crate::config::DEFAULT_CONTEXT_LINES;
use crate::query::MatchResult;

/// Lines of context printed around highlighted lines. Context never extends
/// past the lines spanned by the match itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextLines {
    pub before: usize,
    pub after: usize,
}

impl Default for ContextLines {
    fn default() -> Self {
        Self { before: DEFAULT_CONTEXT_LINES, after: DEFAULT_CONTEXT_LINES }
    }
}

/// Render the lines of `source` covered by `result`.
///
/// Output runs from the line holding the match start to the closing line of
/// the enclosing function, or to the end of the outermost captured node when
/// the match has no enclosing function. Lines holding captured nodes are always
/// shown, other lines only within `context`; skipped runs become `...`. With
/// `colorize` the captured nodes (except the outermost) are wrapped in ANSI
/// red; without it every shown line is returned verbatim.
pub fn render_match(
    result: &MatchResult,
    source: &str,
    context: ContextLines,
    colorize: bool,
) -> String {
    let lines = line_table(source);
    let highlights = highlight_ranges(result);
    let outer = outer_span(result);
    let end = result.function.as_ref().map_or(outer.end, |f| f.end.max(outer.end));

    let mut anchored = vec![false; lines.len()];
    anchored[line_of(&lines, result.start)] = true;
    anchored[line_of(&lines, end.saturating_sub(1).max(outer.start))] = true;
    for h in &highlights {
        for (i, (offset, line)) in lines.iter().enumerate() {
            if h.start < offset + line.len().max(1) && *offset < h.end {
                anchored[i] = true;
            }
        }
    }

    let Some(first) = anchored.iter().position(|a| *a) else { return String::new() };
    let last = anchored.iter().rposition(|a| *a).unwrap_or(first);

    let mut shown = vec![false; lines.len()];
    for i in (first..=last).filter(|i| anchored[*i]) {
        let from = i.saturating_sub(context.before).max(first);
        let to = (i + context.after).min(last);
        for flag in &mut shown[from..=to] {
            *flag = true;
        }
    }

    let mut out: Vec<String> = Vec::new();
    let mut gap = false;
    for (i, (offset, line)) in lines.iter().enumerate() {
        if !shown[i] {
            gap = !out.is_empty();
            continue;
        }
        if gap {
            out.push("...".to_string());
            gap = false;
        }
        out.push(paint_line(*offset, line, &highlights, colorize));
    }
    out.join("\n")
}

/// `(byte offset, line text)` for every line of `source`.
fn line_table(source: &str) -> Vec<(usize, &str)> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for line in source.split('\n') {
        lines.push((offset, line));
        offset += line.len() + 1;
    }
    lines
}

fn line_of(lines: &[(usize, &str)], offset: usize) -> usize {
    lines.iter().rposition(|(start, _)| *start <= offset).unwrap_or(0)
}

fn sorted_spans(result: &MatchResult) -> Vec<Range<usize>> {
    let mut spans = result.spans.clone();
    spans.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
    spans
}

fn outer_span(result: &MatchResult) -> Range<usize> {
    sorted_spans(result).into_iter().next().unwrap_or(result.start..result.start + 1)
}

/// Captured ranges minus the outermost node, with nested ranges folded into
/// the enclosing one.
fn highlight_ranges(result: &MatchResult) -> Vec<Range<usize>> {
    let mut clean: Vec<Range<usize>> = Vec::new();
    for r in sorted_spans(result).into_iter().skip(1) {
        if r.is_empty() {
            continue;
        }
        if clean.last().is_some_and(|prev| prev.contains(&r.start)) {
            continue;
        }
        clean.push(r);
    }
    clean
}

fn paint_line(offset: usize, line: &str, highlights: &[Range<usize>], colorize: bool) -> String {
    if !colorize {
        return line.to_string();
    }
    let end = offset + line.len();
    let local: Vec<Range<usize>> = highlights
        .iter()
        .filter(|h| h.start < end && offset < h.end)
        .map(|h| h.start.max(offset) - offset..h.end.min(end) - offset)
        .collect();
    write_ansi(line, &local)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| line.to_string())
}

fn write_ansi(line: &str, ranges: &[Range<usize>]) -> io::Result<Vec<u8>> {
    let mut out = Ansi::new(Vec::new());
    let mut spec = ColorSpec::new();
    spec.set_fg(Some(Color::Red));

    let mut cursor = 0;
    for r in ranges {
        let (Some(plain), Some(marked)) = (line.get(cursor..r.start), line.get(r.clone())) else {
            continue;
        };
        out.write_all(plain.as_bytes())?;
        out.set_color(&spec)?;
        out.write_all(marked.as_bytes())?;
        out.reset()?;
        cursor = r.end;
    }
    out.write_all(line.get(cursor..).unwrap_or_default().as_bytes())?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn result(start: usize, spans: Vec<Range<usize>>) -> MatchResult {
        MatchResult { start, function: None, spans, vars: BTreeMap::new() }
    }

    #[test]
    fn plain_rendering_keeps_single_line_verbatim() {
        let src = "void f() {x = g(y);}";
        let m = result(0, vec![0..src.len(), 10..11, 14..15]);
        assert_eq!(render_match(&m, src, ContextLines::default(), false), src);
    }

    #[test]
    fn colored_rendering_wraps_each_capture() {
        let src = "void f() {x = g(y);}";
        let m = result(0, vec![0..src.len(), 10..11, 14..15]);
        let out = render_match(&m, src, ContextLines::default(), true);
        assert_eq!(out.matches("\u{1b}[31m").count(), 2);
        assert!(out.contains("\u{1b}[31mx\u{1b}[0m"));
        assert!(out.contains("\u{1b}[31mg\u{1b}[0m"));
    }

    #[test]
    fn nested_captures_fold_into_parent() {
        let m = result(0, vec![0..20, 2..10, 4..6, 12..14]);
        assert_eq!(highlight_ranges(&m), vec![2..10, 12..14]);
    }

    #[test]
    fn lines_outside_context_collapse_into_ellipsis() {
        let src = "int f() {\na();\nb();\nc();\nd();\nhit();\n}";
        let hit = src.find("hit").unwrap();
        let m = result(0, vec![0..src.len(), hit..hit + 3]);
        let out = render_match(&m, src, ContextLines { before: 1, after: 0 }, false);
        assert_eq!(out, "int f() {\n...\nd();\nhit();\n}");
    }

    #[test]
    fn enclosing_function_extends_output_to_closing_brace() {
        let src = "int f() {\n  hit();\n  a();\n}";
        let hit = src.find("hit").unwrap();
        let stmt = hit..hit + 6;
        let mut m = result(hit, vec![stmt.clone(), hit..hit + 3]);
        let context = ContextLines { before: 0, after: 0 };
        assert_eq!(render_match(&m, src, context, false), "  hit();");

        m.start = 0;
        m.function = Some(0..src.len());
        assert_eq!(render_match(&m, src, context, false), "int f() {\n  hit();\n...\n}");
    }

    #[test]
    fn context_covers_whole_match_when_large() {
        let src = "int f() {\na();\nhit();\n}";
        let hit = src.find("hit").unwrap();
        let m = result(0, vec![0..src.len(), hit..hit + 3]);
        let out = render_match(&m, src, ContextLines::default(), false);
        assert_eq!(out, src);
    }
}
