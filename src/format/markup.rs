//! Lightweight markup used in bot replies: `**bold**`, `*italic*`, `• ` bullet
//! lines and blank-line paragraph breaks.
//!
//! Backend text is untrusted, so the HTML renderer escapes every line before
//! any substitution happens.

pub const BULLET: &str = "• ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Line(Vec<Span>),
    Bullet(Vec<Span>),
    Break,
}

pub fn parse(text: &str) -> Vec<Block> {
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                Block::Break
            } else if let Some(rest) = line.strip_prefix(BULLET) {
                Block::Bullet(parse_spans(rest))
            } else {
                Block::Line(parse_spans(line))
            }
        })
        .collect()
}

pub fn parse_spans(line: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut rest = line;

    while !rest.is_empty() {
        if let Some((inner, tail)) = delimited(rest, "**") {
            push_span(&mut spans, inner, true, false);
            rest = tail;
            continue;
        }
        if !rest.starts_with("**") {
            if let Some((inner, tail)) = delimited(rest, "*") {
                push_span(&mut spans, inner, false, true);
                rest = tail;
                continue;
            }
        }

        let next = rest
            .char_indices()
            .skip(1)
            .find(|(_, ch)| *ch == '*')
            .map(|(index, _)| index)
            .unwrap_or(rest.len());
        push_span(&mut spans, &rest[..next], false, false);
        rest = &rest[next..];
    }

    spans
}

fn delimited<'a>(text: &'a str, marker: &str) -> Option<(&'a str, &'a str)> {
    let body = text.strip_prefix(marker)?;
    let end = body.find(marker)?;
    if end == 0 {
        return None;
    }
    Some((&body[..end], &body[end + marker.len()..]))
}

fn push_span(spans: &mut Vec<Span>, text: &str, bold: bool, italic: bool) {
    if let Some(last) = spans.last_mut() {
        if last.bold == bold && last.italic == italic {
            last.text.push_str(text);
            return;
        }
    }
    spans.push(Span {
        text: text.to_string(),
        bold,
        italic,
    });
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

pub fn to_html(text: &str) -> String {
    let mut html = String::new();
    let mut in_list = false;

    for block in parse(text) {
        match block {
            Block::Bullet(spans) => {
                if !in_list {
                    html.push_str("<ul>");
                    in_list = true;
                }
                html.push_str("<li>");
                html.push_str(&spans_to_html(&spans));
                html.push_str("</li>");
            }
            Block::Line(spans) => {
                if in_list {
                    html.push_str("</ul>");
                    in_list = false;
                }
                html.push_str(&spans_to_html(&spans));
                html.push_str("<br>");
            }
            Block::Break => {
                if in_list {
                    html.push_str("</ul>");
                    in_list = false;
                }
                html.push_str("<br>");
            }
        }
    }

    if in_list {
        html.push_str("</ul>");
    }
    html
}

fn spans_to_html(spans: &[Span]) -> String {
    spans
        .iter()
        .map(|span| {
            let body = escape_html(&span.text);
            match (span.bold, span.italic) {
                (true, _) => format!("<strong>{body}</strong>"),
                (false, true) => format!("<em>{body}</em>"),
                (false, false) => body,
            }
        })
        .collect()
}

pub fn plain_text(text: &str) -> String {
    text.replace("**", "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bold_and_italic_spans() {
        let spans = parse_spans("**Total:** 40 *students*");
        assert_eq!(
            spans,
            vec![
                Span { text: "Total:".into(), bold: true, italic: false },
                Span { text: " 40 ".into(), bold: false, italic: false },
                Span { text: "students".into(), bold: false, italic: true },
            ]
        );
    }

    #[test]
    fn unmatched_markers_stay_literal() {
        let spans = parse_spans("5 * 3 = 15");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "5 * 3 = 15");
    }

    #[test]
    fn bullets_are_grouped_into_one_list() {
        let html = to_html("**Header**\n• one\n• two\n\nafter");
        assert_eq!(
            html,
            "<strong>Header</strong><br><ul><li>one</li><li>two</li></ul><br>after<br>"
        );
    }

    #[test]
    fn script_text_is_escaped_before_substitution() {
        let html = to_html("**<script>alert('x')</script>**");
        assert!(!html.contains("<script>"));
        assert!(html.contains("<strong>&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;</strong>"));
    }

    #[test]
    fn blank_lines_become_breaks() {
        let blocks = parse("a\n\nb");
        assert_eq!(blocks[1], Block::Break);
    }
}
