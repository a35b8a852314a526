//! Splitting article text into the three content-record parts.

use regex::Regex;
use std::sync::LazyLock;

/// Number of parts a content record stores.
pub const SECTION_COUNT: usize = 3;

static HEADING: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?m)^## ").ok());

/// Splits `text` into three parts.
///
/// With at least three `## ` headings the text is cut at heading
/// boundaries, headings grouped as evenly as possible (any preamble stays
/// with the first part). Otherwise paragraphs are grouped into thirds.
/// Parts may be empty for very short text.
#[must_use]
pub fn split_into_sections(text: &str) -> [String; SECTION_COUNT] {
    let starts: Vec<usize> = HEADING
        .as_ref()
        .map(|re| re.find_iter(text).map(|m| m.start()).collect())
        .unwrap_or_default();

    if starts.len() >= SECTION_COUNT {
        split_at_headings(text, &starts)
    } else {
        split_paragraphs(text)
    }
}

fn group_bounds(count: usize) -> [(usize, usize); SECTION_COUNT] {
    let base = count / SECTION_COUNT;
    let extra = count % SECTION_COUNT;
    let mut bounds = [(0, 0); SECTION_COUNT];
    let mut start = 0;
    for (i, bound) in bounds.iter_mut().enumerate() {
        let len = base + usize::from(i < extra);
        *bound = (start, start + len);
        start += len;
    }
    bounds
}

fn split_at_headings(text: &str, starts: &[usize]) -> [String; SECTION_COUNT] {
    let bounds = group_bounds(starts.len());
    let offset = |heading: usize| {
        if heading == 0 {
            0
        } else if heading >= starts.len() {
            text.len()
        } else {
            starts[heading]
        }
    };

    bounds.map(|(first, end)| text[offset(first)..offset(end)].trim().to_string())
}

fn split_paragraphs(text: &str) -> [String; SECTION_COUNT] {
    let paragraphs: Vec<&str> = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    group_bounds(paragraphs.len()).map(|(first, end)| paragraphs[first..end].join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_three_headings() {
        let text = "Intro line\n\n## One\na\n\n## Two\nb\n\n## Three\nc";
        let parts = split_into_sections(text);
        assert_eq!(parts[0], "Intro line\n\n## One\na");
        assert_eq!(parts[1], "## Two\nb");
        assert_eq!(parts[2], "## Three\nc");
    }

    #[test]
    fn test_headings_grouped_evenly() {
        let text = "## A\n1\n## B\n2\n## C\n3\n## D\n4\n## E\n5";
        let parts = split_into_sections(text);
        assert_eq!(parts[0], "## A\n1\n## B\n2");
        assert_eq!(parts[1], "## C\n3\n## D\n4");
        assert_eq!(parts[2], "## E\n5");
    }

    #[test]
    fn test_subheadings_do_not_split() {
        let text = "## A\n### a1\n\n## B\n\n## C\n#### deep";
        let parts = split_into_sections(text);
        assert_eq!(parts[0], "## A\n### a1");
        assert_eq!(parts[2], "## C\n#### deep");
    }

    #[test]
    fn test_paragraph_thirds() {
        let text = "p1\n\np2\n\np3\n\np4";
        let parts = split_into_sections(text);
        assert_eq!(parts[0], "p1\n\np2");
        assert_eq!(parts[1], "p3");
        assert_eq!(parts[2], "p4");
    }

    #[test]
    fn test_short_text() {
        let parts = split_into_sections("only");
        assert_eq!(parts, ["only".to_string(), String::new(), String::new()]);
        assert_eq!(split_into_sections(""), [String::new(), String::new(), String::new()]);
    }
}
