use crate::EMPTY_RESPONSE;

/// Disclaimer openers removed from the head of a completion.
pub const DEFAULT_DISCLAIMER_PREFIXES: &[&str] = &["as an ai"];

/// Post-processing applied to raw completion text before it is relayed.
///
/// 1. When the text opens with a known disclaimer prefix (case-insensitive),
///    everything from the start through the end of the first paragraph is
///    dropped. A paragraph ends at the first blank line; without one the
///    whole text is treated as disclaimer.
/// 2. One leading `*` is removed from every line.
/// 3. Surrounding whitespace is trimmed.
///
/// An empty result becomes [`EMPTY_RESPONSE`].
#[derive(Debug, Clone)]
pub struct ReplyCleaner {
    prefixes: Vec<String>,
}

impl Default for ReplyCleaner {
    fn default() -> Self {
        Self::new(DEFAULT_DISCLAIMER_PREFIXES.iter().copied())
    }
}

impl ReplyCleaner {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let prefixes = prefixes
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { prefixes }
    }

    pub fn clean(&self, raw: &str) -> String {
        let body = self.strip_disclaimer(raw);
        let body = strip_leading_asterisks(body);
        let body = body.trim();
        if body.is_empty() {
            EMPTY_RESPONSE.to_string()
        } else {
            body.to_string()
        }
    }

    fn strip_disclaimer<'a>(&self, text: &'a str) -> &'a str {
        let head = text.trim_start();
        if !self
            .prefixes
            .iter()
            .any(|prefix| starts_with_ignore_case(head, prefix))
        {
            return text;
        }
        match end_of_first_paragraph(head) {
            Some(end) => &head[end..],
            None => "",
        }
    }
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    let mut text = text.chars().flat_map(char::to_lowercase);
    prefix
        .chars()
        .flat_map(char::to_lowercase)
        .all(|p| text.next() == Some(p))
}

/// Byte offset just past the first blank line that follows some content.
fn end_of_first_paragraph(text: &str) -> Option<usize> {
    let mut offset = 0;
    let mut seen_content = false;
    for line in text.split_inclusive('\n') {
        offset += line.len();
        if !line.trim().is_empty() {
            seen_content = true;
        } else if seen_content {
            return Some(offset);
        }
    }
    None
}

fn strip_leading_asterisks(text: &str) -> String {
    text.split('\n')
        .map(|line| line.strip_prefix('*').unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disclaimer_paragraph_is_removed_entirely() {
        let cleaner = ReplyCleaner::default();
        let raw = "As an AI language model, I cannot have opinions.\nBut I can try.\n\nHere is a joke about cats.";
        assert_eq!(cleaner.clean(raw), "Here is a joke about cats.");
    }

    #[test]
    fn disclaimer_without_paragraph_break_leaves_placeholder() {
        let cleaner = ReplyCleaner::default();
        assert_eq!(
            cleaner.clean("as an AI, I cannot do that. Sorry!"),
            EMPTY_RESPONSE
        );
    }

    #[test]
    fn disclaimer_only_matches_at_the_start() {
        let cleaner = ReplyCleaner::default();
        let raw = "Sure! As an AI I love puns.";
        assert_eq!(cleaner.clean(raw), raw);
    }

    #[test]
    fn leading_asterisk_is_stripped_per_line() {
        let cleaner = ReplyCleaner::default();
        let raw = "*Point one\n*Point two\n**bold** stays half";
        assert_eq!(cleaner.clean(raw), "Point one\nPoint two\n*bold** stays half");
    }

    #[test]
    fn custom_prefixes_are_case_insensitive() {
        let cleaner = ReplyCleaner::new(["I'm just a language model"]);
        let raw = "I'M JUST A LANGUAGE MODEL but\n\nthe answer is 42";
        assert_eq!(cleaner.clean(raw), "the answer is 42");
    }

    #[test]
    fn whitespace_only_reply_becomes_placeholder() {
        assert_eq!(ReplyCleaner::default().clean("  \n\t "), EMPTY_RESPONSE);
    }
}
