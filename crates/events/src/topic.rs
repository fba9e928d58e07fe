//! Dot-separated routing keys with AMQP-style wildcard patterns.

/// A binding pattern over dot-separated topics.
///
/// `*` matches exactly one word, `#` matches zero or more words, anything
/// else matches literally. `account.*` therefore covers `account.created`
/// but not `account.settings.changed`, while `account.#` covers both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPattern {
    raw: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    OneWord,
    ZeroOrMore,
}

impl TopicPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        let raw = pattern.into();
        let segments = raw
            .split('.')
            .map(|word| match word {
                "*" => Segment::OneWord,
                "#" => Segment::ZeroOrMore,
                literal => Segment::Literal(literal.to_owned()),
            })
            .collect();
        Self { raw, segments }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, topic: &str) -> bool {
        let words: Vec<&str> = topic.split('.').collect();
        matches_at(&self.segments, &words)
    }
}

impl core::fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for TopicPattern {
    fn from(pattern: &str) -> Self {
        Self::new(pattern)
    }
}

impl From<String> for TopicPattern {
    fn from(pattern: String) -> Self {
        Self::new(pattern)
    }
}

fn matches_at(pattern: &[Segment], words: &[&str]) -> bool {
    match pattern.split_first() {
        None => words.is_empty(),
        Some((Segment::Literal(literal), rest)) => words
            .split_first()
            .is_some_and(|(word, tail)| word == literal && matches_at(rest, tail)),
        Some((Segment::OneWord, rest)) => words
            .split_first()
            .is_some_and(|(_, tail)| matches_at(rest, tail)),
        Some((Segment::ZeroOrMore, rest)) => {
            (0..=words.len()).any(|skip| matches_at(rest, &words[skip..]))
        }
    }
}
