//! Word tokenization and lemmatization for message text.
//!
//! Text is split Treebank-style: runs of word characters (keeping inner
//! hyphens and apostrophes), each remaining punctuation character on its own,
//! and English contraction suffixes (`n't`, `'s`, `'ll`, ...) split from the
//! word they attach to. Every token is lowercased and reduced to its base noun
//! form with a fixed table of irregular plurals plus suffix rules.

use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::OnceLock;

const WORD_PATTERN: &str = r"\w+(?:[-'’]\w+)*|[^\w\s]";

const NEGATION_SUFFIXES: [&str; 2] = ["n't", "n’t"];

const CLITICS: [&str; 6] = ["s", "m", "d", "ll", "re", "ve"];

/// Irregular plurals, plural-form words that are their own base form, and
/// common `-s` words the suffix rules would otherwise mangle.
const NOUN_EXCEPTIONS: &[(&str, &str)] = &[
    ("men", "man"),
    ("women", "woman"),
    ("children", "child"),
    ("feet", "foot"),
    ("teeth", "tooth"),
    ("mice", "mouse"),
    ("geese", "goose"),
    ("lives", "life"),
    ("wives", "wife"),
    ("knives", "knife"),
    ("leaves", "leaf"),
    ("halves", "half"),
    ("shelves", "shelf"),
    ("wolves", "wolf"),
    ("thieves", "thief"),
    ("loaves", "loaf"),
    ("calves", "calf"),
    ("data", "datum"),
    ("criteria", "criterion"),
    ("phenomena", "phenomenon"),
    ("analyses", "analysis"),
    ("crises", "crisis"),
    ("diagnoses", "diagnosis"),
    ("news", "news"),
    ("series", "series"),
    ("species", "species"),
    ("means", "means"),
    ("clothes", "clothes"),
    ("goods", "goods"),
    ("thanks", "thanks"),
    ("aids", "aids"),
    ("glasses", "glasses"),
    ("buses", "bus"),
    ("gases", "gas"),
    ("quizzes", "quiz"),
    ("movies", "movie"),
    ("cookies", "cookie"),
    ("calories", "calorie"),
    ("zombies", "zombie"),
    ("goes", "go"),
    ("does", "does"),
    ("always", "always"),
    ("perhaps", "perhaps"),
    ("towards", "towards"),
    ("afterwards", "afterwards"),
    ("sometimes", "sometimes"),
    ("whereas", "whereas"),
    ("besides", "besides"),
    ("hers", "hers"),
    ("ours", "ours"),
    ("yours", "yours"),
    ("theirs", "theirs"),
];

fn word_regex() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(WORD_PATTERN).expect("word pattern is a valid regex"))
}

/// Noun lemmatizer backed by a fixed exception table and suffix rules.
#[derive(Debug, Clone)]
pub struct Lemmatizer {
    exceptions: HashMap<&'static str, &'static str>,
}

impl Default for Lemmatizer {
    fn default() -> Self {
        Self {
            exceptions: NOUN_EXCEPTIONS.iter().copied().collect(),
        }
    }
}

impl Lemmatizer {
    /// Shared instance.
    pub fn global() -> &'static Lemmatizer {
        static LEMMATIZER: OnceLock<Lemmatizer> = OnceLock::new();
        LEMMATIZER.get_or_init(Lemmatizer::default)
    }

    /// Base form of a lowercase word. Words that match no rule are returned
    /// unchanged.
    pub fn lemmatize<'a>(&self, word: &'a str) -> Cow<'a, str> {
        if let Some(base) = self.exceptions.get(word) {
            return Cow::Borrowed(*base);
        }
        if word.len() <= 3 || !word.bytes().all(|b| b.is_ascii_lowercase()) {
            return Cow::Borrowed(word);
        }

        if word.ends_with("sses") {
            return Cow::Borrowed(&word[..word.len() - 2]);
        }
        if word.len() > 4 && word.ends_with("ies") {
            return Cow::Owned(format!("{}y", &word[..word.len() - 3]));
        }
        if ["xes", "zzes", "ches", "shes"].iter().any(|s| word.ends_with(s)) {
            return Cow::Borrowed(&word[..word.len() - 2]);
        }
        if ["ss", "us", "is"].iter().any(|s| word.ends_with(s)) {
            return Cow::Borrowed(word);
        }
        match word.strip_suffix('s') {
            Some(stem) => Cow::Borrowed(stem),
            None => Cow::Borrowed(word),
        }
    }
}

/// Split `text` into raw word and punctuation tokens, without normalization.
pub fn word_tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    for m in word_regex().find_iter(text) {
        let (head, tail) = split_contraction(m.as_str());
        tokens.push(head);
        if let Some(tail) = tail {
            tokens.push(tail);
        }
    }
    tokens
}

fn split_contraction(word: &str) -> (&str, Option<&str>) {
    for suffix in NEGATION_SUFFIXES {
        if word.len() > suffix.len() {
            let at = word.len() - suffix.len();
            if word.is_char_boundary(at) && word[at..].eq_ignore_ascii_case(suffix) {
                return (&word[..at], Some(&word[at..]));
            }
        }
    }

    if let Some(at) = word.rfind(|c: char| c == '\'' || c == '’') {
        let apostrophe_len = word[at..].chars().next().map_or(1, char::len_utf8);
        let rest = &word[at + apostrophe_len..];
        if at > 0 && CLITICS.iter().any(|c| rest.eq_ignore_ascii_case(c)) {
            return (&word[..at], Some(&word[at..]));
        }
    }

    (word, None)
}

/// Tokenize and normalize `text`: lowercase, lemmatize, trim, and drop empty
/// tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let lemmatizer = Lemmatizer::global();
    word_tokenize(text)
        .into_iter()
        .filter_map(|token| {
            let lower = token.to_lowercase();
            let lemma = lemmatizer.lemmatize(&lower);
            let trimmed = lemma.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_text_yields_no_tokens() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \n\t").is_empty());
    }

    #[test]
    fn test_punctuation_is_separate() {
        assert_eq!(
            word_tokenize("Help, please!"),
            vec!["Help", ",", "please", "!"]
        );
    }

    #[test]
    fn test_contractions_split() {
        assert_eq!(word_tokenize("We don't have"), vec!["We", "do", "n't", "have"]);
        assert_eq!(word_tokenize("it's flooding"), vec!["it", "'s", "flooding"]);
        assert_eq!(word_tokenize("we'll wait"), vec!["we", "'ll", "wait"]);
    }

    #[test]
    fn test_hyphenated_words_stay_whole() {
        assert_eq!(word_tokenize("a well-known area"), vec!["a", "well-known", "area"]);
    }

    #[test]
    fn test_tokens_are_lowercased_and_lemmatized() {
        assert_eq!(
            tokenize("Families need Tents and Blankets"),
            vec!["family", "need", "tent", "and", "blanket"]
        );
    }

    #[test]
    fn test_lemmatizer_rules() {
        let lem = Lemmatizer::default();
        assert_eq!(lem.lemmatize("cities"), "city");
        assert_eq!(lem.lemmatize("boxes"), "box");
        assert_eq!(lem.lemmatize("churches"), "church");
        assert_eq!(lem.lemmatize("classes"), "class");
        assert_eq!(lem.lemmatize("houses"), "house");
        assert_eq!(lem.lemmatize("children"), "child");
        assert_eq!(lem.lemmatize("news"), "news");
        assert_eq!(lem.lemmatize("virus"), "virus");
        assert_eq!(lem.lemmatize("glass"), "glass");
        assert_eq!(lem.lemmatize("was"), "was");
        assert_eq!(lem.lemmatize("2010s"), "2010s");
    }

    #[test]
    fn test_lemmatizer_keeps_dictionary_forms() {
        let lem = Lemmatizer::default();
        for (word, base) in [
            ("movies", "movie"),
            ("cookies", "cookie"),
            ("buses", "bus"),
            ("gases", "gas"),
            ("quizzes", "quiz"),
            ("goes", "go"),
            ("always", "always"),
            ("perhaps", "perhaps"),
            ("towards", "towards"),
            ("sometimes", "sometimes"),
            ("hers", "hers"),
            ("ours", "ours"),
        ] {
            assert_eq!(lem.lemmatize(word), base, "lemma of {word}");
        }
    }

    #[test]
    fn test_sentence_with_irregular_s_words() {
        assert_eq!(
            tokenize("Movies always go, perhaps towards buses; he goes with gases and cookies"),
            vec![
                "movie", "always", "go", ",", "perhaps", "towards", "bus", ";", "he", "go",
                "with", "gas", "and", "cookie",
            ]
        );
    }

    proptest! {
        #[test]
        fn prop_tokenize_is_deterministic(text in "\\PC{0,80}") {
            prop_assert_eq!(tokenize(&text), tokenize(&text));
        }

        #[test]
        fn prop_tokens_are_trimmed_and_non_empty(text in "\\PC{0,80}") {
            for token in tokenize(&text) {
                prop_assert!(!token.is_empty());
                prop_assert_eq!(token.trim(), token.as_str());
            }
        }
    }
}
