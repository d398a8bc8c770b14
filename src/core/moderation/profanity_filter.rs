//! Local, offline profanity check.
//!
//! Whole-word matching against a fixed word list. Common character
//! substitutions (`sh!t`, `b@stard`) are folded back to letters first.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Built-in word list.
const PROFANE_WORDS: &[&str] = &[
    "arse",
    "arsehole",
    "ass",
    "asshole",
    "bastard",
    "bitch",
    "bitches",
    "bollocks",
    "bullshit",
    "crap",
    "cunt",
    "damn",
    "dick",
    "dickhead",
    "douche",
    "douchebag",
    "fuck",
    "fucked",
    "fucker",
    "fucking",
    "goddamn",
    "horseshit",
    "jackass",
    "motherfucker",
    "piss",
    "pissed",
    "prick",
    "pussy",
    "shit",
    "shitty",
    "slut",
    "twat",
    "wanker",
    "whore",
];

static DEFAULT_WORDS: Lazy<HashSet<String>> =
    Lazy::new(|| PROFANE_WORDS.iter().map(|w| w.to_string()).collect());

/// Maps a look-alike character to the letter it usually stands for.
fn fold_substitute(c: char) -> char {
    match c {
        '@' | '4' => 'a',
        '$' | '5' => 's',
        '0' => 'o',
        '1' | '!' => 'i',
        '3' => 'e',
        '7' => 't',
        other => other,
    }
}

#[derive(Debug, Clone)]
pub struct ProfanityFilter {
    words: HashSet<String>,
}

impl ProfanityFilter {
    /// Filter using only the built-in list.
    pub fn new() -> Self {
        Self {
            words: DEFAULT_WORDS.clone(),
        }
    }

    /// Filter using the built-in list plus `extra` words.
    pub fn with_extra_words<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::new();
        filter.words.extend(
            extra
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty()),
        );
        filter
    }

    /// Returns true if any word of `text` is on the list. Never fails.
    pub fn contains_profanity(&self, text: &str) -> bool {
        text.split_whitespace().any(|chunk| self.chunk_is_profane(chunk))
    }

    fn chunk_is_profane(&self, chunk: &str) -> bool {
        let lowered = chunk.to_lowercase();

        // Plain words: "damn!" -> "damn"
        if lowered
            .split(|c: char| !c.is_alphabetic())
            .any(|word| self.words.contains(word))
        {
            return true;
        }

        // Obfuscated words: "sh!t" -> "shit", "b@stard," -> "bastard"
        let folded: String = lowered.chars().map(fold_substitute).collect();
        let folded = folded.trim_matches(|c: char| !c.is_alphabetic());
        self.words.contains(folded)
    }
}

impl Default for ProfanityFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_passes() {
        let filter = ProfanityFilter::new();
        assert!(!filter.contains_profanity("What a lovely post about gardening."));
        assert!(!filter.contains_profanity(""));
    }

    #[test]
    fn test_whole_word_match_is_case_insensitive() {
        let filter = ProfanityFilter::new();
        assert!(filter.contains_profanity("This is SHIT"));
        assert!(filter.contains_profanity("well, damn!"));
    }

    #[test]
    fn test_substrings_of_clean_words_are_ignored() {
        let filter = ProfanityFilter::new();
        assert!(!filter.contains_profanity("A classic assessment of the passage"));
        assert!(!filter.contains_profanity("Scunthorpe"));
    }

    #[test]
    fn test_character_substitutions_are_caught() {
        let filter = ProfanityFilter::new();
        assert!(filter.contains_profanity("total sh!t"));
        assert!(filter.contains_profanity("you b@stard,"));
        assert!(filter.contains_profanity("$h1tty service"));
    }

    #[test]
    fn test_numbers_are_not_profane() {
        let filter = ProfanityFilter::new();
        assert!(!filter.contains_profanity("Released in 2024, version 3.1.4"));
    }

    #[test]
    fn test_extra_words() {
        let filter = ProfanityFilter::with_extra_words(["Frak", " "]);
        assert!(filter.contains_profanity("oh frak"));
        assert!(!ProfanityFilter::new().contains_profanity("oh frak"));
    }
}
