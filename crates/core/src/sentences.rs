use crate::chunking::normalize_whitespace;
use crate::error::SplitError;
use regex::Regex;
use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;

struct LanguageRules {
    // never end a sentence: they introduce a name or a number
    titles: &'static [&'static str],
    // end a sentence only when a typical sentence opener follows
    abbreviations: &'static [&'static str],
    starters: &'static [&'static str],
}

const ENGLISH: LanguageRules = LanguageRules {
    titles: &[
        "mr.", "mrs.", "ms.", "dr.", "prof.", "st.", "mt.", "vs.", "e.g.", "i.e.", "cf.", "fig.",
        "figs.", "vol.", "pp.", "eq.", "approx.", "ref.", "refs.", "dept.",
    ],
    abbreviations: &[
        "sr.", "jr.", "etc.", "no.", "nos.", "p.", "ch.", "sec.", "inc.", "ltd.", "co.", "corp.",
        "jan.", "feb.", "mar.", "apr.", "jun.", "jul.", "aug.", "sep.", "sept.", "oct.", "nov.",
        "dec.", "u.s.", "u.k.", "a.m.", "p.m.", "al.", "ed.", "eds.",
    ],
    starters: &[
        "The", "A", "An", "It", "Its", "We", "They", "Then", "He", "She", "I", "You", "This",
        "That", "These", "Those", "There", "Their", "Our", "His", "Her", "My", "In", "On", "At",
        "But", "And", "So", "However", "After", "Before", "If", "When", "While", "What", "Where",
        "Why", "How", "As", "Finally", "Next",
    ],
};

const GERMAN: LanguageRules = LanguageRules {
    titles: &[
        "z.b.", "bzw.", "d.h.", "ca.", "nr.", "dr.", "prof.", "hr.", "fr.", "abb.", "abs.", "vgl.",
        "ggf.", "inkl.", "evtl.", "s.", "bd.", "tel.",
    ],
    abbreviations: &["usw.", "u.a.", "str.", "jh."],
    starters: &[
        "Der", "Die", "Das", "Ein", "Eine", "Es", "Er", "Sie", "Wir", "Ich", "Dann", "Danach",
        "Aber", "Im", "In", "Am", "Dies", "Diese", "Dieser", "Damit", "Auch",
    ],
};

const FRENCH: LanguageRules = LanguageRules {
    titles: &[
        "m.", "mme.", "mlle.", "dr.", "pr.", "p.", "cf.", "ex.", "fig.", "n°.", "vol.", "av.",
        "bd.", "chap.", "env.",
    ],
    abbreviations: &["etc."],
    starters: &[
        "Le", "La", "Les", "Un", "Une", "Il", "Elle", "Ils", "Elles", "Nous", "On", "Je", "Ce",
        "Cette", "Puis", "Ensuite", "Mais", "Dans", "En",
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Abbreviation {
    Title,
    Ambiguous,
}

#[derive(Debug, Clone)]
pub struct SentenceSplitter {
    language: String,
    titles: HashSet<&'static str>,
    abbreviations: HashSet<&'static str>,
    starters: HashSet<&'static str>,
    initial: Regex,
    dotted_acronym: Regex,
}

impl SentenceSplitter {
    pub fn for_language(language: &str) -> Result<Self, SplitError> {
        let code = language.trim().to_lowercase();
        let rules = match code.as_str() {
            "en" => &ENGLISH,
            "de" => &GERMAN,
            "fr" => &FRENCH,
            _ => return Err(SplitError::UnsupportedLanguage(language.to_string())),
        };

        Ok(Self {
            language: code,
            titles: rules.titles.iter().copied().collect(),
            abbreviations: rules.abbreviations.iter().copied().collect(),
            starters: rules.starters.iter().copied().collect(),
            initial: Regex::new(r"^\p{Lu}\.$")?,
            dotted_acronym: Regex::new(r"^(?:\p{L}\.){2,}$")?,
        })
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let normalized = normalize_whitespace(text);
        let segments = normalized.split_sentence_bounds().collect::<Vec<_>>();

        let mut sentences = Vec::new();
        let mut pending = String::new();

        for (index, segment) in segments.iter().enumerate() {
            pending.push_str(segment);
            let next_word = segments.get(index + 1).and_then(|next| first_word(next));
            if self.continues_after(&pending, next_word) {
                continue;
            }
            push_trimmed(&mut sentences, &mut pending);
        }
        push_trimmed(&mut sentences, &mut pending);

        sentences
    }

    fn continues_after(&self, pending: &str, next_word: Option<&str>) -> bool {
        let Some(next_word) = next_word else {
            return false;
        };
        match self.trailing_abbreviation(pending) {
            Some(Abbreviation::Title) => true,
            Some(Abbreviation::Ambiguous) => !self.starters.contains(next_word),
            None => false,
        }
    }

    fn trailing_abbreviation(&self, pending: &str) -> Option<Abbreviation> {
        let last_word = pending
            .split_whitespace()
            .last()?
            .trim_start_matches(|c: char| matches!(c, '(' | '"' | '\'' | '[' | '«'));
        let lowered = last_word.to_lowercase();

        if self.titles.contains(lowered.as_str()) {
            Some(Abbreviation::Title)
        } else if self.abbreviations.contains(lowered.as_str())
            || self.initial.is_match(last_word)
            || self.dotted_acronym.is_match(&lowered)
        {
            Some(Abbreviation::Ambiguous)
        } else {
            None
        }
    }
}

fn first_word(segment: &str) -> Option<&str> {
    segment
        .split_whitespace()
        .next()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|word| !word.is_empty())
}

fn push_trimmed(sentences: &mut Vec<String>, pending: &mut String) {
    let sentence = pending.trim();
    if !sentence.is_empty() {
        sentences.push(sentence.to_string());
    }
    pending.clear();
}
