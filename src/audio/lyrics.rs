//! Lyric parsing and syllable splitting.

use serde::{Deserialize, Serialize};
use std::fmt;

const VOWELS: &[char] = &['a', 'e', 'i', 'o', 'u', 'y'];

fn is_vowel(c: char) -> bool {
    VOWELS.contains(&c.to_ascii_lowercase())
}

/// Ordered syllables of one line of lyrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricLine {
    pub syllables: Vec<String>,
}

impl LyricLine {
    /// Splits text into syllables.
    ///
    /// Words containing hyphens are split at the hyphens and nothing else,
    /// so `"sky-line"` gives exactly the syllables the writer marked. Other
    /// words go through a vowel-group heuristic.
    ///
    /// ```
    /// use songsmith::audio::LyricLine;
    ///
    /// let line = LyricLine::parse("dreams in the neon skyline");
    /// assert_eq!(line.len(), 6);
    /// ```
    pub fn parse(text: &str) -> Self {
        let syllables = text
            .split_whitespace()
            .flat_map(|word| {
                let cleaned: String = word
                    .chars()
                    .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '\'')
                    .collect();
                if cleaned.contains('-') {
                    cleaned
                        .split('-')
                        .filter(|part| !part.is_empty())
                        .map(str::to_string)
                        .collect()
                } else {
                    syllabify(&cleaned)
                }
            })
            .collect();
        Self { syllables }
    }

    pub fn len(&self) -> usize {
        self.syllables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.syllables.is_empty()
    }
}

impl fmt::Display for LyricLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.syllables.join("-"))
    }
}

/// Splits one word into syllables.
///
/// Each run of vowels (including `y`) is a syllable nucleus. A trailing
/// silent `e` does not count, unless it is the only nucleus or follows a
/// consonant + `l`. Between two nuclei a single consonant starts the next
/// syllable; a longer cluster is split after its first consonant.
pub fn syllabify(word: &str) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    // (start, end) of each vowel run
    let mut nuclei: Vec<(usize, usize)> = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if is_vowel(chars[i]) {
            let start = i;
            while i < chars.len() && is_vowel(chars[i]) {
                i += 1;
            }
            nuclei.push((start, i));
        } else {
            i += 1;
        }
    }

    if nuclei.len() > 1 {
        if let Some(&(start, end)) = nuclei.last() {
            let len = chars.len();
            let silent_e = end == len
                && start == len - 1
                && chars[start].eq_ignore_ascii_case(&'e')
                && !(len >= 3
                    && chars[len - 2].eq_ignore_ascii_case(&'l')
                    && !is_vowel(chars[len - 3]));
            if silent_e {
                nuclei.pop();
            }
        }
    }

    if nuclei.len() <= 1 {
        return vec![word.to_string()];
    }

    let mut boundaries = Vec::with_capacity(nuclei.len() - 1);
    for pair in nuclei.windows(2) {
        let gap_start = pair[0].1;
        let gap_end = pair[1].0;
        let boundary = if gap_end - gap_start <= 1 {
            gap_start
        } else {
            gap_start + 1
        };
        boundaries.push(boundary);
    }

    let mut syllables = Vec::with_capacity(nuclei.len());
    let mut from = 0;
    for boundary in boundaries {
        syllables.push(chars[from..boundary].iter().collect());
        from = boundary;
    }
    syllables.push(chars[from..].iter().collect());
    syllables
}

/// First vowel of a syllable, lowercased.
pub fn vowel_of(syllable: &str) -> Option<char> {
    syllable
        .chars()
        .find(|c| is_vowel(*c))
        .map(|c| c.to_ascii_lowercase())
}

/// Whether a syllable opens with a hissing consonant.
pub fn has_fricative_onset(syllable: &str) -> bool {
    let lowered = syllable.to_ascii_lowercase();
    ["s", "f", "h", "z", "v", "x", "ch", "th"]
        .iter()
        .any(|onset| lowered.starts_with(onset))
}
