//! String normalization helpers used by the extraction strategies.
//!
//! Source attribute tables frequently shout their names in capitals and mark
//! ranges with ASCII double hyphens. These helpers turn such values into
//! display names and derive URL-safe slugs from them.

/// The em-dash used for ranges and compound district names.
pub const EM_DASH: char = '\u{2014}';

/// Words kept in lower case inside a title, unless first or last.
const SMALL_WORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "but", "by", "de", "du", "en", "et", "for", "if", "in", "la",
    "le", "of", "on", "or", "the", "to", "v", "via", "vs",
];

/// Clean a raw attribute value for display.
///
/// Values written entirely in capitals are title-cased, every whitespace
/// character becomes a plain space, and `" -- "`, `" --"`, `"-- "`, `"--"`
/// and `" - "` become an em-dash.
///
/// # Examples
///
/// ```
/// use boundaries_core::text::clean_string;
///
/// assert_eq!(clean_string("NORTH -- SOUTH"), "North\u{2014}South");
/// assert_eq!(clean_string("Ward 1 - East"), "Ward 1\u{2014}East");
/// ```
#[must_use]
pub fn clean_string(value: &str) -> String {
    let cased = if is_all_caps(value) {
        title_case(value)
    } else {
        value.to_owned()
    };
    let spaced: String = cased
        .chars()
        .map(|ch| if ch.is_whitespace() { ' ' } else { ch })
        .collect();
    collapse_dashes(&spaced)
}

/// Clean a value and turn every remaining hyphen into an em-dash.
#[must_use]
pub fn dashed_string(value: &str) -> String {
    clean_string(value).replace('-', "\u{2014}")
}

/// Title-case a value.
///
/// Small joining words stay lower case except at either end, letters that
/// follow `-`, `/`, `(`, `.` or a one-letter prefix and apostrophe (as in
/// `O'Brien`) are capitalised, and short Roman numerals stay upper case.
#[must_use]
pub fn title_case(value: &str) -> String {
    let word_count = value.split_whitespace().count();
    let mut out = String::with_capacity(value.len());
    let mut word = String::new();
    let mut position = 0;
    for ch in value.chars() {
        if ch.is_whitespace() {
            if !word.is_empty() {
                out.push_str(&title_word(&word, position, word_count));
                word.clear();
                position += 1;
            }
            out.push(ch);
        } else {
            word.push(ch);
        }
    }
    if !word.is_empty() {
        out.push_str(&title_word(&word, position, word_count));
    }
    out
}

/// Derive a slug: lower case alphanumeric runs joined by single hyphens.
///
/// Apostrophes are dropped so that `St. John's` becomes `st-johns`, and an
/// em-dash separates words just like any other punctuation.
///
/// ```
/// use boundaries_core::text::slugify;
///
/// assert_eq!(slugify("Ward 1\u{2014}East"), "ward-1-east");
/// assert_eq!(slugify("  St. John's  "), "st-johns");
/// ```
#[must_use]
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_separator = false;
    for ch in value.chars() {
        if is_apostrophe(ch) {
            continue;
        }
        if ch.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_separator = true;
        }
    }
    slug
}

fn is_all_caps(value: &str) -> bool {
    value.chars().any(char::is_uppercase) && !value.chars().any(char::is_lowercase)
}

const fn is_apostrophe(ch: char) -> bool {
    matches!(ch, '\'' | '\u{2019}')
}

fn is_roman_numeral(word: &str) -> bool {
    word.len() <= 4 && word.chars().all(|ch| matches!(ch, 'I' | 'V' | 'X'))
}

fn title_word(word: &str, position: usize, word_count: usize) -> String {
    if is_roman_numeral(word) {
        return word.to_owned();
    }
    let lower = word.to_lowercase();
    let at_edge = position == 0 || position + 1 == word_count;
    if !at_edge && SMALL_WORDS.contains(&lower.as_str()) {
        return lower;
    }

    let mut out = String::with_capacity(word.len());
    let mut capitalize_next = true;
    let mut segment_len = 0_usize;
    for ch in word.chars() {
        if ch.is_alphanumeric() {
            if capitalize_next {
                out.extend(ch.to_uppercase());
                capitalize_next = false;
            } else {
                out.extend(ch.to_lowercase());
            }
            segment_len += 1;
        } else {
            capitalize_next =
                matches!(ch, '-' | '/' | '(' | '.' | '"') || (is_apostrophe(ch) && segment_len == 1);
            segment_len = 0;
            out.push(ch);
        }
    }
    out
}

/// Replace dash runs left to right, preferring the longest spaced form.
fn collapse_dashes(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len());
    let mut rest = chars.as_slice();
    while let [first, tail @ ..] = rest {
        if let Some(remaining) = strip_dash_run(rest) {
            out.push(EM_DASH);
            rest = remaining;
        } else {
            out.push(*first);
            rest = tail;
        }
    }
    out
}

fn strip_dash_run(rest: &[char]) -> Option<&[char]> {
    match rest {
        [' ', '-', '-', ' ', tail @ ..]
        | [' ', '-', '-', tail @ ..]
        | ['-', '-', ' ', tail @ ..]
        | ['-', '-', tail @ ..]
        | [' ', '-', ' ', tail @ ..] => Some(tail),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("NORTH BAY", "North Bay")]
    #[case("ST. JOHN'S EAST", "St. John's East")]
    #[case("O'BRIEN", "O'Brien")]
    #[case("BAIE-COMEAU", "Baie-Comeau")]
    #[case("VILLE DE QUÉBEC", "Ville de Québec")]
    #[case("THE RIVER OF", "The River Of")]
    #[case("WARD II", "Ward II")]
    #[case("2ND AVENUE", "2nd Avenue")]
    fn title_cases_words(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(title_case(input), expected);
    }

    #[rstest]
    #[case("Ward 1 -- East", "Ward 1\u{2014}East")]
    #[case("Ward 1 --East", "Ward 1\u{2014}East")]
    #[case("Ward 1-- East", "Ward 1\u{2014}East")]
    #[case("Ward 1--East", "Ward 1\u{2014}East")]
    #[case("Ward 1 - East", "Ward 1\u{2014}East")]
    #[case("Ward-East", "Ward-East")]
    #[case("Ward\tOne\nTwo", "Ward One Two")]
    #[case("KINGS--HANTS", "Kings\u{2014}Hants")]
    fn cleans_strings(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(clean_string(input), expected);
    }

    #[rstest]
    fn mixed_case_values_keep_their_casing() {
        assert_eq!(clean_string("McLeod Lake"), "McLeod Lake");
    }

    #[rstest]
    fn dashed_replaces_every_hyphen() {
        assert_eq!(
            dashed_string("BAIE-COMEAU -- LAVAL"),
            "Baie\u{2014}Comeau\u{2014}Laval"
        );
    }

    #[rstest]
    #[case("Kings\u{2014}Hants", "kings-hants")]
    #[case("  Ward  1  ", "ward-1")]
    #[case("Côte-Nord", "côte-nord")]
    #[case("---", "")]
    #[case("A & B", "a-b")]
    fn slugifies(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(slugify(input), expected);
    }
}
