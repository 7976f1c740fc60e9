//! Offline token estimate, following the API's published rule of thumb:
//! one English character is about 0.3 tokens, one Chinese character about
//! 0.6 tokens.

use unicode_properties::{GeneralCategory, UnicodeGeneralCategory};
use unicode_script::{Script, UnicodeScript};

/// Estimated cost of each character class, in tenths of a token.
const LATIN_TENTHS: u64 = 3;
const HAN_TENTHS: u64 = 6;

/// Estimate how many tokens `text` uses. Whitespace, punctuation and other
/// scripts are not counted; the result is rounded up.
pub fn estimate_tokens(text: &str) -> u64 {
    let tenths: u64 = text.chars().map(char_tenths).sum();
    tenths.div_ceil(10)
}

fn char_tenths(c: char) -> u64 {
    match c.script() {
        Script::Latin => LATIN_TENTHS,
        Script::Han => HAN_TENTHS,
        _ if c.general_category() == GeneralCategory::DecimalNumber => LATIN_TENTHS,
        _ => 0,
    }
}
