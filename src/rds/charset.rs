//! Translation to the RDS basic character set.
//!
//! RDS text fields (PS, RT, PTYN, LPS, eRT) do not carry Unicode: they use
//! the code table of EN 50067 annex E. This module maps input text onto that
//! table — printable ASCII passes through unchanged, common accented letters
//! map into the 0x80+ rows, and anything unrepresentable becomes a space.
//!
//! The translation is a pure function and is idempotent on text it already
//! produced: every ASCII byte it emits maps back to itself.

/// Translate one character to its RDS code point.
///
/// Returns 0x20 (space) for characters with no representation.
pub fn rds_char(c: char) -> u8 {
    match c {
        // Printable ASCII is shared between the two tables
        ' '..='~' => c as u8,
        // Lowercase accents, row 0x80
        'á' => 0x80, 'à' => 0x81, 'é' => 0x82, 'è' => 0x83,
        'í' => 0x84, 'ì' => 0x85, 'ó' => 0x86, 'ò' => 0x87,
        'ú' => 0x88, 'ù' => 0x89, 'Ñ' => 0x8A, 'Ç' => 0x8B,
        'Ş' => 0x8C, 'ß' => 0x8D, '¡' => 0x8E, 'Ĳ' => 0x8F,
        // Row 0x90
        'â' => 0x90, 'ä' => 0x91, 'ê' => 0x92, 'ë' => 0x93,
        'î' => 0x94, 'ï' => 0x95, 'ô' => 0x96, 'ö' => 0x97,
        'û' => 0x98, 'ü' => 0x99, 'ñ' => 0x9A, 'ç' => 0x9B,
        'ş' => 0x9C, 'ğ' => 0x9D, 'ı' => 0x9E, 'ĳ' => 0x9F,
        // Symbols we care about from rows 0xA0/0xB0
        '©' => 0xA2, '€' => 0xA9, '£' => 0xAA,
        '°' => 0xBB, '¿' => 0xB9, '±' => 0xB4, '§' => 0xBF,
        // Uppercase accents, row 0xC0
        'Á' => 0xC0, 'À' => 0xC1, 'É' => 0xC2, 'È' => 0xC3,
        'Í' => 0xC4, 'Ì' => 0xC5, 'Ó' => 0xC6, 'Ò' => 0xC7,
        'Ú' => 0xC8, 'Ù' => 0xC9, 'Ř' => 0xCA, 'Č' => 0xCB,
        'Š' => 0xCC, 'Ž' => 0xCD, 'Ð' => 0xCE, 'Ŀ' => 0xCF,
        // Row 0xD0
        'Â' => 0xD0, 'Ä' => 0xD1, 'Ê' => 0xD2, 'Ë' => 0xD3,
        'Î' => 0xD4, 'Ï' => 0xD5, 'Ô' => 0xD6, 'Ö' => 0xD7,
        'Û' => 0xD8, 'Ü' => 0xD9, 'ř' => 0xDA, 'č' => 0xDB,
        'š' => 0xDC, 'ž' => 0xDD, 'đ' => 0xDE, 'ŀ' => 0xDF,
        // Row 0xE0
        'Ã' => 0xE0, 'Å' => 0xE1, 'Æ' => 0xE2, 'Œ' => 0xE3,
        'ŷ' => 0xE4, 'ý' => 0xE5, 'Õ' => 0xE6, 'Ø' => 0xE7,
        'Þ' => 0xE8, 'Ŋ' => 0xE9, 'Ŕ' => 0xEA, 'Ć' => 0xEB,
        'Ś' => 0xEC, 'Ź' => 0xED, 'Ŧ' => 0xEE, 'ð' => 0xEF,
        // Row 0xF0
        'ã' => 0xF0, 'å' => 0xF1, 'æ' => 0xF2, 'œ' => 0xF3,
        'ŵ' => 0xF4, 'õ' => 0xF6, 'ø' => 0xF7, 'þ' => 0xF8,
        'ŋ' => 0xF9, 'ŕ' => 0xFA, 'ć' => 0xFB, 'ś' => 0xFC,
        'ź' => 0xFD, 'ŧ' => 0xFE,
        _ => 0x20,
    }
}

/// Translate a string into RDS code points, one byte per input character.
pub fn xlat(input: &str) -> Vec<u8> {
    input.chars().map(rds_char).collect()
}

/// Translate into a fixed-width field: truncate past the target, pad the
/// rest with spaces.
pub fn fill(target: &mut [u8], input: &str) {
    let mut pos = 0;
    for c in input.chars() {
        if pos >= target.len() {
            break;
        }
        target[pos] = rds_char(c);
        pos += 1;
    }
    while pos < target.len() {
        target[pos] = 0x20;
        pos += 1;
    }
}
