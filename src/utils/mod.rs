//! Project-specific utilities live here.

/// URL-friendly form of `text`.
///
/// ASCII letters, digits and `_` are kept and lowercased. Accented Latin
/// letters are reduced to their base letter. Runs of whitespace and `-`
/// become a single `-`, with none at either end. Everything else, including
/// punctuation and non-Latin scripts, is dropped without splitting words.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars().map(|c| strip_accent(c).unwrap_or(c)) {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' {
            pending_dash = true;
        }
    }

    slug
}

/// Base letter of a precomposed Latin letter with a diacritic.
fn strip_accent(c: char) -> Option<char> {
    let base = match c {
        'à'..='å' | 'À'..='Å' | 'ā' | 'Ā' | 'ą' | 'Ą' | 'ă' | 'Ă' => 'a',
        'ç' | 'Ç' | 'ć' | 'Ć' | 'č' | 'Č' => 'c',
        'ď' | 'Ď' => 'd',
        'è'..='ë' | 'È'..='Ë' | 'ē' | 'Ē' | 'ę' | 'Ę' | 'ě' | 'Ě' => 'e',
        'ğ' | 'Ğ' => 'g',
        'ì'..='ï' | 'Ì'..='Ï' | 'ī' | 'Ī' | 'İ' => 'i',
        'ñ' | 'Ñ' | 'ń' | 'Ń' | 'ň' | 'Ň' => 'n',
        'ò'..='ö' | 'Ò'..='Ö' | 'ō' | 'Ō' | 'ő' | 'Ő' => 'o',
        'ř' | 'Ř' => 'r',
        'ś' | 'Ś' | 'š' | 'Š' | 'ş' | 'Ş' => 's',
        'ť' | 'Ť' | 'ţ' | 'Ţ' => 't',
        'ù'..='ü' | 'Ù'..='Ü' | 'ū' | 'Ū' | 'ů' | 'Ů' | 'ű' | 'Ű' => 'u',
        'ý' | 'ÿ' | 'Ý' | 'Ÿ' => 'y',
        'ź' | 'Ź' | 'ż' | 'Ż' | 'ž' | 'Ž' => 'z',
        _ => return None,
    };
    Some(base)
}

/// True for non-empty slugs made of lowercase ASCII letters, digits, `_` and `-`
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  The Rust -- Book  "), "the-rust-book");
        assert_eq!(slugify("snake_case stays"), "snake_case-stays");
    }

    #[test]
    fn slugify_drops_punctuation_without_splitting_words() {
        assert_eq!(slugify("Don't Panic"), "dont-panic");
        assert_eq!(slugify("Swiss Design: 2025 Edition"), "swiss-design-2025-edition");
    }

    #[test]
    fn slugify_reduces_accented_letters() {
        assert_eq!(slugify("Café Crème"), "cafe-creme");
        assert_eq!(slugify("Žluťoučký kůň"), "zlutoucky-kun");
        assert_eq!(slugify("Ærø 日本 post"), "r-post");
    }

    #[test]
    fn slugify_can_be_empty() {
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn valid_slugs() {
        assert!(is_valid_slug("space-exploration_101"));
        assert!(!is_valid_slug("Space"));
        assert!(!is_valid_slug("a b"));
        assert!(!is_valid_slug(""));
    }
}
