//! Naming convention utilities for code generation.
//!
//! Manifest identifiers arrive in whatever style the plugin author used (`GetEntityName`,
//! `get_entity_name`, `HTTPRequest`). Every conversion goes through [`split_words`] first,
//! so all styles produce the same target spelling.
//!
//! # Supported Conversions
//!
//! | Input | Function | Output |
//! |-------|----------|--------|
//! | `GetHTTPHeader` | [`to_snake_case`] | `get_http_header` |
//! | `GetHTTPHeader` | [`to_camel_case`] | `getHTTPHeader` |
//! | `get_http_header` | [`to_pascal_case`] | `GetHttpHeader` |
//! | `MaxPlayers` | [`to_screaming_snake_case`] | `MAX_PLAYERS` |
//! | `word` | [`capitalize`] | `Word` |
//! | `my-plugin.v2` | [`sanitize_identifier`] | `my_plugin_v2` |

/// Split an identifier into words on separators and case boundaries.
///
/// Runs of capitals are kept together as an acronym, and digits stay attached to the word
/// before them.
///
/// # Examples
///
/// ```
/// use plugify_gen::naming::split_words;
///
/// assert_eq!(split_words("GetEntityName"), ["Get", "Entity", "Name"]);
/// assert_eq!(split_words("HTTPServer"), ["HTTP", "Server"]);
/// assert_eq!(split_words("vec3_length"), ["vec3", "length"]);
/// ```
pub fn split_words(s: &str) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if matches!(c, '_' | '-' | '.' | ' ') {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower);
            if boundary {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Convert an identifier to snake_case.
///
/// # Examples
///
/// ```
/// use plugify_gen::naming::to_snake_case;
///
/// assert_eq!(to_snake_case("SetColor"), "set_color");
/// assert_eq!(to_snake_case("already_snake"), "already_snake");
/// ```
pub fn to_snake_case(s: &str) -> String {
    split_words(s)
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// Convert an identifier to SCREAMING_SNAKE_CASE.
pub fn to_screaming_snake_case(s: &str) -> String {
    split_words(s)
        .iter()
        .map(|w| w.to_uppercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// Convert an identifier to camelCase.
///
/// # Examples
///
/// ```
/// use plugify_gen::naming::to_camel_case;
///
/// assert_eq!(to_camel_case("hello_world"), "helloWorld");
/// assert_eq!(to_camel_case("SetColor"), "setColor");
/// assert_eq!(to_camel_case("already"), "already");
/// ```
pub fn to_camel_case(s: &str) -> String {
    let mut result = String::new();
    for (i, word) in split_words(s).iter().enumerate() {
        if i == 0 {
            result.push_str(&word.to_lowercase());
        } else {
            result.push_str(&capitalize(word));
        }
    }
    result
}

/// Convert an identifier to PascalCase.
///
/// Handles snake_case, kebab-case, and already-capitalized input.
///
/// # Examples
///
/// ```
/// use plugify_gen::naming::to_pascal_case;
///
/// assert_eq!(to_pascal_case("hello_world"), "HelloWorld");
/// assert_eq!(to_pascal_case("hello-world"), "HelloWorld");
/// assert_eq!(to_pascal_case("GetHTTPHeader"), "GetHTTPHeader");
/// ```
pub fn to_pascal_case(s: &str) -> String {
    split_words(s).iter().map(|w| capitalize(w)).collect()
}

/// Capitalize the first letter of a string.
///
/// # Examples
///
/// ```
/// use plugify_gen::naming::capitalize;
///
/// assert_eq!(capitalize("hello"), "Hello");
/// assert_eq!(capitalize(""), "");
/// ```
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().chain(chars).collect(),
    }
}

/// Replace every character that cannot appear in an identifier with `_`.
///
/// Used for file and module names derived from the package name.
pub fn sanitize_identifier(s: &str) -> String {
    let mut result: String = s
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if result.is_empty() || result.starts_with(|c: char| c.is_ascii_digit()) {
        result.insert(0, '_');
    }
    result
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use test_case::test_case;

    #[test_case("GetEntityName", &["Get", "Entity", "Name"])]
    #[test_case("get_entity_name", &["get", "entity", "name"])]
    #[test_case("HTTPServer", &["HTTP", "Server"])]
    #[test_case("parseJSON", &["parse", "JSON"])]
    #[test_case("Vec3Length", &["Vec3", "Length"])]
    #[test_case("__leading", &["leading"])]
    #[test_case("", &[])]
    fn split_words___splits_on_boundaries(input: &str, expected: &[&str]) {
        assert_eq!(split_words(input), expected);
    }

    #[test]
    fn to_camel_case___converts_snake_case() {
        assert_eq!(to_camel_case("hello_world"), "helloWorld");
        assert_eq!(to_camel_case("display_name"), "displayName");
        assert_eq!(to_camel_case("foo_bar_baz"), "fooBarBaz");
    }

    #[test]
    fn to_camel_case___handles_simple_words() {
        assert_eq!(to_camel_case("simple"), "simple");
        assert_eq!(to_camel_case(""), "");
    }

    #[test]
    fn to_camel_case___handles_consecutive_underscores() {
        assert_eq!(to_camel_case("foo__bar"), "fooBar");
        assert_eq!(to_camel_case("trailing_"), "trailing");
    }

    #[test]
    fn to_pascal_case___converts_snake_and_kebab_case() {
        assert_eq!(to_pascal_case("hello_world"), "HelloWorld");
        assert_eq!(to_pascal_case("my-plugin"), "MyPlugin");
    }

    #[test]
    fn to_pascal_case___handles_simple_words() {
        assert_eq!(to_pascal_case("hello"), "Hello");
        assert_eq!(to_pascal_case(""), "");
    }

    #[test_case("SetColor", "set_color")]
    #[test_case("GetHTTPHeader", "get_http_header")]
    #[test_case("x", "x")]
    fn to_snake_case___lowercases_words(input: &str, expected: &str) {
        assert_eq!(to_snake_case(input), expected);
    }

    #[test]
    fn to_screaming_snake_case___uppercases_words() {
        assert_eq!(to_screaming_snake_case("MaxPlayers"), "MAX_PLAYERS");
        assert_eq!(to_screaming_snake_case("red"), "RED");
    }

    #[test]
    fn capitalize___preserves_rest_of_string() {
        assert_eq!(capitalize("helloWorld"), "HelloWorld");
        assert_eq!(capitalize("ALLCAPS"), "ALLCAPS");
        assert_eq!(capitalize("a"), "A");
    }

    #[test_case("my-plugin", "my_plugin")]
    #[test_case("core.v2", "core_v2")]
    #[test_case("3d", "_3d")]
    #[test_case("plain", "plain")]
    fn sanitize_identifier___replaces_invalid_characters(input: &str, expected: &str) {
        assert_eq!(sanitize_identifier(input), expected);
    }
}
