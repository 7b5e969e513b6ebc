//! Classification of one CLI item into its request-building role.
//!
//! The separator grammar follows the terse HTTPie conventions:
//!
//! | shape        | kind        |
//! |--------------|-------------|
//! | `key:=value` | raw JSON    |
//! | `key@value`  | file upload |
//! | `key==value` | query param |
//! | `key:value`  | header      |
//! | `key=value`  | data field  |
//!
//! The earliest separator occurrence in the string decides; at the same
//! position the longer operator wins, so `a:=1` is raw JSON rather than a
//! header named `a` with value `=1`, and `name=a:b` is a data field rather
//! than a header.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Header,
    Query,
    Data,
    RawJson,
    FileUpload,
    Unmatched,
}

/// Transient classification result; produced and consumed in one parse pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedToken {
    pub kind: TokenKind,
    pub key: String,
    pub value: String,
}

/// Classifies a single item string. Never fails: anything without a
/// recognizable separator (or with an empty key) comes back `Unmatched` with
/// the whole token in `value`.
pub fn classify(token: &str) -> ClassifiedToken {
    for (i, _) in token.char_indices() {
        let rest = &token[i..];
        let matched = if rest.starts_with(":=") {
            Some((TokenKind::RawJson, 2))
        } else if rest.starts_with("==") {
            Some((TokenKind::Query, 2))
        } else if rest.starts_with('@') {
            Some((TokenKind::FileUpload, 1))
        } else if rest.starts_with(':') {
            Some((TokenKind::Header, 1))
        } else if rest.starts_with('=') {
            Some((TokenKind::Data, 1))
        } else {
            None
        };
        if let Some((kind, len)) = matched {
            if i == 0 {
                break;
            }
            return ClassifiedToken {
                kind,
                key: token[..i].to_string(),
                value: token[i + len..].to_string(),
            };
        }
    }
    ClassifiedToken {
        kind: TokenKind::Unmatched,
        key: String::new(),
        value: token.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(token: &str) -> TokenKind {
        classify(token).kind
    }

    #[test]
    fn raw_json_beats_header_and_data() {
        let token = classify("age:=25");
        assert_eq!(token.kind, TokenKind::RawJson);
        assert_eq!(token.key, "age");
        assert_eq!(token.value, "25");
    }

    #[test]
    fn query_beats_data() {
        let token = classify("page==2");
        assert_eq!(token.kind, TokenKind::Query);
        assert_eq!(token.key, "page");
        assert_eq!(token.value, "2");
    }

    #[test]
    fn single_separators() {
        assert_eq!(kind_of("Accept:text/html"), TokenKind::Header);
        assert_eq!(kind_of("name=John"), TokenKind::Data);
        assert_eq!(kind_of("photo@cat.jpg"), TokenKind::FileUpload);
    }

    #[test]
    fn earliest_separator_decides() {
        // '=' comes before ':' so this is data, not a header
        let token = classify("name=a:b");
        assert_eq!(token.kind, TokenKind::Data);
        assert_eq!(token.key, "name");
        assert_eq!(token.value, "a:b");
    }

    #[test]
    fn header_value_may_contain_equals() {
        let token = classify("X-Token:a=b");
        assert_eq!(token.kind, TokenKind::Header);
        assert_eq!(token.value, "a=b");
    }

    #[test]
    fn empty_values_are_allowed() {
        assert_eq!(classify("photo@").value, "");
        assert_eq!(classify("X-Remove:").value, "");
    }

    #[test]
    fn bracketed_keys_pass_through_verbatim() {
        let token = classify("user[address][city]=NYC");
        assert_eq!(token.kind, TokenKind::Data);
        assert_eq!(token.key, "user[address][city]");
    }

    #[test]
    fn no_separator_or_empty_key_is_unmatched() {
        assert_eq!(kind_of("lonely"), TokenKind::Unmatched);
        assert_eq!(kind_of("=oops"), TokenKind::Unmatched);
        assert_eq!(kind_of(""), TokenKind::Unmatched);
    }

    #[test]
    fn classification_is_idempotent() {
        for token in ["age:=25", "q==x", "a:b", "k=v", "f@p", "???"] {
            assert_eq!(classify(token), classify(token));
        }
    }
}
