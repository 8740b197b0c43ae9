//! Exclusion lists for bulk mutations.
//!
//! An exclusion list is the raw comma separated operator input, mixing
//! record ids and emails. A token containing `@` is matched against the
//! record's email, anything else against its id. Matching is exact.

/// A record that can be matched against an exclusion list.
pub trait Keyed {
    /// The record's unique id.
    fn key(&self) -> &str;

    /// The record's email, when it has one.
    fn email(&self) -> Option<&str> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Email(String),
    Id(String),
}

/// Immutable set of ids and emails excluded from a bulk operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionList {
    tokens: Vec<Token>,
}

impl ExclusionList {
    /// Split a raw list on `,`. Tokens are not trimmed.
    pub fn parse(raw: Option<&str>) -> Self {
        let tokens = raw
            .unwrap_or_default()
            .split(',')
            .filter(|t| !t.is_empty())
            .map(|t| {
                if t.contains('@') {
                    Token::Email(t.to_string())
                } else {
                    Token::Id(t.to_string())
                }
            })
            .collect();
        Self { tokens }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True when any token names `record` by id or email.
    pub fn is_excluded<R: Keyed + ?Sized>(&self, record: &R) -> bool {
        self.tokens.iter().any(|token| match token {
            Token::Email(email) => record.email() == Some(email.as_str()),
            Token::Id(id) => record.key() == id,
        })
    }
}
