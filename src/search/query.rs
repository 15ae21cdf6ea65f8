//! Search query tokenization.

use std::fmt;

/// One atomic unit of search input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchToken {
    /// Free text, matched as a case-insensitive substring
    Text(String),
    /// Structural `name:value` filter; never matched against row text
    Filter { name: String, value: String },
}

impl SearchToken {
    pub fn text(text: impl Into<String>) -> Self {
        SearchToken::Text(text.into())
    }

    pub fn is_filter(&self) -> bool {
        matches!(self, SearchToken::Filter { .. })
    }

    fn from_word(word: String, quoted: bool) -> Self {
        if !quoted {
            if let Some((name, value)) = word.split_once(':') {
                let is_name = !name.is_empty()
                    && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-');
                if is_name {
                    return SearchToken::Filter {
                        name: name.to_string(),
                        value: value.to_string(),
                    };
                }
            }
        }
        SearchToken::Text(word)
    }
}

impl fmt::Display for SearchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchToken::Text(text) if text.chars().any(char::is_whitespace) => write!(f, "\"{text}\""),
            SearchToken::Text(text) => f.write_str(text),
            SearchToken::Filter { name, value } => write!(f, "{name}:{value}"),
        }
    }
}

/// Unordered set of tokens; a row matches when every text token matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    tokens: Vec<SearchToken>,
}

impl SearchQuery {
    pub fn new(tokens: Vec<SearchToken>) -> Self {
        SearchQuery { tokens }
    }

    /// Split on whitespace. Double quotes group a phrase into one text token
    /// (an unterminated quote runs to the end); unquoted `name:value` words are
    /// filter tokens.
    pub fn parse(input: &str) -> Self {
        let mut tokens = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut quoted = false;

        for c in input.chars() {
            match c {
                '"' => {
                    in_quotes = !in_quotes;
                    quoted = true;
                }
                c if c.is_whitespace() && !in_quotes => {
                    if !current.is_empty() {
                        tokens.push(SearchToken::from_word(std::mem::take(&mut current), quoted));
                    }
                    quoted = false;
                }
                c => current.push(c),
            }
        }
        if !current.is_empty() {
            tokens.push(SearchToken::from_word(current, quoted));
        }

        SearchQuery { tokens }
    }

    pub fn tokens(&self) -> &[SearchToken] {
        &self.tokens
    }

    /// Tokens that take part in text matching.
    pub fn text_tokens(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().filter_map(|token| match token {
            SearchToken::Text(text) => Some(text.as_str()),
            SearchToken::Filter { .. } => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
