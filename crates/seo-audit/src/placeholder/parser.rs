use std::fmt;

use super::PlaceholderError;

/// Parsed template: literal text interleaved with field tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Token(Token),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub field: String,
    /// Maximum number of characters kept from the value.
    pub limit: Option<usize>,
    /// Source text of the token, braces included.
    pub raw: String,
    /// Character offset of the opening brace.
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxIssue {
    UnclosedBrace,
    UnmatchedClosingBrace,
    EmptyIdentifier,
    InvalidIdentifier,
    MalformedTruncation,
    NonNumericLength,
    NonPositiveLength,
}

impl fmt::Display for SyntaxIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SyntaxIssue::UnclosedBrace => "unclosed '{'",
            SyntaxIssue::UnmatchedClosingBrace => "unmatched '}'",
            SyntaxIssue::EmptyIdentifier => "empty field name",
            SyntaxIssue::InvalidIdentifier => "invalid field name",
            SyntaxIssue::MalformedTruncation => "truncation must look like [:N]",
            SyntaxIssue::NonNumericLength => "truncation length is not a number",
            SyntaxIssue::NonPositiveLength => "truncation length must be positive",
        };
        f.write_str(text)
    }
}

fn syntax(offset: usize, fragment: impl Into<String>, issue: SyntaxIssue) -> PlaceholderError {
    PlaceholderError::InvalidSyntax {
        offset,
        fragment: fragment.into(),
        issue,
    }
}

impl Template {
    /// Parse `{field}` and `{field[:N]}` tokens. `{{` and `}}` are literal braces.
    pub fn parse(source: &str) -> Result<Self, PlaceholderError> {
        let chars: Vec<char> = source.chars().collect();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut index = 0;

        while index < chars.len() {
            let next = chars.get(index + 1).copied();
            match chars[index] {
                '{' if next == Some('{') => {
                    literal.push('{');
                    index += 2;
                }
                '}' if next == Some('}') => {
                    literal.push('}');
                    index += 2;
                }
                '}' => return Err(syntax(index, "}", SyntaxIssue::UnmatchedClosingBrace)),
                '{' => {
                    let stop = chars[index + 1..]
                        .iter()
                        .position(|ch| *ch == '}' || *ch == '{')
                        .map(|position| position + index + 1);
                    let end = match stop {
                        Some(end) if chars[end] == '}' => end,
                        Some(end) => {
                            let fragment: String = chars[index..end].iter().collect();
                            return Err(syntax(index, fragment, SyntaxIssue::UnclosedBrace));
                        }
                        None => {
                            let fragment: String = chars[index..].iter().collect();
                            return Err(syntax(index, fragment, SyntaxIssue::UnclosedBrace));
                        }
                    };

                    let raw: String = chars[index..=end].iter().collect();
                    let inner: String = chars[index + 1..end].iter().collect();
                    let token = parse_token(&inner, raw, index)?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Token(token));
                    index = end + 1;
                }
                ch => {
                    literal.push(ch);
                    index += 1;
                }
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Token(token) => Some(token),
            Segment::Literal(_) => None,
        })
    }

    pub fn has_tokens(&self) -> bool {
        self.tokens().next().is_some()
    }
}

fn parse_token(inner: &str, raw: String, offset: usize) -> Result<Token, PlaceholderError> {
    let (name, truncation) = match inner.find('[') {
        Some(position) => (&inner[..position], Some(inner[position..].trim_end())),
        None => (inner, None),
    };

    let field = name.trim();
    if field.is_empty() {
        return Err(syntax(offset, raw, SyntaxIssue::EmptyIdentifier));
    }
    if !is_identifier(field) {
        return Err(syntax(offset, raw, SyntaxIssue::InvalidIdentifier));
    }

    let limit = match truncation {
        Some(truncation) => Some(
            parse_limit(truncation).map_err(|issue| syntax(offset, raw.clone(), issue))?,
        ),
        None => None,
    };

    Ok(Token {
        field: field.to_string(),
        limit,
        raw,
        offset,
    })
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        }
        _ => false,
    }
}

fn parse_limit(truncation: &str) -> Result<usize, SyntaxIssue> {
    let digits = truncation
        .strip_prefix("[:")
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or(SyntaxIssue::MalformedTruncation)?
        .trim();

    if let Some(negative) = digits.strip_prefix('-') {
        if !negative.is_empty() && negative.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(SyntaxIssue::NonPositiveLength);
        }
        return Err(SyntaxIssue::NonNumericLength);
    }
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(SyntaxIssue::NonNumericLength);
    }

    match digits.parse::<usize>() {
        Ok(0) => Err(SyntaxIssue::NonPositiveLength),
        Ok(limit) => Ok(limit),
        // All digits but too large to represent: no value is that long anyway.
        Err(_) => Ok(usize::MAX),
    }
}
