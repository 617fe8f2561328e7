//! Key pattern matching for `KEYS`.
//!
//! Patterns follow SQL `LIKE` rules:
//! - `%` matches any run of bytes, including the empty run
//! - `_` matches exactly one byte
//! - `\` makes the next byte literal (`\%`, `\_`, `\\`)
//!
//! Every other byte matches itself. Matching is byte-wise, so keys do not
//! need to be valid UTF-8.

/// The pattern that matches every key.
pub const MATCH_ALL: &[u8] = b"%";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    AnyRun,
    AnyByte,
    Literal(u8),
}

/// A compiled `LIKE` pattern.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    tokens: Vec<Token>,
}

impl KeyPattern {
    pub fn new(pattern: &[u8]) -> Self {
        let mut tokens = Vec::with_capacity(pattern.len());
        let mut bytes = pattern.iter().copied();

        while let Some(b) = bytes.next() {
            let token = match b {
                b'%' => Token::AnyRun,
                b'_' => Token::AnyByte,
                // A trailing backslash matches itself.
                b'\\' => Token::Literal(bytes.next().unwrap_or(b'\\')),
                other => Token::Literal(other),
            };
            // Consecutive `%` collapse into one.
            if token == Token::AnyRun && tokens.last() == Some(&Token::AnyRun) {
                continue;
            }
            tokens.push(token);
        }

        Self { tokens }
    }

    /// True if this pattern is a lone `%`.
    pub fn matches_everything(&self) -> bool {
        self.tokens == [Token::AnyRun]
    }

    /// Matches `text` against the pattern.
    ///
    /// Iterative with single-point backtracking to the last `%`, so the cost
    /// stays O(pattern * text) even for patterns like `%a%a%a%b`.
    pub fn matches(&self, text: &[u8]) -> bool {
        let (mut p, mut t) = (0usize, 0usize);
        let mut backtrack: Option<(usize, usize)> = None;

        while t < text.len() {
            match self.tokens.get(p) {
                Some(Token::AnyRun) => {
                    backtrack = Some((p, t));
                    p += 1;
                    continue;
                }
                Some(Token::AnyByte) => {
                    p += 1;
                    t += 1;
                    continue;
                }
                Some(Token::Literal(c)) if *c == text[t] => {
                    p += 1;
                    t += 1;
                    continue;
                }
                _ => {}
            }

            match backtrack {
                Some((star_p, star_t)) => {
                    // Let the last `%` swallow one more byte and retry.
                    backtrack = Some((star_p, star_t + 1));
                    p = star_p + 1;
                    t = star_t + 1;
                }
                None => return false,
            }
        }

        self.tokens[p..].iter().all(|token| *token == Token::AnyRun)
    }
}
