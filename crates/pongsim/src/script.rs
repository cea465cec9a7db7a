//! Key scripts
//!
//! A script is the sequence of keyboard events the simulated controller
//! hands out, one per loop iteration. Tokens are separated by whitespace,
//! commas or newlines; `#` starts a comment that runs to the end of the
//! line.
//!
//! | Token            | Meaning                                   |
//! |------------------|-------------------------------------------|
//! | `.`              | no key this iteration                     |
//! | `28`, `0x1C`     | raw scan code                             |
//! | `enter`          | start key                                 |
//! | `w`, `s`         | left paddle up / down                     |
//! | `up`, `down`     | right paddle up / down                    |
//! | `TOKEN*N`        | the token repeated `N` times              |
//!
//! ```text
//! enter .*10   # start, then let the ball fly
//! s*3 up, .*50
//! ```

use pongos::keyboard::scancode;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Script parse failure
#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("line {line}: invalid key `{token}`")]
    InvalidToken { line: usize, token: String },

    #[error("line {line}: invalid repeat count in `{token}`")]
    InvalidRepeat { line: usize, token: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScriptError {
    fn invalid_token(line: usize, token: &str) -> Self {
        Self::InvalidToken {
            line,
            token: token.to_string(),
        }
    }

    fn invalid_repeat(line: usize, token: &str) -> Self {
        Self::InvalidRepeat {
            line,
            token: token.to_string(),
        }
    }
}

/// Parsed key script
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    events: Vec<Option<u8>>,
}

impl Script {
    /// Parse script text
    pub fn parse(source: &str) -> Result<Self, ScriptError> {
        let mut events = Vec::new();

        for (index, line) in source.lines().enumerate() {
            let line_no = index + 1;
            let code = line.split('#').next().unwrap_or_default();

            for token in code.split(|c: char| c == ',' || c.is_whitespace()).filter(|t| !t.is_empty()) {
                let (key, count) = match token.split_once('*') {
                    Some((key, count)) => {
                        let count = count
                            .parse::<usize>()
                            .map_err(|_| ScriptError::invalid_repeat(line_no, token))?;
                        (key, count)
                    }
                    None => (token, 1),
                };

                let event = parse_key(key).ok_or_else(|| ScriptError::invalid_token(line_no, token))?;
                events.extend(std::iter::repeat_n(event, count));
            }
        }

        Ok(Script { events })
    }

    /// Read and parse a script file
    pub fn from_file(path: &Path) -> Result<Self, ScriptError> {
        let source = fs::read_to_string(path)?;
        Self::parse(&source)
    }

    pub fn events(&self) -> &[Option<u8>] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_events(self) -> std::vec::IntoIter<Option<u8>> {
        self.events.into_iter()
    }
}

fn parse_key(key: &str) -> Option<Option<u8>> {
    let code = match key.to_ascii_lowercase().as_str() {
        "." => return Some(None),
        "enter" => scancode::ENTER,
        "w" => scancode::W,
        "s" => scancode::S,
        "up" => scancode::UP,
        "down" => scancode::DOWN,
        other => match other.strip_prefix("0x") {
            Some(hex) => u8::from_str_radix(hex, 16).ok()?,
            None => other.parse::<u8>().ok()?,
        },
    };
    Some(Some(code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_named_and_raw_keys() {
        let script = Script::parse("enter w s up down 28 0x1c .").unwrap();
        assert_eq!(
            script.events(),
            &[Some(28), Some(17), Some(31), Some(72), Some(80), Some(28), Some(28), None]
        );
    }

    #[test]
    fn test_repeats_comments_and_separators() {
        let script = Script::parse("enter, .*3  # idle\n\nS*2,UP\n").unwrap();
        assert_eq!(script.events(), &[Some(28), None, None, None, Some(31), Some(31), Some(72)]);
    }

    #[test]
    fn test_zero_repeat_is_empty() {
        assert!(Script::parse(".*0").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_token_reports_line() {
        let err = Script::parse("enter\n  jump").unwrap_err();
        assert!(matches!(err, ScriptError::InvalidToken { line: 2, ref token } if token == "jump"));
    }

    #[test]
    fn test_out_of_range_code_is_rejected() {
        let err = Script::parse("256").unwrap_err();
        assert!(matches!(err, ScriptError::InvalidToken { line: 1, .. }));
    }

    #[test]
    fn test_invalid_repeat() {
        let err = Script::parse("w*many").unwrap_err();
        assert!(matches!(err, ScriptError::InvalidRepeat { line: 1, ref token } if token == "w*many"));
        assert_eq!(err.to_string(), "line 1: invalid repeat count in `w*many`");
    }
}
