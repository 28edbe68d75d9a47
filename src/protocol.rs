//! Protocol parser and command definitions for kvsock
//!
//! A request is a single line `VERB [KEY [VALUE]]` with tokens separated by
//! runs of whitespace. A reply is one bare token (`OK`, `NOT_FOUND`, `ERROR`)
//! or the raw bytes of a stored value. Neither side carries a terminator.

use crate::bounded::BoundedBytes;
use crate::error::{KvError, Result};
use nom::{
    bytes::complete::{take_while, take_while1},
    multi::many_m_n,
    sequence::preceded,
    IResult,
};

/// Largest request the server reads from a connection
pub const MAX_REQUEST_LEN: usize = 1023;

/// A request never yields more than verb, key and value
const MAX_TOKENS: usize = 3;

/// Commands supported by the kvsock protocol
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Set { key: BoundedBytes, value: BoundedBytes },
    Get { key: BoundedBytes },
    Delete { key: BoundedBytes },
}

impl Command {
    /// Encode the command as a request line, without terminator
    pub fn to_bytes(&self) -> Vec<u8> {
        let parts: Vec<&[u8]> = match self {
            Command::Set { key, value } => vec![&b"SET"[..], key.as_bytes(), value.as_bytes()],
            Command::Get { key } => vec![&b"GET"[..], key.as_bytes()],
            Command::Delete { key } => vec![&b"DELETE"[..], key.as_bytes()],
        };
        parts.join(&b' ')
    }
}

/// Response types from the server
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Ok,
    Value(BoundedBytes),
    NotFound,
    Error,
}

impl Response {
    /// Serialize response to bytes for network transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Response::Ok => b"OK".to_vec(),
            Response::Value(v) => v.as_bytes().to_vec(),
            Response::NotFound => b"NOT_FOUND".to_vec(),
            Response::Error => b"ERROR".to_vec(),
        }
    }

    /// Interpret a raw reply to `command`
    ///
    /// A GET reply is the stored value unless it is exactly `NOT_FOUND`, so a
    /// value that happens to read `OK` or `ERROR` still comes back as a value.
    pub fn from_reply(command: &Command, reply: &[u8]) -> Result<Response> {
        match (command, reply) {
            (Command::Get { .. }, b"NOT_FOUND") => Ok(Response::NotFound),
            (Command::Get { .. }, value) => Ok(Response::Value(BoundedBytes::new(value))),
            (_, b"OK") => Ok(Response::Ok),
            (_, b"ERROR") => Ok(Response::Error),
            (_, other) => Err(KvError::Protocol(format!(
                "unexpected reply: {}",
                String::from_utf8_lossy(other)
            ))),
        }
    }
}

fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

/// One whitespace-delimited token, skipping any leading whitespace
fn token(input: &[u8]) -> IResult<&[u8], &[u8]> {
    preceded(take_while(is_space), take_while1(|c| !is_space(c)))(input)
}

/// Split a request into at most three tokens, each capped at 255 bytes
///
/// Anything after the third token is ignored.
pub fn tokenize(input: &[u8]) -> Result<Vec<BoundedBytes>> {
    let (_, tokens) = many_m_n(0, MAX_TOKENS, token)(input)?;
    Ok(tokens.into_iter().map(BoundedBytes::new).collect())
}

/// Parse a request into a command
///
/// Verbs are matched exactly and case-sensitively. Arguments a verb does not
/// use are ignored.
pub fn parse_command(input: &[u8]) -> Result<Command> {
    let mut tokens = tokenize(input)?.into_iter();
    let verb = tokens
        .next()
        .ok_or_else(|| KvError::Protocol("empty command".to_string()))?;
    let key = tokens.next();
    let value = tokens.next();

    match (verb.as_bytes(), key, value) {
        (b"SET", Some(key), Some(value)) => Ok(Command::Set { key, value }),
        (b"GET", Some(key), _) => Ok(Command::Get { key }),
        (b"DELETE", Some(key), _) => Ok(Command::Delete { key }),
        (b"SET" | b"GET" | b"DELETE", _, _) => Err(KvError::Protocol(format!(
            "missing arguments for {}",
            verb
        ))),
        _ => Err(KvError::Protocol(format!("unknown command: {}", verb))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounded::MAX_FIELD_LEN;

    fn b(s: &str) -> BoundedBytes {
        BoundedBytes::from(s)
    }

    #[test]
    fn test_parse_set_command() {
        let result = parse_command(b"SET mykey myvalue").unwrap();
        assert_eq!(
            result,
            Command::Set {
                key: b("mykey"),
                value: b("myvalue")
            }
        );
    }

    #[test]
    fn test_parse_get_command() {
        let result = parse_command(b"GET mykey").unwrap();
        assert_eq!(result, Command::Get { key: b("mykey") });
    }

    #[test]
    fn test_parse_delete_command() {
        let result = parse_command(b"DELETE mykey").unwrap();
        assert_eq!(result, Command::Delete { key: b("mykey") });
    }

    #[test]
    fn test_whitespace_runs_and_terminators() {
        let result = parse_command(b"  SET\t\tname   Hong\r\n").unwrap();
        assert_eq!(
            result,
            Command::Set {
                key: b("name"),
                value: b("Hong")
            }
        );
    }

    #[test]
    fn test_extra_tokens_are_ignored() {
        assert_eq!(
            parse_command(b"GET k unused").unwrap(),
            Command::Get { key: b("k") }
        );
        assert_eq!(
            parse_command(b"SET k v trailing words").unwrap(),
            Command::Set {
                key: b("k"),
                value: b("v")
            }
        );
    }

    #[test]
    fn test_missing_arguments() {
        let inputs: [&[u8]; 5] = [b"SET k", b"SET", b"GET", b"DELETE", b"GET   \n"];
        for input in inputs {
            assert!(matches!(parse_command(input), Err(KvError::Protocol(_))));
        }
    }

    #[test]
    fn test_unknown_and_empty_commands() {
        let inputs: [&[u8]; 5] = [b"FOO bar", b"set k v", b"get k", b"", b" \t\r\n"];
        for input in inputs {
            assert!(matches!(parse_command(input), Err(KvError::Protocol(_))));
        }
    }

    #[test]
    fn test_long_tokens_are_truncated() {
        let key = "k".repeat(MAX_FIELD_LEN + 10);
        let value = "v".repeat(MAX_FIELD_LEN + 1);
        let input = format!("SET {} {}", key, value);

        match parse_command(input.as_bytes()).unwrap() {
            Command::Set { key, value } => {
                assert_eq!(key.len(), MAX_FIELD_LEN);
                assert_eq!(value.len(), MAX_FIELD_LEN);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_tokenize_caps_token_count() {
        let tokens = tokenize(b"a b c d e").unwrap();
        assert_eq!(tokens, vec![b("a"), b("b"), b("c")]);
        assert!(tokenize(b"   ").unwrap().is_empty());
    }

    #[test]
    fn test_command_encoding() {
        let command = Command::Set {
            key: b("name"),
            value: b("Hong"),
        };
        assert_eq!(command.to_bytes(), b"SET name Hong");
        assert_eq!(parse_command(&command.to_bytes()).unwrap(), command);
        assert_eq!(Command::Delete { key: b("x") }.to_bytes(), b"DELETE x");
    }

    #[test]
    fn test_response_serialization() {
        assert_eq!(Response::Ok.to_bytes(), b"OK");
        assert_eq!(Response::Value(b("test")).to_bytes(), b"test");
        assert_eq!(Response::NotFound.to_bytes(), b"NOT_FOUND");
        assert_eq!(Response::Error.to_bytes(), b"ERROR");
    }

    #[test]
    fn test_response_from_reply() {
        let get = Command::Get { key: b("k") };
        let set = Command::Set {
            key: b("k"),
            value: b("v"),
        };

        assert_eq!(
            Response::from_reply(&get, b"NOT_FOUND").unwrap(),
            Response::NotFound
        );
        assert_eq!(
            Response::from_reply(&get, b"ERROR").unwrap(),
            Response::Value(b("ERROR"))
        );
        assert_eq!(Response::from_reply(&set, b"OK").unwrap(), Response::Ok);
        assert_eq!(Response::from_reply(&set, b"ERROR").unwrap(), Response::Error);
        assert!(Response::from_reply(&set, b"garbage").is_err());
    }
}
