//! Sign-In with Ethereum (EIP-4361) messages
//!
//! Parses the plaintext a wallet signs and checks its static fields and
//! validity window against server policy.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::Address;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use thiserror::Error;

use super::crypto::{checksum_address, parse_address};

const PREAMBLE_SUFFIX: &str = " wants you to sign in with your Ethereum account:";
const SUPPORTED_VERSION: &str = "1";
const MIN_NONCE_LEN: usize = 8;

const TAG_URI: &str = "URI";
const TAG_VERSION: &str = "Version";
const TAG_CHAIN_ID: &str = "Chain ID";
const TAG_NONCE: &str = "Nonce";
const TAG_ISSUED_AT: &str = "Issued At";
const TAG_EXPIRATION_TIME: &str = "Expiration Time";
const TAG_NOT_BEFORE: &str = "Not Before";
const TAG_REQUEST_ID: &str = "Request ID";
const TAG_RESOURCES: &str = "Resources";

/// Reasons a message fails to parse
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageParseError {
    #[error("Missing sign-in preamble")]
    MissingPreamble,

    #[error("Invalid domain: {0:?}")]
    InvalidDomain(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Unsupported version: {0}")]
    UnsupportedVersion(String),

    #[error("Unexpected line: {0:?}")]
    UnexpectedLine(String),
}

/// RFC 3339 timestamp that keeps the exact text it was parsed from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiweTimestamp {
    raw: String,
    at: DateTime<Utc>,
}

impl SiweTimestamp {
    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }
}

impl From<DateTime<Utc>> for SiweTimestamp {
    fn from(at: DateTime<Utc>) -> Self {
        Self {
            raw: at.to_rfc3339_opts(SecondsFormat::Secs, true),
            at,
        }
    }
}

impl FromStr for SiweTimestamp {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let at = DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc);
        Ok(Self {
            raw: s.to_string(),
            at,
        })
    }
}

impl fmt::Display for SiweTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A parsed sign-in message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiweMessage {
    pub domain: String,
    pub address: Address,
    pub statement: Option<String>,
    pub uri: String,
    pub version: String,
    pub chain_id: u64,
    pub nonce: String,
    pub issued_at: SiweTimestamp,
    pub expiration_time: Option<SiweTimestamp>,
    pub not_before: Option<SiweTimestamp>,
    pub request_id: Option<String>,
    pub resources: Vec<String>,
}

impl FromStr for SiweMessage {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lines = Lines::new(s);

        let domain = lines
            .next()
            .and_then(|line| line.strip_suffix(PREAMBLE_SUFFIX))
            .ok_or(MessageParseError::MissingPreamble)?;
        if domain.is_empty() || domain.contains(char::is_whitespace) {
            return Err(MessageParseError::InvalidDomain(domain.to_string()));
        }

        let address_line = lines
            .next()
            .ok_or(MessageParseError::MissingField("address"))?;
        let address = parse_address(address_line)
            .map_err(|_| MessageParseError::InvalidAddress(address_line.to_string()))?;

        lines.expect_blank()?;

        // Either "\n\n" or "\n<statement>\n\n" separates the address from the URI;
        // a single blank line is tolerated too
        let statement = match lines.peek() {
            Some("") => {
                lines.next();
                None
            }
            // A statement is followed by a blank line, the URI field by Version
            Some(line)
                if line.starts_with(&format!("{TAG_URI}:")) && lines.peek_second() != Some("") =>
            {
                None
            }
            Some(line) => {
                let statement = line.to_string();
                lines.next();
                lines.expect_blank()?;
                Some(statement)
            }
            None => return Err(MessageParseError::MissingField(TAG_URI)),
        };

        let uri = lines.required(TAG_URI)?.to_string();
        if uri.is_empty() {
            return Err(MessageParseError::InvalidField {
                field: TAG_URI,
                reason: "empty".to_string(),
            });
        }

        let version = lines.required(TAG_VERSION)?.to_string();
        if version != SUPPORTED_VERSION {
            return Err(MessageParseError::UnsupportedVersion(version));
        }

        let chain_id = lines
            .required(TAG_CHAIN_ID)?
            .parse::<u64>()
            .map_err(|e| MessageParseError::InvalidField {
                field: TAG_CHAIN_ID,
                reason: e.to_string(),
            })?;

        // Emptiness is a policy failure, not a grammar one
        let nonce = lines.required(TAG_NONCE)?.to_string();
        if !nonce
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(MessageParseError::InvalidField {
                field: TAG_NONCE,
                reason: "must be alphanumeric".to_string(),
            });
        }
        if !nonce.is_empty() && nonce.len() < MIN_NONCE_LEN {
            return Err(MessageParseError::InvalidField {
                field: TAG_NONCE,
                reason: format!("must be at least {} characters", MIN_NONCE_LEN),
            });
        }

        let issued_at = parse_timestamp(TAG_ISSUED_AT, lines.required(TAG_ISSUED_AT)?)?;

        let expiration_time = lines
            .optional(TAG_EXPIRATION_TIME)
            .map(|v| parse_timestamp(TAG_EXPIRATION_TIME, v))
            .transpose()?;

        let not_before = lines
            .optional(TAG_NOT_BEFORE)
            .map(|v| parse_timestamp(TAG_NOT_BEFORE, v))
            .transpose()?;

        let request_id = lines.optional(TAG_REQUEST_ID).map(str::to_string);

        let mut resources = Vec::new();
        if lines.peek().and_then(|l| l.strip_prefix(TAG_RESOURCES)) == Some(":") {
            lines.next();
            while let Some(resource) = lines.peek().and_then(|l| l.strip_prefix("- ")) {
                resources.push(resource.to_string());
                lines.next();
            }
        }

        // A single trailing newline is fine, anything else is not
        if let Some(line) = lines.next() {
            if !(line.is_empty() && lines.peek().is_none()) {
                return Err(MessageParseError::UnexpectedLine(line.to_string()));
            }
        }

        Ok(SiweMessage {
            domain: domain.to_string(),
            address,
            statement,
            uri,
            version,
            chain_id,
            nonce,
            issued_at,
            expiration_time,
            not_before,
            request_id,
            resources,
        })
    }
}

impl fmt::Display for SiweMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}{}", self.domain, PREAMBLE_SUFFIX)?;
        writeln!(f, "{}", checksum_address(&self.address))?;
        writeln!(f)?;
        if let Some(statement) = &self.statement {
            writeln!(f, "{statement}")?;
        }
        writeln!(f)?;
        writeln!(f, "{TAG_URI}: {}", self.uri)?;
        writeln!(f, "{TAG_VERSION}: {}", self.version)?;
        writeln!(f, "{TAG_CHAIN_ID}: {}", self.chain_id)?;
        writeln!(f, "{TAG_NONCE}: {}", self.nonce)?;
        write!(f, "{TAG_ISSUED_AT}: {}", self.issued_at)?;
        if let Some(expiration_time) = &self.expiration_time {
            write!(f, "\n{TAG_EXPIRATION_TIME}: {expiration_time}")?;
        }
        if let Some(not_before) = &self.not_before {
            write!(f, "\n{TAG_NOT_BEFORE}: {not_before}")?;
        }
        if let Some(request_id) = &self.request_id {
            write!(f, "\n{TAG_REQUEST_ID}: {request_id}")?;
        }
        if !self.resources.is_empty() {
            write!(f, "\n{TAG_RESOURCES}:")?;
            for resource in &self.resources {
                write!(f, "\n- {resource}")?;
            }
        }
        Ok(())
    }
}

fn parse_timestamp(field: &'static str, value: &str) -> Result<SiweTimestamp, MessageParseError> {
    value
        .parse()
        .map_err(|e: chrono::ParseError| MessageParseError::InvalidField {
            field,
            reason: e.to_string(),
        })
}

/// Line cursor over the message text
struct Lines<'a> {
    inner: std::iter::Peekable<std::str::Split<'a, char>>,
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            inner: text.split('\n').peekable(),
        }
    }

    fn next(&mut self) -> Option<&'a str> {
        self.inner.next()
    }

    fn peek(&mut self) -> Option<&'a str> {
        self.inner.peek().copied()
    }

    fn peek_second(&self) -> Option<&'a str> {
        self.inner.clone().nth(1)
    }

    fn expect_blank(&mut self) -> Result<(), MessageParseError> {
        match self.next() {
            Some("") => Ok(()),
            Some(line) => Err(MessageParseError::UnexpectedLine(line.to_string())),
            None => Err(MessageParseError::MissingField(TAG_URI)),
        }
    }

    /// Value of a `Tag: value` line that must come next
    fn required(&mut self, tag: &'static str) -> Result<&'a str, MessageParseError> {
        self.optional(tag)
            .ok_or(MessageParseError::MissingField(tag))
    }

    /// Value of a `Tag: value` line if it comes next
    fn optional(&mut self, tag: &'static str) -> Option<&'a str> {
        let value = self
            .peek()?
            .strip_prefix(tag)?
            .strip_prefix(':')
            .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))?;
        self.next();
        Some(value)
    }
}

/// Policy violations found while validating a message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    #[error("Domain mismatch: got {actual:?}, expected {expected:?}")]
    DomainMismatch { expected: String, actual: String },

    #[error("URI mismatch: got {actual:?}, expected {expected:?}")]
    UriMismatch { expected: String, actual: String },

    #[error("Chain ID mismatch: got {actual}, expected {expected}")]
    ChainMismatch { expected: u64, actual: u64 },

    #[error("Missing nonce")]
    MissingNonce,

    #[error("Message is not valid at {0}")]
    TimeConstraintViolation(DateTime<Utc>),
}

/// What a message must agree with to be accepted
#[derive(Debug, Clone)]
pub struct SiweConstraints {
    pub domain: String,
    pub uri: String,
    /// Zero accepts any chain
    pub chain_id: u64,
    pub time_skew: Duration,
}

impl SiweConstraints {
    /// Check every static field, then the validity window at `now`
    pub fn validate(&self, message: &SiweMessage, now: DateTime<Utc>) -> Result<(), PolicyViolation> {
        if message.domain != self.domain {
            return Err(PolicyViolation::DomainMismatch {
                expected: self.domain.clone(),
                actual: message.domain.clone(),
            });
        }

        if message.uri != self.uri {
            return Err(PolicyViolation::UriMismatch {
                expected: self.uri.clone(),
                actual: message.uri.clone(),
            });
        }

        if self.chain_id != 0 && message.chain_id != self.chain_id {
            return Err(PolicyViolation::ChainMismatch {
                expected: self.chain_id,
                actual: message.chain_id,
            });
        }

        if message.nonce.is_empty() {
            return Err(PolicyViolation::MissingNonce);
        }

        self.check_time_window(message, now)
    }

    /// `now` must lie inside the message's validity window, widened by the skew
    pub fn check_time_window(
        &self,
        message: &SiweMessage,
        now: DateTime<Utc>,
    ) -> Result<(), PolicyViolation> {
        let skew = self.time_skew;

        if message.issued_at.at() > now + skew {
            return Err(PolicyViolation::TimeConstraintViolation(now));
        }

        if let Some(not_before) = &message.not_before {
            if now < not_before.at() - skew {
                return Err(PolicyViolation::TimeConstraintViolation(now));
            }
        }

        if let Some(expiration_time) = &message.expiration_time {
            if now > expiration_time.at() + skew {
                return Err(PolicyViolation::TimeConstraintViolation(now));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const FULL_MESSAGE: &str = "example.com wants you to sign in with your Ethereum account:
0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed

Sign in to the demo app.

URI: https://example.com
Version: 1
Chain ID: 1
Nonce: 32891756abcdefgh
Issued At: 2024-05-01T11:50:00Z
Expiration Time: 2024-05-01T13:00:00Z
Not Before: 2024-05-01T11:55:00Z
Request ID: req-42
Resources:
- ipfs://bafybeiemxf5abjwjbikoz4mc3a3dla6ual3jsgpdr4cjr3oz3evfyavhwq/
- https://example.com/my-web2-claim.json";

    const MINIMAL_MESSAGE: &str = "example.com wants you to sign in with your Ethereum account:
0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed


URI: https://example.com
Version: 1
Chain ID: 1
Nonce: 32891756abcdefgh
Issued At: 2024-05-01T12:00:00Z";

    fn constraints() -> SiweConstraints {
        SiweConstraints {
            domain: "example.com".to_string(),
            uri: "https://example.com".to_string(),
            chain_id: 1,
            time_skew: Duration::minutes(2),
        }
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_parse_full_message() {
        let message: SiweMessage = FULL_MESSAGE.parse().unwrap();

        assert_eq!(message.domain, "example.com");
        assert_eq!(
            checksum_address(&message.address),
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        );
        assert_eq!(message.statement.as_deref(), Some("Sign in to the demo app."));
        assert_eq!(message.uri, "https://example.com");
        assert_eq!(message.chain_id, 1);
        assert_eq!(message.nonce, "32891756abcdefgh");
        assert_eq!(message.issued_at.at(), at(11, 50, 0));
        assert_eq!(message.expiration_time.as_ref().map(|t| t.at()), Some(at(13, 0, 0)));
        assert_eq!(message.not_before.as_ref().map(|t| t.at()), Some(at(11, 55, 0)));
        assert_eq!(message.request_id.as_deref(), Some("req-42"));
        assert_eq!(message.resources.len(), 2);
    }

    #[test]
    fn test_display_reproduces_signed_text() {
        let full: SiweMessage = FULL_MESSAGE.parse().unwrap();
        assert_eq!(full.to_string(), FULL_MESSAGE);

        let minimal: SiweMessage = MINIMAL_MESSAGE.parse().unwrap();
        assert_eq!(minimal.statement, None);
        assert_eq!(minimal.to_string(), MINIMAL_MESSAGE);
    }

    #[test]
    fn test_parse_tolerates_single_blank_line_and_trailing_newline() {
        let text = MINIMAL_MESSAGE.replacen("\n\n\n", "\n\n", 1) + "\n";
        let message: SiweMessage = text.parse().unwrap();
        assert_eq!(message.statement, None);
        assert_eq!(message.nonce, "32891756abcdefgh");
    }

    #[test]
    fn test_parse_lowercase_address() {
        let text = MINIMAL_MESSAGE.replace(
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed",
        );
        let message: SiweMessage = text.parse().unwrap();
        let expected: SiweMessage = MINIMAL_MESSAGE.parse().unwrap();
        assert_eq!(message.address, expected.address);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "hello".parse::<SiweMessage>(),
            Err(MessageParseError::MissingPreamble)
        );

        let bad_address = MINIMAL_MESSAGE.replace(
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0x1234",
        );
        assert!(matches!(
            bad_address.parse::<SiweMessage>(),
            Err(MessageParseError::InvalidAddress(_))
        ));

        let bad_version = MINIMAL_MESSAGE.replace("Version: 1", "Version: 2");
        assert_eq!(
            bad_version.parse::<SiweMessage>(),
            Err(MessageParseError::UnsupportedVersion("2".to_string()))
        );

        let bad_chain = MINIMAL_MESSAGE.replace("Chain ID: 1", "Chain ID: one");
        assert!(matches!(
            bad_chain.parse::<SiweMessage>(),
            Err(MessageParseError::InvalidField { field: "Chain ID", .. })
        ));

        let missing_nonce = MINIMAL_MESSAGE.replace("Nonce: 32891756abcdefgh\n", "");
        assert_eq!(
            missing_nonce.parse::<SiweMessage>(),
            Err(MessageParseError::MissingField("Nonce"))
        );

        let short_nonce = MINIMAL_MESSAGE.replace("32891756abcdefgh", "abc123");
        assert!(matches!(
            short_nonce.parse::<SiweMessage>(),
            Err(MessageParseError::InvalidField { field: "Nonce", .. })
        ));

        let bad_time = MINIMAL_MESSAGE.replace("2024-05-01T12:00:00Z", "yesterday");
        assert!(matches!(
            bad_time.parse::<SiweMessage>(),
            Err(MessageParseError::InvalidField { field: "Issued At", .. })
        ));

        let trailing = format!("{MINIMAL_MESSAGE}\nSomething: else");
        assert!(matches!(
            trailing.parse::<SiweMessage>(),
            Err(MessageParseError::UnexpectedLine(_))
        ));
    }

    #[test]
    fn test_parse_statement_that_looks_like_uri_field() {
        let text = MINIMAL_MESSAGE.replacen("\n\n\nURI:", "\n\nURI: see below\n\nURI:", 1);
        let message: SiweMessage = text.parse().unwrap();

        assert_eq!(message.statement.as_deref(), Some("URI: see below"));
        assert_eq!(message.uri, "https://example.com");
        assert_eq!(message.to_string(), text);
    }

    #[test]
    fn test_parse_empty_nonce_is_left_to_policy() {
        let text = MINIMAL_MESSAGE.replace("Nonce: 32891756abcdefgh", "Nonce: ");
        let message: SiweMessage = text.parse().unwrap();
        assert_eq!(message.nonce, "");

        assert_eq!(
            constraints().validate(&message, at(12, 0, 0)),
            Err(PolicyViolation::MissingNonce)
        );
    }

    #[test]
    fn test_validate_accepts_matching_message() {
        let message: SiweMessage = FULL_MESSAGE.parse().unwrap();
        assert_eq!(constraints().validate(&message, at(12, 10, 0)), Ok(()));
    }

    #[test]
    fn test_validate_static_field_mismatches() {
        let message: SiweMessage = MINIMAL_MESSAGE.parse().unwrap();
        let now = at(12, 0, 0);

        let mut other_domain = constraints();
        other_domain.domain = "evil.com".to_string();
        assert!(matches!(
            other_domain.validate(&message, now),
            Err(PolicyViolation::DomainMismatch { .. })
        ));

        let mut other_uri = constraints();
        other_uri.uri = "https://example.com/login".to_string();
        assert!(matches!(
            other_uri.validate(&message, now),
            Err(PolicyViolation::UriMismatch { .. })
        ));

        let mut other_chain = constraints();
        other_chain.chain_id = 11155111;
        assert_eq!(
            other_chain.validate(&message, now),
            Err(PolicyViolation::ChainMismatch {
                expected: 11155111,
                actual: 1
            })
        );

        let mut any_chain = constraints();
        any_chain.chain_id = 0;
        assert_eq!(any_chain.validate(&message, now), Ok(()));
    }

    #[test]
    fn test_time_window_with_skew() {
        let message: SiweMessage = FULL_MESSAGE.parse().unwrap();
        let policy = constraints();

        // not-before 11:55 minus 2m skew
        assert!(policy.check_time_window(&message, at(11, 53, 0)).is_ok());
        assert!(policy.check_time_window(&message, at(11, 52, 59)).is_err());

        // expiration 13:00 plus 2m skew
        assert!(policy.check_time_window(&message, at(13, 2, 0)).is_ok());
        assert!(policy.check_time_window(&message, at(13, 2, 1)).is_err());
    }

    #[test]
    fn test_issued_in_the_future() {
        let message: SiweMessage = MINIMAL_MESSAGE.parse().unwrap();
        let policy = constraints();

        assert!(policy.check_time_window(&message, at(11, 58, 0)).is_ok());
        assert!(matches!(
            policy.check_time_window(&message, at(11, 57, 59)),
            Err(PolicyViolation::TimeConstraintViolation(_))
        ));
    }
}
