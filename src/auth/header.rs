// src/auth/header.rs
//! Credential parser for `Authorization` header values.
//!
//! Recognizes two schemes by case-insensitive prefix:
//!
//! ```text
//! DIDWba did="did:wba:example.com:user:alice", nonce="...", timestamp="...", verification_method="key-1", signature="..."
//! Bearer eyJhbGciOiJSUzI1NiIs...
//! ```
//!
//! DIDWba field names are matched case-insensitively and may appear in any
//! order. Parsing is pure: no I/O, no clock.

use std::collections::HashMap;

use crate::error::AuthError;
use crate::models::credential::{AuthScheme, Credential, BEARER_SCHEME, DIDWBA_SCHEME};

/// Parses a raw `Authorization` header value into its scheme.
///
/// # Errors
/// - `UnsupportedScheme` if the prefix is neither `DIDWba` nor `Bearer`
/// - `MalformedCredential` if a required field is absent, empty, duplicated, or
///   the field list cannot be tokenized
pub fn parse_authorization(header: &str) -> Result<AuthScheme, AuthError> {
    let header = header.trim();
    let (scheme, rest) = match header.find(char::is_whitespace) {
        Some(idx) => (&header[..idx], header[idx..].trim()),
        None => (header, ""),
    };

    if scheme.eq_ignore_ascii_case(DIDWBA_SCHEME) {
        parse_didwba(rest).map(AuthScheme::DidWba)
    } else if scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        if rest.is_empty() {
            return Err(malformed("bearer token is empty"));
        }
        Ok(AuthScheme::Bearer(rest.to_string()))
    } else {
        Err(AuthError::UnsupportedScheme)
    }
}

/// Decomposes the field list that follows the `DIDWba` prefix.
pub fn parse_didwba(fields: &str) -> Result<Credential, AuthError> {
    let mut fields = parse_fields(fields)?;

    let did = take_required(&mut fields, "did")?;
    if !did.starts_with("did:") {
        return Err(malformed("did is not a DID"));
    }

    Ok(Credential {
        did,
        nonce: take_required(&mut fields, "nonce")?,
        timestamp: take_required(&mut fields, "timestamp")?,
        verification_method: fields
            .remove("verification_method")
            .filter(|method| !method.is_empty()),
        signature: take_required(&mut fields, "signature")?,
    })
}

fn take_required(fields: &mut HashMap<String, String>, name: &str) -> Result<String, AuthError> {
    match fields.remove(name) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(malformed(&format!("missing field {}", name))),
    }
}

/// Splits `key="value", key=value, ...` into a map keyed by lowercase name.
fn parse_fields(input: &str) -> Result<HashMap<String, String>, AuthError> {
    let mut fields = HashMap::new();
    let mut rest = input.trim();

    while !rest.is_empty() {
        let (key, after_key) = rest
            .split_once('=')
            .ok_or_else(|| malformed("expected key=value pair"))?;
        let key = key.trim().to_ascii_lowercase();
        if key.is_empty() || key.contains(|c: char| c.is_whitespace() || c == ',' || c == '"') {
            return Err(malformed("invalid field name"));
        }

        let after_key = after_key.trim_start();
        let (value, remainder) = match after_key.strip_prefix('"') {
            Some(quoted) => {
                let end = quoted
                    .find('"')
                    .ok_or_else(|| malformed("unterminated quoted value"))?;
                (&quoted[..end], &quoted[end + 1..])
            }
            None => match after_key.find(',') {
                Some(end) => (after_key[..end].trim(), &after_key[end..]),
                None => (after_key.trim(), ""),
            },
        };

        if fields.insert(key, value.to_string()).is_some() {
            return Err(malformed("duplicate field"));
        }

        rest = remainder.trim_start();
        if let Some(next) = rest.strip_prefix(',') {
            rest = next.trim_start();
        } else if !rest.is_empty() {
            return Err(malformed("expected ',' between fields"));
        }
    }

    Ok(fields)
}

fn malformed(detail: &str) -> AuthError {
    AuthError::MalformedCredential(detail.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = r#"DIDWba did="did:wba:example.com:user:alice", nonce="abc123", timestamp="2024-12-05T12:34:56Z", verification_method="key-1", signature="c2lnbmF0dXJl""#;

    #[test]
    fn test_parse_didwba_header() {
        let scheme = parse_authorization(HEADER).unwrap();
        let AuthScheme::DidWba(cred) = scheme else {
            panic!("expected DIDWba scheme");
        };
        assert_eq!(cred.did, "did:wba:example.com:user:alice");
        assert_eq!(cred.nonce, "abc123");
        assert_eq!(cred.timestamp, "2024-12-05T12:34:56Z");
        assert_eq!(cred.verification_method.as_deref(), Some("key-1"));
        assert_eq!(cred.signature, "c2lnbmF0dXJl");
    }

    #[test]
    fn test_scheme_prefix_is_case_insensitive() {
        let lower = HEADER.replacen("DIDWba", "didwba", 1);
        assert!(matches!(parse_authorization(&lower), Ok(AuthScheme::DidWba(_))));

        assert_eq!(
            parse_authorization("BEARER abc.def.ghi").unwrap(),
            AuthScheme::Bearer("abc.def.ghi".into())
        );
    }

    #[test]
    fn test_fields_in_any_order_and_case() {
        let header = r#"DIDWba SIGNATURE="sig", Timestamp="2024-12-05T12:34:56Z",nonce="n", DID="did:example:alice""#;
        let AuthScheme::DidWba(cred) = parse_authorization(header).unwrap() else {
            panic!("expected DIDWba scheme");
        };
        assert_eq!(cred.did, "did:example:alice");
        assert_eq!(cred.verification_method, None);
        assert_eq!(cred.signature, "sig");
    }

    #[test]
    fn test_round_trip_through_to_header() {
        let AuthScheme::DidWba(cred) = parse_authorization(HEADER).unwrap() else {
            panic!("expected DIDWba scheme");
        };
        assert_eq!(parse_authorization(&cred.to_header()).unwrap(), AuthScheme::DidWba(cred));
    }

    #[test]
    fn test_missing_required_field() {
        let header = r#"DIDWba did="did:example:alice", timestamp="2024-12-05T12:34:56Z", signature="sig""#;
        assert_eq!(
            parse_authorization(header),
            Err(AuthError::MalformedCredential("missing field nonce".into()))
        );

        let header = r#"DIDWba did="did:example:alice", nonce="", timestamp="t", signature="sig""#;
        assert!(matches!(
            parse_authorization(header),
            Err(AuthError::MalformedCredential(_))
        ));
    }

    #[test]
    fn test_rejects_garbage_field_lists() {
        for header in [
            "DIDWba",
            r#"DIDWba did="did:example:alice"#,
            r#"DIDWba did="did:example:alice" nonce="n""#,
            r#"DIDWba did="did:example:alice", did="did:example:bob", nonce="n", timestamp="t", signature="s""#,
            r#"DIDWba did="alice", nonce="n", timestamp="t", signature="s""#,
        ] {
            assert!(
                matches!(parse_authorization(header), Err(AuthError::MalformedCredential(_))),
                "{header}"
            );
        }
    }

    #[test]
    fn test_unsupported_scheme() {
        assert_eq!(
            parse_authorization("Basic dXNlcjpwYXNz"),
            Err(AuthError::UnsupportedScheme)
        );
        assert_eq!(parse_authorization(""), Err(AuthError::UnsupportedScheme));
        // The prefix must match a whole scheme token
        assert_eq!(
            parse_authorization("Bearerabc"),
            Err(AuthError::UnsupportedScheme)
        );
    }

    #[test]
    fn test_empty_bearer_token() {
        assert!(matches!(
            parse_authorization("Bearer   "),
            Err(AuthError::MalformedCredential(_))
        ));
    }
}
