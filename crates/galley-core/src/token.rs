//! Join-token wire formats.
//!
//! Two formats cross the operator's clipboard and are never interchangeable:
//!
//! - **Auth tokens** are issued by the platform as `header.payload.signature`.
//!   Only the payload's `sub` claim is read here. The signature is *not*
//!   verified locally: the token is presented as a bearer credential and the
//!   platform verifies it.
//! - **Worker join tokens** are minted by a controller node as standard base64
//!   of `<cluster-id>.worker.<runtime-secret>`. Expiry lives in the runtime's
//!   own token store, not in these bytes.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;

use crate::error::TokenError;
use crate::types::{ClusterRole, JoinSecret, NodeIdentity};

/// Separator between worker token fields
pub const WORKER_TOKEN_DELIMITER: char = '.';

/// Role marker carried by worker join tokens
const WORKER_ROLE_MARKER: &str = "worker";

/// A platform-issued bearer token together with its decoded subject
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    raw: String,
    subject: String,
}

impl AuthToken {
    /// Decode the subject claim of a three-segment token
    pub fn parse(token: &str) -> Result<Self, TokenError> {
        let raw = token.trim();
        let subject = decode_auth_subject(raw)?;
        Ok(Self {
            raw: raw.to_string(),
            subject,
        })
    }

    /// The `sub` claim: the id of the cluster this token admits into
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The raw token, for use as a bearer credential
    #[must_use]
    pub fn bearer(&self) -> &str {
        &self.raw
    }

    /// Identity of a controller admitted by this token under `role`
    #[must_use]
    pub fn identity(&self, role: ClusterRole) -> NodeIdentity {
        NodeIdentity {
            cluster_id: self.subject.clone(),
            role,
            secret: JoinSecret::new(self.raw.clone()),
        }
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("subject", &self.subject)
            .field("raw", &"***")
            .finish()
    }
}

/// Extract the `sub` claim from a `header.payload.signature` token.
///
/// Fails with [`TokenError::MalformedToken`] unless there are exactly three
/// segments, the middle one is URL-safe base64 and decodes to a JSON object
/// with a string `sub` field.
pub fn decode_auth_subject(token: &str) -> Result<String, TokenError> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::malformed(format!(
            "expected 3 dot-separated segments, found {}",
            segments.len()
        )));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(segments[1].trim_end_matches('='))
        .map_err(|e| TokenError::malformed(format!("payload is not base64url: {e}")))?;

    let claims: serde_json::Value = serde_json::from_slice(&payload)
        .map_err(|e| TokenError::malformed(format!("payload is not JSON: {e}")))?;

    claims
        .as_object()
        .ok_or_else(|| TokenError::malformed("payload is not a JSON object"))?
        .get("sub")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| TokenError::malformed("payload has no subject claim"))
}

/// Mint a worker join token for `cluster_id` carrying the runtime's join secret.
///
/// Neither field may contain [`WORKER_TOKEN_DELIMITER`]; such input is
/// rejected rather than escaped.
pub fn encode_worker_token(cluster_id: &str, secret: &str) -> Result<String, TokenError> {
    if cluster_id.contains(WORKER_TOKEN_DELIMITER) {
        return Err(TokenError::DelimiterInField {
            field: "cluster id",
            delimiter: WORKER_TOKEN_DELIMITER,
        });
    }
    if secret.contains(WORKER_TOKEN_DELIMITER) {
        return Err(TokenError::DelimiterInField {
            field: "join secret",
            delimiter: WORKER_TOKEN_DELIMITER,
        });
    }

    let raw = format!("{cluster_id}{WORKER_TOKEN_DELIMITER}{WORKER_ROLE_MARKER}{WORKER_TOKEN_DELIMITER}{secret}");
    Ok(STANDARD.encode(raw))
}

/// Decode a worker join token into the identity it admits.
///
/// A role segment other than `worker` is always rejected with
/// [`TokenError::WrongTokenRole`].
pub fn decode_worker_token(token: &str) -> Result<NodeIdentity, TokenError> {
    let bytes = STANDARD
        .decode(token.trim())
        .map_err(|e| TokenError::malformed(format!("token is not base64: {e}")))?;
    let payload = String::from_utf8(bytes)
        .map_err(|_| TokenError::malformed("token payload is not UTF-8"))?;

    let parts: Vec<&str> = payload.split(WORKER_TOKEN_DELIMITER).collect();
    let [cluster_id, role, secret] = parts.as_slice() else {
        return Err(TokenError::malformed(format!(
            "expected 3 token fields, found {}",
            parts.len()
        )));
    };

    if *role != WORKER_ROLE_MARKER {
        return Err(TokenError::WrongTokenRole {
            found: (*role).to_string(),
        });
    }

    Ok(NodeIdentity {
        cluster_id: (*cluster_id).to_string(),
        role: ClusterRole::Worker,
        secret: JoinSecret::new(*secret),
    })
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn proptest_worker_token_round_trip(cluster_id in "[^.]*", secret in "[^.]*") {
            let token = encode_worker_token(&cluster_id, &secret).unwrap();
            let identity = decode_worker_token(&token).unwrap();
            prop_assert_eq!(identity.cluster_id, cluster_id);
            prop_assert_eq!(identity.secret.expose(), secret.as_str());
            prop_assert_eq!(identity.role, ClusterRole::Worker);
        }

        #[test]
        fn proptest_non_worker_role_is_rejected(
            cluster_id in "[^.]*",
            role in "[^.]*",
            secret in "[^.]*",
        ) {
            prop_assume!(role != WORKER_ROLE_MARKER);
            let token = STANDARD.encode(format!("{cluster_id}.{role}.{secret}"));
            prop_assert_eq!(
                decode_worker_token(&token).unwrap_err(),
                TokenError::WrongTokenRole { found: role }
            );
        }

        #[test]
        fn proptest_delimiter_is_never_encoded(
            head in "[^.]*",
            tail in "[^.]*",
            other in "[^.]*",
        ) {
            let dotted = format!("{head}.{tail}");
            let is_delimiter_error = |result: Result<String, TokenError>| {
                matches!(result, Err(TokenError::DelimiterInField { .. }))
            };
            prop_assert!(is_delimiter_error(encode_worker_token(&dotted, &other)));
            prop_assert!(is_delimiter_error(encode_worker_token(&other, &dotted)));
        }
    }
}
