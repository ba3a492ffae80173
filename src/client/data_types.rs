//! Data types shared by the gateway client, submission and polling layers.
//!
//! Identifiers are Arweave transaction ids: base64url strings assigned by the
//! network. Result records are the JSON payloads written by the fact-checking
//! agent.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tag names and values used on claim and result transactions.
pub mod tags {
    /// Application name tag.
    pub const APP_NAME: &str = "App-Name";
    /// Payload content type tag.
    pub const CONTENT_TYPE: &str = "Content-Type";
    /// Type discriminator tag.
    pub const TYPE: &str = "Type";
    /// Tag on result transactions naming the originating request.
    pub const RELATED_REQUEST: &str = "Related-Request";

    /// `Type` value on claim transactions.
    pub const REQUEST_TYPE: &str = "FactCheckRequest";
    /// `Type` value on result transactions.
    pub const RESULT_TYPE: &str = "FactCheckResult";
}

fn validate_tx_id(raw: &str) -> Result<()> {
    let valid = !raw.is_empty()
        && raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidId(raw.to_string()))
    }
}

macro_rules! tx_id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse an identifier.
            ///
            /// # Errors
            ///
            /// Returns [`Error::InvalidId`] if the id is empty or contains
            /// characters outside the base64url alphabet.
            pub fn new(raw: impl Into<String>) -> Result<Self> {
                let raw = raw.into();
                validate_tx_id(&raw)?;
                Ok(Self(raw))
            }

            /// The id as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = Error;

            fn try_from(value: String) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

tx_id_type!(
    /// Network id of the transaction carrying a submitted claim.
    RequestId
);

tx_id_type!(
    /// Network id of the transaction carrying the agent's verdict.
    ResultTxId
);

/// Outcome of a fact check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// The claim holds.
    True,
    /// The claim does not hold.
    False,
    /// The claim is partly true or lacks context.
    Misleading,
}

impl Verdict {
    /// Upper-case label for display.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::True => "TRUE",
            Self::False => "FALSE",
            Self::Misleading => "MISLEADING",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::True => "true",
            Self::False => "false",
            Self::Misleading => "misleading",
        })
    }
}

/// A source cited by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceSource {
    /// Source title.
    pub title: String,
    /// Link to the source, usually an Arweave URL.
    pub url: String,
    /// Whether the agent could verify the source.
    #[serde(default)]
    pub verified: bool,
}

/// The agent's verdict for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// The verdict.
    pub verdict: Verdict,
    /// Confidence percentage, 0 to 100.
    pub confidence: u8,
    /// Free-form analysis text.
    pub analysis: String,
    /// Cited sources, in the order the agent listed them.
    #[serde(default)]
    pub sources: Vec<EvidenceSource>,
}

impl ResultRecord {
    /// Maximum confidence value.
    pub const MAX_CONFIDENCE: u8 = 100;

    /// Check invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResult`] if the confidence exceeds 100.
    pub fn validate(&self) -> Result<()> {
        if self.confidence > Self::MAX_CONFIDENCE {
            return Err(Error::MalformedResult(format!(
                "confidence {} is above {}",
                self.confidence,
                Self::MAX_CONFIDENCE
            )));
        }
        Ok(())
    }

    /// Number of sources the agent marked as verified.
    #[must_use]
    pub fn verified_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.verified).count()
    }
}

/// A key/value tag on a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag name.
    pub name: String,
    /// Tag value.
    pub value: String,
}

impl Tag {
    /// Create a tag.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A claim to be written to the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSubmission {
    content: String,
    content_type: String,
}

impl ClaimSubmission {
    /// Content type used for plain-text claims.
    pub const TEXT_PLAIN: &'static str = "text/plain";

    /// Create a plain-text claim.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidClaim`] if the content is blank.
    pub fn text(content: impl Into<String>) -> Result<Self> {
        Self::new(content, Self::TEXT_PLAIN)
    }

    /// Create a claim with an explicit content type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidClaim`] if the content or content type is blank.
    pub fn new(content: impl Into<String>, content_type: impl Into<String>) -> Result<Self> {
        let content = content.into();
        let content_type = content_type.into();
        if content.trim().is_empty() {
            return Err(Error::InvalidClaim("claim content is empty".into()));
        }
        if content_type.trim().is_empty() {
            return Err(Error::InvalidClaim("content type is empty".into()));
        }
        Ok(Self {
            content,
            content_type,
        })
    }

    /// Claim text.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Claim content type.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Tags written on the claim transaction.
    #[must_use]
    pub fn tags(&self, app_name: &str) -> Vec<Tag> {
        vec![
            Tag::new(tags::APP_NAME, app_name),
            Tag::new(tags::CONTENT_TYPE, &self.content_type),
            Tag::new(tags::TYPE, tags::REQUEST_TYPE),
        ]
    }
}
