use data_encoding::{BASE64, HEXUPPER};
use hmac::{Hmac, Mac};
use qrcode::{render::svg, QrCode};
use rocket::{http::Status, serde::json::serde_json};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    error::{Error, Result},
    model::{
        common::id::Id,
        db::election::{Candidate, Vote},
    },
};

type HmacSha256 = Hmac<Sha256>;

/// Number of hex characters in a verification code.
const CODE_LENGTH: usize = 16;

/// Derive the verification code for a stored vote.
///
/// Plain SHA-256 of `{voteId}-{userId}-{candidateId}` unless a secret is
/// configured, in which case it is an HMAC keyed with that secret.
pub fn verification_code(vote: &Vote, secret: Option<&[u8]>) -> String {
    let message = format!("{}-{}-{}", vote.id, vote.user_id, vote.candidate_id);
    let digest = match secret {
        Some(key) => {
            let mut hmac =
                HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
            hmac.update(message.as_bytes());
            hmac.finalize().into_bytes().to_vec()
        }
        None => Sha256::digest(message.as_bytes()).to_vec(),
    };
    let mut code = HEXUPPER.encode(&digest);
    code.truncate(CODE_LENGTH);
    code
}

/// The fields encoded into a receipt's QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptData {
    pub vote_id: Id,
    pub candidate_id: Id,
    pub candidate_name: String,
    /// Unix milliseconds.
    pub timestamp: i64,
    pub verification_code: String,
}

/// Voter-facing proof that a ballot was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    #[serde(flatten)]
    pub data: ReceiptData,
    /// SVG data URL of a QR code holding `data` as JSON.
    pub qr_code: String,
}

impl Receipt {
    pub fn issue(vote: &Vote, candidate: &Candidate, secret: Option<&[u8]>) -> Result<Self> {
        let data = ReceiptData {
            vote_id: vote.id.clone(),
            candidate_id: vote.candidate_id.clone(),
            candidate_name: candidate.name.clone(),
            timestamp: vote.created_at,
            verification_code: verification_code(vote, secret),
        };
        let qr_code = qr_data_url(&serde_json::to_vec(&data)?)?;
        Ok(Self { data, qr_code })
    }
}

/// Render `payload` as a QR code in an SVG data URL.
fn qr_data_url(payload: &[u8]) -> Result<String> {
    let code = QrCode::new(payload).map_err(|e| {
        Error::Status(
            Status::InternalServerError,
            format!("Failed to render receipt QR code: {e}"),
        )
    })?;
    let image = code
        .render::<svg::Color>()
        .min_dimensions(240, 240)
        .build();
    Ok(format!(
        "data:image/svg+xml;base64,{}",
        BASE64.encode(image.as_bytes())
    ))
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[serde(default)]
    pub verification_code: Option<String>,
    #[serde(default)]
    pub vote_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedVote {
    pub candidate_name: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote: Option<VerifiedVote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl VerifyResponse {
    pub fn valid(vote: VerifiedVote) -> Self {
        Self {
            valid: true,
            vote: Some(vote),
            message: None,
        }
    }

    pub fn invalid(message: &str) -> Self {
        Self {
            valid: false,
            vote: None,
            message: Some(message.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote() -> Vote {
        Vote {
            id: Id::from("vote-1"),
            user_id: Id::from("user-1"),
            candidate_id: Id::from("cand-1"),
            created_at: 1_700_000_000_000,
        }
    }

    #[test]
    fn code_is_truncated_uppercase_sha256() {
        let vote = vote();
        let expected = HEXUPPER.encode(&Sha256::digest(b"vote-1-user-1-cand-1"));
        let code = verification_code(&vote, None);
        assert_eq!(code.len(), CODE_LENGTH);
        assert_eq!(code, expected[..CODE_LENGTH]);
        assert!(code.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn secret_changes_code() {
        let vote = vote();
        let plain = verification_code(&vote, None);
        let keyed = verification_code(&vote, Some(b"campus"));
        assert_ne!(plain, keyed);
        assert_eq!(keyed, verification_code(&vote, Some(b"campus")));
        assert_eq!(keyed.len(), CODE_LENGTH);
    }

    #[test]
    fn receipt_embeds_payload() {
        let vote = vote();
        let candidate = Candidate::example("Ada", None);
        let receipt = Receipt::issue(&vote, &candidate, None).unwrap();
        assert_eq!(receipt.data.vote_id, vote.id);
        assert_eq!(receipt.data.candidate_name, "Ada");
        assert_eq!(receipt.data.timestamp, vote.created_at);
        assert_eq!(receipt.data.verification_code, verification_code(&vote, None));

        let encoded = receipt
            .qr_code
            .strip_prefix("data:image/svg+xml;base64,")
            .unwrap();
        let svg = String::from_utf8(BASE64.decode(encoded.as_bytes()).unwrap()).unwrap();
        assert!(svg.contains("<svg"));

        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["voteId"], "vote-1");
        assert!(json["qrCode"].is_string());
        assert!(json["verificationCode"].is_string());
    }
}
