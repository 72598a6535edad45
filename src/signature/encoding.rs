use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::PublicKey;
use serde::{Deserialize, Serialize};

use crate::core::{
    errors::{ProvenanceError, ProvenanceResult},
    types::{
        CURVE_SCALAR_SIZE, RAW_SIGNATURE_SIZE, SEC1_COMPRESSED_SIZE, SEC1_UNCOMPRESSED_SIZE,
        WRAPPED_KEY_DIGEST_SIZE,
    },
};

/// Supported detached-signature encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureEncoding {
    /// ASN.1 DER SEQUENCE of two INTEGERs
    Der,
    /// Fixed-width big-endian r || s, 64 bytes
    RawFixed,
}

/// Supported public key encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyEncoding {
    /// SEC1 uncompressed point, 65 bytes starting 0x04
    Sec1Uncompressed,
    /// SEC1 compressed point, 33 bytes starting 0x02 or 0x03
    Sec1Compressed,
    /// 32-byte key fingerprint from a hardware key wrapper. Parses, but the
    /// curve point cannot be recovered, so cryptographic checks cannot run.
    WrappedDigest,
}

/// Signature normalized to fixed-width big-endian scalars
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedSignature {
    pub r: [u8; CURVE_SCALAR_SIZE],
    pub s: [u8; CURVE_SCALAR_SIZE],
}

impl NormalizedSignature {
    /// Concatenated r || s
    pub fn to_bytes(self) -> [u8; RAW_SIGNATURE_SIZE] {
        let mut out = [0u8; RAW_SIGNATURE_SIZE];
        out[..CURVE_SCALAR_SIZE].copy_from_slice(&self.r);
        out[CURVE_SCALAR_SIZE..].copy_from_slice(&self.s);
        out
    }
}

/// Public key after normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedKey {
    /// Validated curve point, SEC1 uncompressed bytes
    Point([u8; SEC1_UNCOMPRESSED_SIZE]),
    /// Fingerprint of a wrapped key; not verifiable
    WrappedDigest([u8; WRAPPED_KEY_DIGEST_SIZE]),
}

/// Parse a signature in the declared encoding into fixed-width scalars
pub fn normalize_signature(
    bytes: &[u8],
    encoding: SignatureEncoding,
) -> ProvenanceResult<NormalizedSignature> {
    match encoding {
        SignatureEncoding::Der => parse_der_signature(bytes),
        SignatureEncoding::RawFixed => {
            if bytes.len() != RAW_SIGNATURE_SIZE {
                return Err(ProvenanceError::MalformedEncoding(format!(
                    "raw signature is {} bytes, expected {}",
                    bytes.len(),
                    RAW_SIGNATURE_SIZE
                )));
            }
            let mut r = [0u8; CURVE_SCALAR_SIZE];
            let mut s = [0u8; CURVE_SCALAR_SIZE];
            r.copy_from_slice(&bytes[..CURVE_SCALAR_SIZE]);
            s.copy_from_slice(&bytes[CURVE_SCALAR_SIZE..]);
            Ok(NormalizedSignature { r, s })
        }
    }
}

/// Parse a public key in the declared encoding, validating curve membership
pub fn normalize_public_key(
    bytes: &[u8],
    encoding: KeyEncoding,
) -> ProvenanceResult<NormalizedKey> {
    match encoding {
        KeyEncoding::Sec1Uncompressed => {
            if bytes.len() != SEC1_UNCOMPRESSED_SIZE || bytes[0] != 0x04 {
                return Err(ProvenanceError::MalformedEncoding(format!(
                    "uncompressed point must be {} bytes starting 0x04, got {} bytes",
                    SEC1_UNCOMPRESSED_SIZE,
                    bytes.len()
                )));
            }
            decode_sec1_point(bytes)
        }
        KeyEncoding::Sec1Compressed => {
            if bytes.len() != SEC1_COMPRESSED_SIZE || (bytes[0] != 0x02 && bytes[0] != 0x03) {
                return Err(ProvenanceError::MalformedEncoding(format!(
                    "compressed point must be {} bytes starting 0x02/0x03, got {} bytes",
                    SEC1_COMPRESSED_SIZE,
                    bytes.len()
                )));
            }
            decode_sec1_point(bytes)
        }
        KeyEncoding::WrappedDigest => {
            if bytes.len() != WRAPPED_KEY_DIGEST_SIZE {
                return Err(ProvenanceError::MalformedEncoding(format!(
                    "wrapped key digest is {} bytes, expected {}",
                    bytes.len(),
                    WRAPPED_KEY_DIGEST_SIZE
                )));
            }
            let mut digest = [0u8; WRAPPED_KEY_DIGEST_SIZE];
            digest.copy_from_slice(bytes);
            Ok(NormalizedKey::WrappedDigest(digest))
        }
    }
}

fn decode_sec1_point(bytes: &[u8]) -> ProvenanceResult<NormalizedKey> {
    let key = PublicKey::from_sec1_bytes(bytes)
        .map_err(|_| ProvenanceError::MalformedEncoding("point not on the P-256 curve".into()))?;
    let encoded = key.to_encoded_point(false);
    let mut point = [0u8; SEC1_UNCOMPRESSED_SIZE];
    point.copy_from_slice(encoded.as_bytes());
    Ok(NormalizedKey::Point(point))
}

/// Minimal DER parser for ECDSA signatures: SEQUENCE of exactly two INTEGERs.
/// Leading zero bytes are stripped and scalars left-padded to 32 bytes.
fn parse_der_signature(bytes: &[u8]) -> ProvenanceResult<NormalizedSignature> {
    let malformed = |msg: &str| ProvenanceError::MalformedEncoding(format!("DER: {}", msg));

    if bytes.len() < 8 {
        return Err(malformed("too short"));
    }
    if bytes[0] != 0x30 {
        return Err(malformed("missing SEQUENCE tag"));
    }
    // P-256 signatures always fit the short length form (max ~70 content bytes)
    let seq_len = bytes[1] as usize;
    if bytes[1] & 0x80 != 0 || seq_len != bytes.len() - 2 {
        return Err(malformed("bad SEQUENCE length"));
    }

    let body = &bytes[2..];
    let (r, rest) = parse_der_integer(body)?;
    let (s, rest) = parse_der_integer(rest)?;
    if !rest.is_empty() {
        return Err(malformed("trailing bytes after second INTEGER"));
    }
    Ok(NormalizedSignature { r, s })
}

fn parse_der_integer(bytes: &[u8]) -> ProvenanceResult<([u8; CURVE_SCALAR_SIZE], &[u8])> {
    let malformed = |msg: &str| ProvenanceError::MalformedEncoding(format!("DER: {}", msg));

    if bytes.len() < 2 || bytes[0] != 0x02 {
        return Err(malformed("missing INTEGER tag"));
    }
    let len = bytes[1] as usize;
    if bytes[1] & 0x80 != 0 || len == 0 || bytes.len() < 2 + len {
        return Err(malformed("bad INTEGER length"));
    }
    let content = &bytes[2..2 + len];

    // Strip leading zeros added for the sign bit
    let mut start = 0;
    while start < content.len() - 1 && content[start] == 0 {
        start += 1;
    }
    let scalar = &content[start..];
    if scalar.len() > CURVE_SCALAR_SIZE {
        return Err(malformed("INTEGER wider than the curve order"));
    }
    // Negative scalars never appear in valid signatures
    if content[0] & 0x80 != 0 {
        return Err(malformed("negative INTEGER"));
    }

    let mut out = [0u8; CURVE_SCALAR_SIZE];
    out[CURVE_SCALAR_SIZE - scalar.len()..].copy_from_slice(scalar);
    Ok((out, &bytes[2 + len..]))
}
