//! Detached signature verification over caller payloads.
//!
//! Public keys arrive as base64 DER SubjectPublicKeyInfo (or PEM) and the
//! scheme is taken from the key's algorithm identifier:
//!
//! - ECDSA over secp256k1 or P-256 with SHA-256, signatures in ASN.1 DER or raw `r || s`
//! - RSA PKCS#1 v1.5 with SHA-256
//! - Ed25519, 64-byte signatures over the raw payload
//!
//! A signature that does not match is a normal `Ok(false)`; errors are
//! reserved for inputs that are not structurally a key or a signature.

use crate::CryptoError;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use ed25519_dalek::pkcs8::DecodePublicKey as _;
use k256::ecdsa::signature::Verifier as _;

const LENIENT: GeneralPurposeConfig =
	GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

const PEM_HEADER: &str = "-----BEGIN PUBLIC KEY-----";

/// Signature schemes accepted for caller payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
	EcdsaSecp256k1Sha256,
	EcdsaP256Sha256,
	RsaPkcs1v15Sha256,
	Ed25519,
}

/// A parsed public key of a supported scheme.
#[derive(Debug, Clone)]
pub enum PublicKey {
	Secp256k1(k256::ecdsa::VerifyingKey),
	P256(p256::ecdsa::VerifyingKey),
	Rsa(rsa::pkcs1v15::VerifyingKey<sha2::Sha256>),
	Ed25519(ed25519_dalek::VerifyingKey),
}

impl PublicKey {
	/// Parses a DER-encoded SubjectPublicKeyInfo.
	pub fn from_spki_der(der: &[u8]) -> Result<Self, CryptoError> {
		if let Ok(key) = k256::ecdsa::VerifyingKey::from_public_key_der(der) {
			return Ok(PublicKey::Secp256k1(key));
		}
		if let Ok(key) = p256::ecdsa::VerifyingKey::from_public_key_der(der) {
			return Ok(PublicKey::P256(key));
		}
		if let Ok(key) = rsa::pkcs1v15::VerifyingKey::<sha2::Sha256>::from_public_key_der(der) {
			return Ok(PublicKey::Rsa(key));
		}
		if let Ok(key) = ed25519_dalek::VerifyingKey::from_public_key_der(der) {
			return Ok(PublicKey::Ed25519(key));
		}
		Err(CryptoError::MalformedKey(
			"expected a DER SubjectPublicKeyInfo for secp256k1, P-256, RSA or Ed25519".to_string(),
		))
	}

	/// Parses a PEM `PUBLIC KEY` block.
	pub fn from_spki_pem(pem: &str) -> Result<Self, CryptoError> {
		if let Ok(key) = k256::ecdsa::VerifyingKey::from_public_key_pem(pem) {
			return Ok(PublicKey::Secp256k1(key));
		}
		if let Ok(key) = p256::ecdsa::VerifyingKey::from_public_key_pem(pem) {
			return Ok(PublicKey::P256(key));
		}
		if let Ok(key) = rsa::pkcs1v15::VerifyingKey::<sha2::Sha256>::from_public_key_pem(pem) {
			return Ok(PublicKey::Rsa(key));
		}
		if let Ok(key) = ed25519_dalek::VerifyingKey::from_public_key_pem(pem) {
			return Ok(PublicKey::Ed25519(key));
		}
		Err(CryptoError::MalformedKey(
			"expected a PEM public key for secp256k1, P-256, RSA or Ed25519".to_string(),
		))
	}

	/// Parses the textual form callers submit: base64 DER, or PEM.
	pub fn from_text(text: &str) -> Result<Self, CryptoError> {
		let text = text.trim();
		if text.starts_with(PEM_HEADER) {
			return Self::from_spki_pem(text);
		}
		let der = decode_base64(text)
			.map_err(|e| CryptoError::MalformedKey(format!("invalid base64: {}", e)))?;
		Self::from_spki_der(&der)
	}

	pub fn scheme(&self) -> SignatureScheme {
		match self {
			PublicKey::Secp256k1(_) => SignatureScheme::EcdsaSecp256k1Sha256,
			PublicKey::P256(_) => SignatureScheme::EcdsaP256Sha256,
			PublicKey::Rsa(_) => SignatureScheme::RsaPkcs1v15Sha256,
			PublicKey::Ed25519(_) => SignatureScheme::Ed25519,
		}
	}

	/// Checks `signature` over `data`.
	pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool, CryptoError> {
		match self {
			PublicKey::Secp256k1(key) => {
				let signature = k256::ecdsa::Signature::from_der(signature)
					.or_else(|_| k256::ecdsa::Signature::from_slice(signature))
					.map_err(|_| {
						CryptoError::MalformedSignature(format!(
							"not a DER or 64-byte ECDSA signature ({} bytes)",
							signature.len()
						))
					})?;
				// OpenSSL does not normalize s; accept both halves of the curve order.
				let signature = signature.normalize_s().unwrap_or(signature);
				Ok(key.verify(data, &signature).is_ok())
			},
			PublicKey::P256(key) => {
				let signature = p256::ecdsa::Signature::from_der(signature)
					.or_else(|_| p256::ecdsa::Signature::from_slice(signature))
					.map_err(|_| {
						CryptoError::MalformedSignature(format!(
							"not a DER or 64-byte ECDSA signature ({} bytes)",
							signature.len()
						))
					})?;
				let signature = signature.normalize_s().unwrap_or(signature);
				Ok(key.verify(data, &signature).is_ok())
			},
			PublicKey::Rsa(key) => {
				let signature = rsa::pkcs1v15::Signature::try_from(signature).map_err(|e| {
					CryptoError::MalformedSignature(format!("not an RSA signature: {}", e))
				})?;
				Ok(key.verify(data, &signature).is_ok())
			},
			PublicKey::Ed25519(key) => {
				let bytes: [u8; ed25519_dalek::SIGNATURE_LENGTH] =
					signature.try_into().map_err(|_| {
						CryptoError::MalformedSignature(format!(
							"Ed25519 signatures are {} bytes, got {}",
							ed25519_dalek::SIGNATURE_LENGTH,
							signature.len()
						))
					})?;
				let signature = ed25519_dalek::Signature::from_bytes(&bytes);
				Ok(key.verify_strict(data, &signature).is_ok())
			},
		}
	}
}

/// Stateless verifier for detached payload signatures.
pub struct SignatureVerifier;

impl SignatureVerifier {
	/// Verifies raw bytes: DER public key, signature bytes.
	pub fn verify(data: &[u8], public_key_der: &[u8], signature: &[u8]) -> Result<bool, CryptoError> {
		PublicKey::from_spki_der(public_key_der)?.verify(data, signature)
	}

	/// Verifies the textual request form: UTF-8 data, base64/PEM key, base64 signature.
	pub fn verify_encoded(data: &str, public_key: &str, signature: &str) -> Result<bool, CryptoError> {
		let key = PublicKey::from_text(public_key)?;
		let signature = decode_base64(signature.trim())
			.map_err(|e| CryptoError::MalformedSignature(format!("invalid base64: {}", e)))?;
		let verified = key.verify(data.as_bytes(), &signature)?;
		tracing::debug!(scheme = ?key.scheme(), verified, "Checked payload signature");
		Ok(verified)
	}
}

/// Decodes standard or URL-safe base64, with or without padding, ignoring
/// embedded whitespace.
pub fn decode_base64(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
	let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
	STANDARD_LENIENT
		.decode(&compact)
		.or_else(|_| URL_SAFE_LENIENT.decode(&compact))
}
