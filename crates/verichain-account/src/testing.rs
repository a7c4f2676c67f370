//! Deterministic keys and signatures for tests.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ed25519_dalek::pkcs8::EncodePublicKey as _;
use ed25519_dalek::Signer as _;
use k256::pkcs8::LineEnding;

/// First well-known development account key.
pub const TEST_PRIVATE_KEY: &str =
	"0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
/// Address controlled by [`TEST_PRIVATE_KEY`].
pub const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

/// A secp256k1 payload-signing identity.
pub struct EcdsaIdentity {
	key: k256::ecdsa::SigningKey,
}

impl EcdsaIdentity {
	/// Builds a key from a repeated seed byte. `seed` must be non-zero.
	pub fn from_seed(seed: u8) -> Self {
		let key = k256::ecdsa::SigningKey::from_bytes(&[seed; 32].into())
			.expect("repeated non-zero byte is a valid scalar");
		Self { key }
	}

	pub fn public_key_der(&self) -> Vec<u8> {
		self.key
			.verifying_key()
			.to_public_key_der()
			.expect("encode spki")
			.as_bytes()
			.to_vec()
	}

	pub fn public_key_base64(&self) -> String {
		STANDARD.encode(self.public_key_der())
	}

	pub fn public_key_pem(&self) -> String {
		self.key
			.verifying_key()
			.to_public_key_pem(LineEnding::LF)
			.expect("encode pem")
	}

	pub fn sign_der(&self, data: &[u8]) -> Vec<u8> {
		let signature: k256::ecdsa::Signature = self.key.sign(data);
		signature.to_der().as_bytes().to_vec()
	}

	pub fn sign_der_base64(&self, data: &str) -> String {
		STANDARD.encode(self.sign_der(data.as_bytes()))
	}

	/// Raw `r || s`, low-s form.
	pub fn sign_fixed(&self, data: &[u8]) -> Vec<u8> {
		let signature: k256::ecdsa::Signature = self.key.sign(data);
		signature.to_bytes().to_vec()
	}

	/// Raw `r || s` with `s` replaced by `n - s`.
	pub fn sign_fixed_high_s(&self, data: &[u8]) -> Vec<u8> {
		let signature: k256::ecdsa::Signature = self.key.sign(data);
		let (r, s) = signature.split_scalars();
		let high_s = -(*s);
		k256::ecdsa::Signature::from_scalars((*r).to_bytes(), high_s.to_bytes())
			.expect("negated scalar is non-zero")
			.to_bytes()
			.to_vec()
	}
}

/// An Ed25519 payload-signing identity.
pub struct Ed25519Identity {
	key: ed25519_dalek::SigningKey,
}

impl Ed25519Identity {
	pub fn from_seed(seed: u8) -> Self {
		Self {
			key: ed25519_dalek::SigningKey::from_bytes(&[seed; 32]),
		}
	}

	pub fn public_key_der(&self) -> Vec<u8> {
		self.key
			.verifying_key()
			.to_public_key_der()
			.expect("encode spki")
			.as_bytes()
			.to_vec()
	}

	pub fn public_key_base64(&self) -> String {
		STANDARD.encode(self.public_key_der())
	}

	pub fn sign(&self, data: &[u8]) -> Vec<u8> {
		self.key.sign(data).to_bytes().to_vec()
	}

	pub fn sign_base64(&self, data: &str) -> String {
		STANDARD.encode(self.sign(data.as_bytes()))
	}
}
