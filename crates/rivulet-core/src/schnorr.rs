use std::str::FromStr;

use bitcoin_hashes::{hex::FromHex, sha256};
use secp256k1::{
  schnorr, KeyPair, Message, PublicKey, Secp256k1, SecretKey, Signing, Verification,
  XOnlyPublicKey,
};

/// A secp256k1 keypair used for schnorr signatures.
#[derive(Debug)]
pub struct AsymmetricKeys {
  pub private_key: SecretKey,
  pub public_key: PublicKey,
}

impl Default for AsymmetricKeys {
  fn default() -> Self {
    let secp = Secp256k1::new();
    let private_key = SecretKey::new(&mut rand::thread_rng());
    Self {
      private_key,
      public_key: PublicKey::from_secret_key(&secp, &private_key),
    }
  }
}

impl AsymmetricKeys {
  /// The x-only form of the public key (the 33-byte compressed key
  /// without its parity byte), which is what events carry as `pubkey`.
  pub fn x_only_public_key(&self) -> String {
    self.public_key.to_string()[2..].to_string()
  }
}

/// [`Schnorr`] error
#[derive(thiserror::Error, Debug)]
pub enum SchnorrError {
  /// Error related to bitcoin_hashes::hex
  #[error(transparent)]
  SHA256(#[from] bitcoin_hashes::hex::Error),

  /// Error secp256k1
  #[error(transparent)]
  SECP256K1(#[from] secp256k1::Error),
}

///
/// Signs a schnorr signature over an already-hashed message.
///
/// ## Arguments
///
/// * `secp` - A Secp256k1 engine to execute the signature.
/// * `msg` - A SHA256 hash, hex-encoded (an event id).
/// * `seckey` - The private key to sign the message with.
///
pub fn sign_schnorr<C: Signing>(
  secp: &Secp256k1<C>,
  msg: String,
  seckey: Vec<u8>,
) -> Result<schnorr::Signature, SchnorrError> {
  let hash_from_hex = sha256::Hash::from_hex(&msg)?;
  let msg = Message::from_slice(hash_from_hex.as_ref())?;
  match SecretKey::from_slice(&seckey) {
    Ok(seckey) => {
      let keypair = KeyPair::from_secret_key(secp, &seckey);
      Ok(secp.sign_schnorr_no_aux_rand(&msg, &keypair))
    }
    Err(err) => {
      log::error!("[sign_schnorr > SecretKey::from_slice] {err}");
      Err(SchnorrError::SECP256K1(err))
    }
  }
}

///
/// Verifies a schnorr signature over an already-hashed message.
///
/// Returns `Ok(true)` when the signature verifies, an error otherwise.
///
/// ## Arguments
///
/// * `secp` - A Secp256k1 engine to execute the verification.
/// * `msg` - A SHA256 hash, hex-encoded (an event id).
/// * `sig` - The schnorr signature to verify.
/// * `pubkey` - The x-only public key to verify against.
///
pub fn verify_schnorr<C: Verification>(
  secp: &Secp256k1<C>,
  msg: String,
  sig: schnorr::Signature,
  pubkey: String,
) -> Result<bool, SchnorrError> {
  let hash_from_hex = sha256::Hash::from_hex(&msg)?;
  let msg = Message::from_slice(hash_from_hex.as_ref())?;
  let x_only_pubkey = XOnlyPublicKey::from_str(&pubkey)?;

  match secp.verify_schnorr(&sig, &msg, &x_only_pubkey) {
    Ok(_) => Ok(true),
    Err(err) => {
      log::error!("[verify_schnorr] {err}");
      Err(SchnorrError::SECP256K1(err))
    }
  }
}

///
/// Generates a random keypair usable for schnorr signatures.
///
pub fn generate_keys() -> AsymmetricKeys {
  let secp = Secp256k1::new();
  let mut rng = rand::thread_rng();

  let (seckey, pubkey) = secp.generate_keypair(&mut rng);

  AsymmetricKeys {
    public_key: pubkey,
    private_key: seckey,
  }
}

///
/// Rebuilds a keypair from a hex-encoded secret key
/// (the relay's own durable identity).
///
pub fn keys_from_hex(seckey_hex: &str) -> Result<AsymmetricKeys, SchnorrError> {
  let secp = Secp256k1::new();
  let private_key = SecretKey::from_str(seckey_hex)?;
  Ok(AsymmetricKeys {
    private_key,
    public_key: PublicKey::from_secret_key(&secp, &private_key),
  })
}

#[cfg(test)]
mod tests {
  use bitcoin_hashes::{hex::ToHex, Hash};
  use secp256k1::All;

  use super::*;

  struct Sut {
    seckey: [u8; 32],
    msg: String,
    secp: Secp256k1<All>,
  }

  fn make_sut() -> Sut {
    let seckey = [
      59, 148, 11, 85, 134, 130, 61, 253, 2, 174, 59, 70, 27, 180, 51, 107, 94, 203, 174, 253, 102,
      39, 170, 146, 46, 252, 4, 143, 236, 12, 136, 28,
    ];
    let hashed_msg = sha256::Hash::hash(b"This is some message");
    let msg = hashed_msg.to_hex();

    let secp = Secp256k1::new();

    Sut { seckey, msg, secp }
  }

  #[test]
  fn test_should_sign_schnorr_without_errors() {
    let sut: Sut = make_sut();
    assert!(sign_schnorr(&sut.secp, sut.msg, sut.seckey.to_vec()).is_ok());
  }

  #[test]
  fn test_should_return_an_error_when_trying_to_sign_schnorr_with_invalid_secret_key() {
    let sut: Sut = make_sut();
    let invalid_seckey = [0x00; 32];
    let result = sign_schnorr(&sut.secp, sut.msg, invalid_seckey.to_vec());
    assert!(result.is_err());
    let expected_err_message = String::from("malformed or out-of-range secret key");
    let err_message = result.err().unwrap().to_string();
    assert_eq!(expected_err_message, err_message);
  }

  #[test]
  fn test_should_verify_schnorr_without_errors() {
    let sut: Sut = make_sut();
    let signature_schnorr = sign_schnorr(&sut.secp, sut.msg.clone(), sut.seckey.to_vec()).unwrap();
    let seckey = SecretKey::from_slice(&sut.seckey).unwrap();
    let keypair = KeyPair::from_secret_key(&sut.secp, &seckey);
    let pubkey = XOnlyPublicKey::from_keypair(&keypair);
    assert!(verify_schnorr(&sut.secp, sut.msg, signature_schnorr, pubkey.0.to_string()).is_ok());
  }

  #[test]
  fn test_should_return_err_when_schnorr_signature_is_invalid_for_msg() {
    let sut: Sut = make_sut();
    let hashed_msg = sha256::Hash::hash(b"another message");
    let msg = hashed_msg.to_hex();
    let invalid_signature_schnorr = sign_schnorr(&sut.secp, msg, sut.seckey.to_vec()).unwrap();
    let seckey = SecretKey::from_slice(&sut.seckey).unwrap();
    let keypair = KeyPair::from_secret_key(&sut.secp, &seckey);
    let pubkey = XOnlyPublicKey::from_keypair(&keypair);
    let result = verify_schnorr(
      &sut.secp,
      sut.msg,
      invalid_signature_schnorr,
      pubkey.0.to_string(),
    );
    assert!(result.is_err());
  }

  #[test]
  fn keys_from_hex_round_trips() {
    let generated = generate_keys();
    let hex_seckey = hex::encode(generated.private_key.secret_bytes());

    let rebuilt = keys_from_hex(&hex_seckey).unwrap();

    assert_eq!(rebuilt.public_key, generated.public_key);
    assert_eq!(rebuilt.x_only_public_key(), generated.x_only_public_key());
  }

  #[test]
  fn keys_from_hex_rejects_garbage() {
    assert!(keys_from_hex("not-hex").is_err());
  }
}
