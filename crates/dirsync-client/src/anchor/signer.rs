//! # Local Transaction Signing
//!
//! Signs legacy (EIP-155) transactions with a secp256k1 key held by this
//! process, for RPC providers that do not manage accounts. The signed bytes
//! go out through `eth_sendRawTransaction`.
//!
//! The key is kept as zeroizing bytes and only turned into a signing key for
//! the duration of one signature.

use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rlp::RlpStream;
use sha3::{Digest, Keccak256};
use zeroize::Zeroizing;

use crate::error::AnchorError;

/// A secp256k1 private key and the address it controls.
#[derive(Clone)]
pub struct LocalSigner {
    key: Zeroizing<[u8; 32]>,
    address: String,
}

impl LocalSigner {
    /// Parse a hex private key, with or without `0x`.
    pub fn from_hex(private_key: &str) -> Result<Self, AnchorError> {
        let raw = Zeroizing::new(
            hex::decode(private_key.trim().trim_start_matches("0x"))
                .map_err(|_| AnchorError::InvalidConfig("private key is not hex".into()))?,
        );
        let key: [u8; 32] = raw.as_slice().try_into().map_err(|_| {
            AnchorError::InvalidConfig(format!("private key must be 32 bytes, got {}", raw.len()))
        })?;
        let key = Zeroizing::new(key);

        let signing_key = SigningKey::from_slice(key.as_slice())
            .map_err(|_| AnchorError::InvalidConfig("private key is not a valid secp256k1 scalar".into()))?;
        let address = address_of(&signing_key);

        Ok(Self { key, address })
    }

    /// Lowercase `0x` address derived from the public key.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Sign `tx` and return the raw transaction bytes.
    pub fn sign(&self, tx: &LegacyTransaction) -> Result<Vec<u8>, AnchorError> {
        let signing_key = SigningKey::from_slice(self.key.as_slice())
            .map_err(|_| AnchorError::InvalidConfig("private key is not a valid secp256k1 scalar".into()))?;
        let (signature, recovery_id) = signing_key
            .sign_prehash_recoverable(&tx.signing_hash())
            .map_err(|e| AnchorError::InvalidConfig(format!("signing failed: {e}")))?;

        let v = u64::from(recovery_id.to_byte()) + tx.chain_id * 2 + 35;
        let rs = signature.to_bytes();
        let (r, s) = rs.split_at(32);

        let mut stream = RlpStream::new_list(9);
        tx.append_fields(&mut stream);
        stream.append(&int_bytes(&v.to_be_bytes()));
        stream.append(&int_bytes(r));
        stream.append(&int_bytes(s));
        Ok(stream.out().to_vec())
    }
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// A pre-EIP-1559 transaction with EIP-155 replay protection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: [u8; 20],
    pub value: u128,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

impl LegacyTransaction {
    fn append_fields(&self, stream: &mut RlpStream) {
        stream.append(&int_bytes(&self.nonce.to_be_bytes()));
        stream.append(&int_bytes(&self.gas_price.to_be_bytes()));
        stream.append(&int_bytes(&self.gas_limit.to_be_bytes()));
        stream.append(&self.to.to_vec());
        stream.append(&int_bytes(&self.value.to_be_bytes()));
        stream.append(&self.data);
    }

    /// `rlp([nonce, gasPrice, gas, to, value, data, chainId, 0, 0])`.
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(9);
        self.append_fields(&mut stream);
        stream.append(&int_bytes(&self.chain_id.to_be_bytes()));
        stream.append(&Vec::<u8>::new());
        stream.append(&Vec::<u8>::new());
        stream.out().to_vec()
    }

    pub fn signing_hash(&self) -> [u8; 32] {
        keccak256(&self.signing_payload())
    }
}

/// Parse a `0x` + 40 hex address into bytes.
pub fn parse_address(address: &str) -> Result<[u8; 20], AnchorError> {
    let bytes = hex::decode(address.trim_start_matches("0x"))
        .map_err(|_| AnchorError::InvalidConfig(format!("invalid address: {address}")))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| AnchorError::InvalidConfig(format!("invalid address: {address}")))
}

pub fn keccak256(bytes: &[u8]) -> [u8; 32] {
    Keccak256::digest(bytes).into()
}

fn address_of(key: &SigningKey) -> String {
    let point = key.verifying_key().to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}

/// Big-endian integer bytes with leading zeros stripped; zero is empty.
fn int_bytes(be: &[u8]) -> Vec<u8> {
    let start = be.iter().position(|b| *b != 0).unwrap_or(be.len());
    be[start..].to_vec()
}
