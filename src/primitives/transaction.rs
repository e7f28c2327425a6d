//! Signed transactions and ECDSA sender recovery.

use alloy_primitives::{keccak256, Address, Bytes, TxKind, B256, U256};
use alloy_rlp::{Encodable, Header as RlpHeader};
use k256::{
    ecdsa::{RecoveryId, VerifyingKey},
    elliptic_curve::sec1::ToEncodedPoint,
    PublicKey,
};

/// An unsigned value-bearing transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    /// Sender account nonce.
    pub nonce: u64,
    /// Price per unit of gas, in wei.
    pub gas_price: u128,
    /// Gas budget of the transaction.
    pub gas_limit: u64,
    /// Call target, or create.
    pub to: TxKind,
    /// Value transferred, in wei.
    pub value: U256,
    /// Call data.
    pub input: Bytes,
}

impl Transaction {
    fn fields_len(&self) -> usize {
        self.nonce.length() +
            self.gas_price.length() +
            self.gas_limit.length() +
            self.to.length() +
            self.value.length() +
            self.input.length()
    }

    fn encode_fields(&self, out: &mut dyn alloy_rlp::BufMut) {
        self.nonce.encode(out);
        self.gas_price.encode(out);
        self.gas_limit.encode(out);
        self.to.encode(out);
        self.value.encode(out);
        self.input.encode(out);
    }

    /// Hash that the sender signs over: the RLP list of the six
    /// transaction fields.
    pub fn signature_hash(&self) -> B256 {
        let mut buf = Vec::with_capacity(self.fields_len() + 3);
        RlpHeader { list: true, payload_length: self.fields_len() }.encode(&mut buf);
        self.encode_fields(&mut buf);
        keccak256(&buf)
    }
}

/// An ECDSA signature over a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signature {
    /// R component.
    pub r: U256,
    /// S component.
    pub s: U256,
    /// Parity of the curve point's y coordinate.
    pub odd_y_parity: bool,
}

impl Signature {
    /// The `v` value as encoded on the wire.
    pub const fn v(&self) -> u64 {
        27 + self.odd_y_parity as u64
    }

    fn fields_len(&self) -> usize {
        self.v().length() + self.r.length() + self.s.length()
    }

    fn encode_fields(&self, out: &mut dyn alloy_rlp::BufMut) {
        self.v().encode(out);
        self.r.encode(out);
        self.s.encode(out);
    }

    /// Recovers the address that produced this signature over `hash`.
    ///
    /// Returns `None` if the signature does not describe a valid curve
    /// point.
    pub fn recover_signer(&self, hash: B256) -> Option<Address> {
        let recovery_id = RecoveryId::from_byte(self.odd_y_parity as u8)?;
        let signature = k256::ecdsa::Signature::from_scalars(
            self.r.to_be_bytes::<32>(),
            self.s.to_be_bytes::<32>(),
        )
        .ok()?;
        let key =
            VerifyingKey::recover_from_prehash(hash.as_slice(), &signature, recovery_id).ok()?;
        Some(public_key_to_address(&key))
    }
}

/// Computes the address controlled by the given public key.
pub fn public_key_to_address(key: &VerifyingKey) -> Address {
    let point = PublicKey::from(key).to_encoded_point(false);
    // skip the uncompressed-point tag byte
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// A [`Transaction`] with its [`Signature`] and memoized hash.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Deref)]
pub struct TransactionSigned {
    /// The transaction payload.
    #[deref]
    pub transaction: Transaction,
    /// Signature over [`Transaction::signature_hash`].
    pub signature: Signature,
    /// Hash of the RLP-encoded signed transaction.
    pub hash: B256,
}

impl TransactionSigned {
    /// Builds a signed transaction, computing its hash.
    pub fn new(transaction: Transaction, signature: Signature) -> Self {
        let mut this = Self { transaction, signature, hash: B256::ZERO };
        this.hash = keccak256(alloy_rlp::encode(&this));
        this
    }

    /// Recovers the sender of this transaction.
    pub fn recover_signer(&self) -> Option<Address> {
        self.signature.recover_signer(self.transaction.signature_hash())
    }

    fn payload_len(&self) -> usize {
        self.transaction.fields_len() + self.signature.fields_len()
    }
}

impl Encodable for TransactionSigned {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        RlpHeader { list: true, payload_length: self.payload_len() }.encode(out);
        self.transaction.encode_fields(out);
        self.signature.encode_fields(out);
    }

    fn length(&self) -> usize {
        let payload = self.payload_len();
        payload + RlpHeader { list: true, payload_length: payload }.length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;

    fn key(byte: u8) -> SigningKey {
        let mut bytes = [0u8; 32];
        bytes[31] = byte;
        SigningKey::from_slice(&bytes).unwrap()
    }

    fn sign(tx: Transaction, signer: &SigningKey) -> TransactionSigned {
        let hash = tx.signature_hash();
        let (sig, recovery_id) = signer.sign_prehash_recoverable(hash.as_slice()).unwrap();
        let r = U256::from_be_slice(&sig.r().to_bytes());
        let s = U256::from_be_slice(&sig.s().to_bytes());
        TransactionSigned::new(
            tx,
            Signature { r, s, odd_y_parity: recovery_id.is_y_odd() },
        )
    }

    #[test]
    fn recovers_the_signing_address() {
        let signer = key(1);
        let expected = public_key_to_address(signer.verifying_key());

        let tx = Transaction {
            nonce: 3,
            gas_price: 10,
            gas_limit: 21_000,
            to: TxKind::Call(Address::repeat_byte(0x22)),
            value: U256::from(1_000),
            input: Bytes::new(),
        };
        let signed = sign(tx, &signer);

        assert_eq!(signed.recover_signer(), Some(expected));
    }

    #[test]
    fn corrupted_signature_does_not_recover_sender() {
        let signer = key(2);
        let expected = public_key_to_address(signer.verifying_key());
        let mut signed = sign(Transaction::default(), &signer);
        signed.signature.odd_y_parity = !signed.signature.odd_y_parity;
        assert_ne!(signed.recover_signer(), Some(expected));
    }

    #[test]
    fn encoded_length_matches_encoding() {
        let signed = sign(Transaction { nonce: 9, ..Default::default() }, &key(3));
        assert_eq!(alloy_rlp::encode(&signed).len(), signed.length());
    }
}
