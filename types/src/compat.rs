#![cfg(test)]
use crate::execution::{Fulfillment, Instruction, Transaction};
use crate::round::{RandomWord, RequestId};
use commonware_codec::{Encode, EncodeSize};
use commonware_cryptography::{ed25519::PrivateKey, Signer};

#[test]
fn instruction_encoding_is_stable() {
    assert_eq!(Instruction::Open.encode().as_ref(), &[0u8]);
    assert_eq!(Instruction::Close.encode().as_ref(), &[2u8]);
    assert_eq!(Instruction::RetryPayout.encode().as_ref(), &[3u8]);

    let mut expected = vec![1u8];
    expected.extend_from_slice(&42u128.to_be_bytes());
    assert_eq!(
        Instruction::Enter { payment: 42 }.encode().as_ref(),
        expected.as_slice()
    );
}

#[test]
fn request_id_encoding_is_stable() {
    assert_eq!(
        RequestId(42).encode().as_ref(),
        &[0u8, 0, 0, 0, 0, 0, 0, 42]
    );
}

#[test]
fn transaction_layout_is_stable() {
    let private = PrivateKey::from_seed(1);
    let tx = Transaction::sign(&private, 7, Instruction::Close);
    let encoded = tx.encode();

    // nonce (8) + instruction (1) + public key (32) + signature (64)
    assert_eq!(encoded.len(), 8 + 1 + 32 + 64);
    assert_eq!(encoded.len(), tx.encode_size());
    assert_eq!(&encoded[..8], &7u64.to_be_bytes());
    assert_eq!(encoded[8], 2u8);
    assert_eq!(&encoded[9..41], private.public_key().as_ref());
}

#[test]
fn fulfillment_layout_is_stable() {
    let coordinator = PrivateKey::from_seed(3);
    let fulfillment = Fulfillment::sign(
        &coordinator,
        RequestId(1),
        vec![RandomWord::from(7), RandomWord::from(8)],
    );
    let encoded = fulfillment.encode();

    // request id (8) + word count varint (1) + 2 words (64) + signature (64)
    assert_eq!(encoded.len(), 8 + 1 + 64 + 64);
    assert_eq!(encoded.len(), fulfillment.encode_size());
    assert_eq!(encoded[8], 2u8);
    assert_eq!(encoded[8 + 32], 7u8);
}
