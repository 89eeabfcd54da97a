//! Building and signing without a node: payload layout, golden bytes,
//! extension resolution and decoding.

use substrate_kit::*;

use crate::mock_node::*;

fn fixed_key() -> SecretKey {
    let seed: [u8; 32] = ::hex::decode(ED25519_SEED).unwrap().try_into().unwrap();
    SecretKey::from_seed(CryptoType::Ed25519, seed)
}

fn golden_builder() -> ExtrinsicBuilder {
    ExtrinsicBuilder::new()
        .call(transfer(1000))
        .address(alice())
        .nonce(3)
        .era(Era::mortal(64, 1000), H256::from_bytes(FINALIZED))
}

// =============================================================================
// Payload
// =============================================================================

#[test]
fn test_signing_payload_layout() {
    let ctx = context();
    let resolver = ExtensionResolver::new();

    let payload = golden_builder().signature_payload(&ctx, &resolver).unwrap();

    let mut expected = transfer(1000).encode(&ctx.metadata).unwrap();
    assert_eq!(expected.len(), 37);
    expected.extend_from_slice(&[0x85, 0x02]); // era
    expected.push(0x0c); // compact nonce 3
    expected.push(0x00); // compact tip 0
    expected.extend_from_slice(&GENESIS);
    expected.extend_from_slice(&FINALIZED);
    expected.extend_from_slice(&SPEC_VERSION.to_le_bytes());
    expected.extend_from_slice(&TX_VERSION.to_le_bytes());

    assert_eq!(payload, expected);
    assert_eq!(payload.len(), 113);
}

#[test]
fn test_call_encoding() {
    let call = transfer(1000).encode(&metadata()).unwrap();
    let mut expected = vec![0x04, 0x00, 0x00];
    expected.extend_from_slice(alice().as_bytes());
    expected.extend_from_slice(&[0xa1, 0x0f]);
    assert_eq!(call, expected);
}

#[test]
fn test_long_payload_is_hashed() {
    let ctx = context();
    let resolver = ExtensionResolver::new();
    let builder = ExtrinsicBuilder::new()
        .call(remark(&[7u8; 300]))
        .address(alice())
        .nonce(0);

    let full = builder.encoded_payload(&ctx, &resolver).unwrap();
    let signed = builder.signature_payload(&ctx, &resolver).unwrap();
    assert!(full.len() > 256);
    assert_eq!(signed, blake2_256(&full).to_vec());
}

// =============================================================================
// Golden vector
// =============================================================================

#[test]
fn test_golden_extrinsic() {
    let ctx = context();
    let resolver = ExtensionResolver::new();
    let key = fixed_key();

    let signed = golden_builder()
        .sign(|payload| key.sign(payload), CryptoType::Ed25519, &ctx, &resolver)
        .unwrap();
    let hex = signed.build_hex(&ctx).unwrap();

    assert_eq!(
        hex,
        "0x31028400d43593c715fdd31c61141abd04a99fd6822c8558854ccde39a5684e7a56da27d003ec553c70ba27917b1504d45373d609d74764217b55444679fd2ad4d4c2124b7cc3093d34743486cd5ebf2fb77300fc01d9c0f79114ec870a53d05baacec380b85020c00040000d43593c715fdd31c61141abd04a99fd6822c8558854ccde39a5684e7a56da27da10f"
    );
    assert_eq!(
        signed.build_extrinsic(&ctx).unwrap().hash().to_string(),
        "0x0b41c0b5396b72c8a352f7512878d6bf20cb81f5c191e2b65479d339a6cb8172"
    );

    // Deterministic across runs
    let again = golden_builder()
        .sign(|payload| key.sign(payload), CryptoType::Ed25519, &ctx, &resolver)
        .unwrap()
        .build_hex(&ctx)
        .unwrap();
    assert_eq!(hex, again);
}

#[test]
fn test_golden_signature_verifies() {
    let ctx = context();
    let resolver = ExtensionResolver::new();
    let key = fixed_key();

    let signed = golden_builder()
        .sign(|payload| key.sign(payload), CryptoType::Ed25519, &ctx, &resolver)
        .unwrap();
    let payload = signed.signature_payload(&ctx, &resolver).unwrap();
    let signature = signed.signature().unwrap();

    assert!(key.public_key().unwrap().verify(&payload, &signature.raw));
    assert_eq!(signature.type_name, "sp_runtime::MultiSignature");
}

#[test]
fn test_async_signing_key_matches_secret_key() {
    let key = fixed_key();
    let signing_key = SigningKey::new(key.clone()).unwrap();
    let payload = golden_builder()
        .signature_payload(&context(), &ExtensionResolver::new())
        .unwrap();

    let raw = tokio_test::block_on(signing_key.sign(&payload)).unwrap();
    assert_eq!(raw, key.sign(&payload).unwrap());
    assert_eq!(signing_key.crypto_type(), CryptoType::Ed25519);
}

#[test]
fn test_changing_nonce_drops_signature() {
    let ctx = context();
    let resolver = ExtensionResolver::new();
    let key = fixed_key();

    let signed = golden_builder()
        .sign(|payload| key.sign(payload), CryptoType::Ed25519, &ctx, &resolver)
        .unwrap();
    assert!(signed.is_signed());

    let unsigned = signed.nonce(4);
    assert!(!unsigned.is_signed());
    let bytes = unsigned.build(&ctx).unwrap();
    // Unsigned extrinsics carry the bare version byte
    assert_eq!(bytes[1], 0x04);
}

// =============================================================================
// Extension resolution
// =============================================================================

#[test]
fn test_resolver_cache_per_revision() {
    let ctx = context();
    let resolver = ExtensionResolver::new();

    for _ in 0..3 {
        golden_builder().signature_payload(&ctx, &resolver).unwrap();
    }
    let first = resolver.stats();

    let upgraded = RuntimeContext::new(
        SPEC_VERSION + 1,
        TX_VERSION,
        H256::from_bytes(GENESIS),
        metadata(),
    );
    golden_builder().signature_payload(&upgraded, &resolver).unwrap();
    let second = resolver.stats();

    // CheckNonZeroSender is unknown: searched once, then served from cache
    assert_eq!(first.suffix_searches, 1);
    assert_eq!(first.cache_hits, 2);
    // A new spec version searches again
    assert_eq!(second.suffix_searches, 2);
    assert_eq!(second.cache_hits, 2);
}

#[test]
fn test_unknown_extension_policy() {
    let mut json = metadata_json();
    json["extrinsic"]["signedExtensions"]
        .as_array_mut()
        .unwrap()
        .push(serde_json::json!({
            "identifier": "CheckMetadataHash", "type": 19, "additionalSigned": 21
        }));
    let metadata = RuntimeMetadata::try_from(metadata_v14(&json)).unwrap();
    let ctx = RuntimeContext::new(SPEC_VERSION, TX_VERSION, H256::from_bytes(GENESIS), metadata);

    let skip = ExtensionResolver::new();
    assert!(golden_builder().signature_payload(&ctx, &skip).is_ok());

    let reject = ExtensionResolver::new().with_policy(UnknownExtensionPolicy::Reject);
    assert!(matches!(
        golden_builder().signature_payload(&ctx, &reject),
        Err(Error::UnsupportedSignedExtension(name)) if name == "CheckMetadataHash"
    ));
}

// =============================================================================
// Decoding
// =============================================================================

#[test]
fn test_decode_golden_extrinsic() {
    let ctx = context();
    let resolver = ExtensionResolver::new();
    let key = fixed_key();

    let bytes = golden_builder()
        .sign(|payload| key.sign(payload), CryptoType::Ed25519, &ctx, &resolver)
        .unwrap()
        .build(&ctx)
        .unwrap();
    let decoded = decode_extrinsic(&ctx.metadata, &bytes).unwrap();

    assert_eq!(decoded.version, 4);
    let signature = decoded.signature.unwrap();
    assert_eq!(signature.extra.nonce, 3);
    assert_eq!(signature.extra.tip, 0);
    assert_eq!(decoded.call.function, "transfer");
    assert_eq!(
        decoded.call.args.field("value").and_then(Value::as_u128),
        Some(1000)
    );

    // Truncated input is rejected
    assert!(decode_extrinsic(&ctx.metadata, &bytes[..bytes.len() - 1]).is_err());
}
