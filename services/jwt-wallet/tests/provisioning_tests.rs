//! Integration tests for startup provisioning and local sign/verify.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{Duration, Utc};
use jsonwebtoken::Algorithm;
use jwt_wallet::keys::{encode_key_document, JoseKeyCodec, KeyCodec};
use jwt_wallet::{
    Claims, KeyResolutionError, ProvisioningMode, VerificationError, VerificationFailure,
    Wallet, WalletConfig, WalletError,
};

/// Base64 JSON private and public JWKs sharing `kid`.
fn encoded_key_pair(kid: &str) -> (String, String) {
    let pair = JoseKeyCodec.generate(Algorithm::ES256).unwrap();
    (
        encode_key_document(&pair.private.tagged(kid, Algorithm::ES256)).unwrap(),
        encode_key_document(&pair.public.tagged(kid, Algorithm::ES256)).unwrap(),
    )
}

fn reason(err: WalletError) -> VerificationFailure {
    match err {
        WalletError::Verification(VerificationError { reason }) => reason,
        other => panic!("expected verification error, got {other:?}"),
    }
}

fn claims() -> Claims {
    Claims::new()
        .with_subject("user-42")
        .with_audience("orders-api")
        .with_random_jti()
}

#[tokio::test]
async fn test_ephemeral_wallet_round_trip() {
    let wallet = Wallet::new(WalletConfig::default()).unwrap();
    assert_eq!(wallet.mode(), &ProvisioningMode::Ephemeral);
    assert!(wallet.issuer().is_none());

    let token = wallet
        .sign_token(&claims(), Utc::now() + Duration::minutes(5))
        .unwrap();
    let verified = wallet.verify_token(&token, "orders-api").await.unwrap();

    assert_eq!(verified.sub.as_deref(), Some("user-42"));
    assert!(verified.iss.is_none());
    assert_eq!(verified.iat, verified.nbf);
}

#[tokio::test]
async fn test_dev_port_alone_persists_keys_and_exits() {
    let err = Wallet::new(WalletConfig::default().with_dev_port(9000)).unwrap_err();
    assert_eq!(err.code(), "JWT_SAVE_TOKEN_EXIT");

    let WalletError::SaveTokenExit { keys } = err else {
        panic!("expected SaveTokenExit");
    };
    assert!(!keys.private_key.is_empty());
    assert!(!keys.public_key.is_empty());
    assert!(STANDARD.decode(&keys.private_key).is_ok());
    assert!(STANDARD.decode(&keys.public_key).is_ok());
    assert!(keys.env_lines().starts_with("JWT_PRIVATE="));
}

#[tokio::test]
async fn test_persisted_keys_work_after_restart() {
    let WalletError::SaveTokenExit { keys } =
        Wallet::new(WalletConfig::default().with_dev_port(9000)).unwrap_err()
    else {
        panic!("expected SaveTokenExit");
    };

    let config = WalletConfig::default()
        .with_dev_port(9000)
        .with_private_key(keys.private_key.clone())
        .with_dev_public_key(keys.public_key.clone());
    let wallet = Wallet::new(config).unwrap();

    assert_eq!(
        wallet.mode(),
        &ProvisioningMode::DevPublic {
            issuer: "http://localhost:9000".to_string()
        }
    );
    assert_eq!(wallet.key_id(), Some(keys.key_id.as_str()));

    let token = wallet
        .sign_token(&claims(), Utc::now() + Duration::minutes(5))
        .unwrap();
    let verified = wallet.verify_token(&token, "orders-api").await.unwrap();
    assert_eq!(verified.iss.as_deref(), Some("http://localhost:9000"));
}

#[test]
fn test_private_key_without_kid_is_rejected() {
    let pair = JoseKeyCodec.generate(Algorithm::ES256).unwrap();
    let mut private = pair.private.clone();
    private.alg = Some("ES256".to_string());
    let config = WalletConfig::default().with_private_key(encode_key_document(&private).unwrap());

    assert!(matches!(Wallet::new(config), Err(WalletError::KeyIdMismatch)));
}

#[test]
fn test_private_key_without_alg_is_rejected() {
    let pair = JoseKeyCodec.generate(Algorithm::ES256).unwrap();
    let mut private = pair.private.clone();
    private.kid = Some("no-alg".to_string());
    let config = WalletConfig::default().with_private_key(encode_key_document(&private).unwrap());

    assert!(matches!(
        Wallet::new(config),
        Err(WalletError::UndefinedAlgorithm)
    ));
}

#[test]
fn test_bare_private_key_document_reports_missing_alg() {
    let config = WalletConfig::default().with_private_key(STANDARD.encode(r#"{"kid":"k"}"#));
    assert!(matches!(
        Wallet::new(config),
        Err(WalletError::UndefinedAlgorithm)
    ));
}

#[test]
fn test_symmetric_dev_key_is_refused() {
    let secret = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(b"shared-secret");
    let document = format!(r#"{{"kty":"oct","kid":"pub","alg":"HS256","k":"{secret}"}}"#);
    let config = WalletConfig::default().with_dev_public_key(STANDARD.encode(document));

    assert!(matches!(
        Wallet::new(config),
        Err(WalletError::InvalidKeyMaterial { .. })
    ));
}

#[tokio::test]
async fn test_encryption_key_cannot_verify_signatures() {
    let (private, _) = encoded_key_pair("dual");
    let public_jwk = {
        let bytes = STANDARD.decode(&private).unwrap();
        let mut value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let object = value.as_object_mut().unwrap();
        object.remove("d");
        object.insert("use".to_string(), serde_json::json!("enc"));
        STANDARD.encode(serde_json::to_vec(&value).unwrap())
    };
    let wallet = Wallet::new(
        WalletConfig::default()
            .with_private_key(private)
            .with_dev_public_key(public_jwk),
    )
    .unwrap();

    let token = wallet
        .sign_token(&claims(), Utc::now() + Duration::minutes(5))
        .unwrap();
    let err = wallet.verify_token(&token, "orders-api").await.unwrap_err();
    assert!(matches!(
        reason(err),
        VerificationFailure::KeyResolution(KeyResolutionError::AlgorithmMismatch { .. })
    ));
}

#[test]
fn test_undecodable_private_key_is_rejected() {
    let config = WalletConfig::default().with_private_key("%%% not base64 %%%");
    assert!(matches!(
        Wallet::new(config),
        Err(WalletError::InvalidKeyMaterial {
            field: "private_key",
            ..
        })
    ));
}

#[test]
fn test_verification_only_wallet_cannot_sign() {
    let (_, public) = encoded_key_pair("dev-key");
    let wallet = Wallet::new(WalletConfig::default().with_dev_public_key(public)).unwrap();

    assert!(!wallet.can_sign());
    assert!(wallet.key_id().is_none());
    assert!(matches!(
        wallet.sign_token(&claims(), Utc::now() + Duration::minutes(5)),
        Err(WalletError::PrivateKeyMissing)
    ));

    let jwks = wallet.public_jwks().unwrap();
    assert_eq!(jwks.keys[0].kid.as_deref(), Some("dev-key"));
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let wallet = Wallet::new(WalletConfig::default()).unwrap();
    let token = wallet
        .sign_token(&claims(), Utc::now() - Duration::minutes(1))
        .unwrap();

    let err = wallet.verify_token(&token, "orders-api").await.unwrap_err();
    assert!(!err.is_retryable());
    assert_eq!(reason(err), VerificationFailure::Expired);
}

#[tokio::test]
async fn test_wrong_audience_is_rejected() {
    let wallet = Wallet::new(WalletConfig::default()).unwrap();
    let token = wallet
        .sign_token(&claims(), Utc::now() + Duration::minutes(5))
        .unwrap();

    let err = wallet.verify_token(&token, "billing-api").await.unwrap_err();
    assert_eq!(reason(err), VerificationFailure::AudienceMismatch);
}

#[tokio::test]
async fn test_token_from_unknown_key_fails_resolution() {
    let issuer = Wallet::new(WalletConfig::default()).unwrap();
    let verifier = Wallet::new(WalletConfig::default()).unwrap();

    let token = issuer
        .sign_token(&claims(), Utc::now() + Duration::minutes(5))
        .unwrap();
    let err = verifier.verify_token(&token, "orders-api").await.unwrap_err();

    assert!(matches!(
        reason(err),
        VerificationFailure::KeyResolution(KeyResolutionError::UnknownKeyId { kid: Some(_) })
    ));
}

#[tokio::test]
async fn test_tampered_token_is_rejected() {
    let wallet = Wallet::new(WalletConfig::default()).unwrap();
    let token = wallet
        .sign_token(&claims(), Utc::now() + Duration::minutes(5))
        .unwrap();

    let forged_claims = claims().with_subject("admin");
    let forged_payload = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .encode(serde_json::to_vec(&forged_claims).unwrap());
    let mut parts: Vec<&str> = token.split('.').collect();
    parts[1] = &forged_payload;
    let forged = parts.join(".");

    let err = wallet.verify_token(&forged, "orders-api").await.unwrap_err();
    assert_eq!(reason(err), VerificationFailure::InvalidSignature);
}

#[tokio::test]
async fn test_configured_key_wins_over_generated_key() {
    let (private, _) = encoded_key_pair("configured");
    let wallet = Wallet::new(WalletConfig::default().with_private_key(private)).unwrap();

    assert_eq!(wallet.mode(), &ProvisioningMode::Ephemeral);
    assert_eq!(wallet.key_id(), Some("configured"));

    // The generated verification key does not match the configured signing key.
    let token = wallet
        .sign_token(&claims(), Utc::now() + Duration::minutes(5))
        .unwrap();
    let err = wallet.verify_token(&token, "orders-api").await.unwrap_err();
    assert!(matches!(reason(err), VerificationFailure::KeyResolution(_)));
}
