//! Property-based tests for sign/verify.
//!
//! Property 1: any claim set signed by a wallet verifies with the same wallet
//! Property 2: verification fails for an audience the token does not name
//! Property 3: registered time claims are always set by the signer

use std::sync::LazyLock;

use chrono::{Duration, Utc};
use jwt_wallet::{Claims, VerificationError, VerificationFailure, Wallet, WalletConfig, WalletError};
use proptest::prelude::*;

static WALLET: LazyLock<Wallet> =
    LazyLock::new(|| Wallet::new(WalletConfig::default()).unwrap());

/// Generate arbitrary subject strings.
fn arb_subject() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_-]{1,64}"
}

/// Generate arbitrary audience lists.
fn arb_audience() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z][a-z0-9-]{0,23}", 1..5)
}

/// Generate arbitrary TTL (1 minute to 24 hours).
fn arb_ttl() -> impl Strategy<Value = i64> {
    60i64..86_400i64
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property 1: Sign/Verify Round Trip
    #[test]
    fn prop_signed_tokens_verify(
        subject in arb_subject(),
        audience in arb_audience(),
        ttl in arb_ttl(),
        role in "[a-z]{1,12}",
    ) {
        let claims = Claims::new()
            .with_subject(subject.clone())
            .with_audience(audience.clone())
            .with_claim("role", serde_json::json!(role.clone()));

        let token = WALLET.sign_token(&claims, Utc::now() + Duration::seconds(ttl)).unwrap();

        for expected in &audience {
            let verified = tokio_test::block_on(WALLET.verify_token(&token, expected)).unwrap();
            prop_assert_eq!(verified.sub.as_deref(), Some(subject.as_str()));
            prop_assert_eq!(verified.get("role"), Some(&serde_json::json!(role.clone())));
        }
    }

    /// Property 2: Audience Enforcement
    #[test]
    fn prop_foreign_audience_is_rejected(
        audience in arb_audience(),
        other in "[A-Z]{1,16}",
    ) {
        let claims = Claims::new().with_audience(audience);
        let token = WALLET.sign_token(&claims, Utc::now() + Duration::minutes(5)).unwrap();

        let err = tokio_test::block_on(WALLET.verify_token(&token, &other)).unwrap_err();
        let rejected = matches!(
            err,
            WalletError::Verification(VerificationError {
                reason: VerificationFailure::AudienceMismatch
            })
        );
        prop_assert!(rejected);
    }

    /// Property 3: Time Claims Are Wallet-Controlled
    #[test]
    fn prop_time_claims_are_overwritten(
        iat in any::<i64>(),
        nbf in any::<i64>(),
        ttl in arb_ttl(),
    ) {
        let claims = Claims {
            iat: Some(iat),
            nbf: Some(nbf),
            ..Claims::new().with_audience("api")
        };
        let expires_at = Utc::now() + Duration::seconds(ttl);
        let token = WALLET.sign_token(&claims, expires_at).unwrap();

        let verified = tokio_test::block_on(WALLET.verify_token(&token, "api")).unwrap();
        prop_assert_eq!(verified.exp, Some(expires_at.timestamp()));
        prop_assert_eq!(verified.iat, verified.nbf);
        prop_assert!(verified.iat.is_some_and(|t| t <= Utc::now().timestamp()));
    }
}
