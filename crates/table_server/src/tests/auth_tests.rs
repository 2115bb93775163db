use super::*;

fn config(secret: &str, ttl_seconds: i64) -> TokenConfig {
    TokenConfig {
        secret: secret.into(),
        ttl_seconds,
    }
}

#[test]
fn minted_token_verifies_to_the_same_user() {
    let cfg = config("devsecret", 60);
    let user = user_id_for("microsoftaccount", "alice");
    let token = mint_token(&cfg, &user).expect("token");

    assert_eq!(verify_token(&cfg, &token).expect("verify"), user);
    assert_eq!(user.0, "microsoftaccount:alice");
}

#[test]
fn token_signed_with_another_secret_is_rejected() {
    let token = mint_token(&config("one", 60), &UserId("u".into())).expect("token");
    assert!(verify_token(&config("two", 60), &token).is_err());
}

#[test]
fn expired_token_is_rejected() {
    let cfg = config("devsecret", -3600);
    let token = mint_token(&cfg, &UserId("u".into())).expect("token");
    assert!(verify_token(&cfg, &token).is_err());
}

#[test]
fn garbage_is_rejected() {
    assert!(verify_token(&config("devsecret", 60), "not-a-jwt").is_err());
}
