//! Tests for `dockhand configure` and `dockhand auto-configure`.

mod harness;
use harness::{assert_failure, assert_success, stderr, TestEnv};

#[test]
fn test_configure_seeds_env_from_template_and_sets_key() {
    let env = TestEnv::with_template();

    let output = env
        .cmd()
        .args(["configure", "FEATURE_X", "on"])
        .output()
        .unwrap();
    assert_success(&output);

    assert!(env.path(".env").exists());
    assert_eq!(env.env_value("FEATURE_X").as_deref(), Some("on"));
    // Template content came along
    assert_eq!(env.env_value("POSTGRES_USER").as_deref(), Some("app"));
}

#[test]
fn test_configure_rewrites_existing_key_in_place() {
    let env = TestEnv::with_template();
    env.write(
        ".env",
        "# database\nPOSTGRES_USER=app\nPOSTGRES_PASSWORD=old\n# end\n",
    );

    let output = env
        .cmd()
        .args(["configure", "POSTGRES_PASSWORD", "new_value"])
        .output()
        .unwrap();
    assert_success(&output);

    let contents = env.read(".env");
    assert!(contents.contains("POSTGRES_PASSWORD=new_value"));
    // Comments and untouched lines survive byte-for-byte
    assert!(contents.starts_with("# database\nPOSTGRES_USER=app\n"));
    assert!(contents.ends_with("# end\n"));
}

#[test]
fn test_configure_without_key_fails_non_interactively() {
    let env = TestEnv::with_template();

    // Piped stdin, so no prompt is possible
    let output = env.cmd().arg("configure").output().unwrap();
    assert_failure(&output);
}

#[test]
fn test_auto_configure_replaces_placeholder_secrets() {
    let env = TestEnv::with_template();

    let output = env
        .cmd()
        .args(["auto-configure", "--domain", "app.example.com"])
        .output()
        .unwrap();
    assert_success(&output);

    let jwt = env.env_value("JWT_SECRET").unwrap();
    assert_eq!(jwt.len(), 64);
    assert!(jwt.chars().all(|c| c.is_ascii_hexdigit()));
    assert!(!env.env_value("POSTGRES_PASSWORD").unwrap().starts_with("CHANGE_THIS"));
    assert!(!env.env_value("REDIS_PASSWORD").unwrap().starts_with("CHANGE_THIS"));
}

#[test]
fn test_auto_configure_rewrites_all_urls_for_domain() {
    let env = TestEnv::with_template();

    let output = env
        .cmd()
        .args(["auto-configure", "--domain", "app.example.com"])
        .output()
        .unwrap();
    assert_success(&output);

    assert_eq!(env.env_value("DOMAIN").as_deref(), Some("app.example.com"));
    assert_eq!(
        env.env_value("API_URL").as_deref(),
        Some("https://app.example.com")
    );
    assert_eq!(
        env.env_value("SOCKET_URL").as_deref(),
        Some("wss://app.example.com")
    );
    assert_eq!(
        env.env_value("OAUTH_CALLBACK_URL").as_deref(),
        Some("https://app.example.com/oauth/callback")
    );
}

#[test]
fn test_auto_configure_keeps_operator_set_secrets() {
    let env = TestEnv::with_template();
    env.write(
        ".env",
        "DOMAIN=localhost\n# operator managed\nPOSTGRES_PASSWORD=operator_chosen_pw_1234\nJWT_SECRET=CHANGE_THIS_JWT\n",
    );

    let output = env
        .cmd()
        .args(["auto-configure", "--domain", "localhost"])
        .output()
        .unwrap();
    assert_success(&output);

    assert_eq!(
        env.env_value("POSTGRES_PASSWORD").as_deref(),
        Some("operator_chosen_pw_1234")
    );
    assert!(!env.env_value("JWT_SECRET").unwrap().starts_with("CHANGE_THIS"));
    assert!(env.read(".env").contains("# operator managed"));
}

#[test]
fn test_auto_configure_is_idempotent() {
    let env = TestEnv::with_template();

    assert_success(
        &env.cmd()
            .args(["auto-configure", "--domain", "app.example.com"])
            .output()
            .unwrap(),
    );
    let first = env.read(".env");

    assert_success(
        &env.cmd()
            .args(["auto-configure", "--domain", "app.example.com"])
            .output()
            .unwrap(),
    );
    assert_eq!(env.read(".env"), first);
}

#[test]
fn test_configure_without_env_or_template_hints_install() {
    let env = TestEnv::new();

    let output = env
        .cmd()
        .args(["configure", "KEY", "value"])
        .output()
        .unwrap();
    assert_failure(&output);
    assert!(stderr(&output).contains("dockhand install"));
}
