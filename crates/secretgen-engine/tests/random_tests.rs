//! Random password generation through the full run

mod common;

use common::*;
use serde_json::json;

#[tokio::test]
async fn test_generates_password_from_charsets() {
    let testbed = Testbed::new().unwrap();
    let config = testbed
        .config_with_mounts(json!({ "pw": random_secret(&["lowercase", "numbers"], 48) }), 2)
        .unwrap();

    let summary = testbed.run(&config).await.unwrap();
    assert_generated(&summary, &["pw"]);

    let password = testbed.read_secret_string("pw").unwrap();
    assert_eq!(password.len(), 48);
    assert!(password
        .chars()
        .all(|c| "abcdefghijkmnpqrstuvwxyz123456789".contains(c)));

    assert_readable_by(&testbed, "pw", &["alpha", "bravo"], password.as_bytes());
    assert_not_readable_by(&testbed, "pw", "charlie");
    assert!(!testbed.read_entropy("pw").unwrap().is_empty());
}

#[tokio::test]
async fn test_unmodified_secret_is_not_rewritten() {
    let testbed = Testbed::new().unwrap();
    let config = testbed
        .config_with_mounts(json!({ "pw": random_secret(&["special", "uppercase"], 24) }), 3)
        .unwrap();

    testbed.run(&config).await.unwrap();
    let ciphertext = testbed.ciphertext("pw").unwrap();
    let entropy = testbed.read_entropy("pw").unwrap();

    let summary = testbed.run(&config).await.unwrap();
    assert_unchanged(&summary, &["pw"]);
    assert_eq!(testbed.ciphertext("pw").unwrap(), ciphertext);
    assert_eq!(testbed.read_entropy("pw").unwrap(), entropy);
}

#[tokio::test]
async fn test_modified_parameters_regenerate() {
    let testbed = Testbed::new().unwrap();
    let short = testbed
        .config(json!({ "pw": random_secret(&["numbers"], 8) }), json!({}))
        .unwrap();
    let long = testbed
        .config(json!({ "pw": random_secret(&["numbers"], 12) }), json!({}))
        .unwrap();

    testbed.run(&short).await.unwrap();
    assert_eq!(testbed.read_secret("pw").unwrap().len(), 8);

    let summary = testbed.run(&long).await.unwrap();
    assert_generated(&summary, &["pw"]);
    assert_eq!(testbed.read_secret("pw").unwrap().len(), 12);
}

#[tokio::test]
async fn test_modified_charsets_regenerate_at_same_length() {
    let testbed = Testbed::new().unwrap();
    let numbers = testbed
        .config(json!({ "pw": random_secret(&["numbers"], 16) }), json!({}))
        .unwrap();
    let mixed = testbed
        .config(
            json!({ "pw": random_secret(&["numbers", "uppercase"], 16) }),
            json!({}),
        )
        .unwrap();
    let lowercase = testbed
        .config(json!({ "pw": random_secret(&["lowercase"], 16) }), json!({}))
        .unwrap();

    testbed.run(&numbers).await.unwrap();
    let digits = testbed.read_secret_string("pw").unwrap();

    let summary = testbed.run(&mixed).await.unwrap();
    assert_generated(&summary, &["pw"]);
    let mixed_pw = testbed.read_secret_string("pw").unwrap();
    assert_eq!(mixed_pw.len(), 16);
    assert_ne!(mixed_pw, digits);
    assert!(mixed_pw
        .chars()
        .all(|c| "123456789ABCDEFGHJKLMNPQRSTUVWXYZ".contains(c)));

    let summary = testbed.run(&lowercase).await.unwrap();
    assert_generated(&summary, &["pw"]);
    let letters = testbed.read_secret_string("pw").unwrap();
    assert_eq!(letters.len(), 16);
    assert!(letters
        .chars()
        .all(|c| "abcdefghijkmnpqrstuvwxyz".contains(c)));

    let summary = testbed.run(&lowercase).await.unwrap();
    assert_unchanged(&summary, &["pw"]);
}

#[tokio::test]
async fn test_added_mount_reencrypts_for_new_host() {
    let testbed = Testbed::new().unwrap();
    let secrets = json!({ "pw": random_secret(&["lowercase"], 16) });
    let before = testbed
        .config(
            secrets.clone(),
            json!({ "m1": { "host": "alpha", "secret": "pw" } }),
        )
        .unwrap();
    let after = testbed
        .config(
            secrets,
            json!({
                "m1": { "host": "alpha", "secret": "pw" },
                "m2": { "host": "delta", "secret": "pw" }
            }),
        )
        .unwrap();

    testbed.run(&before).await.unwrap();
    assert_not_readable_by(&testbed, "pw", "delta");

    // unchanged content keeps the old recipients; a regeneration picks up the new ones
    testbed.remove_secret("pw").unwrap();
    let summary = testbed.run(&after).await.unwrap();
    assert_generated(&summary, &["pw"]);

    let password = testbed.read_secret("pw").unwrap();
    assert_readable_by(&testbed, "pw", &["alpha", "delta"], &password);
}

#[tokio::test]
async fn test_deleted_secret_is_regenerated() {
    let testbed = Testbed::new().unwrap();
    let config = testbed
        .config(json!({ "pw": random_secret(&["lowercase"], 16) }), json!({}))
        .unwrap();

    testbed.run(&config).await.unwrap();
    testbed.remove_secret("pw").unwrap();

    let summary = testbed.run(&config).await.unwrap();
    assert_generated(&summary, &["pw"]);
    assert_eq!(testbed.read_secret("pw").unwrap().len(), 16);
}

#[tokio::test]
async fn test_tampered_secret_is_regenerated() {
    let testbed = Testbed::new().unwrap();
    let config = testbed
        .config(json!({ "pw": random_secret(&["numbers"], 10) }), json!({}))
        .unwrap();

    testbed.run(&config).await.unwrap();
    testbed.write_secret("pw", b"not-the-password").unwrap();

    let summary = testbed.run(&config).await.unwrap();
    assert_generated(&summary, &["pw"]);
    assert_eq!(testbed.read_secret("pw").unwrap().len(), 10);
}

#[tokio::test]
async fn test_empty_charset_fails() {
    let testbed = Testbed::new().unwrap();
    let config = testbed
        .config(
            json!({ "pw": { "generation": { "random": { "charsets": { "numbers": false }, "length": 8 } } } }),
            json!({}),
        )
        .unwrap();

    assert_run_failed_with(
        testbed.run(&config).await,
        "while generating secret pw: empty charset for secret generation",
    );
    assert!(!testbed.data_path("pw").exists());
    assert!(!testbed.entropy_path("pw").exists());
}

#[tokio::test]
async fn test_unknown_charset_fails() {
    let testbed = Testbed::new().unwrap();
    let config = testbed
        .config(
            json!({ "pw": { "generation": { "random": { "charsets": { "numbers": true, "kanji": false }, "length": 8 } } } }),
            json!({}),
        )
        .unwrap();

    assert_run_failed_with(testbed.run(&config).await, "unknown charset: kanji");
}

#[tokio::test]
async fn test_unknown_mount_host_fails_before_generation() {
    let testbed = Testbed::new().unwrap();
    let config = testbed
        .config(
            json!({ "pw": random_secret(&["numbers"], 8) }),
            json!({ "m": { "host": "nowhere", "secret": "pw" } }),
        )
        .unwrap();

    assert_run_failed_with(
        testbed.run(&config).await,
        "Unknown host in secret mount: mount=m secret=pw host=nowhere",
    );
    assert!(!testbed.data_path("pw").exists());
}
