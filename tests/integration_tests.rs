//! Integration tests for the phrase translation engine
//!
//! These tests drive the public API end to end: an on-disk SQLite cache, a
//! mocked lookup service and a file-backed language preference.

use chrono::{Duration as ChronoDuration, Utc};
use phrase_translation::{
    backend::HttpBackend,
    config::Config,
    i18n::{LanguageTag, TranslatedPayload},
    preference::{FilePreference, LanguagePreference},
    store::{CachedTranslation, RecordStore, SqliteRecordStore},
    ResolutionEngine,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

// ==================== Test Helpers ====================

const WAIT: Duration = Duration::from_secs(5);

fn french() -> LanguageTag {
    LanguageTag::parse("fr").unwrap()
}

/// Create a test config pointing at the mock server, with a short debounce
fn create_test_config(mock_server: &MockServer, temp_dir: &TempDir) -> Config {
    let mut config = Config::new(format!("{}/api/translation", mock_server.uri()));
    config.debounce_time_ms = 100;
    config.request_timeout_secs = 2;
    config.database_path = temp_dir
        .path()
        .join("translations.db")
        .to_str()
        .unwrap()
        .to_string();
    config.language_file = temp_dir
        .path()
        .join("preferred-language")
        .to_str()
        .unwrap()
        .to_string();
    config
}

struct TestEnv {
    engine: ResolutionEngine,
    store: Arc<SqliteRecordStore>,
    config: Config,
    _temp_dir: TempDir,
}

/// Build an engine with French already chosen
async fn create_env(mock_server: &MockServer, configure: impl FnOnce(&mut Config)) -> TestEnv {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = create_test_config(mock_server, &temp_dir);
    configure(&mut config);

    let preference = FilePreference::new(&config.language_file);
    preference.set(&french()).expect("Failed to write preference");

    let store = Arc::new(
        SqliteRecordStore::open(&config.database_path)
            .await
            .expect("Failed to open store"),
    );
    let backend = HttpBackend::new(&config).expect("backend");
    let engine = ResolutionEngine::new(
        &config,
        store.clone(),
        Arc::new(backend),
        Arc::new(preference),
    );

    TestEnv {
        engine,
        store,
        config,
        _temp_dir: temp_dir,
    }
}

async fn wait_until<T: Clone>(
    rx: &mut watch::Receiver<T>,
    done: impl FnMut(&T) -> bool,
) -> T {
    tokio::time::timeout(WAIT, rx.wait_for(done))
        .await
        .expect("Timed out waiting for value")
        .expect("Channel closed")
        .clone()
}

async fn requested_phrases(mock_server: &MockServer) -> Vec<Vec<String>> {
    mock_server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| {
            let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
            serde_json::from_value(body["phrases"].clone()).unwrap()
        })
        .collect()
}

// ==================== Batching Tests ====================

#[tokio::test]
async fn test_phrases_close_together_share_one_request() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/translation/fr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "translations": { "Save": "Enregistrer", "Cancel": "Annuler" }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let env = create_env(&mock_server, |_| {}).await;

    let mut save = env.engine.resolve_text("Save");
    tokio::time::sleep(Duration::from_millis(20)).await;
    let mut cancel = env.engine.resolve_text("Cancel");

    assert_eq!(wait_until(&mut save, |t| t == "Enregistrer").await, "Enregistrer");
    assert_eq!(wait_until(&mut cancel, |t| t == "Annuler").await, "Annuler");

    let mut batches = requested_phrases(&mock_server).await;
    assert_eq!(batches.len(), 1);
    batches[0].sort();
    assert_eq!(batches[0], vec!["Cancel", "Save"]);

    let cached = env.store.list_language(&french()).await.unwrap();
    let phrases: Vec<&str> = cached.iter().map(|r| r.phrase.as_str()).collect();
    assert_eq!(phrases, vec!["Cancel", "Save"]);
    assert!(cached.iter().all(|r| r.expires_at > Utc::now()));
}

#[tokio::test]
async fn test_yes_no_variant_matches_input_case() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/translation/fr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "translations": {
                "Confirm?": { "primaryText": "Confirmer ?", "yes": "oui", "no": "non" }
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let env = create_env(&mock_server, |_| {}).await;

    let mut answer = env.engine.resolve_yes_no("Confirm?", "Yes");
    assert_eq!(wait_until(&mut answer, |t| t == "Oui").await, "Oui");

    let record = env
        .store
        .lookup("Confirm?", &french())
        .await
        .unwrap()
        .expect("Structured payload should be cached");
    assert_eq!(record.payload.translation, "Confirmer ?");
    assert_eq!(record.payload.no.as_deref(), Some("non"));
}

// ==================== Failure Tests ====================

#[tokio::test]
async fn test_lookup_failure_shows_original_and_caches_nothing() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/translation/fr"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let env = create_env(&mock_server, |_| {}).await;

    let mut save = env.engine.resolve("Save");
    wait_until(&mut save, |p| p.is_in_progress()).await;
    let settled = wait_until(&mut save, |p| !p.is_in_progress()).await;

    assert_eq!(settled, TranslatedPayload::identity("Save"));
    assert!(env.store.list_language(&french()).await.unwrap().is_empty());
    assert_eq!(env.engine.metrics().batch_failures, 1);
}

#[tokio::test]
async fn test_lookup_failure_in_diagnostic_mode() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/translation/fr"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let env = create_env(&mock_server, |config| config.diagnostic_mode = true).await;

    let mut save = env.engine.resolve_text("Save");
    let text = wait_until(&mut save, |t| t.starts_with("[Test translation")).await;

    assert_eq!(text, "[Test translation for Save]");
    assert!(env.store.list_language(&french()).await.unwrap().is_empty());
}

// ==================== Cache Tests ====================

#[tokio::test]
async fn test_cached_translation_needs_no_request() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    let env = create_env(&mock_server, |_| {}).await;
    env.store
        .bulk_insert(&[CachedTranslation::new(
            "Save",
            french(),
            TranslatedPayload::text("Enregistrer"),
            Utc::now() + ChronoDuration::hours(1),
        )])
        .await
        .unwrap();

    let mut save = env.engine.resolve_text("Save");
    assert_eq!(wait_until(&mut save, |t| t == "Enregistrer").await, "Enregistrer");

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(env.engine.metrics().cache_hits, 1);
    assert_eq!(env.engine.metrics().batches_sent, 0);
}

#[tokio::test]
async fn test_expired_translation_is_refetched() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/translation/fr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "translations": { "Save": "Enregistrer" }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let env = create_env(&mock_server, |_| {}).await;
    env.store
        .bulk_insert(&[CachedTranslation::new(
            "Save",
            french(),
            TranslatedPayload::text("Sauvegarder"),
            Utc::now() - ChronoDuration::minutes(1),
        )])
        .await
        .unwrap();

    let mut save = env.engine.resolve_text("Save");
    assert_eq!(wait_until(&mut save, |t| t == "Enregistrer").await, "Enregistrer");

    let record = env.store.lookup("Save", &french()).await.unwrap().unwrap();
    assert_eq!(record.payload.translation, "Enregistrer");
    assert!(!record.is_expired(Utc::now()));
}

// ==================== Language Tests ====================

#[tokio::test]
async fn test_language_choice_survives_restart() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/translation/cy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "translations": { "Save": "Cadw" }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let env = create_env(&mock_server, |_| {}).await;
    let mut save = env.engine.resolve_text("Save");

    assert!(env.engine.set_language(LanguageTag::WELSH));
    assert!(!env.engine.set_language(LanguageTag::WELSH));
    assert_eq!(wait_until(&mut save, |t| t == "Cadw").await, "Cadw");

    let restarted = ResolutionEngine::new(
        &env.config,
        env.store.clone(),
        Arc::new(HttpBackend::new(&env.config).unwrap()),
        Arc::new(FilePreference::new(&env.config.language_file)),
    );
    assert_eq!(restarted.language(), LanguageTag::WELSH);

    // Served from the cache written by the first engine
    let mut again = restarted.resolve_text("Save");
    assert_eq!(wait_until(&mut again, |t| t == "Cadw").await, "Cadw");
}

#[tokio::test]
async fn test_switch_to_base_language_restores_originals() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/translation/fr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "translations": { "Save": "Enregistrer" }
        })))
        .mount(&mock_server)
        .await;

    let env = create_env(&mock_server, |_| {}).await;
    let mut save = env.engine.resolve_text("Save");
    wait_until(&mut save, |t| t == "Enregistrer").await;

    assert!(env.engine.set_language(LanguageTag::ENGLISH));
    assert_eq!(wait_until(&mut save, |t| t == "Save").await, "Save");
}
