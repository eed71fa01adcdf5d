use anyhow::{bail, Context, Result};
use phrase_translation::{
    backend::HttpBackend,
    config::Config,
    i18n::{needs_translation, LanguageTag, TranslatedPayload},
    preference::FilePreference,
    store::SqliteRecordStore,
    ResolutionEngine,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

const USAGE: &str = "Usage: phrase-translation [--lang <tag>] <phrase>...";

/// Extra time allowed on top of the debounce window and request timeout.
const SETTLE_MARGIN: Duration = Duration::from_secs(2);

#[derive(Debug)]
struct Args {
    language: Option<LanguageTag>,
    phrases: Vec<String>,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut language = None;
    let mut phrases = Vec::new();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--lang" => {
                let code = iter.next().context("--lang needs a language tag")?;
                language = Some(LanguageTag::parse(code)?);
            }
            "-h" | "--help" => bail!("{}", USAGE),
            _ => {
                if !phrases.contains(arg) {
                    phrases.push(arg.clone());
                }
            }
        }
    }

    if phrases.is_empty() {
        bail!("No phrases given\n{}", USAGE);
    }

    Ok(Args { language, phrases })
}

/// Wait until the channel holds a value that is not in progress.
///
/// A phrase sent for lookup starts out as itself, so when `expect_update` is
/// set the first published value is awaited before checking.
async fn settled(
    mut rx: watch::Receiver<TranslatedPayload>,
    expect_update: bool,
) -> TranslatedPayload {
    if expect_update && rx.changed().await.is_err() {
        let payload = rx.borrow().clone();
        return payload;
    }
    if let Ok(payload) = rx.wait_for(|payload| !payload.is_in_progress()).await {
        return payload.clone();
    }
    let payload = rx.borrow().clone();
    payload
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("phrase_translation=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&args)?;

    let config = Config::from_env()?;

    let store = SqliteRecordStore::open(&config.database_path).await?;
    let backend = HttpBackend::new(&config)?;
    let preference = FilePreference::new(&config.language_file);

    let engine = ResolutionEngine::new(
        &config,
        Arc::new(store),
        Arc::new(backend),
        Arc::new(preference),
    );

    if let Some(language) = args.language {
        engine.set_language(language);
    }
    info!(
        "Resolving {} phrases into {}",
        args.phrases.len(),
        engine.language()
    );

    let translating = engine.language() != *engine.base_language();
    let receivers: Vec<_> = args
        .phrases
        .iter()
        .map(|phrase| (engine.resolve(phrase), translating && needs_translation(phrase)))
        .collect();

    let deadline =
        config.debounce() + Duration::from_secs(config.request_timeout_secs) + SETTLE_MARGIN;
    let results = tokio::time::timeout(
        deadline,
        futures::future::join_all(
            receivers
                .iter()
                .map(|(rx, expect_update)| settled(rx.clone(), *expect_update)),
        ),
    )
    .await;

    let results = match results {
        Ok(results) => results,
        Err(_) => {
            warn!("Timed out after {:?}, printing current values", deadline);
            receivers
                .iter()
                .map(|(rx, _)| rx.borrow().clone())
                .collect()
        }
    };

    for (phrase, payload) in args.phrases.iter().zip(results) {
        println!("{} => {}", phrase, payload.translation);
    }

    let report = engine.metrics();
    info!(
        "Resolution metrics: {}",
        serde_json::to_string(&report).context("Failed to serialize metrics")?
    );

    Ok(())
}
