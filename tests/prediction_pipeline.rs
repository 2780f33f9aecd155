//! End-to-end tests of the prediction pipeline
//!
//! The scoring model is replaced by small `sh` scripts written to a
//! per-test directory; the message service is mocked with mockito.

use chrono::{TimeZone, Utc};
use devis_scoring::config::{Config, ScoringConfig};
use devis_scoring::conversation::{InMemoryMessageStore, KeywordLexicon, Message, MessageStore};
use devis_scoring::features::Enrichment;
use devis_scoring::scoring::ScoringError;
use devis_scoring::{PredictionError, PredictionPipeline};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

const REQUIRED: [&str; 11] = [
    "delai_traitement_devis_hrs",
    "moyenne_montant_commande",
    "nb_produits_deja_achetes",
    "nb_produits_devis",
    "ratio_produits_achetes",
    "taux_conversion",
    "temps_dans_application_min",
    "temps_reponse_messagerie_min",
    "totalCommandes",
    "totalDevis",
    "totalMontantCommandes",
];

struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("devis-scoring-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        Self { dir }
    }

    fn script(&self, body: &str) -> PathBuf {
        let path = self.dir.join("score.sh");
        std::fs::write(&path, body).unwrap();
        path
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

fn config_for(script: &Path, timeout_secs: u64) -> Config {
    Config {
        scoring: ScoringConfig {
            interpreter: Some("sh".to_string()),
            script_path: script.to_path_buf(),
            working_dir: None,
            timeout_secs,
        },
        ..Config::default()
    }
}

fn request() -> Map<String, Value> {
    REQUIRED
        .iter()
        .enumerate()
        .map(|(i, field)| (field.to_string(), json!(i + 1)))
        .collect()
}

#[tokio::test]
async fn test_prediction_from_scoring_script() {
    let workspace = Workspace::new();
    let script = workspace.script(
        r#"echo "INFO: loading model"
echo "model warning" >&2
echo '{"prediction": 85.5, "sentiment": "positive", "negotiation_score": 0.6, "objection_score": 0.1}'
"#,
    );

    let pipeline = PredictionPipeline::from_config(&config_for(&script, 10)).unwrap();
    let outcome = pipeline.predict(request()).await.unwrap();

    assert_eq!(outcome.enrichment, Enrichment::Absent);
    let response = outcome.response;
    assert_eq!(response.prediction, 85.5);
    assert_eq!(response.confidence, 0.8);
    assert_eq!(response.sentiment, "positive");
    assert_eq!(
        response.key_factors,
        vec![
            "strong acceptance potential",
            "client in negotiation",
            "positive sentiment"
        ]
    );
}

#[tokio::test]
async fn test_argument_order_and_verbatim_text() {
    let workspace = Workspace::new();
    let args_file = workspace.path("args.txt");
    let script = workspace.script(&format!(
        r#"for arg in "$@"; do printf '%s\n' "$arg" >> '{}'; done
echo '{{"prediction": 12}}'
"#,
        args_file.display()
    ));

    let text = r#"Prix "final" ? $(id) `uname` ; C'est trop cher & > /dev/null"#;
    let mut request = request();
    request.insert("messages".to_string(), json!(text));
    request.insert("objectionIndicators".to_string(), json!(2));

    let pipeline = PredictionPipeline::from_config(&config_for(&script, 10)).unwrap();
    pipeline.predict(request).await.unwrap();

    let recorded = std::fs::read_to_string(&args_file).unwrap();
    let args: Vec<&str> = recorded.lines().collect();

    let mut expected = Vec::new();
    for (i, field) in REQUIRED.iter().enumerate() {
        expected.push(format!("--{}", field));
        expected.push((i + 1).to_string());
    }
    expected.push("--messages".to_string());
    expected.push(text.to_string());
    expected.push("--objectionIndicators".to_string());
    expected.push("2".to_string());

    assert_eq!(args, expected);
}

#[tokio::test]
async fn test_validation_failure_skips_scoring() {
    let workspace = Workspace::new();
    let marker = workspace.path("ran");
    let script = workspace.script(&format!(
        "touch '{}'\necho '{{\"prediction\": 1}}'\n",
        marker.display()
    ));

    let mut request = request();
    request.remove("totalMontantCommandes");

    let pipeline = PredictionPipeline::from_config(&config_for(&script, 10)).unwrap();
    let err = pipeline.predict(request).await.unwrap_err();

    match err {
        PredictionError::Validation(errors) => {
            assert_eq!(
                errors.fields().collect::<Vec<_>>(),
                vec!["totalMontantCommandes"]
            );
        }
        other => panic!("expected validation error, got {:?}", other),
    }
    assert!(!marker.exists());
}

#[tokio::test]
async fn test_non_zero_exit_keeps_output_server_side() {
    let workspace = Workspace::new();
    let script = workspace.script("echo 'Traceback: model file missing' >&2\nexit 1\n");

    let pipeline = PredictionPipeline::from_config(&config_for(&script, 10)).unwrap();
    let err = pipeline.predict(request()).await.unwrap_err();

    match err {
        PredictionError::Scoring(ScoringError::Execution { exit_code, output }) => {
            assert_eq!(exit_code, Some(1));
            assert!(output.contains("Traceback"));
        }
        other => panic!("expected execution error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unparseable_output_is_format_error() {
    let workspace = Workspace::new();
    let script = workspace.script("echo 'prediction: 85'\n");

    let pipeline = PredictionPipeline::from_config(&config_for(&script, 10)).unwrap();
    let err = pipeline.predict(request()).await.unwrap_err();
    assert!(matches!(
        err,
        PredictionError::Scoring(ScoringError::ResultFormat(_))
    ));
}

#[tokio::test]
async fn test_missing_script_is_configuration_error() {
    let workspace = Workspace::new();
    let pipeline =
        PredictionPipeline::from_config(&config_for(&workspace.path("absent.sh"), 10)).unwrap();

    let err = pipeline.predict(request()).await.unwrap_err();
    assert!(matches!(
        err,
        PredictionError::Scoring(ScoringError::Configuration(_))
    ));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_timeout_kills_scoring_process() {
    let workspace = Workspace::new();
    let pid_file = workspace.path("pid");
    let script = workspace.script(&format!(
        "echo $$ > '{}'\nexec sleep 30\n",
        pid_file.display()
    ));

    let pipeline = PredictionPipeline::from_config(&config_for(&script, 1)).unwrap();

    let start = Instant::now();
    let err = pipeline.predict(request()).await.unwrap_err();
    assert!(start.elapsed() < Duration::from_secs(10));

    match err {
        PredictionError::Scoring(e) => assert!(e.is_timeout()),
        other => panic!("expected timeout, got {:?}", other),
    }

    let pid = std::fs::read_to_string(&pid_file).unwrap();
    assert!(gone(pid.trim()), "scoring process {} still alive", pid.trim());
}

/// Whether `pid` has exited; a zombie awaiting its new parent counts as exited
#[cfg(target_os = "linux")]
fn gone(pid: &str) -> bool {
    for _ in 0..100 {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Err(_) => return true,
            Ok(stat) => {
                let state = stat.rsplit(')').next().and_then(|rest| rest.trim().chars().next());
                if state == Some('Z') {
                    return true;
                }
            }
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_timeout_kills_background_model_workers() {
    let workspace = Workspace::new();
    let pid_file = workspace.path("worker.pid");
    let script = workspace.script(&format!(
        "sleep 30 &\necho $! > '{}'\nwait\n",
        pid_file.display()
    ));

    let pipeline = PredictionPipeline::from_config(&config_for(&script, 1)).unwrap();

    let start = Instant::now();
    let err = pipeline.predict(request()).await.unwrap_err();
    assert!(start.elapsed() < Duration::from_secs(10));
    assert!(matches!(err, PredictionError::Scoring(ref e) if e.is_timeout()));

    let pid = std::fs::read_to_string(&pid_file).unwrap();
    assert!(gone(pid.trim()), "background worker {} still alive", pid.trim());
}

#[tokio::test]
async fn test_conversation_enrichment_reaches_model() {
    let workspace = Workspace::new();
    let args_file = workspace.path("args.txt");
    let script = workspace.script(&format!(
        r#"for arg in "$@"; do printf '%s\n' "$arg" >> '{}'; done
echo '{{"prediction": 64, "detected_keywords": {{"negotiation": ["remise"], "objection": []}}}}'
"#,
        args_file.display()
    ));

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/messages/processed-conversation/42")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "rawText": "Une remise est possible ?",
                "stats": {
                    "messageCount": 1,
                    "wordCount": 5,
                    "avgMessageLength": 25.0,
                    "sentimentScore": 0.0,
                    "negotiationIndicators": 1,
                    "objectionIndicators": 0
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let mut config = config_for(&script, 10);
    config.conversation.service_url = Some(server.url());

    let mut request = request();
    request.insert("devisId".to_string(), json!(42));

    let pipeline = PredictionPipeline::from_config(&config).unwrap();
    let outcome = pipeline.predict(request).await.unwrap();

    mock.assert_async().await;
    assert_eq!(outcome.enrichment.outcome(), "applied");
    assert_eq!(outcome.response.keywords.len(), 1);
    assert_eq!(outcome.response.keywords["negotiation"], vec!["remise"]);

    let recorded = std::fs::read_to_string(&args_file).unwrap();
    let args: Vec<&str> = recorded.lines().collect();
    let tail = &args[args.len() - 10..];
    assert_eq!(
        tail,
        &[
            "--messages",
            "Une remise est possible ?",
            "--messageCount",
            "1",
            "--sentimentScore",
            "0",
            "--negotiationIndicators",
            "1",
            "--objectionIndicators",
            "0"
        ]
    );
}

#[tokio::test]
async fn test_message_service_failure_is_recovered() {
    let workspace = Workspace::new();
    let script = workspace.script("echo '{\"prediction\": 30}'\n");

    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/messages/processed-conversation/7")
        .with_status(503)
        .create_async()
        .await;

    let mut config = config_for(&script, 10);
    config.conversation.service_url = Some(server.url());

    let mut request = request();
    request.insert("devisId".to_string(), json!("7"));

    let pipeline = PredictionPipeline::from_config(&config).unwrap();
    let outcome = pipeline.predict(request).await.unwrap();

    assert!(matches!(outcome.enrichment, Enrichment::Failed(_)));
    assert_eq!(outcome.response.prediction, 30.0);
    assert!(outcome.response.key_factors.is_empty());
}

async fn negotiation_indicators_with(lexicon: KeywordLexicon) -> String {
    let workspace = Workspace::new();
    let args_file = workspace.path("args.txt");
    let script = workspace.script(&format!(
        r#"for arg in "$@"; do printf '%s\n' "$arg" >> '{}'; done
echo '{{"prediction": 50}}'
"#,
        args_file.display()
    ));

    let store = InMemoryMessageStore::new();
    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    store.push(42, Message::new("client", t0, "Any discount on the second pallet?"));
    let store: Arc<dyn MessageStore> = Arc::new(store);

    let mut config = config_for(&script, 10);
    config.conversation.lexicon = lexicon;

    let mut request = request();
    request.insert("devisId".to_string(), json!(42));

    let pipeline = PredictionPipeline::from_config_with_store(&config, store);
    let outcome = pipeline.predict(request).await.unwrap();
    assert_eq!(outcome.enrichment.outcome(), "applied");

    let recorded = std::fs::read_to_string(&args_file).unwrap();
    let args: Vec<&str> = recorded.lines().collect();
    let flag = args
        .iter()
        .position(|arg| *arg == "--negotiationIndicators")
        .expect("negotiation indicators passed to the model");
    args[flag + 1].to_string()
}

#[tokio::test]
async fn test_configured_lexicon_drives_store_enrichment() {
    assert_eq!(negotiation_indicators_with(KeywordLexicon::default()).await, "0");

    let lexicon = KeywordLexicon {
        negotiation: vec!["discount".to_string()],
        ..KeywordLexicon::default()
    };
    assert_eq!(negotiation_indicators_with(lexicon).await, "1");
}
