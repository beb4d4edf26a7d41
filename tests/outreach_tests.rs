mod common;

use common::ScriptedModel;
use leadscout::entities::{Candidate, WebPresence};
use leadscout::error::ProviderError;
use leadscout::gemini::TextModel;
use leadscout::outreach::{
    build_batch_prompt, choose_model, fallback_pitch, is_rate_limited, parse_batch_reply, ModelSelector,
    PitchGenerator,
};
use leadscout::policy::Policy;
use std::sync::Arc;
use std::time::Duration;

fn candidate(name: &str, status: WebPresence, url: Option<&str>) -> Candidate {
    Candidate {
        name: name.to_string(),
        address: Some("Via Torino 5, Milano".to_string()),
        phone: Some("+39 02 5555".to_string()),
        rating: Some(4.5),
        reviews: Some(120),
        status,
        url: url.map(str::to_string),
    }
}

fn batch() -> Vec<Candidate> {
    vec![
        candidate("Trattoria Da Mario", WebPresence::NoWebsite, None),
        candidate("Pizzeria Bella", WebPresence::DirectoryOnly, Some("https://www.facebook.com/pizzeriabella")),
        candidate("Osteria Nuova", WebPresence::NoWebsite, None),
    ]
}

fn generator(model: Arc<ScriptedModel>) -> PitchGenerator {
    let backend: Arc<dyn TextModel> = model;
    PitchGenerator::new(Some(backend), None, Arc::new(Policy::default()))
}

#[test]
fn test_fallback_pitch_is_deterministic() {
    let templates = Policy::default().fallback;
    let first = fallback_pitch(&templates, "Pizzeria Bella", "Milano", "Ristorante", WebPresence::DirectoryOnly, Some("https://www.facebook.com/pizzeriabella"));
    let second = fallback_pitch(&templates, "Pizzeria Bella", "Milano", "Ristorante", WebPresence::DirectoryOnly, Some("https://www.facebook.com/pizzeriabella"));
    assert_eq!(first, second);
    assert!(first.starts_with("Buongiorno Pizzeria Bella"));
    assert!(first.contains("facebook.com"));
    assert!(first.contains("Milano"));
    assert!(!first.contains('{'));
}

#[test]
fn test_fallback_pitch_depends_on_status() {
    let templates = Policy::default().fallback;
    let none = fallback_pitch(&templates, "Bar Sport", "Roma", "bar", WebPresence::NoWebsite, None);
    let own = fallback_pitch(&templates, "Bar Sport", "Roma", "bar", WebPresence::HasWebsite, Some("barsport.it"));
    assert_ne!(none, own);
    assert!(own.contains("barsport.it"));
    assert!(none.contains("non ha ancora un sito web"));
}

#[test]
fn test_parse_batch_reply_direct_json() {
    let reply = r#"[{"index": 0, "pitch": "Ciao A"}, {"index": 1, "pitch": "Ciao B"}]"#;
    assert_eq!(
        parse_batch_reply(reply, 2),
        vec![Some("Ciao A".to_string()), Some("Ciao B".to_string())]
    );
}

#[test]
fn test_parse_batch_reply_extracts_array_from_prose() {
    let reply = "Ecco i messaggi:\n```json\n[{\"index\": \"1\", \"pitch\": \"Per B\"},\n {\"id\": 0, \"message\": \"Per A\"}]\n```\nBuon lavoro!";
    assert_eq!(
        parse_batch_reply(reply, 2),
        vec![Some("Per A".to_string()), Some("Per B".to_string())]
    );
}

#[test]
fn test_parse_batch_reply_repairs_per_item() {
    let reply = r#"[
        {"index": 0, "pitch": "Buono"},
        {"index": 7, "pitch": "Fuori range"},
        {"index": 1, "pitch": "   "},
        {"pitch": "Senza indice"},
        "non un oggetto",
        {"index": 0, "pitch": "Duplicato"}
    ]"#;
    assert_eq!(parse_batch_reply(reply, 3), vec![Some("Buono".to_string()), None, None]);
}

#[test]
fn test_parse_batch_reply_unparsable() {
    assert_eq!(parse_batch_reply("Mi dispiace, non posso aiutarti.", 2), vec![None, None]);
    assert_eq!(parse_batch_reply("[{index: 0, pitch: broken}]", 1), vec![None]);
    assert_eq!(parse_batch_reply(r#"{"index": 0, "pitch": "oggetto"}"#, 1), vec![None]);
}

#[test]
fn test_rate_limit_detection() {
    assert!(is_rate_limited("HTTP 429: Too Many Requests"));
    assert!(is_rate_limited("RESOURCE_EXHAUSTED: Quota exceeded for metric"));
    assert!(is_rate_limited("Rate limit reached"));
    assert!(!is_rate_limited("HTTP 500: internal error"));
}

#[test]
fn test_choose_model_order() {
    let available: Vec<String> = ["gemini-pro", "gemini-1.5-flash", "text-bison", "gemini-exp-flash-thinking"]
        .iter()
        .map(|m| m.to_string())
        .collect();
    let preferred = vec!["gemini-2.0-flash".to_string(), "gemini-1.5-flash".to_string()];

    assert_eq!(
        choose_model(&available, Some("models/text-bison"), &preferred, "flash"),
        Some("text-bison".to_string())
    );
    assert_eq!(
        choose_model(&available, Some("not-listed"), &preferred, "flash"),
        Some("gemini-1.5-flash".to_string())
    );

    let no_preferred = vec!["gemini-ultra".to_string()];
    let listed: Vec<String> = vec!["text-bison".to_string(), "gemini-exp-flash".to_string()];
    assert_eq!(
        choose_model(&listed, None, &no_preferred, "flash"),
        Some("gemini-exp-flash".to_string())
    );
    assert_eq!(
        choose_model(&listed, None, &no_preferred, "nothing-matches"),
        Some("text-bison".to_string())
    );
    assert_eq!(choose_model(&[], None, &preferred, "flash"), None);
}

#[test]
fn test_batch_prompt_lists_every_candidate() {
    let policy = Policy::default();
    let prompt = build_batch_prompt(&policy.batch_prompt, &batch(), "Ristorante", "Milano");
    assert!(prompt.contains("0. Trattoria Da Mario | status: No Website"));
    assert!(prompt.contains("1. Pizzeria Bella | status: Directory Only"));
    assert!(prompt.contains("site: https://www.facebook.com/pizzeriabella"));
    assert!(prompt.contains("2. Osteria Nuova"));
    assert!(prompt.contains("\"Ristorante\" in Milano"));
    assert!(!prompt.contains("{businesses}"));
}

#[tokio::test]
async fn test_pitch_batch_uses_model_reply_and_repairs_gaps() {
    let model = Arc::new(ScriptedModel::replying(
        &["gemini-1.5-flash"],
        r#"[{"index": 0, "pitch": "Messaggio AI per Mario"}, {"index": 2, "pitch": "Messaggio AI per Osteria"}]"#,
    ));
    let pitcher = generator(model.clone());

    let pitches = pitcher.pitch_batch(&batch(), "Ristorante", "Milano", true).await;

    assert_eq!(pitches.len(), 3);
    assert_eq!(pitches[0], "Messaggio AI per Mario");
    assert!(pitches[1].starts_with("Buongiorno Pizzeria Bella"));
    assert_eq!(pitches[2], "Messaggio AI per Osteria");
    assert_eq!(model.generate_count(), 1, "one call per batch");
    assert_eq!(model.prompts.lock().unwrap()[0].0, "gemini-1.5-flash");
}

#[tokio::test]
async fn test_pitch_batch_rate_limited_falls_back_for_all() {
    let model = Arc::new(ScriptedModel::new(&["gemini-1.5-flash"], |_| {
        Err(ProviderError::Status {
            status: 429,
            body: "RESOURCE_EXHAUSTED".to_string(),
        })
    }));
    let pitcher = generator(model.clone());
    let candidates = batch();

    let pitches = pitcher.pitch_batch(&candidates, "Ristorante", "Milano", true).await;

    let expected: Vec<String> = candidates
        .iter()
        .map(|c| pitcher.fallback_for(c, "Ristorante", "Milano"))
        .collect();
    assert_eq!(pitches, expected);
    assert_eq!(model.generate_count(), 1, "no retry after a rate limit");
}

#[tokio::test]
async fn test_pitch_batch_garbage_reply_falls_back_for_all() {
    let model = Arc::new(ScriptedModel::replying(&["gemini-1.5-flash"], "Non so rispondere"));
    let pitcher = generator(model);
    let pitches = pitcher.pitch_batch(&batch(), "Ristorante", "Milano", true).await;
    assert_eq!(pitches.len(), 3);
    assert!(pitches.iter().all(|p| p.starts_with("Buongiorno")));
}

#[tokio::test]
async fn test_pitch_batch_without_ai_skips_model() {
    let model = Arc::new(ScriptedModel::replying(&["gemini-1.5-flash"], "[]"));
    let pitcher = generator(model.clone());

    let pitches = pitcher.pitch_batch(&batch(), "Ristorante", "Milano", false).await;

    assert_eq!(pitches.len(), 3);
    assert_eq!(model.list_count(), 0);
    assert_eq!(model.generate_count(), 0);
}

#[tokio::test]
async fn test_templates_only_generator() {
    let pitcher = PitchGenerator::templates_only(Arc::new(Policy::default()));
    assert!(!pitcher.has_backend());
    let pitches = pitcher.pitch_batch(&batch(), "Ristorante", "Milano", true).await;
    assert!(pitches.iter().all(|p| p.starts_with("Buongiorno")));
    assert!(pitcher.pitch_batch(&[], "Ristorante", "Milano", true).await.is_empty());
}

#[tokio::test]
async fn test_model_selection_is_cached() {
    let model = Arc::new(ScriptedModel::replying(&["gemini-1.5-flash"], "[]"));
    let pitcher = generator(model.clone());

    pitcher.pitch_batch(&batch(), "Ristorante", "Milano", true).await;
    pitcher.pitch_batch(&batch(), "Ristorante", "Milano", true).await;

    assert_eq!(model.list_count(), 1);
    assert_eq!(model.generate_count(), 2);
    assert_eq!(pitcher.selector().current().await, Some("gemini-1.5-flash".to_string()));
}

#[tokio::test]
async fn test_concurrent_first_requests_share_one_selection() {
    let model = Arc::new(
        ScriptedModel::replying(&["gemini-1.5-flash"], "[]").with_list_delay(Duration::from_millis(50)),
    );
    let selector = Arc::new(ModelSelector::new(None, vec!["gemini-1.5-flash".to_string()], "flash".to_string()));

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let selector = selector.clone();
            let model = model.clone();
            tokio::spawn(async move { selector.resolve(model.as_ref()).await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap(), Some("gemini-1.5-flash".to_string()));
    }
    assert_eq!(model.list_count(), 1);
}

#[tokio::test]
async fn test_failed_selection_retries_on_next_call() {
    let model = Arc::new(ScriptedModel::replying(&["gemini-1.5-flash"], "[]").unlistable());
    let pitcher = generator(model.clone());

    let pitches = pitcher.pitch_batch(&batch(), "Ristorante", "Milano", true).await;
    assert!(pitches.iter().all(|p| p.starts_with("Buongiorno")));
    pitcher.pitch_batch(&batch(), "Ristorante", "Milano", true).await;

    assert_eq!(model.list_count(), 2);
    assert_eq!(model.generate_count(), 0);
    assert_eq!(pitcher.selector().current().await, None);
}

#[tokio::test]
async fn test_empty_model_list_leaves_generator_unavailable() {
    let model = Arc::new(ScriptedModel::replying(&[], "[]"));
    let pitcher = generator(model.clone());
    let pitches = pitcher.pitch_batch(&batch(), "Ristorante", "Milano", true).await;
    assert_eq!(pitches.len(), 3);
    assert_eq!(model.generate_count(), 0);
}

#[tokio::test]
async fn test_empty_model_list_reports_unavailable() {
    let model = ScriptedModel::replying(&[], "[]");
    let selector = ModelSelector::new(None, vec!["gemini-1.5-flash".to_string()], "flash".to_string());

    let err = selector.try_resolve(&model).await.unwrap_err();

    assert!(matches!(err, ProviderError::Unavailable(_)));
    assert_eq!(selector.current().await, None);
}

#[tokio::test]
async fn test_listing_failure_is_passed_through() {
    let model = ScriptedModel::replying(&["gemini-1.5-flash"], "[]").unlistable();
    let selector = ModelSelector::new(None, Vec::new(), "flash".to_string());

    let err = selector.try_resolve(&model).await.unwrap_err();

    assert!(matches!(err, ProviderError::Transport(_)));
    assert_eq!(model.list_count(), 1);
}
