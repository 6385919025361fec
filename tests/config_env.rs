// tests/config_env.rs
use news_verify::config::AppConfig;
use std::{env, fs};

fn clear_env() {
    for k in [
        "NEWS_VERIFY_CONFIG_PATH",
        "OCR_ENDPOINT",
        "CLASSIFIER_ENDPOINT",
        "CREDIBILITY_DATASET_PATH",
    ] {
        env::remove_var(k);
    }
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // Isolate CWD so the repo's own config/ is not picked up
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    clear_env();

    // 1) Nothing at all -> built-in defaults
    let cfg = AppConfig::load_default().unwrap();
    assert_eq!(cfg.ocr.endpoint, "http://127.0.0.1:8884");
    assert!(cfg.credibility.dataset_path.is_none());

    // 2) Fallback TOML in ./config/
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(
        cfg_dir.join("app.toml"),
        "[ocr]\nendpoint = \"http://ocr.local:9000\"\n[credibility.policy]\nmin_articles = 0\n",
    )
    .unwrap();
    let cfg = AppConfig::load_default().unwrap();
    assert_eq!(cfg.ocr.endpoint, "http://ocr.local:9000");
    assert_eq!(cfg.credibility.policy.min_articles, 1, "zero is lifted to one");

    // 3) Explicit path wins, endpoint env overrides wins over the file
    let p_env = tmp.path().join("custom.toml");
    fs::write(&p_env, "[classifier]\nenabled = false\n").unwrap();
    env::set_var("NEWS_VERIFY_CONFIG_PATH", p_env.display().to_string());
    env::set_var("CLASSIFIER_ENDPOINT", "http://clf:8000/predict");
    env::set_var("CREDIBILITY_DATASET_PATH", "data/news.csv");
    let cfg = AppConfig::load_default().unwrap();
    assert_eq!(cfg.ocr.endpoint, "http://127.0.0.1:8884");
    assert!(cfg.classifier.enabled);
    assert_eq!(cfg.classifier.endpoint, "http://clf:8000/predict");
    assert_eq!(
        cfg.credibility.dataset_path.as_deref(),
        Some(std::path::Path::new("data/news.csv"))
    );

    // 4) Explicit path that does not exist is an error
    env::set_var("NEWS_VERIFY_CONFIG_PATH", tmp.path().join("missing.toml"));
    assert!(AppConfig::load_default().is_err());

    clear_env();
    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[tokio::test]
async fn broken_startup_dataset_still_boots() {
    clear_env();
    let tmp = tempfile::tempdir().unwrap();
    let bad = tmp.path().join("bad.csv");
    fs::write(&bad, "headline\nnothing useful\n").unwrap();
    env::set_var("CREDIBILITY_DATASET_PATH", bad.display().to_string());
    env::set_var("OCR_TEST_MODE", "mock");

    let cfg = AppConfig::load_default().unwrap();
    let state = news_verify::AppState::from_config(&cfg).await;
    assert!(state.is_ok());

    clear_env();
    env::remove_var("OCR_TEST_MODE");
}
