//! Doctor command - verify system requirements and configuration.

use crate::cli::Output;
use crate::config::{EmbeddingProvider, Settings, VectorStoreProvider};
use console::style;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self::with_status(name, CheckStatus::Ok, message, None)
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self::with_status(name, CheckStatus::Warning, message, Some(hint))
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self::with_status(name, CheckStatus::Error, message, Some(hint))
    }

    fn with_status(name: &str, status: CheckStatus, message: &str, hint: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.to_string(),
            hint: hint.map(str::to_string),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Print a titled group of checks and fold them into `all`.
fn section(title: &str, checks: Vec<CheckResult>, all: &mut Vec<CheckResult>) {
    println!("{}", style(title).bold());
    for check in &checks {
        check.print();
    }
    println!();
    all.extend(checks);
}

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings, config_path: Option<&PathBuf>) -> anyhow::Result<()> {
    Output::header("vidscribe doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    section(
        "External Tools",
        vec![
            check_tool("ffmpeg", &["-version"], install_hint_ffmpeg()),
            check_tool("ffprobe", &["-version"], install_hint_ffmpeg()),
        ],
        &mut checks,
    );

    section("Backends", check_backends(settings).await, &mut checks);
    section("Directories", check_directories(settings), &mut checks);

    let config_path = config_path.cloned().unwrap_or_else(Settings::default_config_path);
    section(
        "Configuration",
        vec![check_config_file(&config_path), check_settings(settings)],
        &mut checks,
    );

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!("{} error(s) found. Please fix them before using vidscribe.", errors));
        anyhow::bail!("{} doctor check(s) failed", errors);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! vidscribe is ready to use.");
    }

    Ok(())
}

/// Check if an external tool is available.
fn check_tool(name: &str, args: &[&str], hint: &str) -> CheckResult {
    match Command::new(name).args(args).output() {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let version = stdout.lines().next().unwrap_or("installed").trim();
            CheckResult::ok(name, &truncate(version, 50))
        }
        Ok(_) => CheckResult::error(name, "installed but not working", hint),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => CheckResult::error(name, "not found", hint),
        Err(e) => CheckResult::error(name, &format!("error: {}", e), hint),
    }
}

/// Check the transcription and embedding backends.
async fn check_backends(settings: &Settings) -> Vec<CheckResult> {
    // Whisper always goes through the OpenAI API
    let mut results = vec![check_openai_api_key(std::env::var("OPENAI_API_KEY").ok())];

    match settings.embedding.provider {
        EmbeddingProvider::OpenAI => results.push(CheckResult::ok(
            "Embeddings",
            &format!("openai ({}, {} dims)", settings.embedding.model, settings.embedding.dimensions),
        )),
        EmbeddingProvider::Ollama => results.push(check_ollama(&settings.embedding.ollama_url).await),
    }

    results
}

/// Check if OpenAI API key is configured.
fn check_openai_api_key(key: Option<String>) -> CheckResult {
    const NAME: &str = "OPENAI_API_KEY";
    const HINT: &str = "Set with: export OPENAI_API_KEY='sk-...'";

    match key {
        Some(key) if key.starts_with("sk-") && key.len() > 20 => {
            let masked = format!("{}...{}", &key[..7], &key[key.len() - 4..]);
            CheckResult::ok(NAME, &format!("configured ({})", masked))
        }
        Some(key) if key.is_empty() => CheckResult::error(NAME, "empty", HINT),
        Some(_) => CheckResult::warning(
            NAME,
            "set but format looks unusual",
            "Expected format: sk-... (OpenAI API key)",
        ),
        None => CheckResult::error(NAME, "not set", HINT),
    }
}

/// Check that an Ollama server answers on its tags endpoint.
async fn check_ollama(base_url: &str) -> CheckResult {
    let url = format!("{}/api/tags", base_url.trim_end_matches('/'));
    let client = match reqwest::Client::builder().timeout(Duration::from_secs(3)).build() {
        Ok(client) => client,
        Err(e) => return CheckResult::error("Ollama", &format!("error: {}", e), "Check your TLS setup"),
    };

    match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => CheckResult::ok("Ollama", &format!("reachable at {}", base_url)),
        Ok(resp) => CheckResult::error(
            "Ollama",
            &format!("{} answered {}", base_url, resp.status()),
            "Check embedding.ollama_url",
        ),
        Err(_) => CheckResult::error(
            "Ollama",
            &format!("not reachable at {}", base_url),
            "Start it with: ollama serve",
        ),
    }
}

/// Check data directories.
fn check_directories(settings: &Settings) -> Vec<CheckResult> {
    let mut results = vec![
        check_dir("Data directory", &settings.data_dir()),
        check_dir("Uploads directory", &settings.uploads_dir()),
        check_dir("Temp directory", &settings.temp_dir()),
    ];

    if settings.vector_store.provider == VectorStoreProvider::Memory {
        results.push(CheckResult::warning(
            "Database",
            "in-memory store",
            "Indexed transcripts are lost on exit; set vector_store.provider = \"sqlite\" to keep them",
        ));
        return results;
    }

    let db_path = settings.sqlite_path();
    if db_path.exists() {
        let size = std::fs::metadata(&db_path)
            .map(|m| format_size(m.len()))
            .unwrap_or_else(|_| "unknown size".to_string());
        results.push(CheckResult::ok("Database", &format!("{} ({})", db_path.display(), size)));
    } else {
        results.push(CheckResult::warning(
            "Database",
            &format!("{} (not created yet)", db_path.display()),
            "Database will be created on first transcription",
        ));
    }

    results
}

fn check_dir(name: &str, path: &Path) -> CheckResult {
    if path.is_dir() {
        CheckResult::ok(name, &path.display().to_string())
    } else if path.exists() {
        CheckResult::error(name, &format!("{} is not a directory", path.display()), "Remove it or change the setting")
    } else {
        CheckResult::warning(
            name,
            &format!("{} (will be created)", path.display()),
            "Directory will be created on first use",
        )
    }
}

/// Check if config file exists.
fn check_config_file(path: &Path) -> CheckResult {
    if path.exists() {
        CheckResult::ok("Config file", &path.display().to_string())
    } else {
        CheckResult::warning("Config file", "using defaults", "Create with: vidscribe config init")
    }
}

fn check_settings(settings: &Settings) -> CheckResult {
    match settings.validate() {
        Ok(()) => CheckResult::ok("Settings", "valid"),
        Err(e) => CheckResult::error("Settings", &e.to_string(), "Fix the value in your config file"),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Platform-specific install hint for ffmpeg.
fn install_hint_ffmpeg() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install ffmpeg"
    } else if cfg!(target_os = "linux") {
        "Install with: sudo apt install ffmpeg (or your package manager)"
    } else {
        "Install from: https://ffmpeg.org/download.html"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_check_result_error() {
        let result = CheckResult::error("test", "failed", "fix it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.hint, Some("fix it".to_string()));
    }

    #[test]
    fn test_api_key_checks() {
        assert_eq!(check_openai_api_key(None).status, CheckStatus::Error);
        assert_eq!(check_openai_api_key(Some(String::new())).status, CheckStatus::Error);
        assert_eq!(check_openai_api_key(Some("abc".into())).status, CheckStatus::Warning);

        let ok = check_openai_api_key(Some("sk-abcdefghijklmnopqrstuvwxyz".into()));
        assert_eq!(ok.status, CheckStatus::Ok);
        assert!(!ok.message.contains("ghijklmnop"));
    }

    #[test]
    fn test_missing_tool_is_error() {
        let result = check_tool("vidscribe-no-such-tool", &["-version"], "install it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.message, "not found");
    }

    #[test]
    fn test_check_dir() {
        let dir = TempDir::new().unwrap();
        assert_eq!(check_dir("d", dir.path()).status, CheckStatus::Ok);
        assert_eq!(check_dir("d", &dir.path().join("later")).status, CheckStatus::Warning);

        let file = dir.path().join("file");
        std::fs::write(&file, b"x").unwrap();
        assert_eq!(check_dir("d", &file).status, CheckStatus::Error);
    }

    #[test]
    fn test_invalid_settings_are_reported() {
        let mut settings = Settings::default();
        settings.embedding.dimensions = 0;
        assert_eq!(check_settings(&settings).status, CheckStatus::Error);
        assert_eq!(check_settings(&Settings::default()).status, CheckStatus::Ok);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 50), "short");
        assert_eq!(truncate("åäöåäö", 3), "åäö...");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.0 GB");
    }
}
