//! エラーログファイルと、ログに残す環境情報のマスク

use std::collections::HashMap;
use std::env;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use chrono::{Local, Utc};
use log::warn;

/// エラーログの出力先
/// 優先順位: 環境変数 `CGIWRAP_ERROR_LOG` -> `cgiwrap_error.log`
pub fn error_log_path() -> PathBuf {
    env::var("CGIWRAP_ERROR_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("cgiwrap_error.log"))
}

/// エラー内容を指定ファイルに追記する
pub fn append_error_log(path: &Path, message: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let rule = "=".repeat(80);
    writeln!(file, "{}", rule)?;
    writeln!(file, "CGIWRAP CGI ERROR")?;
    writeln!(file, "Timestamp (UTC): {}", Utc::now().format("%Y-%m-%d %H:%M:%S%.3f UTC"))?;
    writeln!(file, "Timestamp (Local): {}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f %Z"))?;
    writeln!(file, "Process ID: {}", std::process::id())?;
    writeln!(file, "{}", "-".repeat(80))?;
    writeln!(file, "{}", message)?;
    writeln!(file, "{}", rule)?;
    writeln!(file)
}

/// エラー内容を既定のログファイルに追記する（失敗してもログに出すだけ）
pub fn log_error_to_file(message: &str) {
    let path = error_log_path();
    if let Err(e) = append_error_log(&path, message) {
        warn!("Could not append to error log {}: {}", path.display(), e);
    }
}

/// panic時に記録するCGI環境の詳細（センシティブ値はマスク）
pub fn gather_cgi_panic_context(cgi_env: &HashMap<String, String>) -> String {
    let get = |key: &str| cgi_env.get(key).map(String::as_str);
    let mut lines = vec!["CGI panic context:".to_string()];

    for key in [
        "REQUEST_METHOD",
        "PATH_INFO",
        "QUERY_STRING",
        "CONTENT_TYPE",
        "CONTENT_LENGTH",
        "SERVER_SOFTWARE",
        "SERVER_NAME",
        "SERVER_PORT",
        "REMOTE_ADDR",
    ] {
        if let Some(val) = get(key) {
            lines.push(format!("  {}={}", key, redact_value_for_log(key, val)));
        }
    }

    lines.push("  HTTP headers:".to_string());
    let mut headers: Vec<(&String, &String)> = cgi_env
        .iter()
        .filter(|(k, _)| k.starts_with("HTTP_"))
        .collect();
    headers.sort();
    if headers.is_empty() {
        lines.push("    (none)".to_string());
    }
    for (key, val) in headers {
        lines.push(format!("    {}={}", key, redact_value_for_log(key, val)));
    }

    lines.join("\n")
}

pub fn redact_value_for_log(key: &str, value: &str) -> String {
    let key_l = key.to_ascii_lowercase();
    if key_l == "query_string" {
        return redact_query_string(value);
    }
    if is_sensitive_key_like(&key_l) {
        return "***redacted***".to_string();
    }
    // 長すぎる値は切り詰める（文字境界を守る）
    if value.chars().count() > 200 {
        let head: String = value.chars().take(200).collect();
        format!("{}...[truncated]", head)
    } else {
        value.to_string()
    }
}

pub fn is_sensitive_key_like(lower_key: &str) -> bool {
    const PATTERNS: &[&str] = &[
        "authorization",
        "cookie",
        "token",
        "secret",
        "password",
        "pass",
        "api-key",
        "api_key",
        "apikey",
        "jwt",
        "auth",
        "session",
        "csrf",
        "signature",
        "private",
        "key",
        "credential",
        "bearer",
    ];
    PATTERNS.iter().any(|p| lower_key.contains(p))
}

pub fn redact_query_string(qs: &str) -> String {
    qs.split('&')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut it = part.splitn(2, '=');
            let k = it.next().unwrap_or("");
            let v = it.next().unwrap_or("");
            if is_sensitive_key_like(&k.to_ascii_lowercase()) {
                format!("{}=***redacted***", k)
            } else {
                format!("{}={}", k, v)
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}
