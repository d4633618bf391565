//! ホスト側のリクエスト・レスポンス表現

use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use flate2::read::GzDecoder;
use log::{debug, warn};
use crate::error::Error;
use super::traits::ResponseSink;

/// HTTPメソッド
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    HEAD,
    OPTIONS,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::GET => write!(f, "GET"),
            Method::POST => write!(f, "POST"),
            Method::PUT => write!(f, "PUT"),
            Method::DELETE => write!(f, "DELETE"),
            Method::PATCH => write!(f, "PATCH"),
            Method::HEAD => write!(f, "HEAD"),
            Method::OPTIONS => write!(f, "OPTIONS"),
        }
    }
}

impl Method {
    /// 文字列からMethodに変換
    pub fn from_str(method: &str) -> Option<Self> {
        match method.to_uppercase().as_str() {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            "PATCH" => Some(Method::PATCH),
            "HEAD" => Some(Method::HEAD),
            "OPTIONS" => Some(Method::OPTIONS),
            _ => None,
        }
    }
}

/// ホストが解析済みのリクエスト
///
/// `params` はCGI環境変数と同じキー（`REQUEST_METHOD`, `PATH_INFO`,
/// `HTTP_*` 等）を持つ。レガシーコードからは `env_table` として見える。
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTPメソッド
    pub method: Method,
    /// リクエストパス
    pub path: String,
    /// CGI環境
    pub params: HashMap<String, String>,
    /// リクエストボディ
    pub body: Vec<u8>,
}

impl Request {
    /// 新しいリクエストを作成
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        let mut params = HashMap::new();
        params.insert("REQUEST_METHOD".to_string(), method.to_string());
        params.insert("PATH_INFO".to_string(), path.clone());
        Self {
            method,
            path,
            params,
            body: Vec::new(),
        }
    }

    /// CGI環境変数の組からリクエストを構築する
    pub fn from_env_pairs<I, K, V>(pairs: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let params: HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let method_str = params.get("REQUEST_METHOD").ok_or_else(|| {
            Error::InvalidRequestBody("REQUEST_METHOD environment variable not set".to_string())
        })?;
        let method = Method::from_str(method_str).ok_or_else(|| {
            Error::InvalidRequestBody(format!("Invalid HTTP method: {}", method_str))
        })?;
        let path = params
            .get("PATH_INFO")
            .filter(|p| !p.is_empty())
            .cloned()
            .unwrap_or_else(|| "/".to_string());

        Ok(Self {
            method,
            path,
            params,
            body: Vec::new(),
        })
    }

    /// CGI環境変数を追加
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// ボディを追加
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// CGI環境変数を取得
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// `Content-Encoding: gzip` のボディを解凍する
    ///
    /// 解凍後は `CONTENT_LENGTH` を実サイズに更新し、`HTTP_CONTENT_ENCODING` を取り除く。
    pub fn decompress_gzip_body(&mut self) -> Result<(), Error> {
        let is_gzip = self
            .param("HTTP_CONTENT_ENCODING")
            .map(|v| v.trim().eq_ignore_ascii_case("gzip"))
            .unwrap_or(false);
        if !is_gzip || self.body.is_empty() {
            return Ok(());
        }

        let max = super::utils::get_max_body_size();
        let mut decoded = Vec::new();
        // 上限+1バイトまで読み、展開爆弾を検出する
        GzDecoder::new(self.body.as_slice())
            .take(max as u64 + 1)
            .read_to_end(&mut decoded)
            .map_err(|e| Error::InvalidRequestBody(format!("Failed to decompress gzip body: {}", e)))?;
        if decoded.len() > max {
            return Err(Error::PayloadTooLarge(format!(
                "Decompressed body exceeds maximum allowed size {} bytes",
                max
            )));
        }

        debug!("Decompressed gzip body: {} -> {} bytes", self.body.len(), decoded.len());
        self.params.remove("HTTP_CONTENT_ENCODING");
        self.params.insert("CONTENT_LENGTH".to_string(), decoded.len().to_string());
        self.body = decoded;
        Ok(())
    }
}

/// 重複を許すヘッダー名（それ以外は最初の書き込みが優先される）
const ALLOWED_DUPLICATES: &[&str] = &["Set-Cookie", "Set-Cookie2", "Warning", "WWW-Authenticate"];

/// 送出用の順序付きヘッダーコレクション（同名ヘッダーの繰り返しを保持）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    entries: Vec<(String, String)>,
}

impl ResponseHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// ヘッダーを書き込む
    ///
    /// 既に同名ヘッダーがある場合、重複許可ヘッダー以外は無視して `false` を返す。
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        let duplicate_ok = ALLOWED_DUPLICATES.iter().any(|d| d.eq_ignore_ascii_case(&name));
        if !duplicate_ok && self.contains(&name) {
            debug!("Ignoring repeated header: {}", name);
            return false;
        }
        self.entries.push((name, value.into()));
        true
    }

    /// 最初に一致した値（名前は大文字小文字を区別しない）
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// 一致した全ての値を書き込み順で返す
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// 同名ヘッダーを全て取り除く
    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// ホストのHTTPレスポンス（メモリ上のレスポンスシンク）
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTPステータスコード
    pub status: u16,
    /// HTTPヘッダー
    pub headers: ResponseHeaders,
    /// レスポンスボディ
    pub body: Vec<u8>,
    started: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self::new(200)
    }
}

impl Response {
    /// 新しいレスポンスを作成
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: ResponseHeaders::new(),
            body: Vec::new(),
            started: false,
        }
    }

    /// ヘッダーを追加
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// ボディを設定
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// `start` が呼ばれたかどうか
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// 理由句を取得
    pub fn reason_phrase(&self) -> &'static str {
        http::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown")
    }

    /// Error型から固定メッセージのレスポンスを生成
    pub fn from_error(error: &Error) -> Self {
        let res = Response::new(error.status_code());
        let message = res.reason_phrase();
        res.with_header("Content-Type", "text/plain")
            .with_body(message.as_bytes().to_vec())
    }
}

impl ResponseSink for Response {
    fn start<F>(&mut self, status: u16, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut ResponseHeaders, &mut dyn Write) -> Result<(), Error>,
    {
        if self.started {
            warn!("Response started more than once (status {} -> {})", self.status, status);
        }
        self.status = status;
        self.started = true;
        f(&mut self.headers, &mut self.body)
    }

    fn body_writer(&mut self) -> &mut dyn Write {
        &mut self.body
    }
}
