//! レガシーCGIインターフェースのアダプタ本体

use std::cell::OnceCell;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use chrono::Utc;
use log::{debug, warn};

use crate::common::{
    rfc1123_date, BodyProducer, Cgi, Cookie, LegacyHandler, Request, Response, ResponseHeaders,
    ResponseSink,
};
use crate::error::Error;
use super::head::HeaderSet;
use super::options::{HeaderOptions, OptionValue};

/// `header` のマップ形式で特別扱いされ、蓄積ヘッダーには残らないキー
pub const REMOVED_KEYS: [&str; 9] = [
    "nph", "status", "server", "connection", "type",
    "charset", "length", "language", "expires",
];

/// ステータス未指定時の値
const DEFAULT_STATUS: &str = "200";
const DEFAULT_CONTENT_TYPE: &str = "text/html";

/// ホストのリクエスト・レスポンスをレガシーCGIインターフェースで包むアダプタ
///
/// 1リクエストにつき1インスタンス。ヘッダーは `out` まで蓄積され、
/// ステータス・ヘッダー・ボディはレスポンスシンクへ一度だけ送出される。
pub struct CgiWrapper<'r, S: ResponseSink> {
    request: Request,
    response: &'r mut S,
    args: Vec<String>,
    input: Cursor<Vec<u8>>,
    head: HeaderSet,
    status: OnceCell<String>,
    output_cookies: Vec<Cookie>,
    out_called: bool,
}

impl<'r, S: ResponseSink> CgiWrapper<'r, S> {
    /// リクエストとレスポンスシンクからアダプタを作成する
    ///
    /// リクエストボディは `stdinput` 側へ移される。
    pub fn new(mut request: Request, response: &'r mut S) -> Self {
        let input = Cursor::new(std::mem::take(&mut request.body));
        Self {
            request,
            response,
            args: Vec::new(),
            input,
            head: HeaderSet::new(),
            status: OnceCell::new(),
            output_cookies: Vec::new(),
            out_called: false,
        }
    }

    /// 旧来のCGI生成時に渡されていた追加引数を設定
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// 現在の蓄積ヘッダー
    pub fn headers(&self) -> &HeaderSet {
        &self.head
    }

    /// 送出済みかどうか
    pub fn is_finalized(&self) -> bool {
        self.out_called
    }

    /// 送出するステータスコード（数値の文字列）
    ///
    /// 最初の呼び出しで蓄積ヘッダーの `Status` から計算し、以後はその値を返す。
    /// 先頭トークンが有効なステータスコードでなければ `"200"`。
    pub fn status(&self) -> &str {
        self.status.get_or_init(|| {
            let Some(stat) = self.head.get_str("Status") else {
                return DEFAULT_STATUS.to_string();
            };
            match stat.split_whitespace().next() {
                Some(code) if http::StatusCode::from_bytes(code.as_bytes()).is_ok() => code.to_string(),
                _ => {
                    warn!("Malformed Status header {:?}; falling back to {}", stat, DEFAULT_STATUS);
                    DEFAULT_STATUS.to_string()
                }
            }
        })
    }

    /// `status` を数値として返す
    pub fn status_code(&self) -> u16 {
        self.status().parse().unwrap_or(200)
    }

    /// 蓄積された `cookie` と送出待ちクッキーを `Set-Cookie` として書き出す
    pub fn send_cookies(&mut self, to: &mut ResponseHeaders) {
        self.head.send_cookies(&mut self.output_cookies, to);
    }

    /// `type` / `charset` 指定からContent-Typeを組み立て直す
    ///
    /// type未指定なら既存のContent-Type（charsetを除く）を引き継ぐ。
    fn set_content_type(&mut self, media_type: Option<String>, charset: Option<String>) {
        let base_type = media_type
            .or_else(|| {
                self.head
                    .get_str("Content-Type")
                    .and_then(|ct| ct.split(';').next())
                    .map(|ct| ct.trim().to_string())
                    .filter(|ct| !ct.is_empty())
            })
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let content_type = match charset {
            Some(charset) => format!("{}; charset={}", base_type, charset),
            None => base_type,
        };
        self.head.set("Content-Type", content_type);
    }

    fn apply_options(&mut self, mut opts: Vec<(String, OptionValue)>) {
        let requested_type = text_option(&opts, "type");
        let requested_charset = text_option(&opts, "charset");
        if requested_type.is_none() && requested_charset.is_none() {
            // どちらも指定がなければ既存のContent-Typeには触れない
            self.head.set_if_absent("Content-Type", DEFAULT_CONTENT_TYPE);
        } else {
            self.set_content_type(requested_type, requested_charset);
        }

        let nph = opts.iter().any(|(k, v)| k == "nph" && v.is_truthy());
        if nph {
            self.head.set("Date", rfc1123_date(Utc::now()));
        }

        let server = text_option(&opts, "server")
            .or_else(|| self.request.param("SERVER_SOFTWARE").map(str::to_string));
        if let Some(server) = server {
            self.head.set("Server", server);
        }

        if let Some(status) = text_option(&opts, "status") {
            self.head.set("Status", status);
        }
        if let Some(language) = text_option(&opts, "language") {
            self.head.set("Content-Language", language);
        }
        if let Some(expires) = text_option(&opts, "expires") {
            self.head.set("Expires", expires);
        }

        opts.retain(|(k, _)| !REMOVED_KEYS.contains(&k.as_str()));

        // 残りはそのまま（cookieもここで入り、送出時に変換される）
        for (key, value) in opts {
            self.head.set(key, value);
        }
    }
}

/// マップ形式オプションから文字列値を取り出す
fn text_option(opts: &[(String, OptionValue)], key: &str) -> Option<String> {
    opts.iter().find(|(k, _)| k == key).and_then(|(_, v)| v.as_text())
}

impl<'r, S: ResponseSink> Cgi for CgiWrapper<'r, S> {
    fn stdinput(&mut self) -> &mut dyn Read {
        &mut self.input
    }

    fn env_table(&self) -> &HashMap<String, String> {
        &self.request.params
    }

    fn header(&mut self, options: HeaderOptions) -> String {
        match options {
            HeaderOptions::ContentType(content_type) => {
                self.head.set_if_absent("Content-Type", content_type);
            }
            HeaderOptions::Map(opts) => self.apply_options(opts),
        }
        String::new()
    }

    fn out(&mut self, options: HeaderOptions, body: BodyProducer<'_>) -> Result<(), Error> {
        if self.out_called {
            debug!("out called after the response was sent; ignoring");
            return Ok(());
        }
        // シンクが途中で失敗しても二重送出しないよう先に立てる
        self.out_called = true;

        self.header(options);
        let status = self.status_code();
        debug!("Sending legacy response with status {}", status);

        let head = &mut self.head;
        let queued = &mut self.output_cookies;
        self.response.start(status, |to, out| {
            head.send_cookies(queued, to);
            head.drain_into(to);
            let payload = body().unwrap_or_default();
            out.write_all(&payload)
                .map_err(|e| Error::ResponseWrite(format!("Failed to write response body: {}", e)))?;
            Ok(())
        })
    }

    fn add_cookie(&mut self, cookie: Cookie) {
        self.output_cookies.push(cookie);
    }

    fn stdoutput(&mut self) -> &mut dyn Write {
        warn!(
            "stdoutput was used directly by the legacy handler ({} {}); redirecting to the response body",
            self.request.method, self.request.path
        );
        self.response.body_writer()
    }
}

/// 1リクエスト分のアダプタを作ってレガシーハンドラを実行し、ホストのレスポンスを返す
///
/// ハンドラが `out` を呼ばずに戻った場合は既定値（200, `text/html`）で送出する。
pub fn run_legacy(handler: &dyn LegacyHandler, request: Request) -> Result<Response, Error> {
    let mut response = Response::default();
    {
        let mut cgi = CgiWrapper::new(request, &mut response);
        handler.process(&mut cgi)?;
        if !cgi.is_finalized() {
            warn!("Legacy handler returned without calling out; sending default headers");
            cgi.out(HeaderOptions::default(), &mut || None)?;
        }
    }
    Ok(response)
}
