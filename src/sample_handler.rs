//! サンプルのレガシーアプリケーション
//!
//! `Cgi` トレイトだけに依存する、昔ながらの書き方のハンドラ。
//! CGIバイナリとサーバーバイナリの両方から使う。

use std::collections::BTreeMap;
use std::io::{Read, Write};
use log::info;
use serde::Serialize;

use cgiwrap::{parse_query_string, Cgi, Cookie, Error, HeaderOptions, OptionValue};

#[derive(Serialize)]
struct Hello {
    message: String,
    version: &'static str,
}

#[derive(Serialize)]
struct Echo {
    method: String,
    path: String,
    query: BTreeMap<String, String>,
    headers: BTreeMap<String, String>,
    body: String,
}

/// `PATH_INFO` で振り分けるレガシーアプリのエントリポイント
pub fn legacy_app(cgi: &mut dyn Cgi) -> Result<(), Error> {
    let path = cgi.env_table().get("PATH_INFO").cloned().unwrap_or_else(|| "/".to_string());

    match path.as_str() {
        "/" => hello(cgi),
        "/echo" => echo(cgi),
        "/redirect" => redirect(cgi),
        "/login" => login(cgi),
        "/stdout" => raw_stdout(cgi),
        "/panic" => {
            info!("Handling panic request - this will panic!");
            panic!("Test panic from legacy handler");
        }
        _ => {
            cgi.out(
                HeaderOptions::map().with("type", "text/plain").with("status", "404 Not Found"),
                &mut || Some(b"Not Found".to_vec()),
            )
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>, Error> {
    serde_json::to_vec(value)
        .map_err(|e| Error::HandlerError(format!("Failed to serialize JSON: {}", e)))
}

fn hello(cgi: &mut dyn Cgi) -> Result<(), Error> {
    let body = to_json(&Hello {
        message: "Hello from cgiwrap".to_string(),
        version: env!("CARGO_PKG_VERSION"),
    })?;
    cgi.out(HeaderOptions::from("application/json"), &mut || Some(body.clone()))
}

/// リクエスト内容をJSONで返す
fn echo(cgi: &mut dyn Cgi) -> Result<(), Error> {
    let mut raw = Vec::new();
    cgi.stdinput().read_to_end(&mut raw)?;

    let env = cgi.env_table();
    let get = |key: &str| env.get(key).cloned().unwrap_or_default();
    let headers = env
        .iter()
        .filter(|(k, _)| k.starts_with("HTTP_") || k.starts_with("CONTENT_"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let echo = Echo {
        method: get("REQUEST_METHOD"),
        path: get("PATH_INFO"),
        query: parse_query_string(&get("QUERY_STRING")).into_iter().collect(),
        headers,
        body: String::from_utf8_lossy(&raw).into_owned(),
    };
    let body = to_json(&echo)?;

    // typeを省略した2回目の呼び出しは先に決めたメディアタイプを引き継ぐ
    cgi.header(HeaderOptions::map().with("type", "application/json"));
    cgi.out(
        HeaderOptions::map().with("charset", "utf-8").with("cookie", "echoed=1; Path=/"),
        &mut || Some(body.clone()),
    )
}

fn redirect(cgi: &mut dyn Cgi) -> Result<(), Error> {
    cgi.out(
        HeaderOptions::map()
            .with("status", "302 Found")
            .with("Location", "/")
            .with("type", "text/plain"),
        &mut || None,
    )
}

/// 型付きCookieと従来形式のCookieを混ぜて送る
fn login(cgi: &mut dyn Cgi) -> Result<(), Error> {
    let session = Cookie::new("session", "s3cr3t")?.with_path("/").http_only(true);
    cgi.add_cookie(session);

    let theme = vec![("theme", "theme=dark"), ("lang", "lang=ja")];
    cgi.out(
        HeaderOptions::map()
            .with("type", "text/plain")
            .with("cookie", OptionValue::from(theme))
            .with("nph", true),
        &mut || Some(b"logged in".to_vec()),
    )
}

/// ヘッダー送出後に標準出力へ直接書くタイプの古いコード
fn raw_stdout(cgi: &mut dyn Cgi) -> Result<(), Error> {
    cgi.out(HeaderOptions::from("text/plain"), &mut || None)?;
    let out = cgi.stdoutput();
    out.write_all(b"line 1\n")?;
    out.write_all(b"line 2\n")?;
    Ok(())
}
