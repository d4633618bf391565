//! 常駐HTTPサーバーとしてレガシーハンドラを動かすホスト
//!
//! actix-webで受けたリクエストをCGI環境に組み替え、ブロッキングスレッドで
//! `run_legacy` を呼び出す。

use std::sync::Arc;
use log::{debug, error, info, warn};
use actix_web::http::StatusCode;
use actix_web::web::{self, Bytes};
use actix_web::{App, HttpRequest, HttpResponse, HttpServer};

use crate::common::{get_max_body_size, server_software, LegacyHandler, Method, Request, Response};
use crate::error::Error;
use crate::wrapper::run_legacy;

/// CGIバージョン
const GATEWAY_INTERFACE: &str = "CGI/1.2";

type SharedHandler = Arc<dyn LegacyHandler>;

/// actix-webのリクエストをCGI環境の組に変換する
pub fn cgi_env_from(req: &HttpRequest, body_len: usize) -> Vec<(String, String)> {
    let mut env: Vec<(String, String)> = Vec::new();
    let mut push = |k: &str, v: String| env.push((k.to_string(), v));

    push("REQUEST_METHOD", req.method().as_str().to_string());
    push("PATH_INFO", req.path().to_string());
    push("QUERY_STRING", req.query_string().to_string());
    push("REQUEST_URI", req.uri().to_string());
    push("SERVER_SOFTWARE", server_software());
    push("SERVER_PROTOCOL", format!("{:?}", req.version()));
    push("GATEWAY_INTERFACE", GATEWAY_INTERFACE.to_string());

    let host = req.connection_info().host().to_string();
    let (name, port) = match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => {
            (name.to_string(), port.to_string())
        }
        _ => (host.clone(), "80".to_string()),
    };
    push("SERVER_NAME", name);
    push("SERVER_PORT", port);

    if let Some(addr) = req.peer_addr() {
        push("REMOTE_ADDR", addr.ip().to_string());
    }
    if body_len > 0 {
        push("CONTENT_LENGTH", body_len.to_string());
    }

    for name in req.headers().keys() {
        let values: Vec<&str> = req
            .headers()
            .get_all(name)
            .filter_map(|v| v.to_str().ok())
            .collect();
        if values.is_empty() {
            debug!("Skipping non-ASCII header: {}", name);
            continue;
        }
        let key = match name.as_str() {
            "content-type" => "CONTENT_TYPE".to_string(),
            // 実サイズを上で設定済み
            "content-length" => continue,
            other => format!("HTTP_{}", other.to_ascii_uppercase().replace('-', "_")),
        };
        push(key.as_str(), values.join(", "));
    }

    env
}

/// 共通形式のResponseからactix-webのHttpResponseに変換
///
/// `Status` と `Content-Length` はactix側で決まるので持ち込まない。
/// 繰り返しヘッダー（Set-Cookie等）は `append_header` でそのまま並べる。
pub fn convert_to_http_response(response: Response) -> HttpResponse {
    let status = StatusCode::from_u16(response.status).unwrap_or_else(|_| {
        warn!("Unsupported status {}; sending 500", response.status);
        StatusCode::INTERNAL_SERVER_ERROR
    });
    let mut builder = HttpResponse::build(status);

    for (name, value) in response.headers.iter() {
        if name.eq_ignore_ascii_case("Status") || name.eq_ignore_ascii_case("Content-Length") {
            continue;
        }
        builder.append_header((name.to_string(), value.to_string()));
    }

    builder.body(response.body)
}

/// 全パス・全メソッドを受けるハンドラー
async fn handle_request(
    req: HttpRequest,
    body: Bytes,
    handler: web::Data<SharedHandler>,
) -> HttpResponse {
    info!("Received request: {} {}", req.method(), req.path());

    let max = get_max_body_size();
    if body.len() > max {
        warn!("Request body too large: {} bytes (limit {})", body.len(), max);
        return convert_to_http_response(Response::from_error(&Error::PayloadTooLarge(format!(
            "{} bytes",
            body.len()
        ))));
    }

    if Method::from_str(req.method().as_str()).is_none() {
        warn!("Unsupported method: {}", req.method());
        return HttpResponse::MethodNotAllowed().finish();
    }

    let mut request = match Request::from_env_pairs(cgi_env_from(&req, body.len())) {
        Ok(request) => request.with_body(body.to_vec()),
        Err(e) => {
            error!("Failed to build request: {}", e);
            return convert_to_http_response(Response::from_error(&e));
        }
    };
    if let Err(e) = request.decompress_gzip_body() {
        error!("Rejecting request body: {}", e);
        return convert_to_http_response(Response::from_error(&e));
    }

    let method = request.method;
    let path = request.path.clone();
    let handler = handler.get_ref().clone();

    // panicはBlockingErrorとして返ってくる
    let response = match web::block(move || run_legacy(handler.as_ref(), request)).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            error!("Legacy handler failed at {} {}: {}", method, path, e);
            Response::from_error(&e)
        }
        Err(e) => {
            error!("Legacy handler panicked at {} {}: {}", method, path, e);
            Response::from_error(&Error::InternalServerError(e.to_string()))
        }
    };

    convert_to_http_response(response)
}

/// ルートとボディ上限をアプリケーションに登録する
pub fn configure(cfg: &mut web::ServiceConfig) {
    // 上限超過のチェックは自前で行うので、抽出側は1バイト余裕を持たせる
    cfg.app_data(web::PayloadConfig::new(get_max_body_size().saturating_add(1)))
        .route("/{tail:.*}", web::route().to(handle_request));
}

/// レガシーハンドラをHTTPサーバーとして実行
pub async fn run_server<H>(handler: H, host: &str, port: u16) -> std::io::Result<()>
where
    H: LegacyHandler + 'static,
{
    info!("Starting HTTP server on {}:{}", host, port);

    let shared: SharedHandler = Arc::new(handler);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(shared.clone()))
            .configure(configure)
    })
    .bind((host, port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;
    use actix_web::test;
    use crate::common::Cgi;
    use crate::wrapper::HeaderOptions;

    fn echo(cgi: &mut dyn Cgi) -> Result<(), Error> {
        let mut body = String::new();
        cgi.stdinput().read_to_string(&mut body)?;
        let env = cgi.env_table();
        let line = format!(
            "{} {} q={} ua={} body={}",
            env.get("REQUEST_METHOD").map(String::as_str).unwrap_or(""),
            env.get("PATH_INFO").map(String::as_str).unwrap_or(""),
            env.get("QUERY_STRING").map(String::as_str).unwrap_or(""),
            env.get("HTTP_USER_AGENT").map(String::as_str).unwrap_or(""),
            body
        );
        cgi.out(
            HeaderOptions::map()
                .with("type", "text/plain")
                .with("status", "201 Created")
                .with("cookie", vec!["a=1", "b=2"]),
            &mut || Some(line.clone().into_bytes()),
        )
    }

    fn explode(_cgi: &mut dyn Cgi) -> Result<(), Error> {
        panic!("boom");
    }

    fn shared(handler: impl LegacyHandler + 'static) -> web::Data<SharedHandler> {
        let handler: SharedHandler = Arc::new(handler);
        web::Data::new(handler)
    }

    #[actix_web::test]
    async fn test_server_runs_legacy_handler() {
        let app = test::init_service(
            App::new().app_data(shared(echo)).configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/legacy/form?x=1")
            .insert_header(("User-Agent", "curl/8"))
            .set_payload("hello")
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(
            res.headers().get("content-type").and_then(|v| v.to_str().ok()),
            Some("text/plain")
        );
        let cookies: Vec<&str> = res
            .headers()
            .get_all("set-cookie")
            .filter_map(|v| v.to_str().ok())
            .collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
        assert!(res.headers().get("status").is_none());

        let body = test::read_body(res).await;
        assert_eq!(body, "POST /legacy/form q=x=1 ua=curl/8 body=hello");
    }

    #[actix_web::test]
    async fn test_server_panic_becomes_500() {
        let app = test::init_service(
            App::new().app_data(shared(explode)).configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/").to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[::core::prelude::v1::test]
    fn test_cgi_env_from_request() {
        let req = test::TestRequest::get()
            .uri("/path/info?a=b")
            .insert_header(("Host", "example.com:8080"))
            .insert_header(("Content-Type", "text/plain"))
            .insert_header(("X-Forwarded-For", "10.0.0.1"))
            .to_http_request();

        let env: std::collections::HashMap<String, String> =
            cgi_env_from(&req, 0).into_iter().collect();

        assert_eq!(env.get("REQUEST_METHOD").map(String::as_str), Some("GET"));
        assert_eq!(env.get("PATH_INFO").map(String::as_str), Some("/path/info"));
        assert_eq!(env.get("QUERY_STRING").map(String::as_str), Some("a=b"));
        assert_eq!(env.get("SERVER_NAME").map(String::as_str), Some("example.com"));
        assert_eq!(env.get("SERVER_PORT").map(String::as_str), Some("8080"));
        assert_eq!(env.get("CONTENT_TYPE").map(String::as_str), Some("text/plain"));
        assert_eq!(env.get("HTTP_X_FORWARDED_FOR").map(String::as_str), Some("10.0.0.1"));
        assert_eq!(env.get("GATEWAY_INTERFACE").map(String::as_str), Some("CGI/1.2"));
        assert!(!env.contains_key("CONTENT_LENGTH"));
    }

    #[::core::prelude::v1::test]
    fn test_convert_to_http_response_skips_status() {
        let mut response = Response::new(302)
            .with_header("Status", "302 Found")
            .with_header("Location", "/next");
        response.headers.insert("Set-Cookie", "a=1");
        response.headers.insert("Set-Cookie", "b=2");

        let res = convert_to_http_response(response);

        assert_eq!(res.status(), StatusCode::FOUND);
        assert!(res.headers().get("status").is_none());
        assert_eq!(res.headers().get_all("set-cookie").count(), 2);
    }
}
