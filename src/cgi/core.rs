//! CGIメイン実行ロジック

use std::sync::Arc;
use log::{debug, error, info};
use tokio::task;

use crate::common::{LegacyHandler, Request, Response};
use crate::error::Error;
use crate::wrapper::run_legacy;
use super::request::read_cgi_request;
use super::response::write_response;
use super::error_logging::{log_error_to_file, gather_cgi_panic_context};

/// CGIリクエストを読み込み、レガシーハンドラを実行して標準出力へ書き出す
pub async fn run_cgi<H>(handler: H) -> Result<(), Error>
where
    H: LegacyHandler + 'static,
{
    let request = match read_cgi_request() {
        Ok(req) => req,
        // CGI環境でなければ呼び出し元へ返す
        Err(e) if std::env::var_os("REQUEST_METHOD").is_none() => return Err(e),
        Err(e) => {
            error!("Rejecting CGI request: {}", e);
            write_response(&Response::from_error(&e))?;
            return Ok(());
        }
    };

    debug!("Processing CGI request: {} {}", request.method, request.path);
    let response = execute(Arc::new(handler), request).await;
    write_response(&response)?;

    info!("CGI request processed successfully");
    Ok(())
}

/// ハンドラをブロッキングスレッドで実行し、エラー・panicをレスポンスに変換する
pub async fn execute(handler: Arc<dyn LegacyHandler>, request: Request) -> Response {
    let method = request.method;
    let path = request.path.clone();
    let cgi_env = request.params.clone();

    // ハンドラ内でのpanicを検知するためにspawnしてJoinErrorを検査
    let task_result = task::spawn_blocking(move || run_legacy(handler.as_ref(), request)).await;

    match task_result {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => {
            error!("Legacy handler failed at {} {}: {}", method, path, err);
            log_error_to_file(&format!("Handler returned error at {} {}: {:?}", method, path, err));
            Response::from_error(&err)
        }
        Err(join_err) => {
            let panic_info = if join_err.is_panic() {
                "panic occurred in legacy handler".to_string()
            } else {
                format!("task cancelled: {}", join_err)
            };
            error!("{} at {} {}", panic_info, method, path);
            log_error_to_file(&format!("{} at {} {}", panic_info, method, path));
            if join_err.is_panic() {
                log_error_to_file(&gather_cgi_panic_context(&cgi_env));
            }
            Response::from_error(&Error::InternalServerError(panic_info))
        }
    }
}
