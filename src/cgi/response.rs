//! CGIレスポンスの出力機能

use std::io::{self, Write};
use log::error;

use crate::common::Response;
use crate::error::Error;
use super::validation::{is_valid_header_name, is_valid_header_value};
use super::error_logging::log_error_to_file;

/// 送出するヘッダー行を検証しながら集める
///
/// `Status` と `Content-Length` はこちらで生成するためユーザー指定を無視する。
pub(super) fn checked_header_lines(response: &Response) -> Result<Vec<(String, String)>, Error> {
    let mut lines: Vec<(String, String)> = Vec::new();

    for (name, value) in response.headers.iter() {
        if name.eq_ignore_ascii_case("Status") || name.eq_ignore_ascii_case("Content-Length") {
            continue;
        }
        if !is_valid_header_name(name) || !is_valid_header_value(value) {
            return Err(Error::InvalidHeader(format!("{:?}: {:?}", name, value)));
        }
        lines.push((name.to_string(), value.to_string()));
    }

    Ok(lines)
}

/// CGIで書き出すステータス行・ヘッダー行・ボディを組み立てる
///
/// 不正なヘッダーが一つでもあれば、安全な400レスポンスに差し替える。
fn header_lines(response: &Response) -> (String, Vec<(String, String)>, Vec<u8>) {
    match checked_header_lines(response) {
        Ok(lines) => {
            let status = format!("{} {}", response.status, response.reason_phrase());
            (status, lines, response.body.clone())
        }
        Err(err) => {
            error!("Invalid header detected - {}", err);
            log_error_to_file(&format!("CRLF injection attempt detected in header: {}", err));
            let fallback = Response::new(err.status_code());
            let status = format!("{} {}", fallback.status, fallback.reason_phrase());
            let lines = vec![("Content-Type".to_string(), "text/plain; charset=utf-8".to_string())];
            (status, lines, b"Bad Request: Invalid header".to_vec())
        }
    }
}

/// レスポンスを任意のライターへCGI形式で書き出す
pub fn write_response_to<W: Write>(response: &Response, out: &mut W) -> Result<(), Error> {
    let (status, lines, body) = header_lines(response);

    out.write_all(format!("Status: {}\r\n", status).as_bytes())
        .map_err(|e| Error::ResponseWrite(format!("Failed to write status line: {}", e)))?;

    // Set-Cookie等の繰り返しヘッダーはそのまま1行ずつ出る
    for (name, value) in &lines {
        out.write_all(format!("{}: {}\r\n", name, value).as_bytes())
            .map_err(|e| Error::ResponseWrite(format!("Failed to write header {}: {}", name, e)))?;
    }

    out.write_all(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes())
        .map_err(|e| Error::ResponseWrite(format!("Failed to write Content-Length: {}", e)))?;

    out.write_all(&body)
        .map_err(|e| Error::ResponseWrite(format!("Failed to write response body: {}", e)))?;

    Ok(())
}

/// レスポンスを標準出力に書き出す
pub fn write_response(response: &Response) -> Result<(), Error> {
    let mut out = io::stdout().lock();
    let res = write_response_to(response, &mut out);
    out.flush()
        .map_err(|e| Error::ResponseWrite(format!("Failed to flush stdout: {}", e)))?;
    res
}
