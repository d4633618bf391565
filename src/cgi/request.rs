//! CGI環境からのリクエスト構築

use std::env;
use std::io::{self, Read};
use log::debug;

use crate::common::{get_max_body_size, Request};
use crate::error::Error;
use super::validation::is_valid_header_value;

/// プロセス環境をCGI環境として取り出す
///
/// `HTTP_*` のうち値が安全でないものは取り除く。
pub fn get_cgi_env() -> Vec<(String, String)> {
    env::vars()
        .filter(|(key, value)| {
            if key.starts_with("HTTP_") && !is_valid_header_value(value) {
                debug!("Dropping unsafe CGI header variable {}", key);
                return false;
            }
            true
        })
        .collect()
}

/// `CONTENT_LENGTH` に従ってボディを読み込む（上限超過は `PayloadTooLarge`）
pub fn read_request_body_from<R: Read>(
    reader: &mut R,
    content_length: Option<&str>,
) -> Result<Vec<u8>, Error> {
    let Some(content_length) = content_length.and_then(|s| s.trim().parse::<usize>().ok()) else {
        return Ok(Vec::new());
    };
    if content_length == 0 {
        return Ok(Vec::new());
    }

    let max_body_size = get_max_body_size();
    if content_length > max_body_size {
        return Err(Error::PayloadTooLarge(format!(
            "Request body size {} bytes exceeds maximum allowed size {} bytes",
            content_length, max_body_size
        )));
    }

    let mut buffer = vec![0u8; content_length];
    reader.read_exact(&mut buffer).map_err(|e| {
        Error::InvalidRequestBody(format!("Failed to read request body: {}", e))
    })?;
    Ok(buffer)
}

/// 環境変数と標準入力からリクエストを構築する
pub fn read_cgi_request() -> Result<Request, Error> {
    let mut request = Request::from_env_pairs(get_cgi_env())?;
    let content_length = request.param("CONTENT_LENGTH").map(str::to_string);
    request.body = read_request_body_from(&mut io::stdin().lock(), content_length.as_deref())?;
    request.decompress_gzip_body()?;
    Ok(request)
}
