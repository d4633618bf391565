//! エラー型の定義

use thiserror::Error;

/// アプリケーションのエラー型
#[derive(Error, Debug)]
pub enum Error {
    /// 無効なリクエストボディ
    #[error("Invalid request body: {0}")]
    InvalidRequestBody(String),

    /// リクエストボディが上限を超えた
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// 無効なヘッダー名・値
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// 無効なクッキー名・値
    #[error("Invalid cookie: {0}")]
    InvalidCookie(String),

    /// レスポンスシンクへの書き込み失敗
    #[error("Failed to write response: {0}")]
    ResponseWrite(String),

    /// レガシーハンドラが返したエラー
    #[error("Handler error: {0}")]
    HandlerError(String),

    /// 内部サーバーエラー
    #[error("Internal server error: {0}")]
    InternalServerError(String),

    /// レガシーコード内で発生した入出力エラー
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// エラーからHTTPステータスコードを取得
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidRequestBody(_) => 400,
            Error::PayloadTooLarge(_) => 413,
            Error::InvalidHeader(_) => 400,
            Error::InvalidCookie(_) => 400,
            Error::ResponseWrite(_) => 500,
            Error::HandlerError(_) => 500,
            Error::InternalServerError(_) => 500,
            Error::Io(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(Error::InvalidRequestBody("x".into()).status_code(), 400);
        assert_eq!(Error::PayloadTooLarge("x".into()).status_code(), 413);
        assert_eq!(Error::HandlerError("x".into()).status_code(), 500);
    }

    #[test]
    fn test_io_error_is_not_labelled_as_response_write() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "body truncated");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.to_string(), "I/O error: body truncated");
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_invalid_header_is_bad_request() {
        let err = Error::InvalidHeader("X-Evil".into());
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "Invalid header: X-Evil");
    }
}
