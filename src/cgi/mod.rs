//! CGIプロセスとして実行するホスト
//!
//! 環境変数と標準入力からリクエストを構築してレガシーハンドラを実行し、
//! 標準出力にCGIレスポンス形式で書き出す。

pub mod validation;
pub mod error_logging;
pub mod request;
pub mod response;
pub mod core;

pub use self::core::{run_cgi, execute};
