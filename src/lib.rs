//! cgiwrap: 旧来のCGIスタイルのリクエスト処理コードを無改造で動かす互換レイヤー
//!
//! レガシーコードは `Cgi` トレイト（ボディ読み出し・環境取得・ヘッダー設定・送出）だけに依存し、
//! ホスト（CGIプロセス、または常駐HTTPサーバー）は1リクエストごとに `CgiWrapper` を作って渡す。

pub mod common;
pub mod error;
pub mod wrapper;
pub mod cgi;

#[cfg(feature = "server")]
pub mod server;

pub use common::*;
pub use error::*;
pub use wrapper::{CgiWrapper, HeaderOptions, HeaderSet, HeaderValue, OptionValue};
