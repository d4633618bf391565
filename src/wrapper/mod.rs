//! 旧来のCGIヘッダー・ステータス・クッキーの扱いをホストのレスポンスへ変換するアダプタ
//!
//! レガシーコードは `Cgi` トレイト越しに `header` / `out` を呼び、
//! アダプタは送出まで内容を蓄積してからレスポンスシンクへ一度だけ書き出す。

pub mod options;
pub mod head;
pub mod core;

pub use options::{HeaderOptions, HeaderValue, OptionValue};
pub use head::{HeaderSet, COOKIE_KEY};
pub use self::core::{run_legacy, CgiWrapper, REMOVED_KEYS};
