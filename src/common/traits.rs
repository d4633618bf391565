//! コアトレイト定義（ResponseSink、Cgi、LegacyHandler）

use std::collections::HashMap;
use std::io::{Read, Write};
use crate::error::Error;
use crate::wrapper::HeaderOptions;
use super::cookie::Cookie;
use super::http::ResponseHeaders;

/// ボディを生成する呼び出し可能オブジェクト（何も返さなければ空ボディ）
pub type BodyProducer<'a> = &'a mut dyn FnMut() -> Option<Vec<u8>>;

/// ホストのレスポンス出力先
///
/// 1リクエストにつき1つ。`start` の間はこのリクエストが排他的に所有する。
pub trait ResponseSink {
    /// ステータスを確定して書き込みを開始し、ヘッダーと本文の書き込み口を `f` に渡す
    fn start<F>(&mut self, status: u16, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut ResponseHeaders, &mut dyn Write) -> Result<(), Error>;

    /// 本文の書き込み口を直接取得
    fn body_writer(&mut self) -> &mut dyn Write;
}

/// レガシーCGIインターフェース
///
/// 既存のリクエスト処理コードはこのトレイトだけに依存する。
pub trait Cgi {
    /// リクエストボディ（旧来の標準入力）
    fn stdinput(&mut self) -> &mut dyn Read;

    /// CGI環境
    fn env_table(&self) -> &HashMap<String, String>;

    /// ヘッダーを蓄積する。旧来の契約に合わせて常に空文字を返す
    fn header(&mut self, options: HeaderOptions) -> String;

    /// ステータス・ヘッダー・ボディを一度だけ送出する（二回目以降は何もしない）
    fn out(&mut self, options: HeaderOptions, body: BodyProducer<'_>) -> Result<(), Error>;

    /// 型付きクッキーを送出キューに積む
    fn add_cookie(&mut self, cookie: Cookie);

    /// 旧来の生出力チャネル（警告を出した上で実際のレスポンス本文へ転送）
    fn stdoutput(&mut self) -> &mut dyn Write;
}

/// ラップされるレガシーハンドラ
pub trait LegacyHandler: Send + Sync {
    /// 1リクエストを処理する
    fn process(&self, cgi: &mut dyn Cgi) -> Result<(), Error>;
}

impl<F> LegacyHandler for F
where
    F: Fn(&mut dyn Cgi) -> Result<(), Error> + Send + Sync,
{
    fn process(&self, cgi: &mut dyn Cgi) -> Result<(), Error> {
        self(cgi)
    }
}
