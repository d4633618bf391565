//! 送出前に蓄積されるヘッダー集合

use log::debug;
use crate::common::{Cookie, ResponseHeaders};
use super::options::HeaderValue;

/// クッキーを保持する予約キー
pub const COOKIE_KEY: &str = "cookie";

/// 順序付きのヘッダー集合（名前は大文字小文字を区別する）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    entries: Vec<(String, HeaderValue)>,
}

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 値を設定（既存キーは位置を保ったまま上書き）
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<HeaderValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// 未設定の場合のみ値を設定
    pub fn set_if_absent(&mut self, name: impl Into<String>, value: impl Into<HeaderValue>) {
        let name = name.into();
        if !self.contains_key(&name) {
            self.entries.push((name, value.into()));
        }
    }

    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// 単一値として設定されている場合にその文字列を返す
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(HeaderValue::as_single)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == name)
    }

    pub fn remove(&mut self, name: &str) -> Option<HeaderValue> {
        let pos = self.entries.iter().position(|(k, _)| k == name)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `cookie` エントリと送出待ちクッキーを `Set-Cookie` として書き出す
    ///
    /// 書き出した `cookie` エントリは取り除かれるため、二回目の呼び出しは何もしない。
    pub fn send_cookies(&mut self, queued: &mut Vec<Cookie>, to: &mut ResponseHeaders) {
        if let Some(cookie) = self.remove(COOKIE_KEY) {
            for value in cookie.into_values() {
                to.insert("Set-Cookie", value);
            }
        }
        for cookie in queued.drain(..) {
            to.insert("Set-Cookie", cookie.to_header_value());
        }
    }

    /// 残りのエントリを全て送出先へ移す（集合は空になる）
    ///
    /// 複数値のエントリは `, ` で連結した1行になる。
    pub fn drain_into(&mut self, to: &mut ResponseHeaders) {
        for (name, value) in self.entries.drain(..) {
            let joined = value.into_values().join(", ");
            if !to.insert(name.as_str(), joined) {
                debug!("Header {} already sent by the host; keeping the first value", name);
            }
        }
    }
}
