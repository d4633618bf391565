//! `header` / `out` に渡すオプションと、蓄積ヘッダーの値表現

use std::fmt;
use crate::common::Cookie;

/// 呼び出し側が渡すオプション値
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Text(String),
    Flag(bool),
    List(Vec<String>),
    Map(Vec<(String, String)>),
}

impl OptionValue {
    /// 真偽として評価する（偽になるのは `Flag(false)` のみ）
    pub fn is_truthy(&self) -> bool {
        !matches!(self, OptionValue::Flag(false))
    }

    /// 文字列として使える値を取り出す。偽・空文字は `None`
    pub fn as_text(&self) -> Option<String> {
        if !self.is_truthy() {
            return None;
        }
        let text = self.to_string();
        if text.is_empty() { None } else { Some(text) }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Text(s) => f.write_str(s),
            OptionValue::Flag(b) => write!(f, "{}", b),
            OptionValue::List(items) => f.write_str(&items.join(", ")),
            OptionValue::Map(pairs) => {
                let values: Vec<&str> = pairs.iter().map(|(_, v)| v.as_str()).collect();
                f.write_str(&values.join(", "))
            }
        }
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        OptionValue::Text(s.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        OptionValue::Text(s)
    }
}

impl From<bool> for OptionValue {
    fn from(b: bool) -> Self {
        OptionValue::Flag(b)
    }
}

impl From<Vec<&str>> for OptionValue {
    fn from(items: Vec<&str>) -> Self {
        OptionValue::List(items.into_iter().map(String::from).collect())
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(items: Vec<String>) -> Self {
        OptionValue::List(items)
    }
}

impl From<Vec<(&str, &str)>> for OptionValue {
    fn from(pairs: Vec<(&str, &str)>) -> Self {
        OptionValue::Map(pairs.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }
}

impl From<Vec<(String, String)>> for OptionValue {
    fn from(pairs: Vec<(String, String)>) -> Self {
        OptionValue::Map(pairs)
    }
}

impl From<Cookie> for OptionValue {
    fn from(cookie: Cookie) -> Self {
        OptionValue::Text(cookie.to_header_value())
    }
}

impl From<Vec<Cookie>> for OptionValue {
    fn from(cookies: Vec<Cookie>) -> Self {
        OptionValue::List(cookies.iter().map(Cookie::to_header_value).collect())
    }
}

/// 蓄積ヘッダーの値
///
/// 通常のヘッダーは `Single`。予約キー `cookie` の値は3形態のいずれかで、
/// 送出時に `Set-Cookie` へ展開される（`Map` のキーは無視される）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Single(String),
    List(Vec<String>),
    Map(Vec<(String, String)>),
}

impl HeaderValue {
    /// 送出する値を順に返す
    pub fn into_values(self) -> Vec<String> {
        match self {
            HeaderValue::Single(v) => vec![v],
            HeaderValue::List(items) => items,
            HeaderValue::Map(pairs) => pairs.into_iter().map(|(_, v)| v).collect(),
        }
    }

    /// 単一値の場合のみ文字列を返す
    pub fn as_single(&self) -> Option<&str> {
        match self {
            HeaderValue::Single(v) => Some(v),
            _ => None,
        }
    }
}

impl From<OptionValue> for HeaderValue {
    fn from(value: OptionValue) -> Self {
        match value {
            OptionValue::Text(s) => HeaderValue::Single(s),
            OptionValue::Flag(b) => HeaderValue::Single(b.to_string()),
            OptionValue::List(items) => HeaderValue::List(items),
            OptionValue::Map(pairs) => HeaderValue::Map(pairs),
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(s: &str) -> Self {
        HeaderValue::Single(s.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(s: String) -> Self {
        HeaderValue::Single(s)
    }
}

/// `header` の引数
///
/// 文字列形式はContent-Typeのみを指定し、マップ形式は名前付きオプションを渡す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderOptions {
    ContentType(String),
    Map(Vec<(String, OptionValue)>),
}

impl Default for HeaderOptions {
    fn default() -> Self {
        HeaderOptions::ContentType("text/html".to_string())
    }
}

impl HeaderOptions {
    /// 空のマップ形式オプションを作成
    pub fn map() -> Self {
        HeaderOptions::Map(Vec::new())
    }

    /// オプションを設定（同じキーは上書き）。文字列形式に対してはマップ形式へ変換してから設定する
    pub fn with(self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        let mut pairs = match self {
            HeaderOptions::Map(pairs) => pairs,
            HeaderOptions::ContentType(ct) => vec![("type".to_string(), OptionValue::Text(ct))],
        };
        let key = key.into();
        let value = value.into();
        match pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => pairs.push((key, value)),
        }
        HeaderOptions::Map(pairs)
    }
}

impl From<&str> for HeaderOptions {
    fn from(s: &str) -> Self {
        HeaderOptions::ContentType(s.to_string())
    }
}

impl From<String> for HeaderOptions {
    fn from(s: String) -> Self {
        HeaderOptions::ContentType(s)
    }
}

impl From<Vec<(&str, OptionValue)>> for HeaderOptions {
    fn from(pairs: Vec<(&str, OptionValue)>) -> Self {
        pairs
            .into_iter()
            .fold(HeaderOptions::map(), |opts, (k, v)| opts.with(k, v))
    }
}
