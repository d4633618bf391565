//! 共通ユーティリティ関数群（URLデコード、クエリ解析、日付整形、環境設定 等）

use std::collections::HashMap;
use std::env;
use chrono::{DateTime, Utc};
use crate::error::Error;

/// URLエンコーディングのデコード関数
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(h), Some(l)) = (from_hex(bytes[i + 1]), from_hex(bytes[i + 2])) {
                result.push(h * 16 + l);
                i += 3;
                continue;
            }
        } else if bytes[i] == b'+' {
            result.push(b' ');
            i += 1;
            continue;
        }
        result.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&result).into_owned()
}

/// 16進数文字をバイト値に変換するヘルパー関数
fn from_hex(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// クエリ文字列をパースしてURLデコードを行う
/// レガシーハンドラが `QUERY_STRING` を解釈する際に使う
pub fn parse_query_string(query_string: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    if query_string.is_empty() {
        return params;
    }

    for pair in query_string.split('&') {
        let mut parts = pair.splitn(2, '=');
        if let Some(key) = parts.next() {
            if key.is_empty() {
                continue;
            }
            let value = parts.next().unwrap_or("");
            params.insert(percent_decode(key), percent_decode(value));
        }
    }

    params
}

/// RFC 1123形式の日付文字列（例: `Sun, 06 Nov 1994 08:49:37 GMT`）
pub fn rfc1123_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// リクエストボディの最大サイズ（バイト）を取得する
/// 優先順位: 環境変数 `CGIWRAP_MAX_BODY_SIZE` -> デフォルト 5MB
pub fn get_max_body_size() -> usize {
    const DEFAULT_MAX_SIZE: usize = 5 * 1024 * 1024; // 5MB
    env::var("CGIWRAP_MAX_BODY_SIZE")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(DEFAULT_MAX_SIZE)
}

/// ホストが `SERVER_SOFTWARE` として名乗る値
/// 優先順位: 環境変数 `CGIWRAP_SERVER_SOFTWARE` -> `cgiwrap/<version>`
pub fn server_software() -> String {
    env::var("CGIWRAP_SERVER_SOFTWARE")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| format!("cgiwrap/{}", env!("CARGO_PKG_VERSION")))
}

/// ヘッダー値に使用可能な文字かを判定（CRLF・制御文字を拒否）
pub fn is_header_value_valid(value: &str) -> bool {
    // obs-textは考慮せず、制御文字(0x00-0x1F, 0x7F)とCR/LFを拒否する
    value.chars().all(|c| {
        let code = c as u32;
        code >= 0x20 && code != 0x7F
    })
}

/// Cookie名が安全なトークンか（RFC6265準拠の簡易版）
pub fn is_cookie_name_valid(name: &str) -> bool {
    if name.is_empty() { return false; }
    const FORBIDDEN: &[char] = &['(',')','<','>','@',',',';',':','\\','"','/','[',']','?','{','}',' ','\t','\r','\n','='];
    name.chars().all(|c| c.is_ascii() && !c.is_ascii_control() && !FORBIDDEN.contains(&c))
}

/// Cookie値が安全か（RFC6265 cookie-octetの簡易版）
/// 許容: 0x21, 0x23-0x2B, 0x2D-0x3A, 0x3C-0x5B, 0x5D-0x7E
pub fn is_cookie_value_valid(value: &str) -> bool {
    value.chars().all(|c| {
        let b = c as u32;
        matches!(b,
            0x21 |
            0x23..=0x2B |
            0x2D..=0x3A |
            0x3C..=0x5B |
            0x5D..=0x7E
        )
    })
}

/// ヘルパー: 無効なCookie名/値ならErrorを返す
pub fn validate_cookie_name_value(name: &str, value: &str) -> Result<(), Error> {
    if !is_cookie_name_valid(name) {
        return Err(Error::InvalidCookie("cookie name contains invalid characters".into()));
    }
    if !is_cookie_value_valid(value) {
        return Err(Error::InvalidCookie("cookie value contains invalid characters".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_query_string() {
        let query = "name=John&age=30&city=Tokyo";
        let params = parse_query_string(query);

        assert_eq!(params.get("name"), Some(&"John".to_string()));
        assert_eq!(params.get("age"), Some(&"30".to_string()));
        assert_eq!(params.get("city"), Some(&"Tokyo".to_string()));
    }

    #[test]
    fn test_parse_query_string_url_encoding() {
        let query = "name=%E3%81%82%E3%81%84%E3%81%86%E3%81%88%E3%81%8A&city=Tokyo%20Station&flag";
        let params = parse_query_string(query);

        assert_eq!(params.get("name"), Some(&"あいうえお".to_string()));
        assert_eq!(params.get("city"), Some(&"Tokyo Station".to_string()));
        // 値のないキーは空文字
        assert_eq!(params.get("flag"), Some(&"".to_string()));
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("Hello%20World"), "Hello World");
        assert_eq!(percent_decode("test%2Bvalue"), "test+value");
        assert_eq!(percent_decode("plus+space"), "plus space");
        assert_eq!(percent_decode("broken%2"), "broken%2");
    }

    #[test]
    fn test_rfc1123_date() {
        let t = Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap();
        assert_eq!(rfc1123_date(t), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn test_get_max_body_size() {
        use temp_env::with_vars;

        with_vars([("CGIWRAP_MAX_BODY_SIZE", None::<&str>)], || {
            assert_eq!(get_max_body_size(), 5 * 1024 * 1024);
        });
        with_vars([("CGIWRAP_MAX_BODY_SIZE", Some("1024"))], || {
            assert_eq!(get_max_body_size(), 1024);
        });
        // 無効な値はデフォルトにフォールバック
        with_vars([("CGIWRAP_MAX_BODY_SIZE", Some("lots"))], || {
            assert_eq!(get_max_body_size(), 5 * 1024 * 1024);
        });
    }

    #[test]
    fn test_server_software() {
        use temp_env::with_vars;

        with_vars([("CGIWRAP_SERVER_SOFTWARE", None::<&str>)], || {
            assert!(server_software().starts_with("cgiwrap/"));
        });
        with_vars([("CGIWRAP_SERVER_SOFTWARE", Some("Mongrel 1.0"))], || {
            assert_eq!(server_software(), "Mongrel 1.0");
        });
    }

    #[test]
    fn header_value_rejects_crlf_and_ctl() {
        assert!(is_header_value_valid("normal-Value_123"));
        assert!(is_header_value_valid(""));
        assert!(!is_header_value_valid("bad\rvalue"));
        assert!(!is_header_value_valid("bad\nvalue"));
        assert!(!is_header_value_valid("bad\x07bell"));
    }

    #[test]
    fn cookie_name_and_value_validation() {
        assert!(is_cookie_name_valid("SESSIONID"));
        assert!(!is_cookie_name_valid("bad name"));
        assert!(!is_cookie_name_valid("bad;name"));

        assert!(is_cookie_value_valid("abcDEF123-_.:~"));
        assert!(!is_cookie_value_valid("bad;value"));
        assert!(!is_cookie_value_valid("bad,value"));
        assert!(validate_cookie_name_value("SID", "bad\nvalue").is_err());
    }
}
