//! ホストとレガシーコードの双方が使う共通の型とトレイト

pub mod cookie;
pub mod http;
pub mod traits;
pub mod utils;

pub use cookie::{Cookie, SameSite};
pub use http::{Method, Request, Response, ResponseHeaders};
pub use traits::{BodyProducer, Cgi, LegacyHandler, ResponseSink};
pub use utils::{
    get_max_body_size, is_header_value_valid, parse_query_string, percent_decode, rfc1123_date,
    server_software,
};
