//! インテグレーションテスト
//!
//! 公開APIだけを使って、レガシーコードからホストのレスポンスまでを通しで確認する。

use std::io::{Read, Write};

use cgiwrap::wrapper::run_legacy;
use cgiwrap::{
    Cgi, CgiWrapper, Cookie, Error, HeaderOptions, Method, OptionValue, Request, ResponseHeaders,
    ResponseSink,
};

/// ホスト側を自前で実装したレスポンスシンク
#[derive(Default)]
struct RecordingSink {
    status: Option<u16>,
    headers: ResponseHeaders,
    body: Vec<u8>,
}

impl ResponseSink for RecordingSink {
    fn start<F>(&mut self, status: u16, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut ResponseHeaders, &mut dyn Write) -> Result<(), Error>,
    {
        self.status = Some(status);
        f(&mut self.headers, &mut self.body)
    }

    fn body_writer(&mut self) -> &mut dyn Write {
        &mut self.body
    }
}

#[test]
fn legacy_code_drives_custom_sink() {
    let mut sink = RecordingSink::default();
    {
        let request = Request::new(Method::GET, "/items").with_param("SERVER_SOFTWARE", "Mongrel");
        let mut cgi = CgiWrapper::new(request, &mut sink);

        cgi.header(HeaderOptions::map()
            .with("status", "404 Not Found")
            .with("type", "application/json")
            .with("cookie", "sid=abc"));
        assert_eq!(cgi.status(), "404");

        cgi.out(HeaderOptions::default(), &mut || Some(b"{}".to_vec())).unwrap();
    }

    assert_eq!(sink.status, Some(404));
    assert_eq!(sink.headers.get("Content-Type"), Some("application/json"));
    assert_eq!(sink.headers.get_all("Set-Cookie"), vec!["sid=abc"]);
    assert_eq!(sink.headers.get("Server"), Some("Mongrel"));
    assert!(!sink.headers.contains("cookie"));
    assert_eq!(sink.body, b"{}");
}

#[test]
fn closure_handler_through_run_legacy() {
    let handler = |cgi: &mut dyn Cgi| -> Result<(), Error> {
        let mut form = String::new();
        cgi.stdinput().read_to_string(&mut form)?;
        cgi.add_cookie(Cookie::new("seen", "yes")?.with_path("/"));
        cgi.out(
            HeaderOptions::map()
                .with("type", "text/plain")
                .with("charset", "utf-8")
                .with("language", "ja")
                .with("X-Legacy", OptionValue::from(vec!["a", "b"])),
            &mut || Some(format!("form={}", form).into_bytes()),
        )
    };

    let request = Request::new(Method::POST, "/form").with_body(b"name=legacy".to_vec());
    let response = run_legacy(&handler, request).unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.headers.get("Content-Type"), Some("text/plain; charset=utf-8"));
    assert_eq!(response.headers.get("Content-Language"), Some("ja"));
    assert_eq!(response.headers.get("X-Legacy"), Some("a, b"));
    assert_eq!(response.headers.get_all("Set-Cookie"), vec!["seen=yes; Path=/"]);
    assert_eq!(response.body, b"form=name=legacy");
}

#[test]
fn gzip_body_is_visible_decompressed() {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(b"compressed payload").unwrap();
    let mut request = Request::new(Method::POST, "/upload")
        .with_param("HTTP_CONTENT_ENCODING", "gzip")
        .with_body(enc.finish().unwrap());
    request.decompress_gzip_body().unwrap();

    let handler = |cgi: &mut dyn Cgi| -> Result<(), Error> {
        let mut raw = Vec::new();
        cgi.stdinput().read_to_end(&mut raw)?;
        let length = cgi.env_table().get("CONTENT_LENGTH").cloned().unwrap_or_default();
        cgi.out(HeaderOptions::from("text/plain"), &mut || {
            Some(format!("{} {}", length, String::from_utf8_lossy(&raw)).into_bytes())
        })
    };
    let response = run_legacy(&handler, request).unwrap();

    assert_eq!(response.body, b"18 compressed payload");
}

#[test]
fn handler_error_is_propagated() {
    let handler = |_cgi: &mut dyn Cgi| -> Result<(), Error> {
        Err(Error::HandlerError("legacy failure".into()))
    };
    let err = run_legacy(&handler, Request::new(Method::GET, "/")).unwrap_err();
    assert_eq!(err.status_code(), 500);
}
