#![cfg(feature = "server")]

//! HTTPサーバーホストの統合テスト

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use cgiwrap::server::configure;
use cgiwrap::{Cgi, Error, HeaderOptions, LegacyHandler};

fn app_data(handler: impl LegacyHandler + 'static) -> web::Data<Arc<dyn LegacyHandler>> {
    let handler: Arc<dyn LegacyHandler> = Arc::new(handler);
    web::Data::new(handler)
}

fn counter(cgi: &mut dyn Cgi) -> Result<(), Error> {
    let remote = cgi.env_table().get("HTTP_X_REAL_IP").cloned().unwrap_or_default();
    cgi.out(
        HeaderOptions::map()
            .with("type", "text/plain")
            .with("nph", true)
            .with("server", "LegacyServer/1.0"),
        &mut || Some(format!("ip={}", remote).into_bytes()),
    )
}

fn silent(_cgi: &mut dyn Cgi) -> Result<(), Error> {
    Ok(())
}

#[actix_web::test]
async fn test_options_become_http_headers() {
    let app = test::init_service(App::new().app_data(app_data(counter)).configure(configure)).await;

    let req = test::TestRequest::get()
        .uri("/count")
        .insert_header(("X-Real-IP", "192.0.2.1"))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("date"));
    assert_eq!(
        res.headers().get("server").and_then(|v| v.to_str().ok()),
        Some("LegacyServer/1.0")
    );
    let body = test::read_body(res).await;
    assert_eq!(body, "ip=192.0.2.1");
}

#[actix_web::test]
async fn test_silent_handler_gets_default_response() {
    let app = test::init_service(App::new().app_data(app_data(silent)).configure(configure)).await;

    let req = test::TestRequest::get().uri("/").to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get("content-type").and_then(|v| v.to_str().ok()),
        Some("text/html")
    );
}

#[actix_web::test]
async fn test_handler_error_becomes_500() {
    let failing = |_cgi: &mut dyn Cgi| -> Result<(), Error> {
        Err(Error::HandlerError("broken".into()))
    };
    let app = test::init_service(App::new().app_data(app_data(failing)).configure(configure)).await;

    let req = test::TestRequest::get().uri("/").to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
