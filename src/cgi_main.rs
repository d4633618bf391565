//! CGI環境でのエントリポイント
//!
//! Webサーバーから1リクエストごとに起動され、サンプルのレガシーアプリを実行する

use env_logger::Env;
use log::{error, info};
use cgiwrap::cgi;

mod sample_handler;

#[tokio::main]
async fn main() {
    // CGIでは標準出力がHTTPレスポンスとなるため、ログは標準エラー出力に出力する
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    info!("Starting cgiwrap CGI application");

    if let Err(err) = cgi::run_cgi(sample_handler::legacy_app).await {
        error!("Error running CGI application: {:?}", err);
        std::process::exit(1);
    }
}
