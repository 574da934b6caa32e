use std::collections::BTreeMap;
use std::fs;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::info;

use coinwatch::App;
use coinwatch::core::config::AppConfig;

mod test_utils {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Mock CryptoCompare serving BTC, ETH and SOL at fixed prices.
    pub async fn create_mock_server() -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/all/coinlist"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"Response":"Success","Data":{"BTC":{},"ETH":{},"SOL":{}}}"#,
            ))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/data/pricemulti"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"BTC":{"USD":65000.0},"ETH":{"USD":3100.5},"SOL":{"USD":150.25}}"#,
            ))
            .mount(&mock_server)
            .await;

        mock_server
    }
}

fn write_config(dir: &std::path::Path, base_url: &str) -> AppConfig {
    let config_path = dir.join("config.yaml");
    let config_content = format!(
        r#"
        port: 0
        refresh_interval_secs: 1
        data_path: "{}"
        providers:
          cryptocompare:
            base_url: "{}"
            currency: "usd"
    "#,
        dir.display(),
        base_url
    );
    fs::write(&config_path, config_content).expect("Failed to write config file");
    AppConfig::load_from_path(&config_path).expect("Failed to load config")
}

async fn start(config: &AppConfig) -> (String, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let provider = coinwatch::build_provider(config).expect("Failed to build provider");
    let app = App::bind(config, SocketAddr::from(([127, 0, 0, 1], 0)), provider)
        .await
        .expect("Failed to bind app");
    let base = format!("http://{}/crypto", app.local_addr().unwrap());

    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        app.run(async move {
            let _ = rx.await;
        })
        .await
        .expect("Server failed");
    });
    (base, tx, handle)
}

async fn get_quotes(client: &reqwest::Client, url: &str) -> BTreeMap<String, Vec<f64>> {
    let response = client.get(url).send().await.unwrap();
    assert_eq!(response.status(), 200);
    response.json().await.unwrap()
}

#[test_log::test(tokio::test)]
async fn test_full_app_flow_with_mock() {
    let mock_server = test_utils::create_mock_server().await;
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), &mock_server.uri());
    let (base, shutdown, handle) = start(&config).await;
    let client = reqwest::Client::new();

    // Track two tickers; history stays empty until the next refresh
    let response = client
        .post(&base)
        .body(r#"["btc", "eth", "doge"]"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(get_quotes(&client, &base).await.is_empty());

    let tickers: Vec<String> =
        serde_json::from_str(&fs::read_to_string(dir.path().join("tickers.json")).unwrap())
            .unwrap();
    assert_eq!(tickers, vec!["BTC", "ETH"]);

    // Wait for a couple of refresh ticks
    let mut quotes = BTreeMap::new();
    for _ in 0..50 {
        quotes = get_quotes(&client, &format!("{base}?tickers=btc,eth")).await;
        if quotes.get("BTC").is_some_and(|s| s.len() >= 2) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    info!(?quotes, "Quotes after refresh");
    assert_eq!(quotes.keys().collect::<Vec<_>>(), vec!["BTC", "ETH"]);
    assert!(quotes["BTC"].len() >= 2);
    assert!(quotes["BTC"].iter().all(|p| *p == 65000.0));
    assert_eq!(quotes["ETH"][0], 3100.5);

    let windowed = get_quotes(&client, &format!("{base}?step=1")).await;
    assert_eq!(windowed["BTC"], vec![65000.0]);

    // Prices are served in the form the provider sent them
    let body = client
        .get(format!("{base}/?tickers=btc&step=1"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, r#"{"BTC":[65000.0]}"#);

    // Removing a ticker purges its history
    let response = client
        .delete(format!("{base}?tickers=eth"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let quotes = get_quotes(&client, &base).await;
    assert!(!quotes.contains_key("ETH"));
    assert!(quotes.contains_key("BTC"));

    let response = client
        .delete(format!("{base}?tickers=eth"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let response = client
        .get(base.replace("/crypto", "/stocks"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Not found");

    shutdown.send(()).unwrap();
    handle.await.unwrap();
}

#[test_log::test(tokio::test)]
async fn test_state_survives_restart() {
    let mock_server = test_utils::create_mock_server().await;
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), &mock_server.uri());

    let (base, shutdown, handle) = start(&config).await;
    let client = reqwest::Client::new();
    let response = client.post(&base).body(r#""sol""#).send().await.unwrap();
    assert_eq!(response.status(), 200);
    shutdown.send(()).unwrap();
    handle.await.unwrap();

    // The registry is reloaded from disk
    let (base, shutdown, handle) = start(&config).await;
    let response = client.post(&base).body(r#""SOL""#).send().await.unwrap();
    assert_eq!(response.status(), 400);
    shutdown.send(()).unwrap();
    handle.await.unwrap();
}

#[test_log::test(tokio::test)]
async fn test_startup_fails_without_valid_tickers() {
    let mock_server = wiremock::MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), &mock_server.uri());

    let provider = coinwatch::build_provider(&config).unwrap();
    let result = App::bind(&config, SocketAddr::from(([127, 0, 0, 1], 0)), provider).await;
    assert!(result.is_err());
    assert!(
        result
            .err()
            .unwrap()
            .to_string()
            .contains("Failed to fetch the list of valid tickers")
    );
}
