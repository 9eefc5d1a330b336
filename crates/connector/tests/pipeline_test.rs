//! End-to-end: streamer frames -> pipeline -> in-memory bus, with schemas
//! resolved from a mock registry.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use prost::Message as _;
use quoteflow_connector_lib::yahoo::PricingData;
use quoteflow_connector_lib::{
    Classifier, ConnectorError, Enricher, FeedState, FlushPolicy, PipelineWriter, Publisher,
    Runner, SchemaEncoder, TopicBindings, YahooConnector,
};
use quoteflow_metadata::{AssetClass, InstrumentRegistry};
use quoteflow_middleware::InMemoryBus;
use quoteflow_registry::SchemaRegistryClient;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STOCKS_SCHEMA: &str = include_str!("../../../schemas/stocks.avsc");
const CRYPTO_SCHEMA: &str = include_str!("../../../schemas/crypto.avsc");

async fn mock_registry() -> MockServer {
    let server = MockServer::start().await;
    for (subject, id, schema) in [
        ("stocks-value", 1, STOCKS_SCHEMA),
        ("crypto-value", 2, CRYPTO_SCHEMA),
    ] {
        Mock::given(method("GET"))
            .and(path(format!("/subjects/{}/versions/latest", subject)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "subject": subject,
                "version": 1,
                "id": id,
                "schema": schema
            })))
            .mount(&server)
            .await;
    }
    server
}

fn frame(data: &PricingData) -> String {
    serde_json::json!({"type": "pricing", "message": STANDARD.encode(data.encode_to_vec())})
        .to_string()
}

async fn mock_streamer(frames: Vec<String>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        // subscribe command
        ws.next().await.unwrap().unwrap();
        for frame in frames {
            ws.send(Message::Text(frame)).await.unwrap();
        }
        ws.close(None).await.ok();
    });

    format!("ws://{}", addr)
}

#[tokio::test]
async fn test_quotes_flow_to_asset_class_topics() {
    let registry = mock_registry().await;
    let client = SchemaRegistryClient::new(&registry.uri()).unwrap();
    let topics = BTreeMap::from([
        (AssetClass::Stocks, "stocks".to_string()),
        (AssetClass::Crypto, "crypto".to_string()),
    ]);
    let bindings = Arc::new(TopicBindings::resolve(&client, &topics).await.unwrap());

    let instruments = Arc::new(
        InstrumentRegistry::from_json_str(
            r#"{"AAPL": {"type": "stocks"}, "BTC-USD": {"type": "crypto"}}"#,
        )
        .unwrap(),
    );

    let url = mock_streamer(vec![
        frame(&PricingData {
            id: "AAPL".to_string(),
            price: 189.95,
            time: 1_700_000_000_000,
            exchange: "NMS".to_string(),
            quote_type: 8,
            market_hours: 1,
            ..Default::default()
        }),
        frame(&PricingData {
            id: "ZZZZ".to_string(),
            price: 1.0,
            ..Default::default()
        }),
        "garbage".to_string(),
        frame(&PricingData {
            id: "BTC-USD".to_string(),
            price: 37_000.5,
            currency: "USD".to_string(),
            quote_type: 41,
            ..Default::default()
        }),
    ])
    .await;

    let bus = Arc::new(InMemoryBus::new());
    let writer = PipelineWriter::new(
        Classifier::new(Arc::clone(&instruments), Arc::clone(&bindings)),
        Enricher::new(),
        Publisher::new(bus.clone(), FlushPolicy::PerRecord, Duration::from_secs(1)),
    );
    let connector = YahooConnector::new(instruments.ids(), url);
    let mut runner = Runner::new("yahoo", connector, writer);
    let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    // The mock streamer closes the session after its frames
    let result = tokio::time::timeout(Duration::from_secs(10), runner.run(shutdown_rx))
        .await
        .unwrap();
    assert!(matches!(result, Err(ConnectorError::Disconnected(_))));
    assert_eq!(runner.state(), FeedState::Disconnected);

    let stocks = bus.messages("stocks");
    assert_eq!(stocks.len(), 1);
    assert_eq!(stocks[0].key, "AAPL");
    let record =
        SchemaEncoder::decode(&stocks[0].payload, bindings.get(AssetClass::Stocks).unwrap())
            .unwrap();
    assert_eq!(record["id"], "AAPL");
    assert_eq!(record["price"], 189.95);
    assert_eq!(record["exchange"], "NMS");
    assert_eq!(record["quote_type"], "EQUITY");
    assert_eq!(record["source_api"], "YahooFinance");
    assert_eq!(record["ingestion_ts"].as_i64().unwrap() % 1000, 0);

    let crypto = bus.messages("crypto");
    assert_eq!(crypto.len(), 1);
    assert_eq!(crypto[0].key, "BTC-USD");
    assert_eq!(&crypto[0].payload[..5], &[0, 0, 0, 0, 2]);

    assert_eq!(bus.delivered().len(), 2);
}
