#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end question answering over a CSV dataset, a passage index and a mocked Ollama

use booking_insights::InsightsError;
use booking_insights::analytics::Report;
use booking_insights::config::{Config, IndexBackend};
use booking_insights::engine::{Answer, QueryEngine};
use booking_insights::index::{IndexedPassage, LanceIndex, PassageIndex};
use serde_json::json;
use std::fs;
use std::io::Write;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DIMENSION: usize = 64;

const BOOKINGS: &str = "\
hotel,is_canceled,lead_time,arrival_date_year,arrival_date_month,arrival_date_day_of_month,stays_in_weekend_nights,stays_in_week_nights,adults,adr,country,text
Resort Hotel,0,342,2016,July,1,0,2,2,100,PRT,Resort Hotel stay from Portugal
City Hotel,0,7,2016,July,2,2,2,1,50,GBR,City Hotel stay from the United Kingdom
City Hotel,0,13,2016,July,3,0,1,2,25,PRT,Short City Hotel stay from Portugal
City Hotel,1,120,2016,July,4,1,1,2,150,ESP,Canceled City Hotel stay from Spain
Resort Hotel,1,200,2017,March,5,2,5,2,90,FRA,Canceled Resort Hotel stay from France
City Hotel,0,0,2017,March,6,0,3,1,70,NA,Walk-in City Hotel stay
";

fn unit_vector(axis: usize) -> Vec<f32> {
    let mut vector = vec![0.0; DIMENSION];
    vector[axis] = 1.0;
    vector
}

fn passages() -> Vec<IndexedPassage> {
    [
        "Resort Hotel stay from Portugal",
        "City Hotel stay from the United Kingdom",
        "Short City Hotel stay from Portugal",
        "Canceled City Hotel stay from Spain",
        "Canceled Resort Hotel stay from France",
    ]
    .iter()
    .enumerate()
    .map(|(axis, text)| IndexedPassage {
        id: axis.to_string(),
        text: (*text).to_string(),
        vector: unit_vector(axis),
    })
    .collect()
}

struct Deployment {
    temp_dir: TempDir,
    server: MockServer,
    config: Config,
}

async fn deployment(backend: IndexBackend) -> Deployment {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(temp_dir.path().join("hotel_bookings_cleaned.csv"), BOOKINGS)
        .expect("should write dataset");

    let server = MockServer::start().await;
    let mut config = Config::with_base_dir(temp_dir.path());
    config.ollama.host = server.address().ip().to_string();
    config.ollama.port = server.address().port();
    config.ollama.embedding_dimension = DIMENSION as u32;
    config.ollama.retry_attempts = 1;
    config.index.backend = backend;

    match backend {
        IndexBackend::Flat => {
            config.index.path = "passages.jsonl".into();
            let mut file = fs::File::create(temp_dir.path().join("passages.jsonl"))
                .expect("should create index file");
            for passage in passages() {
                let line = serde_json::to_string(&passage).expect("should serialize passage");
                writeln!(file, "{}", line).expect("should write passage");
            }
        }
        IndexBackend::Lancedb => {
            let mut index = LanceIndex::create(&config.index_path(), &config.index.table)
                .await
                .expect("should create index");
            index
                .store_passages(&passages())
                .await
                .expect("should store passages");
        }
    }

    config.save().expect("should save config");

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "all-minilm:latest"}, {"name": "llama3.2:latest"}]
        })))
        .mount(&server)
        .await;

    // Any question embeds closest to the canceled Spain stay, then the France one
    let mut query_vector = unit_vector(3);
    query_vector[4] = 0.5;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embeddings": [query_vector]})))
        .mount(&server)
        .await;

    Deployment {
        temp_dir,
        server,
        config,
    }
}

async fn mount_generation(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn engine(deployment: &Deployment) -> QueryEngine {
    let config = Config::load(deployment.temp_dir.path()).expect("should load config");
    assert_eq!(config, deployment.config);
    QueryEngine::from_config(&config)
        .await
        .expect("should start engine")
}

#[tokio::test(flavor = "multi_thread")]
async fn structured_questions_skip_retrieval() {
    let deployment = deployment(IndexBackend::Flat).await;
    let engine = engine(&deployment).await;

    let answer = engine
        .answer("Show me total revenue for July 2016.")
        .await
        .expect("should answer");
    assert_eq!(
        serde_json::to_value(&answer).expect("should serialize"),
        json!({"total_revenue": {"total": "$425.00", "month": "July", "year": 2016}})
    );

    let answer = engine
        .answer("what is the cancellation rate")
        .await
        .expect("should answer");
    assert_eq!(answer, Answer::Report(Report::CancellationRate("33.33%".to_string())));

    let requests = deployment
        .server
        .received_requests()
        .await
        .expect("request recording is enabled");
    assert!(requests.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn open_questions_are_generated_from_flat_index() {
    let deployment = deployment(IndexBackend::Flat).await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({"model": "llama3.2:latest", "stream": false})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"response": " Mostly city stays. "})),
        )
        .expect(1)
        .mount(&deployment.server)
        .await;
    let engine = engine(&deployment).await;

    let answer = engine
        .answer("Why do people cancel bookings?")
        .await
        .expect("should answer");
    assert_eq!(
        serde_json::to_value(&answer).expect("should serialize"),
        json!({"answer": "Mostly city stays."})
    );

    let requests = deployment
        .server
        .received_requests()
        .await
        .expect("request recording is enabled");
    let generate = requests
        .iter()
        .find(|request| request.url.path() == "/api/generate")
        .expect("generation request was sent");
    let body: serde_json::Value =
        serde_json::from_slice(&generate.body).expect("generation body is JSON");
    let prompt = body["prompt"].as_str().expect("prompt is a string");
    assert!(prompt.contains(
        "Relevant Data: Canceled City Hotel stay from Spain\nCanceled Resort Hotel stay from France\n"
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn open_questions_are_generated_from_lancedb() {
    let deployment = deployment(IndexBackend::Lancedb).await;
    mount_generation(
        &deployment.server,
        ResponseTemplate::new(200).set_body_json(json!({"response": "Spain leads cancellations."})),
    )
    .await;
    let engine = engine(&deployment).await;

    assert_eq!(
        engine.retriever().index().count().await.expect("should count"),
        5
    );

    let answer = engine
        .answer("Tell me about canceled stays")
        .await
        .expect("should answer");
    assert_eq!(
        answer,
        Answer::Text {
            answer: "Spain leads cancellations.".to_string()
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn generator_failure_becomes_answer_text() {
    let deployment = deployment(IndexBackend::Flat).await;
    mount_generation(&deployment.server, ResponseTemplate::new(500)).await;
    let engine = engine(&deployment).await;

    let answer = engine
        .answer("Which season is busiest?")
        .await
        .expect("generation failures still answer");

    match answer {
        Answer::Text { answer } => assert!(answer.starts_with("Error: "), "{}", answer),
        Answer::Report(report) => panic!("unexpected report {:?}", report),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_generation_is_reported() {
    let deployment = deployment(IndexBackend::Flat).await;
    mount_generation(
        &deployment.server,
        ResponseTemplate::new(200).set_body_json(json!({"response": ""})),
    )
    .await;
    let engine = engine(&deployment).await;

    let answer = engine
        .answer("Which season is busiest?")
        .await
        .expect("should answer");
    assert_eq!(
        answer,
        Answer::Text {
            answer: "No relevant information found.".to_string()
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_index_only_affects_open_questions() {
    let deployment = deployment(IndexBackend::Flat).await;
    fs::remove_file(deployment.temp_dir.path().join("passages.jsonl"))
        .expect("should remove index");
    let engine = engine(&deployment).await;

    let result = engine.answer("Why do people cancel bookings?").await;
    assert!(matches!(result, Err(InsightsError::Retrieval(_))));

    let answer = engine
        .answer("Which country has the highest booking cancellations?")
        .await
        .expect("analytics should still work");
    assert_eq!(
        serde_json::to_value(&answer).expect("should serialize"),
        json!({"highest_cancellations": {"country": "ESP", "cancellations": 1}})
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn named_reports() {
    let deployment = deployment(IndexBackend::Flat).await;
    let engine = engine(&deployment).await;

    let Report::TopLocations(locations) = engine.report("TOP_LOCATIONS").expect("should run report")
    else {
        panic!("expected top locations");
    };
    let countries: Vec<&str> = locations.iter().map(|l| l.country.as_str()).collect();
    assert_eq!(countries, ["PRT", "GBR", "Unknown"]);

    let Report::LeadTimeDistribution(bins) = engine
        .report("lead_time_distribution")
        .expect("should run report")
    else {
        panic!("expected lead time distribution");
    };
    assert_eq!(bins.len(), 10);
    assert_eq!(bins.iter().map(|bin| bin.count).sum::<u64>(), 6);

    let Report::RevenueTrends(trends) = engine.report("revenue_trends").expect("should run report")
    else {
        panic!("expected revenue trends");
    };
    assert_eq!(trends.len(), 2);
    assert_eq!((trends[0].year, trends[0].month), (2016, 7));
    assert_eq!((trends[1].year, trends[1].month), (2017, 3));

    let error = engine
        .report("occupancy")
        .expect_err("unknown report should fail");
    assert!(matches!(&error, InsightsError::UnknownReport(name) if name == "occupancy"));
    assert!(error.to_string().contains("lead_time_distribution"));
}
