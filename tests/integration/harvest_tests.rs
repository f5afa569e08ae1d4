use crate::{
    collection, fast_fetcher, link_spec, mount_films, mount_json, mount_linked, person,
    MemorySink,
};
use serde_json::json;
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};
use swapi_harvest::harvest::{FailureStage, Harvester};
use swapi_harvest::storage::{RecordSink, SinkError, SinkResult};
use swapi_harvest::{Fetcher, LinkFieldSpec, RateLimiter, Record};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn stored(sink: &MemorySink<Record>) -> Vec<Record> {
    sink.batches.lock().unwrap().iter().flatten().cloned().collect()
}

#[tokio::test]
async fn test_shared_links_fetched_once_per_batch() {
    let server = MockServer::start().await;

    mount_json(&server, "/people/1", person(&server, "Luke Skywalker", 1, &[])).await;
    mount_json(&server, "/people/2", person(&server, "Owen Lars", 1, &[])).await;
    mount_json(&server, "/people/3", person(&server, "Leia Organa", 2, &[])).await;
    mount_linked(&server, "/planets/1", json!({"name": "Tatooine"}), 1).await;
    mount_linked(&server, "/planets/2", json!({"name": "Alderaan"}), 1).await;

    let sink = Arc::new(MemorySink::<Record>::new());
    let mut harvester = Harvester::with_fetcher(
        fast_fetcher(),
        collection(&server, 1, 3, 3),
        link_spec(),
        Arc::clone(&sink),
    );

    let report = harvester.run().await;

    assert!(report.is_complete());
    assert_eq!(report.links_fetched, 2);
    assert_eq!(harvester.fetcher().requests_sent(), 5);
    assert_eq!(report.records_stored, 3);

    let records = stored(&sink);
    let worlds: Vec<_> = records.iter().map(|r| r.get("homeworld").unwrap()).collect();
    assert_eq!(worlds, vec!["Tatooine", "Tatooine", "Alderaan"]);
    assert!(records
        .iter()
        .all(|r| !r.get("homeworld").unwrap().starts_with("http")));

    server.verify().await;
}

#[tokio::test]
async fn test_primary_404_is_dropped_without_error() {
    let server = MockServer::start().await;
    mount_films(&server).await;
    mount_json(&server, "/planets/1", json!({"name": "Tatooine"})).await;

    mount_json(&server, "/people/1", person(&server, "Luke Skywalker", 1, &[1])).await;
    Mock::given(method("GET"))
        .and(path("/people/2"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Not found"})))
        .mount(&server)
        .await;
    mount_json(&server, "/people/3", person(&server, "R2-D2", 1, &[2])).await;

    let sink = Arc::new(MemorySink::<Record>::new());
    let mut harvester = Harvester::with_fetcher(
        fast_fetcher(),
        collection(&server, 1, 3, 3),
        link_spec(),
        Arc::clone(&sink),
    );

    let report = harvester.run().await;

    assert!(report.failures.is_empty());
    assert!(report.is_complete());
    assert_eq!(report.dropped.len(), 1);
    assert_eq!(report.dropped[0].id, 2);
    assert_eq!(report.dropped[0].reason, "HTTP 404");
    assert_eq!(report.primaries_fetched, 2);

    let ids: Vec<_> = stored(&sink).iter().map(Record::id).collect();
    assert_eq!(ids, vec![1, 3]);
}

#[tokio::test]
async fn test_dropped_primary_fails_run_when_reported() {
    let server = MockServer::start().await;
    mount_json(&server, "/planets/1", json!({"name": "Tatooine"})).await;
    mount_json(&server, "/people/1", person(&server, "Luke Skywalker", 1, &[])).await;
    Mock::given(method("GET"))
        .and(path("/people/2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut config = collection(&server, 1, 2, 2);
    config.report_dropped = true;
    let sink = Arc::new(MemorySink::<Record>::new());
    let mut harvester =
        Harvester::with_fetcher(fast_fetcher(), config, link_spec(), Arc::clone(&sink));

    let report = harvester.run().await;

    assert_eq!(report.records_stored, 1);
    assert_eq!(report.primaries_fetched, 1);
    assert_eq!(report.dropped.len(), 1);
    assert!(!report.is_complete());
}

#[tokio::test]
async fn test_secondary_decode_error_fails_whole_batch() {
    let server = MockServer::start().await;
    mount_json(&server, "/planets/1", json!({"name": "Tatooine"})).await;
    Mock::given(method("GET"))
        .and(path("/planets/9"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{ not json"))
        .mount(&server)
        .await;

    mount_json(&server, "/people/1", person(&server, "Luke Skywalker", 1, &[])).await;
    mount_json(&server, "/people/2", person(&server, "Ghost", 9, &[])).await;
    mount_json(&server, "/people/3", person(&server, "Owen Lars", 1, &[])).await;

    let sink = Arc::new(MemorySink::<Record>::new());
    let mut harvester = Harvester::with_fetcher(
        fast_fetcher(),
        collection(&server, 1, 3, 3),
        link_spec(),
        Arc::clone(&sink),
    );

    let report = harvester.run().await;

    assert!(!report.is_complete());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].batch, 0);
    assert_eq!(report.failures[0].stage, FailureStage::Resolving);
    assert_eq!(report.records_dispatched, 0);
    assert!(sink.batches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_batch_does_not_stop_later_batches() {
    let server = MockServer::start().await;
    mount_json(&server, "/planets/1", json!({"name": "Tatooine"})).await;
    Mock::given(method("GET"))
        .and(path("/planets/9"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    mount_json(&server, "/people/1", person(&server, "Ghost", 9, &[])).await;
    mount_json(&server, "/people/2", person(&server, "Luke Skywalker", 1, &[])).await;

    let sink = Arc::new(MemorySink::<Record>::new());
    let mut harvester = Harvester::with_fetcher(
        fast_fetcher(),
        collection(&server, 1, 2, 1),
        link_spec(),
        Arc::clone(&sink),
    );

    let report = harvester.run().await;

    assert_eq!(report.batches, 2);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].message.contains("503"));
    let ids: Vec<_> = stored(&sink).iter().map(Record::id).collect();
    assert_eq!(ids, vec![2]);
}

#[tokio::test]
async fn test_link_lists_keep_their_order() {
    let server = MockServer::start().await;
    mount_films(&server).await;
    mount_json(&server, "/planets/1", json!({"name": "Tatooine"})).await;
    mount_json(&server, "/people/1", person(&server, "Luke Skywalker", 1, &[3, 1, 2])).await;

    let sink = Arc::new(MemorySink::<Record>::new());
    let mut harvester = Harvester::with_fetcher(
        fast_fetcher(),
        collection(&server, 1, 1, 1),
        link_spec(),
        Arc::clone(&sink),
    );

    let report = harvester.run().await;
    assert!(report.is_complete());

    let records = stored(&sink);
    assert_eq!(
        records[0].get("films"),
        Some("Return of the Jedi, A New Hope, The Empire Strikes Back")
    );
}

#[tokio::test]
async fn test_every_batch_resolves_its_own_links() {
    let server = MockServer::start().await;
    for id in 1..=5 {
        mount_json(
            &server,
            &format!("/people/{}", id),
            person(&server, &format!("Clone {}", id), 1, &[]),
        )
        .await;
    }
    // Three batches, each referencing the same planet
    mount_linked(&server, "/planets/1", json!({"name": "Kamino"}), 3).await;

    let sink = Arc::new(MemorySink::<Record>::new());
    let mut harvester = Harvester::with_fetcher(
        fast_fetcher(),
        collection(&server, 1, 5, 2),
        link_spec(),
        Arc::clone(&sink),
    );

    let report = harvester.run().await;

    assert_eq!(report.batches, 3);
    assert_eq!(report.links_fetched, 3);
    assert_eq!(report.records_stored, 5);
    assert_eq!(sink.batches.lock().unwrap().len(), 3);

    server.verify().await;
}

#[tokio::test]
async fn test_sink_failures_are_reported() {
    let server = MockServer::start().await;
    mount_json(&server, "/planets/1", json!({"name": "Tatooine"})).await;
    mount_json(&server, "/people/1", person(&server, "Luke Skywalker", 1, &[])).await;
    mount_json(&server, "/people/2", person(&server, "Owen Lars", 1, &[])).await;

    let sink = Arc::new(MemorySink::<Record>::failing());
    let mut harvester = Harvester::with_fetcher(
        fast_fetcher(),
        collection(&server, 1, 2, 1),
        link_spec(),
        sink,
    );

    let report = harvester.run().await;

    assert_eq!(report.records_dispatched, 2);
    assert_eq!(report.records_stored, 0);
    assert_eq!(report.failures.len(), 2);
    assert!(report
        .failures
        .iter()
        .all(|f| f.stage == FailureStage::Storing));
}

#[tokio::test]
async fn test_requests_are_paced() {
    let server = MockServer::start().await;
    for id in 1..=3 {
        mount_json(&server, &format!("/people/{}", id), json!({"name": "Droid"})).await;
    }

    let fetcher = Fetcher::new(
        reqwest::Client::new(),
        RateLimiter::new(1, Duration::from_millis(100)),
    );
    let sink = Arc::new(MemorySink::<Record>::new());
    let mut harvester = Harvester::with_fetcher(
        fetcher,
        collection(&server, 1, 3, 3),
        LinkFieldSpec::new(),
        Arc::clone(&sink),
    );

    let start = Instant::now();
    let report = harvester.run().await;

    assert!(report.is_complete());
    assert_eq!(report.records_stored, 3);
    // One slot held 100ms per request: the third request cannot start before 200ms
    assert!(start.elapsed() >= Duration::from_millis(200));
}

/// Sink that holds the write of resource 1 until it is released
struct HeldSink {
    release: Mutex<mpsc::Receiver<()>>,
    stored: Mutex<Vec<u32>>,
}

impl RecordSink<Record> for HeldSink {
    fn store(&self, records: &[Record]) -> SinkResult<()> {
        if records.iter().any(|r| r.id() == 1) {
            self.release
                .lock()
                .map_err(|e| SinkError::Poisoned(e.to_string()))?
                .recv_timeout(Duration::from_secs(5))
                .map_err(|_| SinkError::Database("write of resource 1 was never released".to_string()))?;
        }
        self.stored
            .lock()
            .map_err(|e| SinkError::Poisoned(e.to_string()))?
            .extend(records.iter().map(Record::id));
        Ok(())
    }
}

#[tokio::test]
async fn test_next_batch_fetches_while_previous_is_stored() {
    let server = MockServer::start().await;
    mount_json(&server, "/people/1", json!({"name": "Luke Skywalker"})).await;
    mount_json(&server, "/people/2", json!({"name": "C-3PO"})).await;

    let (release, held) = mpsc::channel();
    let sink = Arc::new(HeldSink {
        release: Mutex::new(held),
        stored: Mutex::new(Vec::new()),
    });
    let mut harvester = Harvester::with_fetcher(
        fast_fetcher(),
        collection(&server, 1, 2, 1),
        LinkFieldSpec::new(),
        Arc::clone(&sink),
    );

    // Batch 0's write is only released once batch 1's request has arrived
    let watch = async {
        for _ in 0..200 {
            let requests = server.received_requests().await.unwrap_or_default();
            if requests.iter().any(|r| r.url.path() == "/people/2") {
                return release.send(()).is_ok();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    };

    let (report, released) = tokio::join!(harvester.run(), watch);

    assert!(released);
    assert!(report.is_complete());
    assert_eq!(report.records_stored, 2);

    let mut ids = sink.stored.lock().unwrap().clone();
    ids.sort();
    assert_eq!(ids, vec![1, 2]);
}
