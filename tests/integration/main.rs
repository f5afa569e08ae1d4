//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the remote API and run whole
//! harvests end-to-end.

mod harvest_tests;

use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::Duration;
use swapi_harvest::config::CollectionConfig;
use swapi_harvest::storage::{RecordSink, SinkError, SinkResult};
use swapi_harvest::{Fetcher, LinkFieldSpec, RateLimiter};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Sink that keeps every stored batch in memory
pub struct MemorySink<T> {
    pub batches: Mutex<Vec<Vec<T>>>,
    pub fail: bool,
}

impl<T> MemorySink<T> {
    pub fn new() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            fail: true,
        }
    }
}

impl<T: Clone + Send> RecordSink<T> for MemorySink<T> {
    fn store(&self, records: &[T]) -> SinkResult<()> {
        if self.fail {
            return Err(SinkError::Database("sink unavailable".to_string()));
        }
        self.batches
            .lock()
            .map_err(|e| SinkError::Poisoned(e.to_string()))?
            .push(records.to_vec());
        Ok(())
    }
}

pub fn collection(server: &MockServer, first_id: u32, last_id: u32, batch_size: u32) -> CollectionConfig {
    CollectionConfig {
        base_url: format!("{}/people", server.uri()),
        first_id,
        last_id,
        batch_size,
        list_delimiter: ", ".to_string(),
        report_dropped: false,
    }
}

pub fn fast_fetcher() -> Fetcher {
    Fetcher::new(reqwest::Client::new(), RateLimiter::new(4, Duration::ZERO))
}

pub fn link_spec() -> LinkFieldSpec {
    LinkFieldSpec::new()
        .with("homeworld", "name")
        .with("films", "title")
}

/// A character body in the shape the API serves it
pub fn person(server: &MockServer, name: &str, planet: u32, films: &[u32]) -> Value {
    let base = server.uri();
    json!({
        "name": name,
        "height": "172",
        "mass": "77",
        "hair_color": "blond",
        "skin_color": "fair",
        "eye_color": "blue",
        "birth_year": "19BBY",
        "gender": "male",
        "homeworld": format!("{}/planets/{}", base, planet),
        "films": films
            .iter()
            .map(|f| format!("{}/films/{}", base, f))
            .collect::<Vec<_>>(),
        "species": [],
        "vehicles": [],
        "starships": [],
    })
}

pub async fn mount_json(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mounts a linked resource that must be requested exactly `times` times
pub async fn mount_linked(server: &MockServer, route: &str, body: Value, times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(times)
        .mount(server)
        .await;
}

pub async fn mount_films(server: &MockServer) {
    for (id, title) in [
        (1, "A New Hope"),
        (2, "The Empire Strikes Back"),
        (3, "Return of the Jedi"),
    ] {
        mount_json(server, &format!("/films/{}", id), json!({ "title": title })).await;
    }
}
