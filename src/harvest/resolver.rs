//! Link resolution for one batch of primary resources
//!
//! Resolution runs in three passes:
//! 1. Discovery: every URL found in a declared link field gets exactly one
//!    fetch task, no matter how many primaries or fields reference it.
//! 2. Join: all tasks are awaited before anything is substituted.
//! 3. Substitution: each URL is replaced in place by the configured attribute
//!    of the resource it points to, keeping list positions.
//!
//! Any failed linked fetch fails the whole batch.

use crate::config::LinkEntry;
use crate::harvest::fetcher::{FetchResult, Fetcher};
use crate::record::Record;
use crate::{FetchError, HarvestError, LinkError};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tokio::task::JoinHandle;

/// A decoded primary resource and its id
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryResource {
    pub id: u32,
    pub body: Value,
}

impl PrimaryResource {
    pub fn new(id: u32, body: Value) -> Self {
        Self { id, body }
    }
}

/// Ordered mapping from link field name to the attribute extracted from its target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkFieldSpec {
    fields: Vec<(String, String)>,
}

impl LinkFieldSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `field` as a link field whose targets resolve to `attribute`
    pub fn with(mut self, field: &str, attribute: &str) -> Self {
        self.fields.push((field.to_string(), attribute.to_string()));
        self
    }

    pub fn from_entries(entries: &[LinkEntry]) -> Self {
        entries
            .iter()
            .fold(Self::new(), |spec, entry| spec.with(&entry.field, &entry.attribute))
    }

    /// Fields in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(f, a)| (f.as_str(), a.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

type LinkTask = JoinHandle<Result<FetchResult, FetchError>>;

/// In-flight fetches of one batch, keyed by URL
///
/// Holds at most one task per distinct URL. Owned by a single resolution;
/// dropping it aborts every task that was not joined.
#[derive(Default)]
pub struct PendingLinkMap {
    order: Vec<String>,
    tasks: HashMap<String, LinkTask>,
}

impl PendingLinkMap {
    /// Spawns a fetch for `url` unless one already exists
    ///
    /// Returns `true` when a new task was created.
    pub fn ensure(&mut self, url: &str, fetcher: &Fetcher) -> bool {
        if self.tasks.contains_key(url) {
            return false;
        }

        let fetcher = fetcher.clone();
        let target = url.to_string();
        let task = tokio::spawn(async move { fetcher.fetch(&target).await });

        self.order.push(url.to_string());
        self.tasks.insert(url.to_string(), task);
        true
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits for every task, then reports the first failure in creation order
    pub async fn join(mut self) -> Result<ResolvedLinks, LinkError> {
        let mut settled = Vec::with_capacity(self.order.len());
        for url in &self.order {
            let outcome = match self.tasks.remove(url) {
                Some(task) => task.await,
                None => continue,
            };
            settled.push((url.clone(), outcome));
        }

        let mut bodies = HashMap::with_capacity(settled.len());
        for (url, outcome) in settled {
            let result = match outcome {
                Ok(Ok(result)) => result,
                Ok(Err(source)) => return Err(LinkError::Fetch { url, source }),
                Err(e) => {
                    return Err(LinkError::Task {
                        url,
                        message: e.to_string(),
                    })
                }
            };

            if !result.is_ok() {
                return Err(LinkError::Status {
                    url,
                    status_code: result.status_code,
                });
            }
            bodies.insert(url, result.body);
        }

        Ok(ResolvedLinks { bodies })
    }
}

impl Drop for PendingLinkMap {
    fn drop(&mut self) {
        for task in self.tasks.values() {
            task.abort();
        }
    }
}

/// Bodies of every linked resource of a batch, keyed by URL
#[derive(Debug, Default)]
pub struct ResolvedLinks {
    bodies: HashMap<String, Value>,
}

impl ResolvedLinks {
    /// The scalar `attribute` of the resource at `url`
    pub fn attribute(&self, url: &str, attribute: &str) -> Result<Value, LinkError> {
        self.bodies
            .get(url)
            .and_then(|body| body.get(attribute))
            .filter(|value| !value.is_null())
            .cloned()
            .ok_or_else(|| LinkError::MissingAttribute {
                url: url.to_string(),
                attribute: attribute.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

/// Outcome of resolving one batch
#[derive(Debug)]
pub struct Resolution {
    pub records: Vec<Record>,
    /// Number of distinct linked resources fetched
    pub links_fetched: usize,
}

/// Collects the URLs held by one link field value
///
/// Missing and `null` fields hold no links. Anything other than a string or
/// a list of strings is malformed.
fn link_urls<'a>(
    id: u32,
    field: &str,
    value: Option<&'a Value>,
) -> Result<Vec<&'a str>, LinkError> {
    let malformed = || LinkError::Malformed {
        id,
        field: field.to_string(),
    };

    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(url)) => Ok(vec![url.as_str()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().ok_or_else(malformed))
            .collect(),
        Some(_) => Err(malformed()),
    }
}

/// Distinct URLs referenced by `primaries`, in first-seen order
fn distinct_links<'a>(
    primaries: &'a [PrimaryResource],
    spec: &LinkFieldSpec,
) -> Result<Vec<&'a str>, LinkError> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for primary in primaries {
        for (field, _) in spec.iter() {
            for url in link_urls(primary.id, field, primary.body.get(field))? {
                if seen.insert(url) {
                    tracing::trace!("Discovered link {} via resource {}", url, primary.id);
                    urls.push(url);
                }
            }
        }
    }

    Ok(urls)
}

/// Creates one fetch task per distinct URL referenced by `primaries`
///
/// Every link field of the batch is checked before the first task is
/// spawned, so a malformed field starts no fetches at all.
pub fn discover(
    primaries: &[PrimaryResource],
    spec: &LinkFieldSpec,
    fetcher: &Fetcher,
) -> Result<PendingLinkMap, LinkError> {
    let urls = distinct_links(primaries, spec)?;

    let mut pending = PendingLinkMap::default();
    for url in urls {
        pending.ensure(url, fetcher);
    }

    Ok(pending)
}

/// Replaces every link field of `primary` with its resolved attribute values
pub fn substitute(
    primary: &mut PrimaryResource,
    spec: &LinkFieldSpec,
    links: &ResolvedLinks,
) -> Result<(), LinkError> {
    let id = primary.id;

    for (field, attribute) in spec.iter() {
        let Some(slot) = primary.body.get_mut(field) else {
            continue;
        };

        let replacement = match slot {
            Value::Null => continue,
            Value::String(url) => links.attribute(url, attribute)?,
            Value::Array(items) => {
                for item in items.iter_mut() {
                    let value = {
                        let url = item.as_str().ok_or_else(|| LinkError::Malformed {
                            id,
                            field: field.to_string(),
                        })?;
                        links.attribute(url, attribute)?
                    };
                    *item = value;
                }
                continue;
            }
            _ => {
                return Err(LinkError::Malformed {
                    id,
                    field: field.to_string(),
                })
            }
        };
        *slot = replacement;
    }

    Ok(())
}

/// Resolves every link field of a batch and flattens the results into records
///
/// Primaries keep their input order. Either every primary is resolved or the
/// batch fails as a whole.
pub async fn resolve(
    mut primaries: Vec<PrimaryResource>,
    spec: &LinkFieldSpec,
    fetcher: &Fetcher,
    delimiter: &str,
) -> Result<Resolution, HarvestError> {
    let pending = discover(&primaries, spec, fetcher)?;
    let links_fetched = pending.len();
    tracing::debug!(
        "Resolving {} distinct links for {} resources",
        links_fetched,
        primaries.len()
    );

    let links = pending.join().await?;

    for primary in primaries.iter_mut() {
        substitute(primary, spec, &links)?;
    }

    let records = primaries
        .iter()
        .map(|primary| Record::flatten(primary.id, &primary.body, delimiter))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Resolution {
        records,
        links_fetched,
    })
}
