use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tracing::debug;

use crate::error::{Error, Result};
use crate::record::Document;
use crate::settings::FetchSettings;

/// Plain GET client carrying only the configured user-agent.
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

pub(crate) fn client_builder(settings: &FetchSettings) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .user_agent(settings.user_agent.clone())
        .timeout(Duration::from_secs(settings.timeout_secs))
}

impl Fetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self> {
        Self::from_builder(client_builder(settings))
    }

    pub(crate) fn from_builder(builder: reqwest::ClientBuilder) -> Result<Self> {
        let client = builder.build().map_err(Error::Client)?;
        Ok(Fetcher { client })
    }

    /// Fetch one page. Non-2xx responses are errors.
    pub async fn fetch(&self, url: &str) -> Result<Document> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| Error::Fetch {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                url: url.to_string(),
                status,
            });
        }

        let html = response.text().await.map_err(|source| Error::Fetch {
            url: url.to_string(),
            source,
        })?;

        Ok(Document {
            url: url.to_string(),
            html,
        })
    }

    /// Fetch every URL, yielding one result per URL in the order given.
    ///
    /// With `concurrency <= 1` nothing runs ahead of the consumer: each GET
    /// starts inside [`Documents::next`]. Otherwise up to `concurrency`
    /// requests run at once and early arrivals wait until every earlier URL
    /// has been handed out.
    pub fn fetch_all(&self, urls: Vec<String>, concurrency: usize) -> Documents {
        if concurrency <= 1 {
            return Documents::Sequential {
                fetcher: self.clone(),
                urls: urls.into_iter(),
            };
        }

        let (tx, rx) = mpsc::channel(concurrency * 2);
        let semaphore = Arc::new(Semaphore::new(concurrency));

        for (index, url) in urls.into_iter().enumerate() {
            let fetcher = self.clone();
            let sem = Arc::clone(&semaphore);
            let tx = tx.clone();

            tokio::spawn(async move {
                let Ok(_permit) = sem.acquire_owned().await else {
                    return;
                };
                let doc = fetcher.fetch(&url).await;
                let _ = tx.send((index, doc)).await;
            });
        }

        // rx closes once every spawned task has dropped its sender
        drop(tx);
        Documents::Ordered {
            rx,
            pending: BTreeMap::new(),
            next: 0,
        }
    }
}

/// Fetch results in URL order.
pub enum Documents {
    Sequential {
        fetcher: Fetcher,
        urls: std::vec::IntoIter<String>,
    },
    Ordered {
        rx: mpsc::Receiver<(usize, Result<Document>)>,
        pending: BTreeMap<usize, Result<Document>>,
        next: usize,
    },
}

impl Documents {
    pub async fn next(&mut self) -> Option<Result<Document>> {
        match self {
            Documents::Sequential { fetcher, urls } => {
                let url = urls.next()?;
                Some(fetcher.fetch(&url).await)
            }
            Documents::Ordered { rx, pending, next } => loop {
                if let Some(doc) = pending.remove(&*next) {
                    *next += 1;
                    return Some(doc);
                }
                match rx.recv().await {
                    Some((index, doc)) => {
                        pending.insert(index, doc);
                    }
                    // a task that never reported leaves a gap; release the rest in order
                    None => return pending.pop_first().map(|(_, doc)| doc),
                }
            },
        }
    }
}

#[cfg(test)]
impl Documents {
    /// Already-fetched results, handed out in the given order.
    pub fn from_results(docs: Vec<Result<Document>>) -> Self {
        let (tx, rx) = mpsc::channel(docs.len().max(1));
        for (index, doc) in docs.into_iter().enumerate() {
            tx.try_send((index, doc)).unwrap();
        }
        Documents::Ordered {
            rx,
            pending: BTreeMap::new(),
            next: 0,
        }
    }
}
