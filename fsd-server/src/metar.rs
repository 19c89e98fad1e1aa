//! METAR lookups against the NOAA text service, off the session event
//! loops. A small worker pool pulls jobs from a bounded queue; when the
//! queue is full the request is refused immediately rather than letting
//! weather lookups back up the protocol path.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::post_office::Address;
use crate::wire::pdu::MetarResponse;
use crate::wire::{ErrorCode, FsdError, SERVER_CALLSIGN};

const QUEUE_DEPTH: usize = 128;
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("weather queue full")]
pub struct QueueFull;

struct Job<A> {
    requester: Arc<A>,
    station: String,
}

pub struct MetarService<A> {
    tx: mpsc::Sender<Job<A>>,
}

impl<A: Address> MetarService<A> {
    pub fn spawn(workers: usize, cancel: CancellationToken) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("building weather HTTP client")?;
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let rx = Arc::new(Mutex::new(rx));
        for _ in 0..workers.max(1) {
            tokio::spawn(worker(Arc::clone(&rx), client.clone(), cancel.clone()));
        }
        Ok(Self { tx })
    }

    pub fn submit(&self, requester: Arc<A>, station: String) -> Result<(), QueueFull> {
        self.tx
            .try_send(Job { requester, station })
            .map_err(|_| QueueFull)
    }
}

async fn worker<A: Address>(
    rx: Arc<Mutex<mpsc::Receiver<Job<A>>>>,
    client: reqwest::Client,
    cancel: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            _ = cancel.cancelled() => return,
            job = async { rx.lock().await.recv().await } => match job {
                Some(job) => job,
                None => return,
            },
        };
        match fetch_metar(&client, &job.station).await {
            Ok(metar) => {
                let response = MetarResponse {
                    from: SERVER_CALLSIGN.into(),
                    to: job.requester.callsign().into(),
                    metar,
                };
                job.requester.send_packet(&response.serialize());
            }
            Err(e) => {
                debug!(station = %job.station, error = %e, "METAR fetch failed");
                let err = FsdError::generic(ErrorCode::NoWeatherProfile, &job.station)
                    .addressed(job.requester.callsign());
                job.requester.send_packet(&err.serialize());
            }
        }
    }
}

/// NOAA serves one file per station: a timestamp line, then the METAR.
async fn fetch_metar(client: &reqwest::Client, station: &str) -> anyhow::Result<String> {
    let url = format!(
        "https://tgftp.nws.noaa.gov/data/observations/metar/stations/{}.TXT",
        station.to_uppercase()
    );
    let body = client
        .get(&url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    let mut lines = body.lines();
    lines.next().context("empty station file")?;
    let metar = lines.next().context("station file missing METAR line")?;
    if metar.trim().is_empty() {
        anyhow::bail!("blank METAR line");
    }
    Ok(metar.trim().to_owned())
}
