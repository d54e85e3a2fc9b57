//! Polling scheduler: drives scans and publishes deltas.
//!
//! One tokio task owns the scanner and the previously held snapshot, so no
//! locking exists anywhere in the engine. The task's `select!` loop
//! serializes its three inputs — the interval tick, forced-scan commands,
//! and the shutdown flag — which gives the non-overlap guarantee for free:
//! a manual scan and a periodic tick can never run concurrently, and a stop
//! request lets whichever tick is in flight finish before the task exits.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use super::diff::{diff, Delta};
use super::endpoint::EndpointSource;
use super::error::{ScanError, ScanResult};
use super::process::NameResolver;
use super::snapshot::{Snapshot, SnapshotBuilder};

/// Default polling interval between table scans.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Scans the TCP table into a snapshot on demand.
///
/// This is the synchronous core of every tick; it is also the `scan once`
/// surface used to list current ports and to seed a baseline before polling
/// starts.
pub struct Scanner<S, R> {
    source: S,
    builder: SnapshotBuilder<R>,
}

impl<S: EndpointSource, R: NameResolver> Scanner<S, R> {
    /// Combine an endpoint source with a name resolver.
    pub fn new(source: S, resolver: R) -> Self {
        Self {
            source,
            builder: SnapshotBuilder::new(resolver),
        }
    }

    /// Run one full scan: query, decode, filter, resolve names.
    pub fn scan_once(&mut self) -> ScanResult<Snapshot> {
        let endpoints = self.source.endpoints()?;
        Ok(self.builder.build(&endpoints))
    }
}

/// Events published by the monitor loop.
#[derive(Debug)]
pub enum MonitorEvent {
    /// Ports changed since the previous snapshot. Ordinary ticks suppress
    /// empty deltas; forced scans deliver theirs even when empty so a
    /// "no changes" state can be shown.
    Delta(Delta),
    /// A tick failed. The held snapshot was replaced with an empty one and
    /// polling continues.
    ScanFailed(ScanError),
}

enum Command {
    ForceScan(oneshot::Sender<ScanResult<Delta>>),
}

/// Handle to a running monitor task.
pub struct MonitorHandle {
    commands: mpsc::Sender<Command>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Run one extra tick outside the schedule, serialized against periodic
    /// ticks, and return its delta (empty or not). The delta is also
    /// mirrored on the event channel.
    pub async fn force_scan(&self) -> ScanResult<Delta> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::ForceScan(reply_tx))
            .await
            .map_err(|_| ScanError::MonitorStopped)?;
        reply_rx.await.map_err(|_| ScanError::MonitorStopped)?
    }

    /// Stop polling and wait for any in-flight tick to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Periodic scan-and-diff driver.
///
/// Owns the previous snapshot between ticks: created without one, replaced
/// wholesale every tick, discarded at stop. Multiple monitors run
/// independently, each with its own state.
pub struct Monitor<S, R> {
    scanner: Scanner<S, R>,
    previous: Option<Snapshot>,
    poll_interval: Duration,
}

impl<S, R> Monitor<S, R>
where
    S: EndpointSource + Send + 'static,
    R: NameResolver + Send + 'static,
{
    /// Build a monitor around a scanner.
    pub fn new(scanner: Scanner<S, R>, poll_interval: Duration) -> Self {
        Self {
            scanner,
            previous: None,
            poll_interval,
        }
    }

    /// Seed the held snapshot, so the first periodic tick reports changes
    /// instead of silently establishing a baseline.
    pub fn with_baseline(mut self, snapshot: Snapshot) -> Self {
        self.previous = Some(snapshot);
        self
    }

    /// The snapshot held from the last completed tick, if any.
    pub fn held_snapshot(&self) -> Option<&Snapshot> {
        self.previous.as_ref()
    }

    /// One periodic tick: scan, diff against the held snapshot, replace it.
    ///
    /// Returns the events to publish, in order. The first tick ever (no held
    /// snapshot) establishes the baseline and publishes nothing. A failed
    /// tick publishes [`MonitorEvent::ScanFailed`] and treats the current
    /// table as empty, so a follow-up delta reports the previously held
    /// ports as removed.
    pub fn poll_once(&mut self) -> Vec<MonitorEvent> {
        match self.scanner.scan_once() {
            Ok(current) => {
                let event = match self.previous.take() {
                    Some(previous) => {
                        let delta = diff(&previous, &current);
                        if delta.is_empty() {
                            None
                        } else {
                            Some(MonitorEvent::Delta(delta))
                        }
                    }
                    None => {
                        debug!(ports = current.len(), "established baseline snapshot");
                        None
                    }
                };
                self.previous = Some(current);
                event.into_iter().collect()
            }
            Err(err) => {
                warn!(error = %err, "scan failed, treating current table as empty");
                let mut events = vec![MonitorEvent::ScanFailed(err)];
                if let Some(previous) = self.previous.take() {
                    let delta = diff(&previous, &Snapshot::empty());
                    if !delta.is_empty() {
                        events.push(MonitorEvent::Delta(delta));
                    }
                }
                self.previous = Some(Snapshot::empty());
                events
            }
        }
    }

    /// One forced tick: always produces a delta, even an empty one.
    ///
    /// With no baseline yet, the diff runs against the empty snapshot, so
    /// every currently listening port reports as added.
    pub fn force_poll(&mut self) -> ScanResult<Delta> {
        match self.scanner.scan_once() {
            Ok(current) => {
                let previous = self.previous.take().unwrap_or_default();
                let delta = diff(&previous, &current);
                self.previous = Some(current);
                Ok(delta)
            }
            Err(err) => {
                warn!(error = %err, "forced scan failed, treating current table as empty");
                self.previous = Some(Snapshot::empty());
                Err(err)
            }
        }
    }

    /// Spawn the polling loop and return its handle plus the event stream.
    ///
    /// The first interval tick fires one full period after this call, so a
    /// start followed immediately by [`MonitorHandle::stop`] executes no
    /// tick at all.
    pub fn start(self) -> (MonitorHandle, mpsc::Receiver<MonitorEvent>) {
        let (event_tx, event_rx) = mpsc::channel(32);
        let (command_tx, command_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(self.run(event_tx, command_rx, shutdown_rx));

        (
            MonitorHandle {
                commands: command_tx,
                shutdown: shutdown_tx,
                task,
            },
            event_rx,
        )
    }

    async fn run(
        mut self,
        events: mpsc::Sender<MonitorEvent>,
        mut commands: mpsc::Receiver<Command>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut interval =
            time::interval_at(time::Instant::now() + self.poll_interval, self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    for event in self.poll_once() {
                        if events.send(event).await.is_err() {
                            debug!("monitor event receiver dropped, shutting down");
                            return;
                        }
                    }
                }
                Some(command) = commands.recv() => {
                    match command {
                        Command::ForceScan(reply) => {
                            let outcome = self.force_poll();
                            let mirror = outcome.as_ref().ok().cloned();
                            let _ = reply.send(outcome);
                            if let Some(delta) = mirror {
                                if events.send(MonitorEvent::Delta(delta)).await.is_err() {
                                    debug!("monitor event receiver dropped, shutting down");
                                    return;
                                }
                            }
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("monitor received shutdown signal");
                        return;
                    }
                }
            }
        }
    }
}
