//! Launch orchestrator
//!
//! Drives one station from claim to termination:
//!
//! ```text
//! Idle ──claim──▶ FrequencyClaimed ──first segment, connect──▶ Streaming
//!   │                    │                                        │
//!   └── occupied ──┐     └── generation / connect error ──┐       │
//!                  ▼                                      ▼       ▼
//!          Terminated(Failed)                     Terminated(Failed | Success)
//! ```
//!
//! The first segment is produced before the server connection is opened,
//! so a station whose content cannot be generated never touches the
//! streaming server. Its outcome is the first status a polling caller sees.

pub mod state;

pub use state::{LaunchReport, LaunchState, Termination};

use bytes::Bytes;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::codec::{FfmpegTranscoder, Transcoder};
use crate::config::{AppConfig, BroadcastConfig};
use crate::error::Error;
use crate::generator::{ContentGenerator, GeminiGenerator, SegmentPlan};
use crate::network::{Clock, Delivery, StreamConnection, Streamer, TokioClock};
use crate::registry::FrequencyRegistry;
use crate::station::{LaunchRequest, Station, StatusRecord, VoiceMap};
use crate::status::StatusReporter;
use crate::store::{self, FileStore, KeyValueStore};

/// Why the broadcast part of a launch ended
enum Ending {
    /// Cancelled after the station went on air
    Stopped,
    /// Cancelled before the first segment was ready
    CancelledBeforeAir,
    Failed(Error),
}

/// Run `fut` unless `cancel` fires first
async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

pub struct LaunchOrchestrator {
    registry: Arc<FrequencyRegistry>,
    status: Arc<StatusReporter>,
    generator: Arc<dyn ContentGenerator>,
    transcoder: Arc<dyn Transcoder>,
    streamer: Arc<Streamer>,
    clock: Arc<dyn Clock>,
    voices: VoiceMap,
    policy: BroadcastConfig,
}

impl LaunchOrchestrator {
    pub fn new(
        registry: Arc<FrequencyRegistry>,
        status: Arc<StatusReporter>,
        generator: Arc<dyn ContentGenerator>,
        transcoder: Arc<dyn Transcoder>,
        streamer: Arc<Streamer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            status,
            generator,
            transcoder,
            streamer,
            clock,
            voices: VoiceMap::default(),
            policy: BroadcastConfig::default(),
        }
    }

    /// Production wiring: file store, Gemini, ffmpeg and the wall clock
    pub fn from_config(config: &AppConfig) -> crate::Result<Self> {
        config.validate()?;
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.storage.data_dir)?);
        let clock: Arc<dyn Clock> = Arc::new(TokioClock);

        Ok(Self::new(
            Arc::new(FrequencyRegistry::new(store.clone())),
            Arc::new(StatusReporter::new(store)),
            Arc::new(GeminiGenerator::new(config.generation.clone())?),
            Arc::new(FfmpegTranscoder::default()),
            Arc::new(Streamer::new(config.server.clone(), clock.clone())),
            clock,
        )
        .with_voices(config.generation.voices.clone())
        .with_policy(config.broadcast.clone()))
    }

    pub fn with_voices(mut self, voices: VoiceMap) -> Self {
        self.voices = voices;
        self
    }

    pub fn with_policy(mut self, policy: BroadcastConfig) -> Self {
        self.policy = policy;
        self
    }

    pub fn registry(&self) -> &Arc<FrequencyRegistry> {
        &self.registry
    }

    pub fn status(&self) -> &Arc<StatusReporter> {
        &self.status
    }

    fn bitrate(&self) -> u32 {
        self.streamer.config().bitrate
    }

    fn transition(&self, station: &Station, report: &mut LaunchReport, next: LaunchState) {
        info!(
            launch_id = %station.launch_id,
            frequency = %station.frequency,
            "Launch state {} -> {}",
            report.state,
            next
        );
        report.state = next;
    }

    /// Write `record` unless it is already the station's current status.
    ///
    /// A failed write is logged; the broadcast carries on without it.
    async fn publish(&self, station: &mut Station, record: StatusRecord) {
        if station.status == record {
            return;
        }
        let status = self.status.clone();
        let launch_id = station.launch_id.clone();
        let written = record.clone();
        if let Err(e) = store::blocking(move || status.record(&launch_id, &written)).await {
            warn!(launch_id = %station.launch_id, "Failed to write status: {}", e);
        }
        station.status = record;
    }

    /// Run one launch to completion.
    ///
    /// Never returns an error: every outcome is written to the status
    /// record, and the report summarizes what happened.
    pub async fn run(&self, request: LaunchRequest, cancel: CancellationToken) -> LaunchReport {
        let mut station = Station::from_request(&request);
        let mut report = LaunchReport::default();
        info!(
            launch_id = %station.launch_id,
            frequency = %station.frequency,
            station = %station.name,
            "Launch requested"
        );

        let claim = {
            let registry = self.registry.clone();
            let frequency = station.frequency.clone();
            let name = station.name.clone();
            store::blocking(move || registry.claim(&frequency, &name)).await
        };
        if let Err(e) = claim {
            error!(launch_id = %station.launch_id, "Launch refused: {}", e);
            let message = e.to_string();
            self.publish(&mut station, StatusRecord::failed(message.clone())).await;
            report.message = message;
            self.transition(&station, &mut report, LaunchState::Terminated(Termination::Failed));
            return report;
        }
        self.transition(&station, &mut report, LaunchState::FrequencyClaimed);

        let ending = self
            .broadcast(&request.topic, &mut station, &mut report, &cancel)
            .await;

        let (termination, record) = match ending {
            Ending::Stopped => (Termination::Success, StatusRecord::success("broadcast stopped")),
            Ending::CancelledBeforeAir => (
                Termination::Failed,
                StatusRecord::failed("launch cancelled before going on air"),
            ),
            Ending::Failed(e) => {
                error!(launch_id = %station.launch_id, "Broadcast failed: {}", e);
                (Termination::Failed, StatusRecord::failed(format!("Failed: {e}")))
            }
        };
        report.message = record.message.clone();
        self.publish(&mut station, record).await;

        let registry = self.registry.clone();
        let frequency = station.frequency.clone();
        if let Err(e) = store::blocking(move || registry.release(&frequency)).await {
            warn!(frequency = %station.frequency, "Failed to release frequency: {}", e);
        }
        self.transition(&station, &mut report, LaunchState::Terminated(termination));
        report
    }

    async fn broadcast(
        &self,
        topic: &str,
        station: &mut Station,
        report: &mut LaunchReport,
        cancel: &CancellationToken,
    ) -> Ending {
        let plan = SegmentPlan::new(topic);

        // The first segment decides whether the station comes up at all
        let first = match self.produce_segment(&plan, 0, cancel).await {
            Ok(Some(mp3)) => {
                let message = format!("station {} is live on {}", station.name, station.frequency);
                self.publish(station, StatusRecord::success(message)).await;
                mp3
            }
            Ok(None) => return Ending::CancelledBeforeAir,
            Err(e) => {
                self.publish(station, StatusRecord::failed(format!("Failed: {e}"))).await;
                return Ending::Failed(e);
            }
        };

        let mount = station.frequency.mount_path();
        let mut connection = match until_cancelled(cancel, self.streamer.connect(&mount)).await {
            None => return Ending::Stopped,
            Some(Err(e)) => return Ending::Failed(e.into()),
            Some(Ok(connection)) => connection,
        };
        self.transition(station, report, LaunchState::Streaming);

        let ending = self
            .stream_loop(&mut connection, first, &plan, station, report, cancel)
            .await;
        connection.close().await;
        ending
    }

    async fn stream_loop(
        &self,
        connection: &mut StreamConnection,
        first: Bytes,
        plan: &SegmentPlan,
        station: &Station,
        report: &mut LaunchReport,
        cancel: &CancellationToken,
    ) -> Ending {
        let bitrate = self.bitrate();
        let mut index = 0u64;
        let mut payload = first;

        loop {
            match connection.send_paced(&payload, bitrate, cancel).await {
                Ok(Delivery::Complete { bytes }) => {
                    report.segments_streamed += 1;
                    report.bytes_streamed += bytes as u64;
                    debug!(
                        launch_id = %station.launch_id,
                        index,
                        bytes,
                        "Segment delivered"
                    );
                }
                Ok(Delivery::Cancelled { bytes }) => {
                    report.bytes_streamed += bytes as u64;
                    return Ending::Stopped;
                }
                Err(e) => return Ending::Failed(e.into()),
            }

            if until_cancelled(cancel, self.clock.sleep(self.policy.segment_gap()))
                .await
                .is_none()
            {
                return Ending::Stopped;
            }

            index += 1;
            payload = match self.produce_with_retry(plan, index, station, cancel).await {
                Ok(Some(mp3)) => mp3,
                Ok(None) => return Ending::Stopped,
                Err(e) => return Ending::Failed(e),
            };
        }
    }

    /// Generate and transcode segment `index`.
    ///
    /// `Ok(None)` means the launch was cancelled between or during stages.
    async fn produce_segment(
        &self,
        plan: &SegmentPlan,
        index: u64,
        cancel: &CancellationToken,
    ) -> Result<Option<Bytes>, Error> {
        let spec = plan.spec(index);
        let Some(segment) = until_cancelled(cancel, self.generator.generate_segment(&spec, &self.voices)).await
        else {
            return Ok(None);
        };
        let segment = segment?;
        if cancel.is_cancelled() {
            return Ok(None);
        }

        let encode = self.transcoder.encode(
            segment.raw_audio.clone(),
            segment.sample_rate,
            segment.channels,
            self.bitrate(),
        );
        let Some(mp3) = until_cancelled(cancel, encode).await else {
            return Ok(None);
        };
        let mp3 = mp3?;
        if cancel.is_cancelled() {
            return Ok(None);
        }

        debug!(
            index,
            kind = %segment.kind,
            seconds = segment.duration_secs(),
            mp3_bytes = mp3.len(),
            "Segment ready"
        );
        Ok(Some(mp3))
    }

    /// Produce a mid-broadcast segment, retrying failed attempts
    async fn produce_with_retry(
        &self,
        plan: &SegmentPlan,
        index: u64,
        station: &Station,
        cancel: &CancellationToken,
    ) -> Result<Option<Bytes>, Error> {
        let mut attempt = 0u32;
        loop {
            match self.produce_segment(plan, index, cancel).await {
                Ok(result) => return Ok(result),
                Err(e) if attempt < self.policy.segment_retries => {
                    attempt += 1;
                    warn!(
                        launch_id = %station.launch_id,
                        index,
                        attempt,
                        "Segment failed, retrying: {}",
                        e
                    );
                    let backoff = self.policy.retry_backoff() * attempt;
                    if until_cancelled(cancel, self.clock.sleep(backoff)).await.is_none() {
                        return Ok(None);
                    }
                }
                Err(e) => {
                    error!(
                        launch_id = %station.launch_id,
                        index,
                        "Segment failed after {} retries",
                        attempt
                    );
                    return Err(e);
                }
            }
        }
    }
}
