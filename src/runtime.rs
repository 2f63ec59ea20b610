//! # Event Loop
//!
//! Wires a [`WatchFaceEngine`] to real services and drives it from one
//! unbounded channel on the current tokio thread.
//!
//! ## Event Sources
//! - [`TokioScheduler`]: blink timer and daily weather request
//! - [`SpoolChannel`]: connection results and inbox batches
//! - [`SystemHost`]: time-zone changes while registered
//! - a minute ticker for [`EngineEvent::TimeTick`]
//! - Ctrl-C, mapped to [`EngineEvent::Shutdown`]
//!
//! After each dispatch the engine's invalidation flag is checked and, if set,
//! the face is redrawn into a [`Framebuffer`] and handed to the caller.

use crate::clock::{Clock, FixedTimeZone, LocalTimeZone, SystemClock, TimeZoneSource};
use crate::config::Config;
use crate::engine::{EngineEvent, FaceHost, WatchFaceEngine};
use crate::framebuffer::Framebuffer;
use crate::scheduler::{delay_to_next_boundary, ManualScheduler, TokioScheduler};
use crate::spool::{self, SpoolChannel, SyncError};
use crate::style::Shape;
use crate::sync::{DataClient, PutDataRequest};
use crate::Capabilities;
use chrono::FixedOffset;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

const MINUTE_MILLIS: i64 = 60_000;

/// How often a registered receiver re-reads the zone offset
const ZONE_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Time zone source chosen by `clock.utc_offset_minutes`.
pub fn time_zone_source(config: &Config) -> Arc<dyn TimeZoneSource + Send + Sync> {
    match config.clock.utc_offset_minutes {
        Some(minutes) => match FixedTimeZone::from_minutes(minutes) {
            Some(zone) => Arc::new(zone),
            None => {
                warn!("utc_offset_minutes {} out of range, using local zone", minutes);
                Arc::new(LocalTimeZone)
            }
        },
        None => Arc::new(LocalTimeZone),
    }
}

/// The face's view of the device: system clock, a zone source and the
/// configured 12/24-hour preference.
pub struct SystemHost {
    clock: SystemClock,
    zone: Arc<dyn TimeZoneSource + Send + Sync>,
    use_24_hour: bool,
    events: UnboundedSender<EngineEvent>,
    receiver: Option<JoinHandle<()>>,
}

impl SystemHost {
    pub fn new(config: &Config, events: UnboundedSender<EngineEvent>) -> Self {
        SystemHost {
            clock: SystemClock,
            zone: time_zone_source(config),
            use_24_hour: config.clock.use_24_hour,
            events,
            receiver: None,
        }
    }
}

impl FaceHost for SystemHost {
    fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    fn time_zone(&self) -> FixedOffset {
        self.zone.current_offset()
    }

    fn is_24_hour(&self) -> bool {
        self.use_24_hour
    }

    fn register_time_zone_receiver(&mut self) {
        if self.receiver.is_some() {
            return;
        }
        let zone = Arc::clone(&self.zone);
        let events = self.events.clone();
        self.receiver = Some(tokio::spawn(async move {
            let mut last = zone.current_offset();
            let mut ticker = tokio::time::interval(ZONE_POLL_INTERVAL);
            loop {
                ticker.tick().await;
                let offset = zone.current_offset();
                if offset != last {
                    info!("time zone changed from {} to {}", last, offset);
                    last = offset;
                    if events.send(EngineEvent::TimeZoneChanged).is_err() {
                        break;
                    }
                }
            }
        }));
    }

    fn unregister_time_zone_receiver(&mut self) {
        if let Some(handle) = self.receiver.take() {
            handle.abort();
        }
    }
}

impl Drop for SystemHost {
    fn drop(&mut self) {
        self.unregister_time_zone_receiver();
    }
}

/// Host callbacks a freshly created face receives, in delivery order.
pub fn startup_events(config: &Config) -> Vec<EngineEvent> {
    let shape = if config.display.round {
        Shape::Round
    } else {
        Shape::Rectangular
    };
    vec![
        EngineEvent::PropertiesChanged(Capabilities {
            low_bit_ambient: config.display.low_bit_ambient,
            burn_in_protection: config.display.burn_in_protection,
        }),
        EngineEvent::InsetsApplied(shape),
        EngineEvent::AmbientModeChanged(config.display.ambient),
        EngineEvent::VisibilityChanged(true),
    ]
}

/// Run the face until Ctrl-C. `present` receives every redrawn frame.
pub async fn run<F>(config: &Config, mut present: F)
where
    F: FnMut(&Framebuffer),
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut engine = WatchFaceEngine::new(
        TokioScheduler::new(tx.clone()),
        SpoolChannel::new(
            &config.sync.spool_dir,
            Duration::from_millis(config.sync.poll_interval_ms),
            tx.clone(),
        ),
        SystemHost::new(config, tx.clone()),
        config.display.y_offset,
    );

    let ticker = spawn_minute_ticker(tx.clone(), SystemClock.now_millis());
    let shutdown_tx = tx.clone();
    let shutdown = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
        }
        let _ = shutdown_tx.send(EngineEvent::Shutdown);
    });
    drop(tx);

    for event in startup_events(config) {
        engine.dispatch(event);
    }

    let mut frame = Framebuffer::new(config.display.width, config.display.height);
    loop {
        if engine.take_invalidation() {
            engine.draw(&mut frame).unwrap_or_else(|e| match e {});
            present(&frame);
        }
        let Some(event) = rx.recv().await else {
            break;
        };
        if !engine.dispatch(event) {
            break;
        }
    }

    ticker.abort();
    shutdown.abort();
    info!("event loop stopped");
}

/// Sends a `TimeTick` at the top of every wall-clock minute, where the wall
/// clock read `now_millis` at spawn time.
fn spawn_minute_ticker(events: UnboundedSender<EngineEvent>, now_millis: i64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let first = delay_to_next_boundary(now_millis, MINUTE_MILLIS);
        let mut ticker = tokio::time::interval_at(Instant::now() + first, Duration::from_secs(60));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if events.send(EngineEvent::TimeTick).is_err() {
                break;
            }
        }
    })
}

/// Sync client for one-shot renders: never connects, drops every send.
#[derive(Debug, Default)]
pub struct OfflineClient;

impl DataClient for OfflineClient {
    fn connect(&mut self) {
        debug!("offline client: not connecting");
    }

    fn disconnect(&mut self) {}

    fn is_connected(&self) -> bool {
        false
    }

    fn add_listener(&mut self) {}

    fn remove_listener(&mut self) {}

    fn put_data_item(&mut self, request: PutDataRequest) {
        debug!("offline client: dropping {}", request.item.path);
    }
}

/// Render a single frame from the config and whatever weather is waiting
/// in the spool inbox. The inbox is read without consuming it.
pub async fn render_preview(config: &Config) -> Result<Framebuffer, SyncError> {
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut engine = WatchFaceEngine::new(
        ManualScheduler::new(),
        OfflineClient,
        SystemHost::new(config, tx),
        config.display.y_offset,
    );
    for event in startup_events(config) {
        engine.dispatch(event);
    }

    let inbox = config.sync.spool_dir.join("inbox");
    if inbox.is_dir() {
        let batch = spool::peek_inbox(&inbox).await?;
        engine.dispatch(EngineEvent::DataChanged(batch));
    } else {
        debug!("no spool inbox at {}, previewing without weather", inbox.display());
    }

    let mut frame = Framebuffer::new(config.display.width, config.display.height);
    engine.draw(&mut frame).unwrap_or_else(|e| match e {});
    engine.dispatch(EngineEvent::Shutdown);
    Ok(frame)
}
