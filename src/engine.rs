//! # Watch Face Engine
//!
//! Owns all mutable face state and reacts to host callbacks, timer messages
//! and sync-channel results. The engine never blocks and never spawns: it
//! talks to the outside world through three seams.
//!
//! - [`Scheduler`]: delayed self-messages (blink timer, daily weather request)
//! - [`DataClient`]: the companion sync channel
//! - [`FaceHost`]: wall clock, time zone, 12/24-hour preference and the
//!   time-zone/locale change receiver
//!
//! ## Timer State Machine
//!
//! The blink timer is running iff `visible && !ambient`. Every transition of
//! either input calls `update_timer`, which cancels the pending
//! [`MessageKind::UpdateTime`] and posts a fresh one only if the timer should
//! run. Each fire invalidates and, while the condition holds, reschedules
//! itself onto the next half-second boundary. A fire whose generation was
//! superseded by a removal is dropped before it reaches `handle_message`, so
//! at most one chain is ever live.
//!
//! ## Visibility
//! - **Visible**: connect (once), register the receiver (once), refresh the zone
//! - **Hidden**: unregister the receiver, drop the listener, disconnect
//!
//! Both directions are idempotent, so rapid flapping never leaves duplicate
//! registrations or connections behind.
//!
//! ## Weather Refresh
//! The first successful connection sends `/request-weather` immediately and
//! starts a day-aligned chain of [`MessageKind::UpdateWeather`] messages that
//! keeps running regardless of visibility until the face is destroyed.
//! A daily request skipped while disconnected is owed, and is sent as soon as
//! the next connection comes up.
//!
//! A `Connected` result only counts while the client reports itself
//! connected; one left over from an abandoned attempt is ignored.

use crate::renderer::{FaceRenderer, FrameInput};
use crate::scheduler::{
    delay_to_next_boundary, MessageKind, Scheduler, TimerMessage, DAY_IN_MILLIS, INTERACTIVE_UPDATE_RATE_MS,
};
use crate::style::{FaceMetrics, FaceStyle, Shape};
use crate::sync::{self, DataClient, DataEvent};
use crate::{Capabilities, ClockReading, DisplayMode, WeatherSnapshot};
use chrono::FixedOffset;
use embedded_graphics::{pixelcolor::Rgb565, prelude::*};
use log::{debug, error, info, warn};

/// Everything the single-threaded loop can hand the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    Timer(TimerMessage),
    Connected,
    ConnectionSuspended(i32),
    ConnectionFailed(String),
    DataChanged(Vec<DataEvent>),
    /// Host's once-a-minute tick, delivered even while the blink timer is stopped
    TimeTick,
    TimeZoneChanged,
    VisibilityChanged(bool),
    AmbientModeChanged(bool),
    PropertiesChanged(Capabilities),
    InsetsApplied(Shape),
    Shutdown,
}

/// Services provided by the hosting framework and device settings.
pub trait FaceHost {
    fn now_millis(&self) -> i64;

    fn time_zone(&self) -> FixedOffset;

    /// The user's 12/24-hour clock preference.
    fn is_24_hour(&self) -> bool;

    /// Start delivering [`EngineEvent::TimeZoneChanged`] on zone or locale changes.
    fn register_time_zone_receiver(&mut self);

    fn unregister_time_zone_receiver(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

pub struct WatchFaceEngine<S, C, H> {
    scheduler: S,
    client: C,
    host: H,

    visible: bool,
    mode: DisplayMode,
    capabilities: Capabilities,
    style: FaceStyle,
    renderer: FaceRenderer,
    y_offset: f32,
    time_zone: FixedOffset,
    weather: Option<WeatherSnapshot>,

    receiver_registered: bool,
    connection: ConnectionState,
    weather_refresh_started: bool,
    refresh_owed: bool,
    invalidated: bool,
    destroyed: bool,
}

impl<S, C, H> WatchFaceEngine<S, C, H>
where
    S: Scheduler,
    C: DataClient,
    H: FaceHost,
{
    /// Create the engine in its initial state: hidden, interactive, no weather.
    ///
    /// Metrics default to a rectangular screen until the first insets callback.
    pub fn new(scheduler: S, client: C, host: H, y_offset: f32) -> Self {
        let mode = DisplayMode::Interactive;
        let capabilities = Capabilities::default();
        let time_zone = host.time_zone();
        WatchFaceEngine {
            scheduler,
            client,
            host,
            visible: false,
            mode,
            capabilities,
            style: FaceStyle::resolve(mode, capabilities),
            renderer: FaceRenderer::new(FaceMetrics::for_shape(Shape::Rectangular), y_offset),
            y_offset,
            time_zone,
            weather: None,
            receiver_registered: false,
            connection: ConnectionState::Disconnected,
            weather_refresh_started: false,
            refresh_owed: false,
            invalidated: true,
            destroyed: false,
        }
    }

    /// Route one event to its callback. Returns false once the face is shut down.
    pub fn dispatch(&mut self, event: EngineEvent) -> bool {
        if self.destroyed {
            debug!("dropping {:?} after destroy", event);
            return false;
        }
        match event {
            EngineEvent::Timer(message) => {
                if self.scheduler.is_current(message) {
                    self.handle_message(message.kind);
                } else {
                    debug!("dropping superseded timer message {}", message);
                }
            }
            EngineEvent::Connected => self.on_connected(),
            EngineEvent::ConnectionSuspended(cause) => self.on_connection_suspended(cause),
            EngineEvent::ConnectionFailed(reason) => self.on_connection_failed(&reason),
            EngineEvent::DataChanged(events) => self.on_data_changed(&events),
            EngineEvent::TimeTick => self.on_time_tick(),
            EngineEvent::TimeZoneChanged => self.on_time_zone_changed(),
            EngineEvent::VisibilityChanged(visible) => self.on_visibility_changed(visible),
            EngineEvent::AmbientModeChanged(ambient) => self.on_ambient_mode_changed(ambient),
            EngineEvent::PropertiesChanged(capabilities) => self.on_properties_changed(capabilities),
            EngineEvent::InsetsApplied(shape) => self.on_apply_window_insets(shape),
            EngineEvent::Shutdown => {
                self.on_destroy();
                return false;
            }
        }
        true
    }

    // -- Host callbacks --

    pub fn on_properties_changed(&mut self, capabilities: Capabilities) {
        debug!(
            "properties: low_bit_ambient={} burn_in_protection={}",
            capabilities.low_bit_ambient, capabilities.burn_in_protection
        );
        self.capabilities = capabilities;
        self.style = FaceStyle::resolve(self.mode, capabilities);
    }

    pub fn on_time_tick(&mut self) {
        self.invalidate();
    }

    pub fn on_ambient_mode_changed(&mut self, in_ambient: bool) {
        self.mode = DisplayMode::from_ambient(in_ambient);
        self.style = FaceStyle::resolve(self.mode, self.capabilities);
        debug!("mode {:?}, anti-alias {}", self.mode, self.style.anti_alias());
        self.invalidate();
        self.update_timer();
    }

    pub fn on_visibility_changed(&mut self, visible: bool) {
        self.visible = visible;
        if visible {
            if self.connection == ConnectionState::Disconnected {
                self.connection = ConnectionState::Connecting;
                self.client.connect();
            }
            self.register_receiver();
            // The zone may have changed while we weren't visible
            self.time_zone = self.host.time_zone();
            self.invalidate();
        } else {
            self.unregister_receiver();
            self.disconnect();
        }
        self.update_timer();
    }

    /// Resolve fonts and sizes for the screen shape; the colon is measured here, once.
    pub fn on_apply_window_insets(&mut self, shape: Shape) {
        let metrics = FaceMetrics::for_shape(shape);
        info!("insets: {:?} screen, colon width {}", shape, metrics.colon_width);
        self.renderer = FaceRenderer::new(metrics, self.y_offset);
        self.invalidate();
    }

    pub fn on_time_zone_changed(&mut self) {
        self.time_zone = self.host.time_zone();
        self.invalidate();
    }

    /// Flush every pending message and release host registrations.
    pub fn on_destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.scheduler.remove_messages(MessageKind::UpdateTime);
        self.scheduler.remove_messages(MessageKind::UpdateWeather);
        self.unregister_receiver();
        self.disconnect();
        self.destroyed = true;
        info!("watch face destroyed");
    }

    // -- Sync channel callbacks --

    pub fn on_connected(&mut self) {
        if self.connection == ConnectionState::Disconnected || !self.client.is_connected() {
            // Result of an attempt we already abandoned
            debug!("ignoring stale connection result");
            return;
        }
        info!("sync channel connected");
        if self.connection != ConnectionState::Connected {
            self.connection = ConnectionState::Connected;
            self.client.add_listener();
        }
        if !self.weather_refresh_started {
            self.weather_refresh_started = true;
            self.scheduler.remove_messages(MessageKind::UpdateWeather);
            self.scheduler.send_now(MessageKind::UpdateWeather);
        } else if self.refresh_owed {
            info!("sending weather refresh missed while disconnected");
            self.request_weather(self.host.now_millis());
        }
    }

    pub fn on_connection_suspended(&mut self, cause: i32) {
        error!("sync channel connection suspended (cause {})", cause);
    }

    /// Logged only; the face keeps rendering with whatever weather it has.
    pub fn on_connection_failed(&mut self, reason: &str) {
        error!("sync channel connection failed: {}", reason);
        if self.connection == ConnectionState::Connecting {
            self.connection = ConnectionState::Disconnected;
        }
    }

    pub fn on_data_changed(&mut self, events: &[DataEvent]) {
        if sync::apply_data_events(events, &mut self.weather) {
            self.invalidate();
        }
    }

    // -- Timer --

    pub fn handle_message(&mut self, kind: MessageKind) {
        match kind {
            MessageKind::UpdateTime => {
                self.invalidate();
                if self.should_timer_be_running() {
                    let delay = delay_to_next_boundary(self.host.now_millis(), INTERACTIVE_UPDATE_RATE_MS);
                    self.scheduler.send_delayed(MessageKind::UpdateTime, delay);
                }
            }
            MessageKind::UpdateWeather => {
                let now = self.host.now_millis();
                if self.client.is_connected() {
                    info!("requesting weather refresh");
                    self.request_weather(now);
                } else {
                    warn!("skipping weather refresh request, sync channel not connected");
                    self.refresh_owed = true;
                }
                self.scheduler
                    .send_delayed(MessageKind::UpdateWeather, delay_to_next_boundary(now, DAY_IN_MILLIS));
            }
        }
    }

    fn request_weather(&mut self, now: i64) {
        self.client.put_data_item(sync::weather_request(now));
        self.refresh_owed = false;
    }

    pub fn should_timer_be_running(&self) -> bool {
        self.visible && !self.mode.is_ambient()
    }

    pub fn is_timer_running(&self) -> bool {
        self.scheduler.has_messages(MessageKind::UpdateTime)
    }

    fn update_timer(&mut self) {
        self.scheduler.remove_messages(MessageKind::UpdateTime);
        if self.should_timer_be_running() {
            self.scheduler.send_now(MessageKind::UpdateTime);
        }
    }

    // -- Registration helpers --

    fn register_receiver(&mut self) {
        if self.receiver_registered {
            return;
        }
        self.receiver_registered = true;
        self.host.register_time_zone_receiver();
    }

    fn unregister_receiver(&mut self) {
        if !self.receiver_registered {
            return;
        }
        self.receiver_registered = false;
        self.host.unregister_time_zone_receiver();
    }

    fn disconnect(&mut self) {
        match self.connection {
            ConnectionState::Disconnected => return,
            ConnectionState::Connected => self.client.remove_listener(),
            ConnectionState::Connecting => {}
        }
        self.client.disconnect();
        self.connection = ConnectionState::Disconnected;
    }

    // -- Rendering --

    fn invalidate(&mut self) {
        self.invalidated = true;
    }

    /// True if a redraw was requested since the last call.
    pub fn take_invalidation(&mut self) -> bool {
        std::mem::take(&mut self.invalidated)
    }

    pub fn reading(&self) -> ClockReading {
        ClockReading::from_millis(self.host.now_millis(), self.time_zone)
    }

    /// Paint the current state onto `target`. Read-only with respect to face state.
    pub fn draw<D>(&self, target: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb565>,
    {
        let frame = FrameInput {
            reading: self.reading(),
            mode: self.mode,
            use_24_hour: self.host.is_24_hour(),
            weather: self.weather.as_ref(),
            size: target.bounding_box().size,
        };
        self.renderer.render(&frame, &self.style, target)
    }

    // -- Accessors --

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn style(&self) -> &FaceStyle {
        &self.style
    }

    pub fn renderer(&self) -> &FaceRenderer {
        &self.renderer
    }

    pub fn weather(&self) -> Option<&WeatherSnapshot> {
        self.weather.as_ref()
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn is_receiver_registered(&self) -> bool {
        self.receiver_registered
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    pub fn host(&self) -> &H {
        &self.host
    }
}
