use std::time::{Duration, Instant};

use rusb::{Context, Device, DeviceHandle, Error, UsbContext};
use serde::{Deserialize, Serialize};

use super::{
    events::JoystickEvents,
    parser::{JoystickParser, ParseOutcome},
    report::ReportError,
    side::{Side, SideRule},
    Timestamp,
};

/// Largest input report read from a device.
pub const MAX_REPORT_LEN: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),
    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Which devices to open and how to read them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceSettings {
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface: u8,
    /// Interrupt IN endpoint carrying input reports.
    pub endpoint: u8,
    pub poll_timeout_ms: u64,
    pub rescan_interval_ms: u64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            vendor_id: 0x1ccf,
            product_id: 0x8048,
            interface: 0,
            endpoint: 0x81,
            poll_timeout_ms: 4,
            rescan_interval_ms: 2000,
        }
    }
}

impl DeviceSettings {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn rescan_interval(&self) -> Duration {
        Duration::from_millis(self.rescan_interval_ms)
    }
}

/// Feeds USB reads into a parser.
///
/// A read timeout replays the last good report so a silent device still
/// reaches its turntable stop.
struct ReportFeed<H> {
    parser: JoystickParser<H>,
    input_buf: [u8; MAX_REPORT_LEN],
    last_report: [u8; MAX_REPORT_LEN],
    last_len: usize,
}

impl<H: JoystickEvents> ReportFeed<H> {
    fn new(parser: JoystickParser<H>) -> Self {
        Self {
            parser,
            input_buf: [0; MAX_REPORT_LEN],
            last_report: [0; MAX_REPORT_LEN],
            last_len: 0,
        }
    }

    fn on_read(
        &mut self,
        read: rusb::Result<usize>,
        now: Timestamp,
    ) -> Result<Option<ParseOutcome>, DeviceError> {
        match read {
            Ok(len) => {
                let len = len.min(MAX_REPORT_LEN);
                let outcome = self.parser.parse(&self.input_buf[..len], now)?;
                self.last_report[..len].copy_from_slice(&self.input_buf[..len]);
                self.last_len = len;
                Ok(Some(outcome))
            }
            Err(Error::Timeout) if self.last_len > 0 => {
                let outcome = self.parser.parse(&self.last_report[..self.last_len], now)?;
                Ok(Some(outcome))
            }
            Err(Error::Timeout) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// One attached controller and its decoder.
pub struct JoystickDevice<H> {
    handle: DeviceHandle<Context>,
    bus: u8,
    address: u8,
    interface: u8,
    endpoint: u8,
    timeout: Duration,
    feed: ReportFeed<H>,
}

impl<H: JoystickEvents> JoystickDevice<H> {
    /// Open `device`, claim its HID interface and attach `parser` to it.
    pub fn open(
        device: &Device<Context>,
        settings: &DeviceSettings,
        parser: JoystickParser<H>,
    ) -> rusb::Result<Self> {
        let handle = device.open()?;

        match handle.set_auto_detach_kernel_driver(true) {
            Ok(()) | Err(Error::NotSupported) => {}
            Err(err) => return Err(err),
        }
        handle.claim_interface(settings.interface)?;

        Ok(Self {
            handle,
            bus: device.bus_number(),
            address: device.address(),
            interface: settings.interface,
            endpoint: settings.endpoint,
            timeout: settings.poll_timeout(),
            feed: ReportFeed::new(parser),
        })
    }

    /// Perform a single interrupt read and decode it.
    pub fn poll_once(&mut self) -> Result<Option<ParseOutcome>, DeviceError> {
        let read = self
            .handle
            .read_interrupt(self.endpoint, &mut self.feed.input_buf, self.timeout);
        self.feed.on_read(read, Instant::now())
    }

    pub fn bus(&self) -> u8 {
        self.bus
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn parser(&self) -> &JoystickParser<H> {
        &self.feed.parser
    }
}

impl<H> Drop for JoystickDevice<H> {
    fn drop(&mut self) {
        let _ = self.handle.release_interface(self.interface);
    }
}

/// Keeps one decoder per attached controller.
///
/// `make_parser` builds the parser for a newly attached device from its side.
pub struct DeviceBridge<H, F> {
    context: Context,
    settings: DeviceSettings,
    sides: SideRule,
    make_parser: F,
    devices: Vec<JoystickDevice<H>>,
    last_scan: Option<Instant>,
}

impl<H, F> DeviceBridge<H, F>
where
    H: JoystickEvents,
    F: FnMut(Side) -> JoystickParser<H>,
{
    pub fn new(settings: DeviceSettings, sides: SideRule, make_parser: F) -> rusb::Result<Self> {
        Ok(Self {
            context: Context::new()?,
            settings,
            sides,
            make_parser,
            devices: Vec::new(),
            last_scan: None,
        })
    }

    pub fn devices(&self) -> &[JoystickDevice<H>] {
        &self.devices
    }

    /// Open matching devices that are not attached yet. Returns how many were added.
    pub fn rescan(&mut self) -> rusb::Result<usize> {
        self.last_scan = Some(Instant::now());
        let mut added = 0;

        for device in self.context.devices()?.iter() {
            let desc = match device.device_descriptor() {
                Ok(desc) => desc,
                Err(err) => {
                    tracing::debug!(
                        bus = device.bus_number(),
                        address = device.address(),
                        error = %err,
                        "skipping device without readable descriptor"
                    );
                    continue;
                }
            };
            if desc.vendor_id() != self.settings.vendor_id
                || desc.product_id() != self.settings.product_id
            {
                continue;
            }

            let (bus, address) = (device.bus_number(), device.address());
            if self
                .devices
                .iter()
                .any(|d| d.bus == bus && d.address == address)
            {
                continue;
            }

            let side = self.sides.classify(address);
            let parser = (self.make_parser)(side);
            match JoystickDevice::open(&device, &self.settings, parser) {
                Ok(joystick) => {
                    tracing::info!(
                        bus,
                        address,
                        %side,
                        turntable_timeout_ms = joystick.parser().turntable_timeout().as_millis() as u64,
                        "controller attached"
                    );
                    self.devices.push(joystick);
                    added += 1;
                }
                Err(err) => {
                    tracing::warn!(bus, address, error = %err, "failed to open controller");
                }
            }
        }

        Ok(added)
    }

    /// Rescan when the configured interval has passed since the last scan.
    pub fn rescan_if_due(&mut self, now: Instant) -> rusb::Result<usize> {
        let due = self
            .last_scan
            .map(|at| now.saturating_duration_since(at) >= self.settings.rescan_interval())
            .unwrap_or(true);
        if due {
            self.rescan()
        } else {
            Ok(0)
        }
    }

    /// Poll every attached device once, dropping devices that went away.
    ///
    /// A failed read that leaves the device usable only drops that report, so
    /// the parser keeps its held buttons and turntable state.
    pub fn poll_all(&mut self) {
        self.devices.retain_mut(|device| match device.poll_once() {
            Ok(Some(outcome)) => {
                if outcome.has_events() {
                    let parser = device.parser();
                    let state = parser.state();
                    tracing::debug!(
                        side = %parser.side(),
                        %state,
                        turntable = %state.direction(),
                        "output state"
                    );
                }
                true
            }
            Ok(None) => true,
            Err(err) if keeps_device(&err) => {
                tracing::warn!(bus = device.bus(), address = device.address(), error = %err, "dropped report");
                true
            }
            Err(err) => {
                tracing::info!(bus = device.bus(), address = device.address(), error = %err, "controller detached");
                false
            }
        });
    }
}

/// Whether the device is still usable after `err`.
fn keeps_device(err: &DeviceError) -> bool {
    match err {
        DeviceError::Report(_) => true,
        DeviceError::Usb(usb) => matches!(
            usb,
            Error::Overflow | Error::Pipe | Error::Interrupted | Error::Busy | Error::Io
        ),
    }
}
