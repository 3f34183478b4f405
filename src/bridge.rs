//! # Printer Bridge
//!
//! Owns the physical printer. Every byte sent to the device goes through one
//! async mutex, so two operations can never interleave on the transport.
//!
//! ## Queueing
//!
//! ```text
//!             ┌──────────── 2 slots ────────────┐
//! print ───►  │ running (holds device lock)     │
//! print ───►  │ pending (waits for device lock) │
//! print ───►  └─────────────────────────────────┘  ──► Busy
//! ```
//!
//! A job that has started transmitting always runs to completion on a
//! blocking thread, even if the caller gives up or its deadline passes; it
//! keeps the device lock until the printer is done. Jobs are never retried.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::adapter::PrintJob;
use crate::error::{LabelbotError, Result};
use crate::printer::{PrinterModel, PrinterProfile, TransportKind};
use crate::protocol::{Heartbeat, InfoKind, InfoValue, PrinterClient, RfidInfo};
use crate::render::Bitmap;
use crate::transport;

/// Running job plus at most one pending job.
pub const QUEUE_SLOTS: usize = 2;

/// Default deadline for one printer operation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Which printer to talk to and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrintTarget {
    pub model: PrinterModel,
    pub connection: TransportKind,
    /// Serial device path or Bluetooth MAC; `None` = USB auto-detect
    pub address: Option<String>,
}

impl PrintTarget {
    pub fn new(model: PrinterModel, connection: TransportKind, address: Option<String>) -> Self {
        Self {
            model,
            connection,
            address,
        }
    }

    pub fn profile(&self) -> PrinterProfile {
        PrinterProfile::for_model(self.model)
    }
}

/// An open conversation with one printer.
pub trait PrinterLink: Send {
    fn print_bitmap(&mut self, bitmap: &Bitmap, density: u8, label_type: u8) -> Result<()>;
    fn heartbeat(&mut self) -> Result<Heartbeat>;
    fn info(&mut self, kind: InfoKind) -> Result<InfoValue>;
    fn rfid(&mut self) -> Result<Option<RfidInfo>>;
}

impl<T: std::io::Read + std::io::Write + Send> PrinterLink for PrinterClient<T> {
    fn print_bitmap(&mut self, bitmap: &Bitmap, density: u8, label_type: u8) -> Result<()> {
        PrinterClient::print_bitmap(self, bitmap, density, label_type)
    }

    fn heartbeat(&mut self) -> Result<Heartbeat> {
        PrinterClient::heartbeat(self)
    }

    fn info(&mut self, kind: InfoKind) -> Result<InfoValue> {
        self.get_info(kind)
    }

    fn rfid(&mut self) -> Result<Option<RfidInfo>> {
        self.get_rfid()
    }
}

/// Opens links. Failing here is always a connect error: nothing was sent.
pub trait PrinterConnector: Send + Sync {
    fn connect(&self, target: &PrintTarget) -> Result<Box<dyn PrinterLink>>;
}

/// Connects to real hardware through [`transport::open`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DeviceConnector;

impl PrinterConnector for DeviceConnector {
    fn connect(&self, target: &PrintTarget) -> Result<Box<dyn PrinterLink>> {
        let port = transport::open(target.connection, target.address.as_deref())?;
        Ok(Box::new(PrinterClient::new(port)))
    }
}

/// Printer state at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub model: PrinterModel,
    pub connection: TransportKind,
    #[serde(flatten)]
    pub heartbeat: Heartbeat,
    pub checked_at: DateTime<Utc>,
}

/// What was printed.
#[derive(Debug, Clone, Serialize)]
pub struct PrintReceipt {
    pub model: PrinterModel,
    pub width: u32,
    pub height: u32,
    pub density: u8,
    pub warnings: Vec<String>,
}

impl PrintReceipt {
    pub fn message(&self) -> String {
        format!(
            "Printed {}x{}px image to {}",
            self.width, self.height, self.model
        )
    }
}

/// # Printer Bridge
///
/// Cheap to clone; clones share the device lock and the queue.
#[derive(Clone)]
pub struct PrinterBridge {
    connector: Arc<dyn PrinterConnector>,
    device: Arc<Mutex<()>>,
    slots: Arc<Semaphore>,
    timeout: Duration,
}

impl PrinterBridge {
    pub fn new(connector: Arc<dyn PrinterConnector>, timeout: Duration) -> Self {
        Self {
            connector,
            device: Arc::new(Mutex::new(())),
            slots: Arc::new(Semaphore::new(QUEUE_SLOTS)),
            timeout,
        }
    }

    /// Bridge to real hardware.
    pub fn device(timeout: Duration) -> Self {
        Self::new(Arc::new(DeviceConnector), timeout)
    }

    /// Print a prepared job. Consumes it.
    pub async fn print(&self, job: PrintJob, target: &PrintTarget) -> Result<PrintReceipt> {
        let profile = target.profile();
        if job.bitmap.width() > profile.max_width {
            return Err(LabelbotError::Render(format!(
                "Image width ({}px) exceeds maximum for {} ({}px)",
                job.bitmap.width(),
                profile.model,
                profile.max_width
            )));
        }

        let mut warnings = job.warnings;
        let clamp = profile.clamp_density(job.density);
        if let Some(warning) = clamp.warning {
            warn!(model = %profile.model, applied = clamp.applied, "density clamped at bridge");
            warnings.push(warning);
        }

        let permit = self.slots.clone().try_acquire_owned().map_err(|_| {
            warn!(model = %profile.model, "print rejected, queue full");
            LabelbotError::Busy
        })?;

        let receipt = PrintReceipt {
            model: profile.model,
            width: job.bitmap.width(),
            height: job.bitmap.height(),
            density: clamp.applied,
            warnings,
        };
        let bitmap = job.bitmap;
        let label_type = job.paper_type.code();
        let density = clamp.applied;

        self.exclusive(target, "printer", Some(permit), move |link| {
            link.print_bitmap(&bitmap, density, label_type)
        })
        .await?;

        info!(model = %receipt.model, width = receipt.width, height = receipt.height, "printed");
        Ok(receipt)
    }

    /// Heartbeat as a health snapshot.
    pub async fn status(&self, target: &PrintTarget) -> Result<HealthSnapshot> {
        let heartbeat = self
            .exclusive(target, "printer status", None, |link| link.heartbeat())
            .await?;
        Ok(HealthSnapshot {
            model: target.model,
            connection: target.connection,
            heartbeat,
            checked_at: Utc::now(),
        })
    }

    pub async fn info(&self, target: &PrintTarget, kind: InfoKind) -> Result<InfoValue> {
        self.exclusive(target, "printer info", None, move |link| link.info(kind))
            .await
    }

    pub async fn rfid(&self, target: &PrintTarget) -> Result<Option<RfidInfo>> {
        self.exclusive(target, "printer rfid", None, |link| link.rfid())
            .await
    }

    /// Run `op` against a fresh link while holding the device lock.
    ///
    /// The deadline covers waiting for the lock and the operation. Once `op`
    /// has started it is never cancelled: the blocking task keeps the lock
    /// (and the queue permit) until it returns.
    async fn exclusive<R, F>(
        &self,
        target: &PrintTarget,
        stage: &'static str,
        permit: Option<OwnedSemaphorePermit>,
        op: F,
    ) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut dyn PrinterLink) -> Result<R> + Send + 'static,
    {
        let device = self.device.clone();
        let connector = self.connector.clone();
        let target = target.clone();

        let run = async move {
            let guard = device.lock_owned().await;
            debug!(stage, model = %target.model, "device acquired");
            tokio::task::spawn_blocking(move || {
                let _held = (guard, permit);
                let mut link = connector.connect(&target)?;
                op(link.as_mut())
            })
            .await
            .map_err(|e| LabelbotError::Protocol(format!("Printer task failed: {}", e)))?
        };

        match tokio::time::timeout(self.timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(LabelbotError::Timeout {
                stage,
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::{PaperType, Rotation};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[derive(Default)]
    struct Counters {
        active: AtomicUsize,
        max_active: AtomicUsize,
        prints: AtomicUsize,
    }

    struct SlowLink(Arc<Counters>);

    impl PrinterLink for SlowLink {
        fn print_bitmap(&mut self, _: &Bitmap, _: u8, _: u8) -> Result<()> {
            let now = self.0.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.0.max_active.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            self.0.active.fetch_sub(1, Ordering::SeqCst);
            self.0.prints.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn heartbeat(&mut self) -> Result<Heartbeat> {
            Ok(Heartbeat {
                power_level: Some(4),
                ..Default::default()
            })
        }

        fn info(&mut self, _: InfoKind) -> Result<InfoValue> {
            Ok(InfoValue::Number(1))
        }

        fn rfid(&mut self) -> Result<Option<RfidInfo>> {
            Ok(None)
        }
    }

    struct SlowConnector(Arc<Counters>);

    impl PrinterConnector for SlowConnector {
        fn connect(&self, _: &PrintTarget) -> Result<Box<dyn PrinterLink>> {
            Ok(Box::new(SlowLink(self.0.clone())))
        }
    }

    struct OffConnector;

    impl PrinterConnector for OffConnector {
        fn connect(&self, _: &PrintTarget) -> Result<Box<dyn PrinterLink>> {
            Err(LabelbotError::TransportConnect {
                message: "no answer".into(),
                powered_off: true,
            })
        }
    }

    fn job(width: u32, density: u8) -> PrintJob {
        PrintJob {
            bitmap: Bitmap::new(width, 4),
            density,
            rotation: Rotation::R0,
            paper_type: PaperType::Small,
            warnings: Vec::new(),
            phrase: None,
        }
    }

    fn target(model: PrinterModel) -> PrintTarget {
        PrintTarget::new(model, TransportKind::Usb, None)
    }

    #[tokio::test]
    async fn test_third_concurrent_print_is_busy() {
        let counters = Arc::new(Counters::default());
        let bridge = PrinterBridge::new(Arc::new(SlowConnector(counters.clone())), DEFAULT_TIMEOUT);
        let t = target(PrinterModel::B1);

        let (a, b, c) = tokio::join!(
            bridge.print(job(8, 3), &t),
            bridge.print(job(8, 3), &t),
            bridge.print(job(8, 3), &t),
        );
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert!(matches!(c, Err(LabelbotError::Busy)));
        assert_eq!(counters.prints.load(Ordering::SeqCst), 2);
        assert_eq!(counters.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slots_free_after_completion() {
        let counters = Arc::new(Counters::default());
        let bridge = PrinterBridge::new(Arc::new(SlowConnector(counters.clone())), DEFAULT_TIMEOUT);
        let t = target(PrinterModel::B1);
        for _ in 0..4 {
            bridge.print(job(8, 3), &t).await.unwrap();
        }
        assert_eq!(counters.prints.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_density_reclamped_for_target() {
        let counters = Arc::new(Counters::default());
        let bridge = PrinterBridge::new(Arc::new(SlowConnector(counters)), DEFAULT_TIMEOUT);
        let receipt = bridge.print(job(8, 5), &target(PrinterModel::D11)).await.unwrap();
        assert_eq!(receipt.density, 3);
        assert_eq!(receipt.warnings.len(), 1);
        assert_eq!(receipt.message(), "Printed 8x4px image to D11");
    }

    #[tokio::test]
    async fn test_too_wide_bitmap_rejected_before_connect() {
        let bridge = PrinterBridge::new(Arc::new(OffConnector), DEFAULT_TIMEOUT);
        let err = bridge.print(job(200, 3), &target(PrinterModel::D110)).await.unwrap_err();
        assert!(matches!(err, LabelbotError::Render(_)));
    }

    #[tokio::test]
    async fn test_connect_failure_surfaces_distinctly() {
        let bridge = PrinterBridge::new(Arc::new(OffConnector), DEFAULT_TIMEOUT);
        let err = bridge.print(job(8, 3), &target(PrinterModel::B1)).await.unwrap_err();
        assert!(matches!(err, LabelbotError::TransportConnect { powered_off: true, .. }));

        let err = bridge.status(&target(PrinterModel::B1)).await.unwrap_err();
        assert!(err.is_transport_connect());
    }

    #[tokio::test]
    async fn test_timeout_does_not_abort_transmission() {
        let counters = Arc::new(Counters::default());
        let bridge = PrinterBridge::new(
            Arc::new(SlowConnector(counters.clone())),
            Duration::from_millis(10),
        );
        let err = bridge.print(job(8, 3), &target(PrinterModel::B1)).await.unwrap_err();
        assert!(matches!(err, LabelbotError::Timeout { stage: "printer", .. }));

        // the job still finishes and releases the device
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(counters.prints.load(Ordering::SeqCst), 1);
        assert!(bridge.device.try_lock().is_ok());
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let bridge = PrinterBridge::new(
            Arc::new(SlowConnector(Arc::new(Counters::default()))),
            DEFAULT_TIMEOUT,
        );
        let snapshot = bridge.status(&target(PrinterModel::B21)).await.unwrap();
        assert_eq!(snapshot.heartbeat.power_level, Some(4));
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["model"], "b21");
        assert_eq!(json["power_level"], 4);
    }
}
