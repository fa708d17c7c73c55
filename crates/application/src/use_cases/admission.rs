use doh_proxy_domain::DomainError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info};

/// Bound on the wait for a serial-mode admission token.
const GATE_WAIT: Duration = Duration::from_secs(10);

/// Admission gate in front of the upstream worker pool.
///
/// The gate starts in serial mode: a single-slot token channel admits at
/// most one outstanding upstream dispatch. The first successful upstream
/// reply switches to parallel mode; a provider failure switches back and
/// re-primes the token.
pub struct AdmissionGate {
    serial: AtomicBool,
    slot: Mutex<TokenSlot>,
}

struct TokenSlot {
    tx: mpsc::Sender<()>,
    rx: Arc<Mutex<mpsc::Receiver<()>>>,
}

fn primed_slot() -> TokenSlot {
    let (tx, rx) = mpsc::channel(1);
    let _ = tx.try_send(());
    TokenSlot {
        tx,
        rx: Arc::new(Mutex::new(rx)),
    }
}

impl AdmissionGate {
    pub fn new() -> Self {
        info!("enter serial mode");
        Self {
            serial: AtomicBool::new(true),
            slot: Mutex::new(primed_slot()),
        }
    }

    pub fn is_serial(&self) -> bool {
        self.serial.load(Ordering::Acquire)
    }

    /// Takes the serial-mode token, waiting at most [`GATE_WAIT`].
    /// A no-op in parallel mode.
    pub async fn admit(&self) -> Result<(), DomainError> {
        if !self.is_serial() {
            return Ok(());
        }
        let rx = self.slot.lock().await.rx.clone();
        let mut rx = rx.lock().await;
        if !self.is_serial() {
            return Ok(());
        }
        match tokio::time::timeout(GATE_WAIT, rx.recv()).await {
            Ok(_) => Ok(()),
            Err(_) => {
                error!("timeout waiting for serial task token");
                Err(DomainError::GateTimeout)
            }
        }
    }

    /// Re-emits the token once a dispatch has completed while serial.
    pub async fn release(&self) {
        if !self.is_serial() {
            return;
        }
        let slot = self.slot.lock().await;
        let _ = slot.tx.try_send(());
    }

    /// Enters serial mode; idempotent. Always leaves exactly one token
    /// available.
    pub async fn enter_serial(&self) {
        let was_serial = self.serial.swap(true, Ordering::AcqRel);
        let mut slot = self.slot.lock().await;
        if was_serial {
            let _ = slot.tx.try_send(());
        } else {
            *slot = primed_slot();
            info!("enter serial mode");
        }
    }

    /// Leaves serial mode and wakes any waiter still parked on the token
    /// channel.
    pub async fn leave_serial(&self) {
        if self.serial.swap(false, Ordering::AcqRel) {
            info!("leave serial mode");
            let slot = self.slot.lock().await;
            let _ = slot.tx.try_send(());
        }
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new()
    }
}
