//! ESP-IDF IEEE 802.15.4 driver adapter (ESP32-C6 / ESP32-H2).
//!
//! Implements [`RadioDriver`] on top of the `esp_ieee802154_*` API and
//! provides the driver's strong callback symbols, which forward to the
//! attached [`InterruptSink`].
//!
//! The callbacks run in ISR context. The sink is kept in a
//! critical-section mutex and only borrowed there; attaching and detaching
//! happen in task context, and the `Arc` is always dropped outside the
//! critical section.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use esp_idf_svc::sys::*;
use log::info;

use crate::frame::MAX_FRAME_LEN;
use crate::radio::{Channel, FrameInfo, InterruptSink, RadioDriver, RadioError, TxError};

type SinkCell = Mutex<CriticalSectionRawMutex, RefCell<Option<Arc<dyn InterruptSink>>>>;

static SINK: SinkCell = Mutex::new(RefCell::new(None));
static TAKEN: AtomicBool = AtomicBool::new(false);

fn check(rc: esp_err_t) -> Result<(), RadioError> {
    if rc == ESP_OK as esp_err_t {
        Ok(())
    } else {
        Err(RadioError(rc))
    }
}

/// The on-chip 802.15.4 radio. There is exactly one.
pub struct EspRadio {
    _private: (),
}

impl EspRadio {
    /// Claim the radio. Returns `None` if it was already claimed.
    pub fn take() -> Option<Self> {
        if TAKEN.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(Self { _private: () })
    }
}

impl Drop for EspRadio {
    fn drop(&mut self) {
        self.detach_interrupts();
        TAKEN.store(false, Ordering::Release);
    }
}

impl RadioDriver for EspRadio {
    fn enable(&self) -> Result<(), RadioError> {
        check(unsafe { esp_ieee802154_enable() })
    }

    fn disable(&self) -> Result<(), RadioError> {
        check(unsafe { esp_ieee802154_disable() })
    }

    fn set_coordinator(&self, enable: bool) -> Result<(), RadioError> {
        check(unsafe { esp_ieee802154_set_coordinator(enable) })
    }

    fn set_promiscuous(&self, enable: bool) -> Result<(), RadioError> {
        check(unsafe { esp_ieee802154_set_promiscuous(enable) })
    }

    fn set_rx_when_idle(&self, enable: bool) -> Result<(), RadioError> {
        check(unsafe { esp_ieee802154_set_rx_when_idle(enable) })
    }

    fn set_channel(&self, channel: Channel) -> Result<(), RadioError> {
        check(unsafe { esp_ieee802154_set_channel(channel.get()) })
    }

    fn receive(&self) -> Result<(), RadioError> {
        check(unsafe { esp_ieee802154_receive() })
    }

    fn transmit(&self, frame: &[u8], cca: bool) -> Result<(), RadioError> {
        // SAFETY: the caller keeps `frame` alive and unmodified until the
        // completion callback (it lives in the transceiver's control buffer).
        check(unsafe { esp_ieee802154_transmit(frame.as_ptr(), cca) })
    }

    fn release_rx_buffer(&self, frame: &[u8]) {
        // SAFETY: `frame` points at the driver's own receive buffer.
        unsafe {
            esp_ieee802154_receive_handle_done(frame.as_ptr());
        }
    }

    fn attach_interrupts(&self, sink: Arc<dyn InterruptSink>) {
        let previous = SINK.lock(|cell| cell.replace(Some(sink)));
        drop(previous);
        info!("esp_radio: interrupt callbacks attached");
    }

    fn detach_interrupts(&self) {
        let previous = SINK.lock(|cell| cell.take());
        if previous.is_some() {
            info!("esp_radio: interrupt callbacks detached");
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Driver callbacks (ISR context)
// ───────────────────────────────────────────────────────────────

/// Borrow the attached sink for the duration of `f`. Returns `false` when
/// nothing is attached.
fn with_sink(f: impl FnOnce(&dyn InterruptSink)) -> bool {
    SINK.lock(|cell| match cell.borrow().as_deref() {
        Some(sink) => {
            f(sink);
            true
        }
        None => false,
    })
}

/// PHR + MPDU view of a driver frame buffer.
///
/// # Safety
/// `frame` must be null or point at a driver buffer of at least
/// `MAX_FRAME_LEN` bytes.
unsafe fn frame_slice<'a>(frame: *const u8) -> &'a [u8] {
    if frame.is_null() {
        return &[];
    }
    let len = (unsafe { *frame } as usize + 1).min(MAX_FRAME_LEN);
    unsafe { core::slice::from_raw_parts(frame, len) }
}

fn to_frame_info(raw: &esp_ieee802154_frame_info_t) -> FrameInfo {
    FrameInfo {
        pending: raw.pending,
        process: raw.process,
        channel: raw.channel,
        rssi: raw.rssi,
        lqi: raw.lqi,
        timestamp: raw.timestamp,
    }
}

#[unsafe(no_mangle)]
unsafe extern "C" fn esp_ieee802154_receive_done(
    frame: *mut u8,
    frame_info: *mut esp_ieee802154_frame_info_t,
) {
    // SAFETY: the driver hands over a valid receive buffer and info struct.
    let bytes = unsafe { frame_slice(frame) };
    let Some(raw_info) = (unsafe { frame_info.as_ref() }) else {
        unsafe { esp_ieee802154_receive_handle_done(frame) };
        return;
    };
    let info = to_frame_info(raw_info);
    if !with_sink(|sink| sink.receive_done(bytes, &info)) {
        unsafe { esp_ieee802154_receive_handle_done(frame) };
    }
}

#[unsafe(no_mangle)]
unsafe extern "C" fn esp_ieee802154_transmit_done(
    frame: *const u8,
    ack: *const u8,
    ack_frame_info: *mut esp_ieee802154_frame_info_t,
) {
    // SAFETY: pointers come straight from the driver; `ack` and its info
    // are null when no ACK was requested.
    let bytes = unsafe { frame_slice(frame) };
    let ack_info = unsafe { ack_frame_info.as_ref() }.map(to_frame_info);
    let ack_bytes = unsafe { frame_slice(ack) };
    with_sink(|sink| {
        let ack = ack_info.as_ref().filter(|_| !ack.is_null()).map(|i| (ack_bytes, i));
        sink.transmit_done(bytes, ack);
    });
    if !ack.is_null() {
        unsafe { esp_ieee802154_receive_handle_done(ack) };
    }
}

#[unsafe(no_mangle)]
unsafe extern "C" fn esp_ieee802154_transmit_failed(
    frame: *const u8,
    error: esp_ieee802154_tx_error_t,
) {
    let bytes = unsafe { frame_slice(frame) };
    let error = TxError::from_raw(error as i32);
    with_sink(|sink| sink.transmit_failed(bytes, error));
}

#[unsafe(no_mangle)]
unsafe extern "C" fn esp_ieee802154_receive_sfd_done() {
    with_sink(|sink| sink.receive_sfd_done());
}

#[unsafe(no_mangle)]
unsafe extern "C" fn esp_ieee802154_transmit_sfd_done(frame: *mut u8) {
    let bytes = unsafe { frame_slice(frame) };
    with_sink(|sink| sink.transmit_sfd_done(bytes));
}
