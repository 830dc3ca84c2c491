//! Console logger
//!
//! Implements `log::Log` on top of the firmware's Simple Text Output
//! protocol. Every record gets a coloured level tag, then the message in
//! the default attribute:
//!
//! ```text
//! [INFO] Found NTFS target partition: ...
//! [FAIL] DiscoverTargetPartition: could not locate an NTFS partition ...
//! ```

use core::fmt::{self, Write};

use log::{Level, LevelFilter, Log, Metadata, Record};
use spin::Mutex;

use crate::uefi::text::{color, SimpleTextOutputProtocol};

/// UCS-2 units converted per `OutputString` call, terminator included.
const CHUNK: usize = 128;

struct Console {
    out: *mut SimpleTextOutputProtocol,
}

// SAFETY: boot services are single-threaded; the pointer is only used
// under the CONSOLE lock.
unsafe impl Send for Console {}

static CONSOLE: Mutex<Option<Console>> = Mutex::new(None);

impl Console {
    fn set_attribute(&mut self, attribute: usize) {
        // SAFETY: `out` comes from the system table and is valid while boot
        // services are active.
        unsafe {
            ((*self.out).set_attribute)(self.out, attribute);
        }
    }

    fn flush_chunk(&mut self, buf: &mut [u16; CHUNK], len: &mut usize) {
        if *len == 0 {
            return;
        }
        buf[*len] = 0;
        // SAFETY: as above; `buf` is NUL-terminated.
        unsafe {
            ((*self.out).output_string)(self.out, buf.as_ptr());
        }
        *len = 0;
    }
}

impl Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut buf = [0u16; CHUNK];
        let mut len = 0;
        for c in s.chars() {
            let (units, n) = match c {
                '\n' => ([b'\r' as u16, b'\n' as u16], 2),
                // Outside the BMP has no UCS-2 form.
                _ => ([u16::try_from(c as u32).unwrap_or(0xFFFD), 0], 1),
            };
            if len + n >= CHUNK {
                self.flush_chunk(&mut buf, &mut len);
            }
            buf[len..len + n].copy_from_slice(&units[..n]);
            len += n;
        }
        self.flush_chunk(&mut buf, &mut len);
        Ok(())
    }
}

/// Writes unadorned text in the default attribute.
pub fn print(args: fmt::Arguments<'_>) {
    if let Some(console) = CONSOLE.lock().as_mut() {
        let _ = console.write_fmt(args);
    }
}

pub struct ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let (tag, attribute) = match record.level() {
            Level::Error => ("[FAIL]", color::LIGHTRED),
            Level::Warn => ("[WARN]", color::YELLOW),
            Level::Info => ("[INFO]", color::WHITE),
            Level::Debug | Level::Trace => ("[DBUG]", color::DARKGRAY),
        };

        let mut guard = CONSOLE.lock();
        let Some(console) = guard.as_mut() else {
            return;
        };
        console.set_attribute(attribute);
        let _ = console.write_str(tag);
        console.set_attribute(color::LIGHTGRAY);
        let _ = writeln!(console, " {}", record.args());
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

/// Routes `log` records to `out`. Later calls only swap the output.
pub fn init(out: *mut SimpleTextOutputProtocol) {
    if out.is_null() {
        return;
    }
    *CONSOLE.lock() = Some(Console { out });

    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(if cfg!(feature = "verbose") {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        });
    }
}
