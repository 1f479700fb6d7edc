//! Host print spooler, used when USB printers are only reachable by name
//!
//! - Windows: RAW datatype job through the Win32 printing API
//! - Elsewhere: `lp -d <name> -o raw` with the payload on stdin

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::validation::validate_system_name;
use crate::error::{TransportError, TransportResult};

/// Submits raw jobs to a named system printer
#[async_trait]
pub trait Spooler: Send + Sync {
    async fn print_raw(&self, printer: &str, data: &[u8]) -> TransportResult<()>;
}

/// The platform's own spooler
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSpooler;

#[async_trait]
impl Spooler for SystemSpooler {
    #[instrument(skip(self, data), fields(printer = %printer, bytes = data.len()))]
    async fn print_raw(&self, printer: &str, data: &[u8]) -> TransportResult<()> {
        validate_system_name(printer)?;
        submit(printer, data).await?;
        debug!("Spooled raw job");
        Ok(())
    }
}

#[cfg(windows)]
async fn submit(printer: &str, data: &[u8]) -> TransportResult<()> {
    // Win32 printing is synchronous
    let name = printer.to_string();
    let data = data.to_vec();
    tokio::task::spawn_blocking(move || win32::write_raw(&name, &data))
        .await
        .map_err(|e| TransportError::send_failure(format!("spooler task failed: {}", e)))?
}

#[cfg(not(windows))]
async fn submit(printer: &str, data: &[u8]) -> TransportResult<()> {
    use std::process::Stdio;
    use tokio::io::AsyncWriteExt;
    use tokio::process::Command;

    let mut child = Command::new("lp")
        .args(["-d", printer, "-o", "raw"])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TransportError::capability_missing("lp is not available").with_cause(e)
            } else {
                TransportError::io("spawn lp", e)
            }
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(data)
            .await
            .map_err(|e| TransportError::send_failure("write to lp failed").with_cause(e))?;
        // Dropping stdin signals end of job
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| TransportError::send_failure("lp did not finish").with_cause(e))?;
    if !output.status.success() {
        return Err(TransportError::send_failure(format!(
            "lp exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

#[cfg(windows)]
mod win32 {
    use core::ffi::c_void;

    use windows::Win32::Graphics::Printing::{
        ClosePrinter, DOC_INFO_1W, EndDocPrinter, EndPagePrinter, OpenPrinterW, PRINTER_HANDLE,
        StartDocPrinterW, StartPagePrinter, WritePrinter,
    };
    use windows::core::{PCWSTR, PWSTR};

    use crate::error::{TransportError, TransportResult};

    fn to_wide(s: &str) -> Vec<u16> {
        s.encode_utf16().chain(std::iter::once(0)).collect()
    }

    pub(super) fn write_raw(name: &str, data: &[u8]) -> TransportResult<()> {
        unsafe {
            let mut handle: PRINTER_HANDLE = PRINTER_HANDLE::default();
            let name_w = to_wide(name);

            OpenPrinterW(PCWSTR::from_raw(name_w.as_ptr()), &mut handle, None).map_err(|_| {
                TransportError::connection_lost(format!("OpenPrinterW failed for {}", name))
            })?;

            let doc_name_w = to_wide("ESC/POS Job");
            let datatype_w = to_wide("RAW");
            let doc_info = DOC_INFO_1W {
                pDocName: PWSTR(doc_name_w.as_ptr() as *mut _),
                pOutputFile: PWSTR::null(),
                pDatatype: PWSTR(datatype_w.as_ptr() as *mut _),
            };

            if StartDocPrinterW(handle, 1, &doc_info as *const DOC_INFO_1W) == 0 {
                let _ = ClosePrinter(handle);
                return Err(TransportError::send_failure("StartDocPrinter failed"));
            }

            if !StartPagePrinter(handle).as_bool() {
                let _ = EndDocPrinter(handle);
                let _ = ClosePrinter(handle);
                return Err(TransportError::send_failure("StartPagePrinter failed"));
            }

            let mut written: u32 = 0;
            let ok = WritePrinter(
                handle,
                data.as_ptr() as *const c_void,
                data.len() as u32,
                &mut written,
            );

            let _ = EndPagePrinter(handle);
            let _ = EndDocPrinter(handle);
            let _ = ClosePrinter(handle);

            if !ok.as_bool() {
                return Err(TransportError::send_failure("WritePrinter failed"));
            }
            if written != data.len() as u32 {
                return Err(TransportError::send_failure(format!(
                    "Incomplete write: {} of {} bytes",
                    written,
                    data.len()
                )));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportErrorKind;

    #[tokio::test]
    async fn test_rejects_option_like_names() {
        let err = SystemSpooler.print_raw("-h evil", b"x").await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::ValidationError);
    }
}
