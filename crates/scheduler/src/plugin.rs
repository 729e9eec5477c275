//! Native plugin loading.
//!
//! A plugin is a cdylib exporting one entry symbol:
//!
//! ```ignore
//! #[no_mangle]
//! pub unsafe extern "C" fn lockstep_plugin_init(registrar: *mut PluginRegistrar) {
//!     (*registrar).register("printer", |task| Box::new(PrinterExecutor::new(task)));
//! }
//! ```
//!
//! The host resolves the symbol with `dlopen`/`dlsym` and calls it once; the
//! plugin registers a factory for each executor kind it provides. Load
//! failures are reported as error values — the caller decides whether they
//! are fatal.

use std::ffi::{CStr, CString};
use std::path::Path;

use tracing::info;

use crate::error::SchedulerError;
use crate::registry::PluginRegistrar;

/// Name of the entry symbol every plugin must export.
pub const PLUGIN_INIT_SYMBOL: &str = "lockstep_plugin_init";

type PluginInitFn = unsafe extern "C" fn(*mut PluginRegistrar);

/// An open plugin library.
///
/// The handle is retained for the life of the task system and never
/// `dlclose`d: executors constructed from the plugin's factories may outlive
/// any point at which unloading would be provably safe.
pub struct PluginHandle {
    handle: *mut libc::c_void,
    path: String,
}

// The raw handle is only ever used on the loading thread after init; keeping
// it is bookkeeping, not shared mutation.
unsafe impl Send for PluginHandle {}

impl PluginHandle {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw `dlopen` handle, kept open for the process lifetime.
    pub fn raw(&self) -> *mut libc::c_void {
        self.handle
    }
}

/// Load the library at `path` and run its init through `registrar`.
pub(crate) fn load(
    path: &Path,
    registrar: &mut PluginRegistrar,
) -> Result<PluginHandle, SchedulerError> {
    let path_str = path.display().to_string();
    let c_path = CString::new(path_str.as_str())
        .map_err(|_| SchedulerError::PluginPath(path_str.clone()))?;

    let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
    if handle.is_null() {
        return Err(SchedulerError::PluginLoad {
            path: path_str,
            reason: last_dl_error(),
        });
    }

    let symbol =
        unsafe { libc::dlsym(handle, b"lockstep_plugin_init\0".as_ptr() as *const _) };
    if symbol.is_null() {
        unsafe { libc::dlclose(handle) };
        return Err(SchedulerError::PluginSymbol {
            path: path_str,
            symbol: PLUGIN_INIT_SYMBOL.to_string(),
        });
    }

    let init: PluginInitFn = unsafe { std::mem::transmute(symbol) };
    unsafe { init(registrar as *mut PluginRegistrar) };

    info!(path = %path_str, kinds = registrar.registered(), "plugin loaded");
    Ok(PluginHandle {
        handle,
        path: path_str,
    })
}

fn last_dl_error() -> String {
    let err = unsafe { libc::dlerror() };
    if err.is_null() {
        "unknown dlopen error".to_string()
    } else {
        unsafe { CStr::from_ptr(err) }.to_string_lossy().into_owned()
    }
}
