//! Runtime loading of shared libraries
//!
//! Thin owner around `dlopen`/`dlsym`/`dlclose`. Symbols are resolved into
//! typed function pointers; the pointers are only valid while the
//! [`DynamicLibrary`] they came from is alive, so bindings keep both in the
//! same struct.

use std::ffi::{c_void, CStr, CString};
use std::mem;
use std::ptr::NonNull;

use fh_error::{FanhalError, Result};
use tracing::trace;

/// An open shared library, closed on drop
#[derive(Debug)]
pub struct DynamicLibrary {
    handle: NonNull<c_void>,
    name: String,
}

// The handle is only an opaque token for dlsym/dlclose, which are thread-safe.
unsafe impl Send for DynamicLibrary {}

impl DynamicLibrary {
    /// Load a library by file name or path
    pub fn open(name: &str) -> Result<Self> {
        let c_name = CString::new(name)
            .map_err(|_| FanhalError::system(format!("Invalid library name: {:?}", name)))?;

        // SAFETY: c_name is a valid NUL-terminated string for the duration of the call.
        let handle = unsafe { libc::dlopen(c_name.as_ptr(), libc::RTLD_LAZY) };

        match NonNull::new(handle) {
            Some(handle) => {
                trace!("Loaded shared library {}", name);
                Ok(Self {
                    handle,
                    name: name.to_string(),
                })
            }
            None => Err(FanhalError::system(format!(
                "Failed to load {}: {}",
                name,
                last_dl_error()
            ))),
        }
    }

    /// Try each name in order and return the first library that loads
    pub fn open_any(names: &[&str]) -> Result<Self> {
        let mut last_err = FanhalError::system("No library names given");
        for name in names {
            match Self::open(name) {
                Ok(lib) => return Ok(lib),
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve `symbol` as a value of type `F`.
    ///
    /// Returns `None` if the symbol does not exist.
    ///
    /// # Safety
    ///
    /// `F` must be a function pointer type whose signature matches the C
    /// declaration of `symbol`, and the returned value must not be used after
    /// this library is dropped.
    pub unsafe fn symbol<F: Copy>(&self, symbol: &str) -> Option<F> {
        if mem::size_of::<F>() != mem::size_of::<*mut c_void>() {
            return None;
        }
        let c_symbol = CString::new(symbol).ok()?;
        let ptr = libc::dlsym(self.handle.as_ptr(), c_symbol.as_ptr());
        if ptr.is_null() {
            trace!("Symbol {} not found in {}", symbol, self.name);
            None
        } else {
            Some(mem::transmute_copy::<*mut c_void, F>(&ptr))
        }
    }
}

impl Drop for DynamicLibrary {
    fn drop(&mut self) {
        // SAFETY: handle came from a successful dlopen and is closed exactly once.
        unsafe {
            libc::dlclose(self.handle.as_ptr());
        }
        trace!("Unloaded shared library {}", self.name);
    }
}

fn last_dl_error() -> String {
    // SAFETY: dlerror returns either NULL or a NUL-terminated string owned by libc.
    unsafe {
        let err = libc::dlerror();
        if err.is_null() {
            "unknown error".to_string()
        } else {
            CStr::from_ptr(err).to_string_lossy().into_owned()
        }
    }
}
