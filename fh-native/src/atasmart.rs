//! libatasmart binding
//!
//! Reads disk temperatures from S.M.A.R.T. data. The library is loaded at
//! runtime, one [`SkDisk`] per device file.

use std::ffi::{c_char, c_int, c_void, CString};
use std::io;
use std::ptr::NonNull;

use fh_error::{FanhalError, Result};
use tracing::trace;

use crate::dynlib::DynamicLibrary;

pub const LIBRARY_NAMES: &[&str] = &["libatasmart.so.4", "libatasmart.so"];

/// `SkBool` is a plain C int
type SkBool = c_int;

type OpenFn = unsafe extern "C" fn(*const c_char, *mut *mut c_void) -> c_int;
type CheckSleepModeFn = unsafe extern "C" fn(*mut c_void, *mut SkBool) -> c_int;
type SmartReadDataFn = unsafe extern "C" fn(*mut c_void) -> c_int;
type SmartGetTemperatureFn = unsafe extern "C" fn(*mut c_void, *mut u64) -> c_int;
type FreeFn = unsafe extern "C" fn(*mut c_void);

#[derive(Clone, Copy)]
struct Api {
    open: OpenFn,
    check_sleep_mode: CheckSleepModeFn,
    smart_read_data: SmartReadDataFn,
    smart_get_temperature: SmartGetTemperatureFn,
    free: FreeFn,
}

impl Api {
    fn resolve(lib: &DynamicLibrary) -> Result<Self> {
        // SAFETY: the type aliases above mirror the declarations in atasmart.h.
        unsafe {
            Ok(Self {
                open: resolve(lib, "sk_disk_open")?,
                check_sleep_mode: resolve(lib, "sk_disk_check_sleep_mode")?,
                smart_read_data: resolve(lib, "sk_disk_smart_read_data")?,
                smart_get_temperature: resolve(lib, "sk_disk_smart_get_temperature")?,
                free: resolve(lib, "sk_disk_free")?,
            })
        }
    }
}

unsafe fn resolve<F: Copy>(lib: &DynamicLibrary, name: &str) -> Result<F> {
    lib.symbol(name).ok_or_else(|| {
        FanhalError::system(format!("Incompatible libatasmart: {} does not export {}", lib.name(), name))
    })
}

/// An open `SkDisk` handle, freed on drop
pub struct SkDisk {
    disk: NonNull<c_void>,
    api: Api,
    path: String,
    _lib: DynamicLibrary,
}

unsafe impl Send for SkDisk {}

impl SkDisk {
    /// Open a block device such as `/dev/sda`
    pub fn open(path: &str) -> Result<Self> {
        let lib = DynamicLibrary::open_any(LIBRARY_NAMES)?;
        let api = Api::resolve(&lib)?;
        let c_path = CString::new(path)
            .map_err(|_| FanhalError::config(format!("Invalid device path: {:?}", path)))?;
        let mut disk: *mut c_void = std::ptr::null_mut();

        // SAFETY: both pointers are valid for the duration of the call.
        let ret = unsafe { (api.open)(c_path.as_ptr(), &mut disk) };
        let disk = match NonNull::new(disk) {
            Some(disk) if ret >= 0 => disk,
            _ => return Err(call_failed("sk_disk_open", path)),
        };
        trace!("Opened {} via libatasmart", path);

        Ok(Self {
            disk,
            api,
            path: path.to_string(),
            _lib: lib,
        })
    }

    /// Whether the disk is in a low-power state. Does not wake the disk.
    pub fn is_sleeping(&mut self) -> Result<bool> {
        let mut awake: SkBool = 1;
        // SAFETY: disk is a live handle and awake is a valid out pointer.
        if unsafe { (self.api.check_sleep_mode)(self.disk.as_ptr(), &mut awake) } < 0 {
            return Err(call_failed("sk_disk_check_sleep_mode", &self.path));
        }
        Ok(awake == 0)
    }

    /// Refresh the cached S.M.A.R.T. data
    pub fn read_smart_data(&mut self) -> Result<()> {
        // SAFETY: disk is a live handle.
        if unsafe { (self.api.smart_read_data)(self.disk.as_ptr()) } < 0 {
            return Err(call_failed("sk_disk_smart_read_data", &self.path));
        }
        Ok(())
    }

    /// Temperature from the last S.M.A.R.T. read, in millikelvin
    pub fn temperature_mkelvin(&mut self) -> Result<u64> {
        let mut mkelvin: u64 = 0;
        // SAFETY: disk is a live handle and mkelvin is a valid out pointer.
        if unsafe { (self.api.smart_get_temperature)(self.disk.as_ptr(), &mut mkelvin) } < 0 {
            return Err(call_failed("sk_disk_smart_get_temperature", &self.path));
        }
        Ok(mkelvin)
    }
}

impl Drop for SkDisk {
    fn drop(&mut self) {
        // SAFETY: disk came from sk_disk_open and is freed exactly once, before _lib is unloaded.
        unsafe { (self.api.free)(self.disk.as_ptr()) };
        trace!("Closed {}", self.path);
    }
}

/// libatasmart reports failures through errno
fn call_failed(call: &str, path: &str) -> FanhalError {
    FanhalError::system(format!("{}({}): {}", call, path, io::Error::last_os_error()))
}
