//! NVIDIA Management Library binding
//!
//! `libnvidia-ml` ships with the proprietary driver, so it is loaded at
//! runtime instead of linked. Only the five entry points needed to read the
//! GPU core temperature are resolved.

use std::ffi::{c_char, c_uint, c_void, CStr, CString};

use fh_error::{FanhalError, Result};
use tracing::{debug, error};

use crate::dynlib::DynamicLibrary;

pub type NvmlReturn = c_uint;

pub const NVML_SUCCESS: NvmlReturn = 0;

/// `NVML_TEMPERATURE_GPU` from `nvmlTemperatureSensors_t`
const NVML_TEMPERATURE_GPU: c_uint = 0;

const NAME_BUFFER_LEN: usize = 256;

pub const LIBRARY_NAMES: &[&str] = &["libnvidia-ml.so", "libnvidia-ml.so.1"];

type InitFn = unsafe extern "C" fn() -> NvmlReturn;
type GetHandleByPciBusIdFn = unsafe extern "C" fn(*const c_char, *mut *mut c_void) -> NvmlReturn;
type GetNameFn = unsafe extern "C" fn(*mut c_void, *mut c_char, c_uint) -> NvmlReturn;
type GetTemperatureFn = unsafe extern "C" fn(*mut c_void, c_uint, *mut c_uint) -> NvmlReturn;
type ShutdownFn = unsafe extern "C" fn() -> NvmlReturn;

/// Opaque `nvmlDevice_t`
#[derive(Debug, Clone, Copy)]
pub struct NvmlDevice(*mut c_void);

unsafe impl Send for NvmlDevice {}

struct Api {
    init: InitFn,
    get_handle_by_pci_bus_id: GetHandleByPciBusIdFn,
    get_name: GetNameFn,
    get_temperature: GetTemperatureFn,
    shutdown: ShutdownFn,
}

impl Api {
    fn resolve(lib: &DynamicLibrary) -> Result<Self> {
        // SAFETY: the type aliases above mirror the declarations in nvml.h.
        unsafe {
            Ok(Self {
                init: resolve(lib, "nvmlInit_v2")?,
                get_handle_by_pci_bus_id: resolve(lib, "nvmlDeviceGetHandleByPciBusId_v2")?,
                get_name: resolve(lib, "nvmlDeviceGetName")?,
                get_temperature: resolve(lib, "nvmlDeviceGetTemperature")?,
                shutdown: resolve(lib, "nvmlShutdown")?,
            })
        }
    }
}

unsafe fn resolve<F: Copy>(lib: &DynamicLibrary, name: &str) -> Result<F> {
    lib.symbol(name).ok_or_else(|| {
        FanhalError::system(format!(
            "Incompatible NVML driver: {} does not export {}",
            lib.name(),
            name
        ))
    })
}

/// An initialized NVML session.
///
/// The resolved entry points and the library handle live and die together.
/// Call [`Nvml::shutdown`] to end the session and observe its result; if the
/// session is dropped without it, the shutdown happens in `Drop` and a
/// failure is only logged.
pub struct Nvml {
    api: Api,
    initialized: bool,
    // Declared last so the library is unloaded after everything above.
    lib: DynamicLibrary,
}

unsafe impl Send for Nvml {}

impl Nvml {
    /// Load the library, resolve all entry points and call `nvmlInit_v2`
    pub fn load() -> Result<Self> {
        let lib = DynamicLibrary::open_any(LIBRARY_NAMES)
            .map_err(|e| FanhalError::system(format!("Failed to load NVML driver: {}", e)))?;
        let api = Api::resolve(&lib)?;

        // SAFETY: init takes no arguments.
        let ret = unsafe { (api.init)() };
        if ret != NVML_SUCCESS {
            return Err(FanhalError::vendor("nvmlInit_v2", ret));
        }
        debug!("Initialized NVML from {}", lib.name());

        Ok(Self {
            api,
            initialized: true,
            lib,
        })
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(FanhalError::system("NVML session has already been shut down"))
        }
    }

    /// Look up a device by PCI bus id, e.g. `0000:01:00.0`
    pub fn device_by_pci_bus_id(&self, bus_id: &str) -> Result<NvmlDevice> {
        self.ensure_initialized()?;
        let c_bus_id = CString::new(bus_id)
            .map_err(|_| FanhalError::config(format!("Invalid PCI bus id: {:?}", bus_id)))?;
        let mut device: *mut c_void = std::ptr::null_mut();

        // SAFETY: both pointers are valid for the duration of the call.
        let ret = unsafe { (self.api.get_handle_by_pci_bus_id)(c_bus_id.as_ptr(), &mut device) };
        if ret != NVML_SUCCESS {
            return Err(FanhalError::vendor(
                format!("nvmlDeviceGetHandleByPciBusId_v2({})", bus_id),
                ret,
            ));
        }
        Ok(NvmlDevice(device))
    }

    pub fn device_name(&self, device: NvmlDevice) -> Result<String> {
        self.ensure_initialized()?;
        let mut buf = [0 as c_char; NAME_BUFFER_LEN];

        // SAFETY: buf has room for NAME_BUFFER_LEN - 1 characters plus the terminator.
        let ret = unsafe {
            (self.api.get_name)(device.0, buf.as_mut_ptr(), (NAME_BUFFER_LEN - 1) as c_uint)
        };
        if ret != NVML_SUCCESS {
            return Err(FanhalError::vendor("nvmlDeviceGetName", ret));
        }
        // SAFETY: NVML NUL-terminates on success and buf was zeroed.
        let name = unsafe { CStr::from_ptr(buf.as_ptr()) };
        Ok(name.to_string_lossy().into_owned())
    }

    /// GPU core temperature in whole degrees Celsius
    pub fn temperature(&self, device: NvmlDevice) -> Result<u32> {
        self.ensure_initialized()?;
        let mut temp: c_uint = 0;

        // SAFETY: temp is a valid out pointer.
        let ret = unsafe { (self.api.get_temperature)(device.0, NVML_TEMPERATURE_GPU, &mut temp) };
        if ret != NVML_SUCCESS {
            return Err(FanhalError::vendor("nvmlDeviceGetTemperature", ret));
        }
        Ok(temp)
    }

    /// End the NVML session. Later calls on this session fail.
    pub fn shutdown(&mut self) -> Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;

        // SAFETY: shutdown takes no arguments and is called at most once per init.
        let ret = unsafe { (self.api.shutdown)() };
        if ret != NVML_SUCCESS {
            return Err(FanhalError::vendor("nvmlShutdown", ret));
        }
        debug!("NVML shut down");
        Ok(())
    }
}

impl Drop for Nvml {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Failed to shut down NVML driver: {}", e);
        }
    }
}
