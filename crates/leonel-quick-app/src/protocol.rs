//! Registers this executable as the `leonel-quick://` handler.

use std::path::Path;

use leonel_quick_core::DEEP_LINK_SCHEME;
use tracing::info;

use crate::AppError;

/// Registry key (under the current user's classes) naming the scheme.
pub fn registry_key() -> String {
    format!("Software\\Classes\\{DEEP_LINK_SCHEME}")
}

/// Shell command the OS runs for a deep link: `"<exe>" "%1"`.
pub fn open_command(exe: &Path) -> String {
    format!("\"{}\" \"%1\"", exe.display())
}

/// Makes the running executable the default handler for the scheme.
///
/// # Errors
/// Returns [`AppError::Protocol`] when the registration cannot be written.
pub fn register_protocol_handler() -> Result<(), AppError> {
    #[cfg(windows)]
    {
        let exe = std::env::current_exe()
            .map_err(|error| AppError::Protocol(format!("executable path unknown: {error}")))?;
        let key = registry_key();
        let description = format!("URL:{DEEP_LINK_SCHEME} Protocol");
        registry::set_string(&key, None, &description)?;
        registry::set_string(&key, Some("URL Protocol"), "")?;
        registry::set_string(
            &format!("{key}\\shell\\open\\command"),
            None,
            &open_command(&exe),
        )?;
        info!(
            event = "protocol.registered",
            scheme = DEEP_LINK_SCHEME,
            "scheme handler registered for current user"
        );
        Ok(())
    }

    #[cfg(target_os = "macos")]
    {
        info!(
            event = "protocol.registered",
            scheme = DEEP_LINK_SCHEME,
            "scheme handler declared by the app bundle"
        );
        Ok(())
    }

    #[cfg(not(any(windows, target_os = "macos")))]
    {
        info!(
            event = "protocol.unsupported",
            scheme = DEEP_LINK_SCHEME,
            "no scheme registration on this platform"
        );
        Ok(())
    }
}

#[cfg(windows)]
mod registry {
    use std::ffi::c_void;
    use std::ptr::null;

    use windows_sys::Win32::Foundation::ERROR_SUCCESS;
    use windows_sys::Win32::System::Registry::{HKEY_CURRENT_USER, REG_SZ, RegSetKeyValueW};

    use crate::AppError;

    pub(super) fn set_string(key: &str, name: Option<&str>, value: &str) -> Result<(), AppError> {
        let key_wide = to_wide(key);
        let name_wide = name.map(to_wide);
        let value_wide = to_wide(value);
        let byte_len = u32::try_from(value_wide.len() * std::mem::size_of::<u16>())
            .map_err(|_| AppError::Protocol("registry value too long".to_string()))?;

        let status = unsafe {
            // Safety:
            // - All strings are NUL-terminated UTF-16 buffers alive for the call.
            // - `byte_len` matches the length of `value_wide` in bytes.
            RegSetKeyValueW(
                HKEY_CURRENT_USER,
                key_wide.as_ptr(),
                name_wide.as_ref().map_or(null(), |name| name.as_ptr()),
                REG_SZ,
                value_wide.as_ptr().cast::<c_void>(),
                byte_len,
            )
        };

        if status != ERROR_SUCCESS {
            return Err(AppError::Protocol(format!(
                "RegSetKeyValueW failed for '{key}' with status {status}"
            )));
        }
        Ok(())
    }

    fn to_wide(value: &str) -> Vec<u16> {
        value.encode_utf16().chain(std::iter::once(0)).collect()
    }
}
