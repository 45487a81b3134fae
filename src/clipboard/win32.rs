use super::{check_written, formats, ClipboardBackend, ClipboardFormat, RawFormat};
use crate::error::{ClipboardError, FormatError};
use windows::core::HSTRING;
use windows::Win32::Foundation::{
    GlobalFree, ERROR_CLIPBOARD_NOT_OPEN, ERROR_NOT_ENOUGH_MEMORY, ERROR_OUTOFMEMORY, HANDLE,
    HGLOBAL, HWND,
};
use windows::Win32::System::DataExchange::{
    CloseClipboard, EmptyClipboard, EnumClipboardFormats, GetClipboardData,
    GetClipboardFormatNameW, OpenClipboard, RegisterClipboardFormatW, SetClipboardData,
};
use windows::Win32::System::Memory::{GlobalAlloc, GlobalLock, GlobalSize, GlobalUnlock, GMEM_MOVEABLE};

const STANDARD_FORMATS: &[(u32, &str)] = &[
    (1, formats::TEXT),
    (2, formats::BITMAP),
    (3, "MetaFilePict"),
    (4, "SymbolicLink"),
    (5, "DataInterchangeFormat"),
    (6, "TaggedImageFileFormat"),
    (7, formats::OEM_TEXT),
    (8, formats::DIB),
    (9, "Palette"),
    (10, "PenData"),
    (11, formats::RIFF_AUDIO),
    (12, formats::WAVE_AUDIO),
    (13, formats::UNICODE_TEXT),
    (14, "EnhancedMetafile"),
    (15, formats::FILE_DROP),
    (16, formats::LOCALE),
    (17, formats::DIB_V5),
];

/// Formats whose data is a GDI handle rather than global memory. Windows
/// synthesizes a memory-backed equivalent (DIB for bitmaps) for most of them.
const HANDLE_FORMATS: &[u32] = &[2, 3, 9, 14, 0x0080, 0x0082, 0x0083, 0x008E];

/// The Win32 clipboard, opened on behalf of `owner`.
///
/// The owner must be a real window: `EmptyClipboard` with a null owner makes
/// every following `SetClipboardData` fail.
pub struct WindowsClipboard {
    owner: isize,
}

impl WindowsClipboard {
    pub fn new(owner: HWND) -> Self {
        Self {
            owner: owner.0 as isize,
        }
    }

    fn owner(&self) -> HWND {
        HWND(self.owner as *mut core::ffi::c_void)
    }
}

struct OpenGuard;

impl OpenGuard {
    fn open(owner: HWND) -> Result<Self, ClipboardError> {
        match unsafe { OpenClipboard(owner) } {
            Ok(()) => Ok(OpenGuard),
            Err(err) => {
                tracing::debug!(?err, "OpenClipboard failed");
                Err(ClipboardError::Busy { attempts: 1 })
            }
        }
    }
}

impl Drop for OpenGuard {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseClipboard();
        }
    }
}

pub fn standard_format_name(id: u32) -> Option<&'static str> {
    STANDARD_FORMATS
        .iter()
        .find(|(code, _)| *code == id)
        .map(|(_, name)| *name)
}

fn format_name(id: u32) -> String {
    if let Some(name) = standard_format_name(id) {
        return name.to_string();
    }
    let mut buf = [0u16; 256];
    let len = unsafe { GetClipboardFormatNameW(id, &mut buf) };
    if len > 0 {
        String::from_utf16_lossy(&buf[..len as usize])
    } else {
        format!("#{id}")
    }
}

fn format_id(name: &str) -> Option<u32> {
    if let Some((code, _)) = STANDARD_FORMATS.iter().find(|(_, n)| *n == name) {
        return Some(*code);
    }
    if let Some(raw) = name.strip_prefix('#') {
        return raw.parse().ok();
    }
    let id = unsafe { RegisterClipboardFormatW(&HSTRING::from(name)) };
    (id != 0).then_some(id)
}

fn classify_os_error(err: windows::core::Error) -> FormatError {
    let code = err.code();
    if code == ERROR_CLIPBOARD_NOT_OPEN.to_hresult() {
        FormatError::ClipboardLost
    } else if code == ERROR_NOT_ENOUGH_MEMORY.to_hresult() || code == ERROR_OUTOFMEMORY.to_hresult()
    {
        FormatError::OutOfMemory
    } else {
        FormatError::Marshalling(err.to_string())
    }
}

/// Copy one format out of clipboard-owned global memory. The clipboard must
/// be open.
fn read_global(id: u32) -> Result<Vec<u8>, FormatError> {
    if HANDLE_FORMATS.contains(&id) {
        return Err(FormatError::Unsupported);
    }
    let handle = unsafe { GetClipboardData(id) }.map_err(classify_os_error)?;
    let hglobal = HGLOBAL(handle.0);
    let size = unsafe { GlobalSize(hglobal) };
    if size == 0 {
        return Ok(Vec::new());
    }

    let mut data = Vec::new();
    data.try_reserve_exact(size)
        .map_err(|_| FormatError::OutOfMemory)?;

    unsafe {
        let ptr = GlobalLock(hglobal) as *const u8;
        if ptr.is_null() {
            return Err(FormatError::Marshalling("GlobalLock returned null".into()));
        }
        data.extend_from_slice(std::slice::from_raw_parts(ptr, size));
        let _ = GlobalUnlock(hglobal);
    }
    Ok(data)
}

/// Hand a copy of `data` to the clipboard. The clipboard must be open and
/// emptied by us.
fn write_global(id: u32, data: &[u8]) -> windows::core::Result<()> {
    unsafe {
        let hglobal = GlobalAlloc(GMEM_MOVEABLE, data.len().max(1))?;
        let ptr = GlobalLock(hglobal) as *mut u8;
        if ptr.is_null() {
            let err = windows::core::Error::from_win32();
            let _ = GlobalFree(hglobal);
            return Err(err);
        }
        std::ptr::copy_nonoverlapping(data.as_ptr(), ptr, data.len());
        let _ = GlobalUnlock(hglobal);

        // On success the system owns the memory.
        if let Err(err) = SetClipboardData(id, HANDLE(hglobal.0)) {
            let _ = GlobalFree(hglobal);
            return Err(err);
        }
    }
    Ok(())
}

impl ClipboardBackend for WindowsClipboard {
    fn read_formats(&self) -> Result<Vec<RawFormat>, ClipboardError> {
        let _open = OpenGuard::open(self.owner())?;
        let mut raw = Vec::new();
        let mut id = 0;
        loop {
            id = unsafe { EnumClipboardFormats(id) };
            if id == 0 {
                break;
            }
            raw.push(RawFormat {
                name: format_name(id),
                payload: read_global(id),
            });
        }
        Ok(raw)
    }

    fn write_formats(&self, formats: &[ClipboardFormat]) -> Result<(), ClipboardError> {
        let _open = OpenGuard::open(self.owner())?;
        unsafe { EmptyClipboard() }.map_err(|e| ClipboardError::Os(e.to_string()))?;

        let mut failed = Vec::new();
        for format in formats {
            let Some(id) = format_id(&format.name) else {
                tracing::warn!(format = %format.name, "unable to resolve clipboard format id");
                failed.push(format.name.clone());
                continue;
            };
            if HANDLE_FORMATS.contains(&id) {
                continue;
            }
            if let Err(err) = write_global(id, &format.data) {
                tracing::warn!(format = %format.name, ?err, "failed to write clipboard format");
                failed.push(format.name.clone());
            }
        }
        check_written(&failed)
    }
}
