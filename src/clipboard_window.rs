//! Hidden window that receives hot key and clipboard viewer messages.

use crate::global_hotkey::MOD_NOREPEAT;
use crate::hotkey::ModifierKeys;
use crate::interceptor::{
    MessageInterceptor, ViewerChain, WindowMessage, WM_CHANGECBCHAIN, WM_DRAWCLIPBOARD, WM_HOTKEY,
};
use anyhow::Context;
use std::cell::RefCell;
use std::rc::Rc;
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::DataExchange::{ChangeClipboardChain, SetClipboardViewer};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    RegisterHotKey, UnregisterHotKey, HOT_KEY_MODIFIERS,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetMessageW,
    PostQuitMessage, RegisterClassW, SendMessageW, TranslateMessage, HMENU, MSG, WINDOW_EX_STYLE,
    WINDOW_STYLE, WM_DESTROY, WNDCLASSW,
};

const CLASS_NAME: PCWSTR = w!("MultipleClipboardsMessageWindow");
/// Registration id of the quit hot key; outside the atom range used for
/// clipboard bindings.
const QUIT_HOT_KEY_ID: i32 = 0x0001;

thread_local! {
    static INTERCEPTOR: RefCell<Option<Rc<MessageInterceptor>>> = const { RefCell::new(None) };
}

fn to_hwnd(raw: isize) -> HWND {
    HWND(raw as *mut core::ffi::c_void)
}

/// Forwards chain messages with `SendMessageW`.
pub struct SendMessageChain;

impl ViewerChain for SendMessageChain {
    fn forward(&self, next_viewer: isize, message: &WindowMessage) {
        unsafe {
            SendMessageW(
                to_hwnd(next_viewer),
                message.msg,
                WPARAM(message.wparam),
                LPARAM(message.lparam),
            );
        }
    }
}

unsafe extern "system" fn wndproc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_HOTKEY if wparam.0 == QUIT_HOT_KEY_ID as usize => {
            tracing::info!("quit hot key pressed");
            PostQuitMessage(0);
            LRESULT(0)
        }
        WM_HOTKEY | WM_DRAWCLIPBOARD | WM_CHANGECBCHAIN => {
            // Clone the Rc out so the thread local is not borrowed while the
            // interceptor forwards messages, which may re-enter this procedure.
            let interceptor = INTERCEPTOR.with(|slot| slot.borrow().clone());
            if let Some(interceptor) = interceptor {
                let message = WindowMessage::new(hwnd.0 as isize, msg, wparam.0, lparam.0);
                let outcome = interceptor.handle(message);
                tracing::trace!(?outcome, msg, "handled window message");
                return LRESULT(0);
            }
            DefWindowProcW(hwnd, msg, wparam, lparam)
        }
        WM_DESTROY => {
            PostQuitMessage(0);
            LRESULT(0)
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

/// The hidden window. Create it on the thread that will run
/// [`ClipboardWindow::run`]; hot keys and clipboard messages are delivered
/// to that thread only.
pub struct ClipboardWindow {
    hwnd: isize,
    attached: bool,
    quit_registered: bool,
}

impl ClipboardWindow {
    pub fn create() -> anyhow::Result<Self> {
        unsafe {
            let instance = GetModuleHandleW(None).context("GetModuleHandleW")?;
            let wc = WNDCLASSW {
                lpfnWndProc: Some(wndproc),
                hInstance: instance.into(),
                lpszClassName: CLASS_NAME,
                ..Default::default()
            };
            // Fails harmlessly if the class is already registered.
            let _ = RegisterClassW(&wc);
            let hwnd = CreateWindowExW(
                WINDOW_EX_STYLE(0),
                CLASS_NAME,
                w!("Multiple Clipboards"),
                WINDOW_STYLE(0),
                0,
                0,
                0,
                0,
                None,
                HMENU::default(),
                instance,
                None,
            )
            .context("unable to create the clipboard window")?;
            if hwnd.0.is_null() {
                anyhow::bail!("unable to create the clipboard window");
            }
            tracing::debug!(hwnd = hwnd.0 as isize, "created clipboard window");
            Ok(Self {
                hwnd: hwnd.0 as isize,
                attached: false,
                quit_registered: false,
            })
        }
    }

    pub fn hwnd(&self) -> HWND {
        to_hwnd(self.hwnd)
    }

    /// Install `interceptor` for this thread and join the clipboard viewer
    /// chain.
    pub fn attach(&mut self, interceptor: MessageInterceptor) {
        let interceptor = Rc::new(interceptor);
        INTERCEPTOR.with(|slot| *slot.borrow_mut() = Some(Rc::clone(&interceptor)));
        // SetClipboardViewer reports an error when there is no next viewer.
        let next = unsafe { SetClipboardViewer(self.hwnd()) }.unwrap_or_default();
        interceptor.set_next_viewer(next.0 as isize);
        self.attached = true;
        tracing::info!(next_viewer = next.0 as isize, "joined clipboard viewer chain");
    }

    /// Bind a hot key that ends the message loop.
    pub fn register_quit_hot_key(
        &mut self,
        modifiers: ModifierKeys,
        key: u32,
    ) -> anyhow::Result<()> {
        unsafe {
            RegisterHotKey(
                self.hwnd(),
                QUIT_HOT_KEY_ID,
                HOT_KEY_MODIFIERS(modifiers.bits() | MOD_NOREPEAT),
                key,
            )
        }
        .context("RegisterHotKey")?;
        self.quit_registered = true;
        Ok(())
    }

    /// Pump messages until `WM_QUIT`.
    pub fn run(&self) -> anyhow::Result<()> {
        let mut msg = MSG::default();
        loop {
            let r = unsafe { GetMessageW(&mut msg, None, 0, 0) };
            if r.0 == 0 {
                return Ok(());
            }
            if r.0 == -1 {
                anyhow::bail!("GetMessageW failed");
            }
            unsafe {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    }

    /// Leave the clipboard viewer chain and uninstall the interceptor.
    /// Later hot key and clipboard messages are left to the default
    /// procedure.
    pub fn detach(&mut self) {
        if !self.attached {
            return;
        }
        let interceptor = INTERCEPTOR.with(|slot| slot.borrow_mut().take());
        let next = interceptor.map(|i| i.next_viewer()).unwrap_or(0);
        // The return value only echoes the next viewer's answer.
        unsafe {
            let _ = ChangeClipboardChain(self.hwnd(), to_hwnd(next));
        }
        self.attached = false;
        tracing::info!("left clipboard viewer chain");
    }
}

impl Drop for ClipboardWindow {
    fn drop(&mut self) {
        self.detach();
        unsafe {
            if self.quit_registered {
                let _ = UnregisterHotKey(self.hwnd(), QUIT_HOT_KEY_ID);
            }
            let _ = DestroyWindow(self.hwnd());
        }
    }
}
