use std::ffi::c_void;

/// One logical frame of a captured call stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackFrame {
    /// Demangled function path without the trailing symbol hash,
    /// e.g. `app::pages::MainPage::build` or `<app::Button as core::default::Default>::default`.
    pub function: String,
    /// Executable or shared object the code was loaded from.
    pub module_path: String,
    /// Distance in bytes from the start of the function to the return address.
    pub offset: u64,
}

impl StackFrame {
    pub fn new(function: impl Into<String>, module_path: impl Into<String>, offset: u64) -> Self {
        Self {
            function: function.into(),
            module_path: module_path.into(),
            offset,
        }
    }

    /// Crate that owns this frame's code, as far as the symbol tells.
    pub fn krate(&self) -> &str {
        crate_of(&self.function)
    }

    /// `(self type, method)` when the function is an associated function.
    pub fn method(&self) -> Option<(&str, &str)> {
        split_method(&self.function)
    }
}

/// Source of call stacks for attribution.
pub trait StackWalker: Send + Sync {
    /// Frames of the calling thread, innermost first, at most `max_frames`.
    fn capture(&self, max_frames: usize) -> Vec<StackFrame>;
}

/// Walks the real stack with the `backtrace` crate and symbolizes every
/// frame, expanding inlined frames when debug info allows it.
#[derive(Clone, Copy, Debug, Default)]
pub struct BacktraceWalker;

impl StackWalker for BacktraceWalker {
    #[inline(never)]
    fn capture(&self, max_frames: usize) -> Vec<StackFrame> {
        let mut frames = Vec::new();
        backtrace::trace(|frame| {
            let ip = frame.ip() as usize;
            let function_start = frame.symbol_address() as usize;
            let module_path = module_path_for_ip(frame.ip());

            backtrace::resolve_frame(frame, |symbol| {
                if frames.len() >= max_frames {
                    return;
                }
                let Some(name) = symbol.name() else {
                    return;
                };
                let start = symbol.addr().map_or(function_start, |addr| addr as usize);
                let function = format!("{name:#}");
                frames.push(StackFrame {
                    function: strip_rust_hash_suffix(&function).to_owned(),
                    module_path: module_path.clone(),
                    offset: ip.saturating_sub(start) as u64,
                });
            });

            frames.len() < max_frames
        });
        frames
    }
}

/// A fixed stack, for embedders that capture frames themselves and for tests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyntheticStack {
    frames: Vec<StackFrame>,
}

impl SyntheticStack {
    /// `frames` are listed innermost first.
    pub fn new(frames: Vec<StackFrame>) -> Self {
        Self { frames }
    }
}

impl StackWalker for SyntheticStack {
    fn capture(&self, max_frames: usize) -> Vec<StackFrame> {
        self.frames.iter().take(max_frames).cloned().collect()
    }
}

#[cfg(unix)]
fn module_path_for_ip(ip: *mut c_void) -> String {
    use std::ffi::CStr;

    let mut info = std::mem::MaybeUninit::<libc::Dl_info>::zeroed();
    let ok = unsafe { libc::dladdr(ip as *const c_void, info.as_mut_ptr()) };
    if ok == 0 {
        return current_exe_path();
    }

    let info = unsafe { info.assume_init() };
    if info.dli_fname.is_null() {
        return current_exe_path();
    }

    let path = unsafe { CStr::from_ptr(info.dli_fname) }
        .to_string_lossy()
        .into_owned();
    if path.is_empty() {
        return current_exe_path();
    }
    path
}

#[cfg(not(unix))]
fn module_path_for_ip(_ip: *mut c_void) -> String {
    current_exe_path()
}

fn current_exe_path() -> String {
    std::env::current_exe()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|_| "<unknown-module>".to_owned())
}

pub(crate) fn strip_rust_hash_suffix(name: &str) -> &str {
    if let Some(idx) = name.rfind("::h") {
        let suffix = &name[idx + 3..];
        if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_hexdigit()) {
            return &name[..idx];
        }
    }
    name
}

/// Byte index of the last `::` that is not nested inside `<...>`.
fn last_top_level_separator(path: &str) -> Option<usize> {
    let bytes = path.as_bytes();
    let mut depth = 0usize;
    let mut found = None;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' => depth += 1,
            b'>' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                found = Some(i);
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    found
}

/// Splits `a::B::new` into `("a::B", "new")` and
/// `<a::B as core::default::Default>::default` into `("a::B", "default")`.
pub(crate) fn split_method(function: &str) -> Option<(&str, &str)> {
    let function = strip_turbofish(function);
    let idx = last_top_level_separator(function)?;
    let (owner, method) = (&function[..idx], &function[idx + 2..]);
    if method.is_empty() || owner.is_empty() {
        return None;
    }
    Some((self_type(owner), method))
}

/// Drops trailing generic arguments that v0 symbols carry: `a::B::new::<&str>`.
fn strip_turbofish(function: &str) -> &str {
    if !function.ends_with('>') {
        return function;
    }
    let mut depth = 0usize;
    for (i, b) in function.bytes().enumerate().rev() {
        match b {
            b'>' => depth += 1,
            b'<' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return function[..i].strip_suffix("::").unwrap_or(function);
                }
            }
            _ => {}
        }
    }
    function
}

fn self_type(owner: &str) -> &str {
    let Some(inner) = owner.strip_prefix('<').and_then(|o| o.strip_suffix('>')) else {
        return owner;
    };
    let bytes = inner.as_bytes();
    let mut depth = 0usize;
    for (i, b) in bytes.iter().enumerate() {
        match b {
            b'<' => depth += 1,
            b'>' => depth = depth.saturating_sub(1),
            b' ' if depth == 0 && inner[i..].starts_with(" as ") => return &inner[..i],
            _ => {}
        }
    }
    inner
}

/// Leading path segment of the code's owning item.
pub(crate) fn crate_of(function: &str) -> &str {
    let owner = match split_method(function) {
        Some((owner, _)) if function.starts_with('<') => owner,
        _ => function,
    };
    let owner = owner.trim_start_matches(['<', '&', '*']);
    let owner = owner.strip_prefix("mut ").unwrap_or(owner);
    let end = owner
        .find(|c: char| c == ':' || c == '<' || c == ' ')
        .unwrap_or(owner.len());
    &owner[..end]
}

/// Drops generic argument lists: `a::Foo<u32>::Bar<T>` becomes `a::Foo::Bar`.
pub(crate) fn strip_generics(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut depth = 0usize;
    for c in path.chars() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}
