use std::ffi::OsStr;
use std::sync::OnceLock;

/// Environment toggle that opts a process into diagnostics without a debugger.
/// Only the literal value `1` enables it.
pub const OPT_IN_ENV: &str = "WEFT_SOURCE_INFO";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GateMode {
    Process,
    Forced(bool),
}

/// Decides whether any diagnostics work happens at all.
///
/// The process gate is open when a debugger is attached (checked on every
/// call) or when [`OPT_IN_ENV`] was `1` the first time it was consulted.
/// Forced gates ignore the environment and exist for tests and embedders
/// that manage enablement themselves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnablementGate {
    mode: GateMode,
}

impl EnablementGate {
    pub const fn process() -> Self {
        Self {
            mode: GateMode::Process,
        }
    }

    pub const fn forced(enabled: bool) -> Self {
        Self {
            mode: GateMode::Forced(enabled),
        }
    }

    #[inline]
    pub fn is_enabled(self) -> bool {
        match self.mode {
            GateMode::Forced(enabled) => enabled,
            GateMode::Process => opt_in_flag() || debugger::is_attached(),
        }
    }
}

impl Default for EnablementGate {
    fn default() -> Self {
        Self::process()
    }
}

/// Cached value of [`OPT_IN_ENV`]; the environment is read once per process.
pub fn opt_in_flag() -> bool {
    static OPT_IN: OnceLock<bool> = OnceLock::new();
    *OPT_IN.get_or_init(|| parse_opt_in(std::env::var_os(OPT_IN_ENV).as_deref()))
}

fn parse_opt_in(value: Option<&OsStr>) -> bool {
    value.and_then(OsStr::to_str) == Some("1")
}

#[cfg(target_os = "linux")]
mod debugger {
    use std::io::Read;

    // Reads into a stack buffer so a closed gate never touches the heap.
    pub fn is_attached() -> bool {
        let Ok(mut file) = std::fs::File::open("/proc/self/status") else {
            return false;
        };
        let mut buf = [0u8; 4096];
        let mut len = 0;
        while len < buf.len() {
            match file.read(&mut buf[len..]) {
                Ok(0) => break,
                Ok(n) => len += n,
                Err(_) => return false,
            }
        }
        super::tracer_pid(&buf[..len]).is_some_and(|pid| pid != 0)
    }
}

#[cfg(not(target_os = "linux"))]
mod debugger {
    pub fn is_attached() -> bool {
        false
    }
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn tracer_pid(status: &[u8]) -> Option<u32> {
    let rest = status
        .split(|b| *b == b'\n')
        .find_map(|line| line.strip_prefix(b"TracerPid:"))?;
    std::str::from_utf8(rest).ok()?.trim().parse().ok()
}
