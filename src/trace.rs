//! The operating-system tracing facility, abstracted behind a trait.
//!
//! The real implementation rides on `ptrace(2)` and only exists on Linux;
//! everything above it is written against [`Tracer`] so the marshalling
//! logic can be exercised with mock tracers on any host.

use core::fmt;

use crate::arch::reg::Gregs;

pub use nix::unistd::Pid;

/// A debugger-level (process, thread) identifier pair.
///
/// On GNU/Linux, threads are traced as pseudo-processes, so a debugger-level
/// identifier carries both the main process id and (possibly) a distinct
/// thread id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ptid {
    pid: Pid,
    lwp: Pid,
}

impl Ptid {
    /// Identifier for thread `lwp` of process `pid`. An `lwp` of zero means
    /// there is no distinct thread.
    pub fn new(pid: i32, lwp: i32) -> Self {
        Ptid {
            pid: Pid::from_raw(pid),
            lwp: Pid::from_raw(lwp),
        }
    }

    /// The main process id.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// The thread id component (zero if none).
    pub fn lwp(&self) -> Pid {
        self.lwp
    }

    /// The OS id to hand to a tracing call: the thread id if there is one,
    /// the process id otherwise.
    pub fn resolve(&self) -> Pid {
        if self.lwp.as_raw() != 0 {
            self.lwp
        } else {
            self.pid
        }
    }
}

/// A failed tracing call, carrying the OS error number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceError {
    /// Reading the general register block failed.
    Getregs(i32),
    /// Writing the general register block failed.
    Setregs(i32),
    /// The get-thread-area request failed.
    ThreadArea(i32),
}

impl fmt::Display for TraceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::TraceError::*;
        match self {
            Getregs(errno) => write!(f, "getregs request failed (errno {})", errno),
            Setregs(errno) => write!(f, "setregs request failed (errno {})", errno),
            ThreadArea(errno) => write!(f, "get-thread-area request failed (errno {})", errno),
        }
    }
}

impl std::error::Error for TraceError {}

/// Blocking register-level access to a traced thread.
///
/// Calls either complete or fail immediately; the host serializes them per
/// traced thread, so implementations hold no cross-call state.
pub trait Tracer {
    /// Read the full general register block of thread `tid`.
    fn getregs(&mut self, tid: Pid) -> Result<Gregs, TraceError>;

    /// Write the full general register block of thread `tid`.
    fn setregs(&mut self, tid: Pid, regs: &Gregs) -> Result<(), TraceError>;

    /// Read the TLS base pointer of thread `tid`, unadjusted.
    fn get_thread_area(&mut self, tid: Pid) -> Result<u64, TraceError>;
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod linux {
            use super::{Gregs, Pid, TraceError, Tracer};
            use crate::arch::NUM_GREGS;

            // MicroBlaze ptrace request numbers (asm/ptrace.h).
            const PTRACE_GETREGS: u32 = 12;
            const PTRACE_SETREGS: u32 = 13;
            const PTRACE_GET_THREAD_AREA: u32 = 22;

            fn last_errno() -> i32 {
                std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
            }

            /// [`Tracer`] implementation over the live `ptrace(2)` interface.
            #[derive(Debug, Default)]
            pub struct LinuxTracer;

            impl Tracer for LinuxTracer {
                fn getregs(&mut self, tid: Pid) -> Result<Gregs, TraceError> {
                    let mut words = [0u32; NUM_GREGS];
                    let rc = unsafe {
                        libc::ptrace(
                            PTRACE_GETREGS as _,
                            tid.as_raw(),
                            core::ptr::null_mut::<libc::c_void>(),
                            words.as_mut_ptr() as *mut libc::c_void,
                        )
                    };
                    if rc < 0 {
                        return Err(TraceError::Getregs(last_errno()));
                    }
                    Ok(Gregs::from_words(words))
                }

                fn setregs(&mut self, tid: Pid, regs: &Gregs) -> Result<(), TraceError> {
                    let rc = unsafe {
                        libc::ptrace(
                            PTRACE_SETREGS as _,
                            tid.as_raw(),
                            core::ptr::null_mut::<libc::c_void>(),
                            regs.words().as_ptr() as *mut libc::c_void,
                        )
                    };
                    if rc < 0 {
                        return Err(TraceError::Setregs(last_errno()));
                    }
                    Ok(())
                }

                fn get_thread_area(&mut self, tid: Pid) -> Result<u64, TraceError> {
                    let mut base: libc::c_ulong = 0;
                    let rc = unsafe {
                        libc::ptrace(
                            PTRACE_GET_THREAD_AREA as _,
                            tid.as_raw(),
                            core::ptr::null_mut::<libc::c_void>(),
                            &mut base as *mut libc::c_ulong as *mut libc::c_void,
                        )
                    };
                    if rc != 0 {
                        return Err(TraceError::ThreadArea(last_errno()));
                    }
                    Ok(base as u64)
                }
            }
        }

        pub use linux::LinuxTracer;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ptid_prefers_thread_id() {
        let ptid = Ptid::new(1024, 1031);
        assert_eq!(ptid.resolve(), Pid::from_raw(1031));
    }

    #[test]
    fn ptid_falls_back_to_process_id() {
        let ptid = Ptid::new(1024, 0);
        assert_eq!(ptid.resolve(), Pid::from_raw(1024));
    }
}
