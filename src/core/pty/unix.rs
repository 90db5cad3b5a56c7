//! openpty/fork backend for Unix systems

use std::ffi::{c_char, CString};
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::libc;
use nix::pty::{openpty, Winsize};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::{close, dup2, fork, setsid, ForkResult, Pid};
use tracing::{debug, info};

use super::{ProcessId, Pty, PtyError, PtySize, Result};

nix::ioctl_write_ptr_bad!(set_window_size, libc::TIOCSWINSZ, libc::winsize);
nix::ioctl_write_int_bad!(set_controlling_tty, libc::TIOCSCTTY);

pub struct UnixPty {
    /// Master side we write keystrokes to
    master_in: Option<File>,
    /// Master side we read output from; also the control handle for resizing
    master_out: Option<File>,
    slave_in: Option<OwnedFd>,
    slave_out: Option<OwnedFd>,
    child: Option<Pid>,
}

impl UnixPty {
    fn master_out(&mut self) -> Result<&mut File> {
        self.master_out.as_mut().ok_or(PtyError::Closed)
    }
}

fn winsize(cols: u16, rows: u16) -> Winsize {
    Winsize {
        ws_row: rows,
        ws_col: cols,
        ws_xpixel: 0,
        ws_ypixel: 0,
    }
}

fn to_io(err: Errno) -> io::Error {
    io::Error::from(err)
}

impl Pty for UnixPty {
    fn open(size: PtySize) -> Result<Self> {
        let pair = openpty(Some(&winsize(size.cols, size.rows)), None)
            .map_err(|e| PtyError::Open(to_io(e)))?;

        let master_in = pair.master.try_clone().map_err(PtyError::Open)?;
        let slave_out = pair.slave.try_clone().map_err(PtyError::Open)?;

        // O_NONBLOCK lives on the open file description, shared by both dups
        fcntl(pair.master.as_raw_fd(), FcntlArg::F_SETFL(OFlag::O_NONBLOCK))
            .map_err(|e| PtyError::Open(to_io(e)))?;

        debug!(
            "Opened pty master={} slave={}",
            pair.master.as_raw_fd(),
            pair.slave.as_raw_fd()
        );

        Ok(Self {
            master_in: Some(File::from(master_in)),
            master_out: Some(File::from(pair.master)),
            slave_in: Some(pair.slave),
            slave_out: Some(slave_out),
            child: None,
        })
    }

    fn spawn(&mut self, program: &str, args: &[String]) -> Result<ProcessId> {
        if self.child.is_some() {
            return Err(PtyError::AlreadySpawned);
        }

        let fds = match (&self.master_in, &self.master_out, &self.slave_in, &self.slave_out) {
            (Some(mi), Some(mo), Some(si), Some(so)) => ChildFds {
                master_in: mi.as_raw_fd(),
                master_out: mo.as_raw_fd(),
                slave_in: si.as_raw_fd(),
                slave_out: so.as_raw_fd(),
            },
            _ => return Err(PtyError::Closed),
        };

        // The child must not allocate, so argv is built up front
        let command = ExecArgs::new(program, args)?;

        // Safety: the child only calls async-signal-safe functions before exec
        match unsafe { fork() }.map_err(|e| PtyError::Spawn(to_io(e)))? {
            ForkResult::Child => exec_child(&fds, &command),
            ForkResult::Parent { child } => {
                self.slave_in = None;
                self.slave_out = None;
                self.child = Some(child);

                info!("Spawned {} (pid {})", program, child);
                Ok(child.as_raw() as ProcessId)
            }
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.master_out()?.read(buf) {
            Ok(0) => Err(PtyError::Closed),
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(0),
            // Linux reports a hung-up slave as EIO on the master
            Err(e) if e.raw_os_error() == Some(libc::EIO) => Err(PtyError::Closed),
            Err(e) => Err(PtyError::Read(e)),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let master = self.master_in.as_mut().ok_or(PtyError::Closed)?;
        master.write(data).map_err(PtyError::Write)
    }

    fn resize(&mut self, cols: u16, rows: u16) -> Result<()> {
        let fd = self.master_out()?.as_raw_fd();
        let ws = winsize(cols.max(1), rows.max(1));

        unsafe { set_window_size(fd, &ws) }.map_err(|e| PtyError::Resize(to_io(e)))?;
        Ok(())
    }

    fn interrupt(&mut self) -> Result<bool> {
        let fd = self.master_out()?.as_raw_fd();

        let pgid = Errno::result(unsafe { libc::tcgetpgrp(fd) })
            .map_err(|e| PtyError::Signal(to_io(e)))?;
        killpg(Pid::from_raw(pgid), Signal::SIGINT).map_err(|e| PtyError::Signal(to_io(e)))?;

        debug!("Sent SIGINT to process group {}", pgid);
        Ok(true)
    }

    fn close(&mut self) {
        let had_handles = self.master_out.is_some();

        self.master_in = None;
        self.master_out = None;
        self.slave_in = None;
        self.slave_out = None;

        if had_handles {
            debug!("Closed pty");
        }
    }

    fn child_id(&self) -> Option<ProcessId> {
        self.child.map(|pid| pid.as_raw() as ProcessId)
    }
}

impl Drop for UnixPty {
    fn drop(&mut self) {
        self.close();
    }
}

struct ChildFds {
    master_in: RawFd,
    master_out: RawFd,
    slave_in: RawFd,
    slave_out: RawFd,
}

/// A program and its null-terminated argv, ready for `execvp`
struct ExecArgs {
    path: CString,
    /// Owns the strings `argv` points into
    _args: Vec<CString>,
    argv: Vec<*const c_char>,
}

impl ExecArgs {
    fn new(program: &str, args: &[String]) -> Result<Self> {
        let path =
            CString::new(program).map_err(|_| PtyError::InvalidArgument(program.to_string()))?;

        let mut owned = vec![path.clone()];
        for arg in args {
            owned.push(
                CString::new(arg.as_str()).map_err(|_| PtyError::InvalidArgument(arg.clone()))?,
            );
        }

        let argv = owned
            .iter()
            .map(|arg| arg.as_ptr())
            .chain(std::iter::once(std::ptr::null()))
            .collect();

        Ok(Self {
            path,
            _args: owned,
            argv,
        })
    }
}

/// Runs in the forked child. Any failure ends the child with status 127.
fn exec_child(fds: &ChildFds, command: &ExecArgs) -> ! {
    unsafe {
        if setsid().is_err() {
            libc::_exit(127);
        }

        let _ = close(fds.master_in);
        let _ = close(fds.master_out);

        if dup2(fds.slave_in, libc::STDIN_FILENO).is_err()
            || dup2(fds.slave_out, libc::STDOUT_FILENO).is_err()
            || dup2(fds.slave_out, libc::STDERR_FILENO).is_err()
        {
            libc::_exit(127);
        }

        if set_controlling_tty(libc::STDIN_FILENO, 0).is_err() {
            libc::_exit(127);
        }

        for fd in [fds.slave_in, fds.slave_out] {
            if fd > libc::STDERR_FILENO {
                let _ = close(fd);
            }
        }

        libc::execvp(command.path.as_ptr(), command.argv.as_ptr());
        libc::_exit(127)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    /// Read until `pred` matches the collected output or the child goes away
    fn read_until(pty: &mut UnixPty, pred: impl Fn(&str) -> bool) -> String {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut output = Vec::new();
        let mut buf = [0u8; 1024];

        while Instant::now() < deadline {
            match pty.read(&mut buf) {
                Ok(0) => std::thread::sleep(Duration::from_millis(10)),
                Ok(n) => output.extend_from_slice(&buf[..n]),
                Err(PtyError::Closed) => break,
                Err(e) => panic!("read failed: {e}"),
            }
            if pred(&String::from_utf8_lossy(&output)) {
                break;
            }
        }

        String::from_utf8_lossy(&output).into_owned()
    }

    #[test]
    fn test_open_read_is_nonblocking() {
        let mut pty = UnixPty::open(PtySize::new(80, 24)).unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(pty.read(&mut buf).unwrap(), 0);
        assert!(pty.resize(100, 30).is_ok());
        assert_eq!(pty.child_id(), None);
    }

    #[test]
    fn test_spawn_echo() {
        let mut pty = UnixPty::open(PtySize::new(80, 24)).unwrap();
        let args = vec!["-c".to_string(), "echo hello".to_string()];
        let pid = pty.spawn("/bin/sh", &args).unwrap();

        assert_eq!(pty.child_id(), Some(pid));
        assert!(matches!(pty.spawn("/bin/sh", &args), Err(PtyError::AlreadySpawned)));

        let output = read_until(&mut pty, |s| s.contains("hello"));
        assert!(output.contains("hello"), "unexpected output {output:?}");
    }

    #[test]
    fn test_spawn_rejects_nul() {
        let mut pty = UnixPty::open(PtySize::default()).unwrap();
        let result = pty.spawn("/bin/sh", &["a\0b".to_string()]);
        assert!(matches!(result, Err(PtyError::InvalidArgument(_))));
    }

    #[test]
    fn test_exec_args_are_null_terminated() {
        let command = ExecArgs::new("/bin/sh", &["-c".to_string(), "true".to_string()]).unwrap();

        assert_eq!(command.argv.len(), 4);
        assert!(command.argv[3].is_null());
        let first = unsafe { std::ffi::CStr::from_ptr(command.argv[0]) };
        assert_eq!(first.to_str().unwrap(), "/bin/sh");
        let last = unsafe { std::ffi::CStr::from_ptr(command.argv[2]) };
        assert_eq!(last.to_str().unwrap(), "true");
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut pty = UnixPty::open(PtySize::default()).unwrap();
        pty.close();
        pty.close();

        let mut buf = [0u8; 8];
        assert!(matches!(pty.read(&mut buf), Err(PtyError::Closed)));
        assert!(matches!(pty.write(b"x"), Err(PtyError::Closed)));
    }
}
