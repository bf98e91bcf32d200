//! Monitor Dialogue: byte-level read/write on the PTY QEMU allocates for its
//! `-monitor pty`, implementing the line-oriented `"(qemu) "`-prompted
//! text-monitor REPL.
//!
//! Reading is strictly one byte at a time via `ppoll` + a single-byte
//! `read`, following the "drain, then consume the command's echo, then
//! consume up to the next prompt" dialogue contract.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use nix::poll::{ppoll, PollFd, PollFlags};
use nix::sys::time::TimeSpec;
use nix::unistd::read;

use crate::error::{HypervisorError, Result};
use crate::types::VmRecord;

const PROMPT: &str = "(qemu) ";

pub struct MonitorDialogue {
    file: File,
    /// Serializes drain->write->consume per VM: at most one `enterCommand`
    /// in flight per VM.
    dialogue_lock: Mutex<()>,
}

impl MonitorDialogue {
    /// Open the PTY QEMU reported on stderr, read/write, no controlling
    /// terminal (`O_RDWR | O_NOCTTY`).
    pub fn open(pty_path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY)
            .open(pty_path)?;
        Ok(Self {
            file,
            dialogue_lock: Mutex::new(()),
        })
    }

    fn fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    /// A duplicate fd onto the same PTY, for the debug console proxy to
    /// bridge directly without going through `enterCommand`'s history
    /// tracking or dialogue lock.
    pub fn duplicate(&self) -> Result<File> {
        Ok(self.file.try_clone()?)
    }

    /// Wrap an already-open fd (e.g. a `socketpair` standing in for a PTY)
    /// for other modules' tests.
    #[cfg(test)]
    pub(crate) fn from_file_for_test(file: File) -> Self {
        Self {
            file,
            dialogue_lock: Mutex::new(()),
        }
    }

    /// Non-blocking reads until the fd has no data ready, appending
    /// everything consumed to `history`.
    fn consume_available(&self, vm_id: i32, history: &mut VmRecord) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        loop {
            if !self.poll_ready(Duration::from_secs(0))? {
                break;
            }
            let byte = self.read_one(vm_id)?;
            buf.push(byte);
        }
        history.push_history(&buf);
        Ok(buf)
    }

    /// Consume characters one-by-one until `needle` has just been seen, or
    /// the timeout/EOF fires.
    fn consume_until(
        &self,
        vm_id: i32,
        history: &mut VmRecord,
        needle: &str,
        timeout: Duration,
    ) -> Result<String> {
        let needle_bytes = needle.as_bytes();
        let mut buf: Vec<u8> = vec![b' '; needle_bytes.len()];
        let result = loop {
            if buf.ends_with(needle_bytes) {
                break Ok(());
            }
            if !self.poll_ready(timeout)? {
                history.error_bit = true;
                break Err(HypervisorError::MonitorTimeout(vm_id));
            }
            match self.read_one(vm_id) {
                Ok(byte) => buf.push(byte),
                Err(e) => break Err(e),
            }
        };
        // Append whatever was actually consumed (minus the leading padding)
        // to history before propagating the outcome, mirroring the source's
        // `finally: child.monitorHistory.append(...)`.
        let consumed = &buf[needle_bytes.len().min(buf.len())..];
        history.push_history(consumed);
        result?;
        Ok(String::from_utf8_lossy(consumed).into_owned())
    }

    fn poll_ready(&self, timeout: Duration) -> Result<bool> {
        let borrowed = unsafe { std::os::fd::BorrowedFd::borrow_raw(self.fd()) };
        let mut fds = [PollFd::new(borrowed, PollFlags::POLLIN)];
        let ts = TimeSpec::from_duration(timeout);
        let n = ppoll(&mut fds, Some(ts), None)?;
        Ok(n > 0)
    }

    fn read_one(&self, vm_id: i32) -> Result<u8> {
        let mut byte = [0u8; 1];
        let n = read(self.fd(), &mut byte)?;
        if n == 0 {
            return Err(HypervisorError::MonitorEarlyEof(vm_id));
        }
        Ok(byte[0])
    }

    fn write_all(&self, bytes: &[u8]) -> Result<()> {
        let mut offset = 0;
        while offset < bytes.len() {
            let chunk = &bytes[offset..];
            let n = unsafe {
                libc::write(
                    self.fd(),
                    chunk.as_ptr() as *const libc::c_void,
                    chunk.len(),
                )
            };
            if n < 0 {
                return Err(HypervisorError::Io(std::io::Error::last_os_error()));
            }
            offset += n as usize;
        }
        Ok(())
    }

    /// Enter a command on the monitor. If `expect_prompt`, consumes the
    /// command's own echo and then up to the next `"(qemu) "` prompt,
    /// returning the text between as the command's result.
    pub fn enter_command(
        &self,
        history: &mut VmRecord,
        cmd: &str,
        expect_prompt: bool,
        timeout: Duration,
    ) -> Result<String> {
        let vm_id = history.pid;
        let _guard = self.dialogue_lock.lock().unwrap();

        self.consume_available(vm_id, history)?;
        let mut line = cmd.to_string();
        line.push('\n');
        self.write_all(line.as_bytes())?;

        if !expect_prompt {
            return Ok(String::new());
        }

        self.consume_until(vm_id, history, cmd, timeout)?;
        self.consume_until(vm_id, history, PROMPT, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write as _;
    use std::os::unix::io::FromRawFd;

    fn make_record() -> VmRecord {
        VmRecord::new(
            crate::types::Instance {
                memory_mb: 512,
                cores: 1,
                disks: vec![],
                nics: vec![],
                hints: HashMap::new(),
            },
            4242,
            true,
        )
    }

    /// A `socketpair` stands in for a PTY: both directions are a single fd
    /// pair, which is all `MonitorDialogue` needs (it never calls PTY-only
    /// ioctls).
    fn make_pair() -> (File, File) {
        let (a, b) = nix::sys::socket::socketpair(
            nix::sys::socket::AddressFamily::Unix,
            nix::sys::socket::SockType::Stream,
            None,
            nix::sys::socket::SockFlag::empty(),
        )
        .unwrap();
        use std::os::fd::IntoRawFd;
        unsafe { (File::from_raw_fd(a.into_raw_fd()), File::from_raw_fd(b.into_raw_fd())) }
    }

    #[test]
    fn enter_command_reads_echo_then_prompt() {
        let (ours, mut theirs) = make_pair();
        let dialogue = MonitorDialogue {
            file: ours,
            dialogue_lock: Mutex::new(()),
        };
        let mut record = make_record();

        let responder = std::thread::spawn(move || {
            // Echo the command, then emit a result line and the prompt.
            let mut buf = [0u8; 64];
            let n = loop {
                match nix::unistd::read(theirs.as_raw_fd(), &mut buf) {
                    Ok(n) if n > 0 => break n,
                    _ => std::thread::sleep(Duration::from_millis(5)),
                }
            };
            theirs.write_all(&buf[..n]).unwrap();
            theirs.write_all(b"result-line\r\n(qemu) ").unwrap();
        });

        let result = dialogue
            .enter_command(&mut record, "info status", true, Duration::from_secs(2))
            .unwrap();
        responder.join().unwrap();

        assert!(result.contains("result-line"));
        assert!(!record.monitor_history.is_empty());
    }

    #[test]
    fn enter_command_without_expect_prompt_returns_immediately() {
        let (ours, _theirs) = make_pair();
        let dialogue = MonitorDialogue {
            file: ours,
            dialogue_lock: Mutex::new(()),
        };
        let mut record = make_record();
        let result = dialogue
            .enter_command(&mut record, "quit", false, Duration::from_secs(1))
            .unwrap();
        assert_eq!(result, "");
    }

    #[test]
    fn timeout_sets_error_bit() {
        let (ours, _theirs) = make_pair();
        let dialogue = MonitorDialogue {
            file: ours,
            dialogue_lock: Mutex::new(()),
        };
        let mut record = make_record();
        let result = dialogue.enter_command(
            &mut record,
            "stop",
            true,
            Duration::from_millis(50),
        );
        assert!(result.is_err());
        assert!(record.error_bit);
    }
}
