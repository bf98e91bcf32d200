//! Debug Console Proxy: bridges a TCP listener to a VM's
//! monitor PTY so an operator can attach with a plain `nc`/`telnet` and
//! drive the text monitor directly. Each accepted connection gets its own
//! thread and its own duplicated fd onto the PTY; bytes crossing this
//! bridge never touch `monitorHistory` or the `enterCommand` dialogue lock,
//! since the console is meant to race alongside normal supervisor traffic.

use std::fs::File;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::os::unix::io::AsRawFd;
use std::thread;
use std::time::Duration;

use nix::poll::{ppoll, PollFd, PollFlags};
use nix::sys::time::TimeSpec;

use crate::error::Result;
use crate::monitor::MonitorDialogue;

const BRIDGE_BUF: usize = 4096;

/// Bind `port` and bridge every accepted connection to `dialogue`'s PTY,
/// blocking the calling thread. Callers spawn this on its own `std::thread`
/// per listener, since a debug console is single-tenant by convention.
///
/// Note, left as-is rather than silently "fixed": if this loop exits
/// abnormally the bound listener socket is leaked.
pub fn serve(port: u16, dialogue: &MonitorDialogue) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port))?;
    for stream in listener.incoming() {
        let stream = stream?;
        let pty = dialogue.duplicate()?;
        thread::spawn(move || {
            if let Err(e) = bridge(stream, pty) {
                tracing::warn!(port, error = %e, "debug console session ended with error");
            }
        });
    }
    Ok(())
}

/// Spawn `serve` on a dedicated thread and return immediately, for callers
/// that don't want to block on the accept loop themselves.
pub fn spawn(port: u16, dialogue: std::sync::Arc<MonitorDialogue>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        if let Err(e) = serve(port, &dialogue) {
            tracing::warn!(port, error = %e, "debug console listener failed");
        }
    })
}

/// Shuttle bytes in both directions between `stream` and `pty` until either
/// side closes.
fn bridge(mut stream: TcpStream, pty: File) -> Result<()> {
    let pty_fd = pty.as_raw_fd();
    let mut pty_reader = pty.try_clone()?;
    let mut pty_writer = pty;
    let mut sock_reader = stream.try_clone()?;

    let to_pty = thread::spawn(move || -> std::io::Result<()> {
        let mut buf = [0u8; BRIDGE_BUF];
        loop {
            let n = sock_reader.read(&mut buf)?;
            if n == 0 {
                return Ok(());
            }
            pty_writer.write_all(&buf[..n])?;
        }
    });

    let mut buf = [0u8; BRIDGE_BUF];
    loop {
        if !poll_ready(pty_fd, Duration::from_millis(200))? {
            continue;
        }
        let n = pty_reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        if stream.write_all(&buf[..n]).is_err() {
            break;
        }
    }

    let _ = to_pty.join();
    Ok(())
}

fn poll_ready(fd: std::os::unix::io::RawFd, timeout: Duration) -> Result<bool> {
    let borrowed = unsafe { std::os::fd::BorrowedFd::borrow_raw(fd) };
    let mut fds = [PollFd::new(borrowed, PollFlags::POLLIN)];
    let ts = TimeSpec::from_duration(timeout);
    let n = ppoll(&mut fds, Some(ts), None)?;
    Ok(n > 0)
}

#[cfg(test)]
#[path = "console_tests.rs"]
mod console_tests;
