//! Unix door runner: PTY allocation, raw-mode passthrough, and the
//! input/output pumps.
//!
//! # Lifecycle
//!
//! ```text
//! write drop files → open PTY (user's saved size, fallback 80×25)
//!   → raw mode on the master (if the door asks) → spawn child on the slave
//!   → output pump:  reader thread → channel → task writing the session
//!   → input pump:   InputHandler.read_available() → master writer
//!   → child exits   → cancel the read interrupt (pump stops WITHOUT
//!                     consuming the user's next keystroke)
//!   → restore termios → close master → join output pump → remove drop dir
//! ```
//!
//! SSH window-resize events arriving during the door are drained and
//! ignored: the door was sized from the user's saved preference and legacy
//! programs repaint badly on live resizes.
//!
//! Resources (termios state, PTY, drop-file directory) are released on every
//! exit path, including a session that disconnects mid-door — in that case
//! the child is killed so the board does not accumulate orphan doors.

// Rust guideline compliant 2026-02

use std::io::{Read, Write};
use std::os::fd::RawFd;

use anyhow::{Context, Result};
use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use tokio::sync::mpsc;

use crate::errors::SessionError;
use crate::input::InputHandler;
use crate::terminal::SessionTerminal;

use super::dropfile::write_drop_files;
use super::{substitute, DoorConfig, DoorLaunch};

/// Runs a configured door to completion.
///
/// `resize` is the session's window-resize event stream, drained and ignored
/// for the duration. Subprocess failure is reported to the user and logged;
/// only launch-infrastructure faults return `Err`.
pub async fn run_door(
    door: &DoorConfig,
    launch: &DoorLaunch<'_>,
    terminal: &SessionTerminal,
    input: &mut InputHandler,
    mut resize: Option<&mut mpsc::UnboundedReceiver<(u16, u16)>>,
) -> Result<()> {
    // Per-node drop-file directory, removed on exit regardless of status.
    let drop_dir = std::env::temp_dir().join(format!("boardwalk-node{}", launch.node));
    std::fs::create_dir_all(&drop_dir)
        .with_context(|| format!("failed to create drop dir {}", drop_dir.display()))?;
    let _drop_guard = scopeguard::guard(drop_dir.clone(), |dir| {
        if let Err(e) = std::fs::remove_dir_all(&dir) {
            log::warn!("failed to remove drop dir {}: {e}", dir.display());
        }
    });

    write_drop_files(&drop_dir, &door.drop_file_kinds(), &launch.dropfile_context())?;

    // The PTY honors the user's saved screen size, not the live terminal.
    let rows = if launch.user.screen_height == 0 { 25 } else { launch.user.screen_height };
    let cols = if launch.user.screen_width == 0 { 80 } else { launch.user.screen_width };
    let pty_system = native_pty_system();
    let pair = pty_system
        .openpty(PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .context("failed to open PTY for door")?;

    let table = launch.substitutions(&drop_dir);
    let program = shellexpand::tilde(&door.command).to_string();
    let mut cmd = CommandBuilder::new(&program);
    for arg in &door.args {
        cmd.arg(substitute(arg, &table));
    }
    cmd.cwd(door.working_dir.clone().unwrap_or_else(|| drop_dir.clone()));
    for (key, value) in &door.env {
        cmd.env(key, substitute(value, &table));
    }
    for (key, value) in launch.standard_env(cols, rows) {
        cmd.env(key, value);
    }
    if door.dos {
        // The emulator's own chatter goes nowhere useful; the virtual COM
        // stream through the PTY is the user-visible channel.
        cmd.env("SDL_VIDEODRIVER", "dummy");
    }

    let master_fd = pair.master.as_raw_fd();
    let saved_termios = if door.raw_terminal {
        match master_fd {
            Some(fd) => Some(set_raw_mode(fd)?),
            None => {
                log::warn!("door requested raw terminal but master has no fd");
                None
            }
        }
    } else {
        None
    };

    let spawned = pair.slave.spawn_command(cmd);
    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            if let (Some(fd), Some(saved)) = (master_fd, saved_termios.as_ref()) {
                restore_mode(fd, saved);
            }
            log::error!("door {program} failed to spawn: {e}");
            terminal
                .print_line(&format!("|12The door failed to start: {e}|07"))
                .await?;
            return Ok(());
        }
    };
    // The slave side belongs to the child now.
    drop(pair.slave);
    log::info!(
        "node {}: door {program} started ({}x{})",
        launch.node,
        cols,
        rows
    );

    let mut killer = child.clone_killer();
    let reader = pair
        .master
        .try_clone_reader()
        .context("failed to clone PTY reader")?;
    let mut writer = pair.master.take_writer().context("failed to take PTY writer")?;

    // Output pump: blocking PTY reads on a thread, session writes on a task.
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let reader_thread = std::thread::spawn(move || {
        let mut reader = reader;
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if out_tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    let out_terminal = terminal.clone();
    let output_task = tokio::spawn(async move {
        while let Some(bytes) = out_rx.recv().await {
            if out_terminal.write_raw(&bytes).await.is_err() {
                break;
            }
        }
    });

    // Child waiter: on exit, cancel the read interrupt so the input pump
    // unblocks without consuming the user's next keystroke.
    let interrupt = input.interrupt_token();
    let waiter = tokio::task::spawn_blocking(move || child.wait());
    let wait_then_interrupt = async {
        let status = waiter.await;
        interrupt.cancel();
        status
    };

    // Input pump: session keystrokes into the PTY until interrupted.
    let input_pump = async {
        loop {
            match input.read_available().await {
                Ok(bytes) => {
                    if writer.write_all(&bytes).and_then(|()| writer.flush()).is_err() {
                        break;
                    }
                }
                Err(SessionError::Interrupted) => break,
                Err(e) => {
                    log::warn!("session lost during door: {e}");
                    let _ = killer.kill();
                    break;
                }
            }
        }
    };

    let status = tokio::select! {
        (status, ()) = async { tokio::join!(wait_then_interrupt, input_pump) } => status,
        () = drain_resizes(resize.as_deref_mut()) => unreachable!("resize drain never completes"),
    };

    // Teardown order matters: termios first, then the master (which ends the
    // reader thread), then join the output pump.
    if let (Some(fd), Some(saved)) = (master_fd, saved_termios.as_ref()) {
        restore_mode(fd, saved);
    }
    drop(pair.master);
    let _ = output_task.await;
    let _ = tokio::task::spawn_blocking(move || reader_thread.join()).await;

    match status.context("door waiter task failed")? {
        Ok(exit) if exit.success() => {
            log::info!("node {}: door {program} exited cleanly", launch.node);
        }
        Ok(exit) => {
            log::warn!(
                "node {}: door {program} exited with {}",
                launch.node,
                exit.exit_code()
            );
            terminal
                .print_line(&format!(
                    "\r\n|12The door ended abnormally (code {}).|07",
                    exit.exit_code()
                ))
                .await?;
        }
        Err(e) => {
            log::error!("node {}: door {program} wait failed: {e}", launch.node);
            terminal
                .print_line("\r\n|12The door ended abnormally.|07")
                .await?;
        }
    }
    Ok(())
}

/// Drains and discards resize events; pends forever once (or if) there are
/// none, so it never wins the select.
async fn drain_resizes(resize: Option<&mut mpsc::UnboundedReceiver<(u16, u16)>>) {
    if let Some(rx) = resize {
        while let Some((cols, rows)) = rx.recv().await {
            log::debug!("ignoring resize to {cols}x{rows} during door (saved size wins)");
        }
    }
    std::future::pending::<()>().await;
}

/// Puts `fd` into raw mode, returning the prior termios for restore.
fn set_raw_mode(fd: RawFd) -> Result<libc::termios> {
    // SAFETY: `fd` is a live PTY master descriptor owned by `pair.master`,
    // and `termios` is a plain-old-data struct the libc calls fully
    // initialize before we read it.
    unsafe {
        let mut term: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(fd, &mut term) != 0 {
            return Err(std::io::Error::last_os_error()).context("tcgetattr on PTY master");
        }
        let saved = term;
        libc::cfmakeraw(&mut term);
        if libc::tcsetattr(fd, libc::TCSANOW, &term) != 0 {
            return Err(std::io::Error::last_os_error()).context("tcsetattr on PTY master");
        }
        Ok(saved)
    }
}

/// Restores a saved termios state; failure is logged, not fatal.
fn restore_mode(fd: RawFd, saved: &libc::termios) {
    // SAFETY: `fd` outlives this call (the master is dropped afterwards) and
    // `saved` came from a successful tcgetattr on the same descriptor.
    let rc = unsafe { libc::tcsetattr(fd, libc::TCSANOW, saved) };
    if rc != 0 {
        log::warn!(
            "failed to restore PTY termios: {}",
            std::io::Error::last_os_error()
        );
    }
}
