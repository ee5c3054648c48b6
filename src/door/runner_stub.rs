//! Door runner stub for platforms without PTY support.
//!
//! Every door invocation reports "not supported" to the user and returns
//! cleanly; the session continues at the menu.

// Rust guideline compliant 2026-02

use anyhow::Result;
use tokio::sync::mpsc;

use crate::input::InputHandler;
use crate::terminal::SessionTerminal;

use super::{DoorConfig, DoorLaunch};

/// Stub runner: doors need a PTY, which this platform cannot allocate.
pub async fn run_door(
    _door: &DoorConfig,
    launch: &DoorLaunch<'_>,
    terminal: &SessionTerminal,
    _input: &mut InputHandler,
    _resize: Option<&mut mpsc::UnboundedReceiver<(u16, u16)>>,
) -> Result<()> {
    log::warn!(
        "node {}: door invocation rejected, no PTY support on this platform",
        launch.node
    );
    terminal
        .print_line("|12Doors are not supported on this platform.|07")
        .await?;
    Ok(())
}
