//! Who-is-online listing.

// Rust guideline compliant 2026-02

use anyhow::Result;
use async_trait::async_trait;

use crate::session::SessionInfo;

use super::{RunContext, RunOutcome, Runnable};

/// `RUN:WHO` — node listing.
///
/// Invisible sessions are hidden from ordinary users; sysops see them
/// marked. The caller's own node always shows.
#[derive(Debug)]
pub struct WhoRunnable;

/// Formats one listing row.
#[must_use]
pub fn format_row(info: &SessionInfo, show_hidden_marker: bool) -> String {
    let handle = info.handle.as_deref().unwrap_or("(logging in)");
    let marker = if show_hidden_marker && info.invisible {
        "|08*|07"
    } else {
        " "
    };
    format!(
        "|15{:>4}{} |11{:<22}|07 {:<20} |03{}|07",
        info.node, marker, handle, info.location, info.activity
    )
}

#[async_trait]
impl Runnable for WhoRunnable {
    fn name(&self) -> &'static str {
        "WHO"
    }

    async fn run(&self, ctx: &mut RunContext<'_>) -> Result<RunOutcome> {
        let sysop = ctx.is_sysop();
        ctx.terminal
            .print_line("|09Node  Handle                 Location             Activity|07")
            .await?;
        ctx.terminal
            .print_line("|08----  ---------------------  -------------------  ----------------|07")
            .await?;

        let mut shown = 0usize;
        for session in ctx.registry.list_active() {
            let info = session.info();
            if info.invisible && !sysop && session.node != ctx.node {
                continue;
            }
            ctx.terminal.print_line(&format_row(&info, sysop)).await?;
            shown += 1;
        }
        ctx.terminal
            .print_line(&format!(
                "|07{} of {} nodes in use.",
                shown,
                ctx.registry.max_nodes()
            ))
            .await?;
        Ok(RunOutcome::done())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_row_marks_invisible_for_sysops_only() {
        let info = SessionInfo {
            node: 4,
            handle: Some("Ghost".to_string()),
            location: "Nowhere".to_string(),
            activity: "Menuing".to_string(),
            invisible: true,
            connected_at: Utc::now(),
        };
        assert!(format_row(&info, true).contains("|08*|07"));
        assert!(!format_row(&info, false).contains("|08*|07"));
    }
}
