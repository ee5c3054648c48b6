//! Inter-node paging.
//!
//! Prompts for a target node and a one-line message, then enqueues the page
//! on the target session. Delivery happens when the target's menu loop next
//! polls its queue between visits.
//!
//! Permission rule: any node may page another when the target is visible;
//! paging an invisible node takes sysop access.

// Rust guideline compliant 2026-02

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use crate::errors::SessionError;
use crate::session::PageMessage;

use super::{RunContext, RunOutcome, Runnable};

/// `RUN:PAGE` — send a page to another node.
#[derive(Debug)]
pub struct PageRunnable;

#[async_trait]
impl Runnable for PageRunnable {
    fn name(&self) -> &'static str {
        "PAGE"
    }

    async fn run(&self, ctx: &mut RunContext<'_>) -> Result<RunOutcome> {
        let Some(sender) = ctx.user.as_ref().map(|u| u.handle.clone()) else {
            ctx.terminal
                .print_line("|12You must be logged in to page.|07")
                .await?;
            return Ok(RunOutcome::done());
        };

        ctx.terminal.print("|07Page which node? |15").await?;
        let answer = match ctx.input.read_line(ctx.terminal, 5).await {
            Ok(line) => line,
            Err(SessionError::Interrupted) => return Ok(RunOutcome::done()),
            Err(e) => return Err(e.into()),
        };
        let Ok(target_node) = answer.trim().parse::<u16>() else {
            ctx.terminal.print_line("|12That is not a node number.|07").await?;
            return Ok(RunOutcome::done());
        };
        if target_node == ctx.node {
            ctx.terminal.print_line("|12That's you.|07").await?;
            return Ok(RunOutcome::done());
        }

        let Some(target) = ctx.registry.get(target_node) else {
            ctx.terminal
                .print_line(&format!("|12Node {target_node} is not online.|07"))
                .await?;
            return Ok(RunOutcome::done());
        };
        if target.is_invisible() && !ctx.is_sysop() {
            // Indistinguishable from an empty node on purpose.
            ctx.terminal
                .print_line(&format!("|12Node {target_node} is not online.|07"))
                .await?;
            return Ok(RunOutcome::done());
        }

        ctx.terminal.print("|07Message: |15").await?;
        let text = match ctx.input.read_line(ctx.terminal, 70).await {
            Ok(line) => line,
            Err(SessionError::Interrupted) => return Ok(RunOutcome::done()),
            Err(e) => return Err(e.into()),
        };
        let text = text.trim();
        if text.is_empty() {
            ctx.terminal.print_line("|07Page aborted.|07").await?;
            return Ok(RunOutcome::done());
        }

        target.enqueue_page(PageMessage {
            from_node: ctx.node,
            from_handle: sender,
            text: text.to_string(),
            sent_at: Utc::now(),
        });
        ctx.terminal
            .print_line(&format!("|10Page queued for node {target_node}.|07"))
            .await?;
        Ok(RunOutcome::done())
    }
}
