//! Per-session menu executor — the node task's main loop.
//!
//! Each visit to a menu runs a strictly ordered pipeline:
//!
//! 1. resolve and process the authored screen (placeholder extraction)
//! 2. LOGIN specialization when unauthenticated
//! 3. load the menu record and command list
//! 4. password gate (three attempts), then ACS gate
//! 5. autorun pass (`//` once per session, `~~` every visit, in declared
//!    order)
//! 6. display: optional clear, screen bytes, prompt template
//! 7. input: lightbar when a `.BAR` exists, command line otherwise
//! 8. special input (`^P` back-stack, numeric selection), then key dispatch
//!
//! The back-stack is deliberately one level deep — `^P` returns to the
//! previous menu only, matching long-standing sysop expectations.
//!
//! Failure policy (summarized): a dropped transport returns `LOGOFF`
//! silently; missing screens or menu records are critical and end the
//! session with a logged error; ACS problems deny; autorun failures are
//! logged and never block later autoruns.

// Rust guideline compliant 2026-02

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::acs::{check_acs, AcsContext};
use crate::ansi::screen::{load_screen, ProcessedScreen, LOGIN_PLACEHOLDERS};
use crate::board::Board;
use crate::door::{run_door, DoorLaunch};
use crate::errors::SessionError;
use crate::input::{InputHandler, Key};
use crate::link::SessionLink;
use crate::menu::lightbar::run_lightbar;
use crate::menu::loader::CommandRecord;
use crate::menu::prompt::{render_prompt, PromptContext};
use crate::runnables::RunContext;
use crate::session::Session;
use crate::terminal::SessionTerminal;
use crate::user::User;

/// Maximum failed logins before the node disconnects.
const MAX_LOGIN_ATTEMPTS: u8 = 3;
/// Maximum menu-password attempts.
const MAX_PASSWORD_ATTEMPTS: u8 = 3;
/// Longest accepted command line at a menu prompt.
const COMMAND_MAX_LEN: usize = 60;

/// How the node task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorOutcome {
    /// Close the transport.
    Logoff,
}

/// Result of one menu visit or action dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
enum VisitOutcome {
    /// Transition to another menu (pushes the back-stack).
    Goto(String),
    /// End the session.
    Logoff,
    /// Stay on the current menu (redisplay).
    Stay,
}

/// The per-session menu engine.
pub struct MenuExecutor {
    board: Arc<Board>,
    session: Arc<Session>,
    terminal: SessionTerminal,
    input: InputHandler,
    resize: Option<mpsc::UnboundedReceiver<(u16, u16)>>,
    local: bool,

    user: Option<User>,
    current_menu: String,
    previous_menu: String,
    autorun_log: HashSet<String>,
    session_start: DateTime<Utc>,
    login_attempts: u8,
}

impl std::fmt::Debug for MenuExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MenuExecutor")
            .field("node", &self.session.node)
            .field("current_menu", &self.current_menu)
            .finish_non_exhaustive()
    }
}

/// Whether an error means the transport is gone.
fn is_disconnect(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<SessionError>()
        .is_some_and(SessionError::is_disconnect)
}

impl MenuExecutor {
    /// Builds the executor for a registered session.
    #[must_use]
    pub fn new(board: Arc<Board>, session: Arc<Session>, link: SessionLink) -> Self {
        let mode = if link.output_mode == crate::ansi::OutputMode::Auto {
            board.config.output_mode
        } else {
            link.output_mode
        };
        let terminal = SessionTerminal::new(link.writer, mode, link.width, link.height);
        let input = InputHandler::new(link.reader);
        let start_menu = board.config.login_menu.to_uppercase();
        Self {
            board,
            session,
            terminal,
            input,
            resize: link.resize,
            local: link.local,
            user: None,
            current_menu: start_menu,
            previous_menu: String::new(),
            autorun_log: HashSet::new(),
            session_start: Utc::now(),
            login_attempts: 0,
        }
    }

    /// Runs the node task to completion.
    ///
    /// Returns `Logoff` when the session ends normally or the transport
    /// drops; critical resource failures (missing screens, broken records)
    /// return `Err` after a logged message.
    pub async fn run(mut self) -> Result<ExecutorOutcome> {
        log::info!(
            "node {}: session started at menu {}",
            self.session.node,
            self.current_menu
        );
        loop {
            if let Err(e) = self.deliver_pages().await {
                if is_disconnect(&e) {
                    return self.finish_logoff().await;
                }
                return Err(e);
            }

            let unauthenticated_login = self.user.is_none()
                && self.current_menu == self.board.config.login_menu.to_uppercase();
            let outcome = if unauthenticated_login {
                self.login_visit().await
            } else {
                self.menu_visit().await
            };

            match outcome {
                Ok(VisitOutcome::Stay) => {}
                Ok(VisitOutcome::Goto(next)) => {
                    self.previous_menu =
                        std::mem::replace(&mut self.current_menu, next.to_uppercase());
                }
                Ok(VisitOutcome::Logoff) => return self.finish_logoff().await,
                Err(e) if is_disconnect(&e) => {
                    log::info!("node {}: disconnected", self.session.node);
                    return self.finish_logoff().await;
                }
                Err(e) => {
                    log::error!(
                        "node {}: critical failure in menu {}: {e:#}",
                        self.session.node,
                        self.current_menu
                    );
                    let _ = self
                        .terminal
                        .print_line("\r\n|12The board hit an internal problem; disconnecting.|07")
                        .await;
                    return Err(e);
                }
            }
        }
    }

    /// Final bookkeeping on the way out.
    async fn finish_logoff(&mut self) -> Result<ExecutorOutcome> {
        if let Some(user) = self.user.as_mut() {
            user.last_call = Some(Utc::now());
            if let Err(e) = self.board.users.save(user) {
                log::error!("failed to save user {} at logoff: {e}", user.handle);
            }
        }
        log::info!("node {}: session ended", self.session.node);
        Ok(ExecutorOutcome::Logoff)
    }

    /// Renders queued pages between visits.
    async fn deliver_pages(&mut self) -> Result<()> {
        for page in self.session.drain_pages() {
            self.terminal
                .print_line(&format!(
                    "\x07|13*** Page from {} (node {}): |15{}|07",
                    page.from_handle, page.from_node, page.text
                ))
                .await?;
        }
        Ok(())
    }

    /// ACS check against the current session facts.
    fn check(&self, expression: &str) -> bool {
        let ctx = AcsContext {
            user: self.user.as_ref(),
            local: self.local,
            ansi: true,
        };
        check_acs(expression, &ctx)
    }

    /// ACS check for a not-yet-committed user (LOGIN default scan).
    fn check_for(&self, expression: &str, user: &User) -> bool {
        let ctx = AcsContext {
            user: Some(user),
            local: self.local,
            ansi: true,
        };
        check_acs(expression, &ctx)
    }

    /// Loads and processes the screen for a menu.
    ///
    /// The programmatic renderer, when configured, overrides the authored
    /// `.ANS` for everything except the login menu (whose placeholders are
    /// hand-positioned).
    fn load_menu_screen(&self, name: &str, placeholders: &[u8]) -> Result<ProcessedScreen> {
        if name != self.board.config.login_menu.to_uppercase() {
            if let Some(generated) = self
                .board
                .screen_renderer
                .as_ref()
                .and_then(|render| render(name))
            {
                return Ok(crate::ansi::screen::process_screen(
                    &generated,
                    self.terminal.mode(),
                    placeholders,
                    None,
                ));
            }
        }
        let path = self.board.menuset.screen_path(name);
        load_screen(&path, self.terminal.mode(), placeholders, None)
            .with_context(|| format!("screen for menu {name}"))
    }

    // === LOGIN specialization ===

    async fn login_visit(&mut self) -> Result<VisitOutcome> {
        self.session.set_activity("Logging in");
        let name = self.current_menu.clone();
        let screen = self.load_menu_screen(&name, LOGIN_PLACEHOLDERS)?;

        let (Some(handle_pos), Some(password_pos)) =
            (screen.coords.get('P'), screen.coords.get('O'))
        else {
            self.terminal
                .print_line("|12The login screen is misauthored; tell the sysop.|07")
                .await?;
            return Err(anyhow!(
                "LOGIN screen lacks the P/O coordinate placeholders"
            ));
        };

        self.terminal.clear_screen().await?;
        self.terminal.write_processed(&screen.bytes).await?;

        self.terminal.goto(handle_pos.0, handle_pos.1).await?;
        let handle = match self.input.read_line(&self.terminal, 30).await {
            Ok(line) => line.trim().to_string(),
            Err(SessionError::Interrupted) => return Ok(VisitOutcome::Stay),
            Err(e) => return Err(e.into()),
        };
        if handle.is_empty() {
            return Ok(VisitOutcome::Stay);
        }

        self.terminal.goto(password_pos.0, password_pos.1).await?;
        let password = match self.input.read_password(&self.terminal, 30).await {
            Ok(line) => line,
            Err(SessionError::Interrupted) => return Ok(VisitOutcome::Stay),
            Err(e) => return Err(e.into()),
        };

        match self.board.users.authenticate(&handle, &password)? {
            Some(mut user) => {
                log::info!("node {}: {} authenticated", self.session.node, user.handle);
                user.calls_total += 1;
                if let Err(e) = self.board.users.save(&user) {
                    log::error!("failed to save login counters for {}: {e}", user.handle);
                }
                self.session.set_user(
                    user.id,
                    &user.handle,
                    &user.location,
                    user.access_level,
                );

                // The unique default entry (empty KEYS) that passes ACS
                // carries the post-authentication transition.
                let commands = self.board.menuset.load_commands(&name)?;
                let Some(default) = commands
                    .iter()
                    .find(|c| c.is_default() && self.check_for(&c.acs, &user))
                else {
                    return Err(anyhow!("menu {name} has no reachable default command"));
                };
                let action = default.command.clone();
                self.user = Some(user);
                self.dispatch(&name, &action).await
            }
            None => {
                self.login_attempts += 1;
                log::warn!(
                    "node {}: failed login for '{handle}' (attempt {})",
                    self.session.node,
                    self.login_attempts
                );
                self.terminal
                    .print_line("\r\n|12Login incorrect.|07")
                    .await?;
                if self.login_attempts >= MAX_LOGIN_ATTEMPTS {
                    return Ok(VisitOutcome::Logoff);
                }
                Ok(VisitOutcome::Stay)
            }
        }
    }

    // === Ordinary menu visit ===

    async fn menu_visit(&mut self) -> Result<VisitOutcome> {
        let name = self.current_menu.clone();
        self.session.set_activity(&format!("Menu: {name}"));

        let screen = self.load_menu_screen(&name, &[])?;
        let menu = self
            .board
            .menuset
            .load_menu(&name)
            .with_context(|| format!("menu record {name}"))?;
        let commands = self.board.menuset.load_commands(&name)?;

        if !menu.password.is_empty() && !self.password_gate(&menu.password).await? {
            self.terminal
                .print_line("\r\n|12Wrong password; disconnecting.|07")
                .await?;
            return Ok(VisitOutcome::Logoff);
        }

        if !self.check(&menu.acs) {
            self.terminal.print_line("|12Access Denied|07").await?;
            return Ok(VisitOutcome::Logoff);
        }

        if let Some(outcome) = self.autorun_pass(&name, &commands).await? {
            return Ok(outcome);
        }

        if menu.clear_screen() {
            self.terminal.clear_screen().await?;
        }
        self.terminal.write_processed(&screen.bytes).await?;
        if menu.use_prompt {
            let prompt_ctx = PromptContext {
                user: self.user.as_ref(),
                node: self.session.node,
                board_name: &self.board.config.board_name,
                menu_name: &name,
                session_start: self.session_start,
            };
            for template in [&menu.prompt1, &menu.prompt2] {
                if !template.is_empty() {
                    let rendered = render_prompt(template, &prompt_ctx, &self.board.menuset);
                    self.terminal.print(&rendered).await?;
                }
            }
        }

        // Input: lightbar when authored, plain command line otherwise.
        let raw_input = if let Some(options) = self.board.menuset.load_lightbar(&name)? {
            match run_lightbar(&self.terminal, &mut self.input, &screen.bytes, &options, 0)
                .await?
            {
                Some(value) => value,
                None => String::new(),
            }
        } else {
            self.read_command_line().await?
        };
        let input = raw_input.trim().to_uppercase();
        if input.is_empty() {
            return Ok(VisitOutcome::Stay);
        }

        // Back-stack navigation.
        if input == "^P" {
            if self.previous_menu.is_empty() {
                return Ok(VisitOutcome::Stay);
            }
            return Ok(VisitOutcome::Goto(self.previous_menu.clone()));
        }

        // Numeric selection over visible, ACS-passing commands.
        if let Ok(number) = input.parse::<usize>() {
            if number >= 1 {
                let selected = commands
                    .iter()
                    .filter(|c| c.is_selectable() && self.check(&c.acs))
                    .nth(number - 1)
                    .map(|c| c.command.clone());
                if let Some(action) = selected {
                    return self.dispatch(&name, &action).await;
                }
            }
        }

        // Key dispatch in declared order; an ACS-failing match is skipped,
        // not denied aloud.
        for command in &commands {
            if command.is_autorun() || command.is_default() {
                continue;
            }
            if !command.matches(&input) {
                continue;
            }
            if !self.check(&command.acs) {
                continue;
            }
            let action = command.command.clone();
            return self.dispatch(&name, &action).await;
        }

        if !menu.fallback.is_empty() {
            return Ok(VisitOutcome::Goto(menu.fallback.to_uppercase()));
        }
        self.terminal.print_line("|12Unknown command.|07").await?;
        Ok(VisitOutcome::Stay)
    }

    /// Menu password gate: up to three secure-prompt attempts.
    async fn password_gate(&mut self, expected: &str) -> Result<bool> {
        for _ in 0..MAX_PASSWORD_ATTEMPTS {
            self.terminal.print("\r\n|07Password: |15").await?;
            let attempt = match self.input.read_password(&self.terminal, 40).await {
                Ok(line) => line,
                Err(SessionError::Interrupted) => continue,
                Err(e) => return Err(e.into()),
            };
            if attempt.trim().eq_ignore_ascii_case(expected.trim()) {
                return Ok(true);
            }
            self.terminal.print_line("|12Wrong.|07").await?;
        }
        Ok(false)
    }

    /// Runs `//` and `~~` entries in declared order.
    ///
    /// Returns `Some` when an autorun produced a transition, which ends the
    /// pass; `Stay` results let later autoruns fire.
    async fn autorun_pass(
        &mut self,
        menu_name: &str,
        commands: &[CommandRecord],
    ) -> Result<Option<VisitOutcome>> {
        for command in commands {
            if !command.is_autorun() {
                continue;
            }
            if !self.check(&command.acs) {
                continue;
            }
            if command.is_autorun_once() {
                let log_key = format!("{menu_name}:{}", command.command);
                if !self.autorun_log.insert(log_key) {
                    continue;
                }
            }
            let action = command.command.clone();
            match self.dispatch(menu_name, &action).await {
                Ok(VisitOutcome::Stay) => {}
                Ok(outcome) => return Ok(Some(outcome)),
                Err(e) if is_disconnect(&e) => return Err(e),
                Err(e) => {
                    // Never blocks later autoruns.
                    log::warn!("autorun {action} on {menu_name} failed: {e:#}");
                }
            }
        }
        Ok(None)
    }

    /// Reads a command line with `^P` (Ctrl-P) recognized on an empty line.
    async fn read_command_line(&mut self) -> Result<String> {
        let mut line = String::new();
        loop {
            match self.input.read_key().await {
                Ok(Key::Enter) => {
                    self.terminal.write_raw(b"\r\n").await?;
                    return Ok(line);
                }
                Ok(Key::Backspace) => {
                    if line.pop().is_some() {
                        self.terminal.write_raw(b"\x08 \x08").await?;
                    }
                }
                Ok(Key::Ctrl('P')) if line.is_empty() => {
                    self.terminal.write_raw(b"\r\n").await?;
                    return Ok("^P".to_string());
                }
                Ok(Key::Ctrl('C')) => {
                    line.clear();
                    self.terminal.write_raw(b"\r\n").await?;
                    return Ok(line);
                }
                Ok(Key::Char(ch)) => {
                    if line.chars().count() < COMMAND_MAX_LEN {
                        line.push(ch);
                        self.terminal.print(&ch.to_string()).await?;
                    }
                }
                Ok(_) => {}
                // A stray interrupt (nothing armed it this visit) is an
                // empty command, not a dead session.
                Err(SessionError::Interrupted) => {
                    line.clear();
                    return Ok(line);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    // === Action dispatch ===

    /// Dispatches `VERB:ARG` actions, following runnable chains without
    /// recursion.
    async fn dispatch(&mut self, menu_name: &str, action: &str) -> Result<VisitOutcome> {
        let mut action = action.trim().to_string();
        loop {
            let (verb, arg) = match action.split_once(':') {
                Some((v, a)) => (v.to_string(), a.to_string()),
                None => (action.clone(), String::new()),
            };
            match verb.to_uppercase().as_str() {
                "GOTO" => {
                    if arg.eq_ignore_ascii_case("LOGOFF") {
                        return Ok(VisitOutcome::Logoff);
                    }
                    return Ok(VisitOutcome::Goto(arg.to_uppercase()));
                }
                "LOGOFF" => return Ok(VisitOutcome::Logoff),
                "RUN" => match self.run_runnable(&arg).await? {
                    Some(next) => action = next,
                    None => return Ok(VisitOutcome::Stay),
                },
                "DOOR" => {
                    self.run_door_action(&arg).await?;
                    return Ok(VisitOutcome::Stay);
                }
                other => {
                    log::warn!(
                        "menu {menu_name}: unknown action verb '{other}' in '{action}'"
                    );
                    return Ok(VisitOutcome::Stay);
                }
            }
        }
    }

    /// Invokes a registered runnable; returns its chained action, if any.
    async fn run_runnable(&mut self, arg: &str) -> Result<Option<String>> {
        let (name, rest) = arg.split_once(':').unwrap_or((arg, ""));
        let Some(runnable) = self.board.runnables.get(name) else {
            log::warn!("RUN:{name} has no registered runnable");
            self.terminal
                .print_line(&format!("|12'{name}' is not available here.|07"))
                .await?;
            return Ok(None);
        };

        self.input.reset();
        let mut ctx = RunContext {
            terminal: &self.terminal,
            input: &mut self.input,
            session: &self.session,
            registry: &self.board.registry,
            chat: &self.board.chat,
            users: self.board.users.as_ref(),
            messages: self.board.messages.as_ref(),
            files: self.board.files.as_ref(),
            config: &self.board.config,
            menuset: &self.board.menuset,
            user: &mut self.user,
            node: self.session.node,
            session_start: self.session_start,
            arg: rest,
        };
        let result = runnable.run(&mut ctx).await;
        self.input.reset();
        match result {
            Ok(outcome) => Ok(outcome.next_action),
            Err(e) => Err(e),
        }
    }

    /// Launches a configured door.
    async fn run_door_action(&mut self, name: &str) -> Result<()> {
        let Some(user) = self.user.clone() else {
            self.terminal
                .print_line("|12You must be logged in to open doors.|07")
                .await?;
            return Ok(());
        };
        let door = match self.board.doors.load(name) {
            Ok(door) => door,
            Err(e) => {
                log::error!("door {name}: {e:#}");
                self.terminal
                    .print_line(&format!("|12Door '{name}' is not configured.|07"))
                    .await?;
                return Ok(());
            }
        };

        self.session.set_activity(&format!("In door: {name}"));
        let launch = DoorLaunch {
            user: &user,
            node: self.session.node,
            board_name: &self.board.config.board_name,
            sysop_name: &self.board.config.sysop_name,
            session_start: self.session_start,
        };
        self.input.reset();
        let result = run_door(
            &door,
            &launch,
            &self.terminal,
            &mut self.input,
            self.resize.as_mut(),
        )
        .await;
        self.input.reset();
        self.session.set_activity("Menuing");

        match result {
            Ok(()) => {
                if let Some(user) = self.user.as_mut() {
                    user.doors_run += 1;
                }
                if let Some(user) = self.user.as_ref() {
                    if let Err(e) = self.board.users.save(user) {
                        log::error!("failed to save door counter for {}: {e}", user.handle);
                    }
                }
                Ok(())
            }
            Err(e) => {
                log::error!("door {name} failed: {e:#}");
                self.terminal
                    .print_line(&format!("|12Door '{name}' failed to run.|07"))
                    .await?;
                Ok(())
            }
        }
    }
}
