//! Door runner integration tests (Unix only — doors need a PTY).

#![cfg(unix)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::io::AsyncReadExt;

use boardwalk::door::{run_door, DoorConfig, DoorLaunch};
use boardwalk::{InputHandler, OutputMode, SessionTerminal, User};

fn door_user() -> User {
    User {
        id: 5,
        handle: "Nomad".to_string(),
        real_name: "Nora Mad".to_string(),
        access_level: 50,
        time_limit_minutes: 30,
        screen_width: 80,
        screen_height: 25,
        ..User::default()
    }
}

fn shell_door(script: &str) -> DoorConfig {
    serde_json::from_value(serde_json::json!({
        "command": "/bin/sh",
        "args": ["-c", script],
    }))
    .expect("door config")
}

/// Session plumbing plus a collector for everything the door writes back.
fn session_parts() -> (SessionTerminal, InputHandler, Arc<Mutex<Vec<u8>>>) {
    let (near, far) = tokio::io::duplex(1 << 18);
    let (near_read, near_write) = tokio::io::split(near);
    let (mut far_read, _far_write) = tokio::io::split(far);

    let output = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&output);
    tokio::spawn(async move {
        let mut buf = vec![0u8; 4096];
        while let Ok(n) = far_read.read(&mut buf).await {
            if n == 0 {
                break;
            }
            sink.lock().expect("lock").extend_from_slice(&buf[..n]);
        }
    });

    let terminal = SessionTerminal::new(Box::new(near_write), OutputMode::Utf8, 80, 25);
    let input = InputHandler::new(Box::new(near_read));
    (terminal, input, output)
}

fn output_text(output: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8_lossy(&output.lock().expect("lock")).to_string()
}

#[tokio::test]
async fn test_door_output_reaches_session_with_substitution() {
    let (terminal, mut input, output) = session_parts();
    let user = door_user();
    let launch = DoorLaunch {
        user: &user,
        node: 7,
        board_name: "Testboard",
        sysop_name: "Op",
        session_start: Utc::now(),
    };
    let door = shell_door("echo DOOR-{NODE}-OK");

    tokio::time::timeout(
        Duration::from_secs(15),
        run_door(&door, &launch, &terminal, &mut input, None),
    )
    .await
    .expect("door timed out")
    .expect("door run");

    assert!(output_text(&output).contains("DOOR-7-OK"));
    // Drop-file directory is removed on exit.
    assert!(!std::env::temp_dir().join("boardwalk-node7").exists());
}

#[tokio::test]
async fn test_door_sees_drop_files_and_env() {
    let (terminal, mut input, output) = session_parts();
    let user = door_user();
    let launch = DoorLaunch {
        user: &user,
        node: 8,
        board_name: "Testboard",
        sysop_name: "Op",
        session_start: Utc::now(),
    };
    // Default cwd is the drop directory; DOOR.SYS line 1 is the COM port.
    let door = shell_door("head -1 DOOR.SYS; echo node=$BBS_NODE cols=$COLUMNS");

    tokio::time::timeout(
        Duration::from_secs(15),
        run_door(&door, &launch, &terminal, &mut input, None),
    )
    .await
    .expect("door timed out")
    .expect("door run");

    let text = output_text(&output);
    assert!(text.contains("COM1:"), "missing DOOR.SYS header: {text}");
    assert!(text.contains("node=8"));
    assert!(text.contains("cols=80"));
}

#[tokio::test]
async fn test_failing_door_reports_exit_code() {
    let (terminal, mut input, output) = session_parts();
    let user = door_user();
    let launch = DoorLaunch {
        user: &user,
        node: 9,
        board_name: "Testboard",
        sysop_name: "Op",
        session_start: Utc::now(),
    };
    let door = shell_door("exit 3");

    tokio::time::timeout(
        Duration::from_secs(15),
        run_door(&door, &launch, &terminal, &mut input, None),
    )
    .await
    .expect("door timed out")
    .expect("door run");

    assert!(output_text(&output).contains("ended abnormally (code 3)"));
}

#[tokio::test]
async fn test_keystroke_after_door_exit_stays_buffered() {
    use tokio::io::AsyncWriteExt;

    let (near, far) = tokio::io::duplex(1 << 18);
    let (near_read, near_write) = tokio::io::split(near);
    let (mut far_read, mut far_write) = tokio::io::split(far);
    tokio::spawn(async move {
        let mut buf = vec![0u8; 4096];
        while far_read.read(&mut buf).await.is_ok_and(|n| n > 0) {}
    });

    let terminal = SessionTerminal::new(Box::new(near_write), OutputMode::Utf8, 80, 25);
    let mut input = InputHandler::new(Box::new(near_read));

    let user = door_user();
    let launch = DoorLaunch {
        user: &user,
        node: 10,
        board_name: "Testboard",
        sysop_name: "Op",
        session_start: Utc::now(),
    };
    // The door ignores stdin and sleeps briefly; the keystroke we type after
    // it exits must go to the menu loop, not vanish into the dead pump.
    let door = shell_door("sleep 1");

    tokio::time::timeout(
        Duration::from_secs(15),
        run_door(&door, &launch, &terminal, &mut input, None),
    )
    .await
    .expect("door timed out")
    .expect("door run");

    // Typed after the pump shut down.
    far_write.write_all(b"Z").await.expect("type");
    let key = tokio::time::timeout(Duration::from_secs(5), input.read_key())
        .await
        .expect("read timed out")
        .expect("read key");
    assert_eq!(key, boardwalk::Key::Char('Z'));
}
