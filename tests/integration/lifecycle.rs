#[path = "common/mod.rs"]
mod common;

use std::{
    io::{BufRead, BufReader},
    process::Stdio,
    thread,
    time::Duration,
};

use common::{Installation, READY_LINE, shutdown_entries, wait_for_exit};
use nix::{
    sys::signal::{Signal, kill},
    unistd::Pid,
};

const FILE_CONFIG: &str = r#"
# Monitor daemon configuration
LOG = [
  SYSTEM      = "file",
  DEBUG_LEVEL = 3
]
"#;

fn signal_child(child: &std::process::Child, signal: Signal) {
    kill(Pid::from_raw(child.id() as i32), signal).expect("failed to signal onemonitord");
}

fn run_until(signal: Signal) -> (Installation, std::process::ExitStatus) {
    let install = Installation::new(FILE_CONFIG);
    let mut child = install.spawn();

    install.wait_for_log(READY_LINE);
    signal_child(&child, signal);

    let status = wait_for_exit(&mut child);
    (install, status)
}

#[test]
fn sigterm_shuts_down_cleanly() {
    let (install, status) = run_until(Signal::SIGTERM);

    assert_eq!(status.code(), Some(0));

    let entries = install.log_entries();
    assert_eq!(entries.first().map(String::as_str), Some("[MON][I]: Init Monitor Log system"));
    assert!(entries.iter().any(|e| e == "[MON][I]: Received SIGTERM, stopping monitor"));
    assert_eq!(
        entries.last().map(String::as_str),
        Some("[MON][I]: Finalizing Monitor log system")
    );
}

#[test]
fn sigint_and_sigterm_share_shutdown_sequence() {
    let (sigint, sigint_status) = run_until(Signal::SIGINT);
    let (sigterm, sigterm_status) = run_until(Signal::SIGTERM);

    assert_eq!(sigint_status.code(), Some(0));
    assert_eq!(sigterm_status.code(), Some(0));

    let after_sigint = shutdown_entries(&sigint.log_entries());
    let after_sigterm = shutdown_entries(&sigterm.log_entries());

    assert!(!after_sigint.is_empty());
    assert_eq!(after_sigint, after_sigterm);
    assert!(
        after_sigint
            .iter()
            .any(|e| e == "[MON][D]: Runtime support released")
    );
}

#[test]
fn log_file_is_truncated_and_carries_banner() {
    let install = Installation::new(FILE_CONFIG);
    std::fs::write(install.log_file(), "left over from the last run\n").unwrap();

    let mut child = install.spawn();
    install.wait_for_log(READY_LINE);
    signal_child(&child, Signal::SIGTERM);
    wait_for_exit(&mut child);

    let content = std::fs::read_to_string(install.log_file()).unwrap();
    assert!(!content.contains("left over"));
    assert!(content.contains("Starting Monitor Daemon"));
    assert!(content.contains("LOG=[\n  SYSTEM=file,\n  DEBUG_LEVEL=3 ]"));
}

#[test]
fn other_signals_are_ignored() {
    let install = Installation::new(FILE_CONFIG);
    let mut child = install.spawn();
    install.wait_for_log(READY_LINE);

    for signal in [Signal::SIGHUP, Signal::SIGUSR1, Signal::SIGUSR2, Signal::SIGPIPE] {
        signal_child(&child, signal);
    }
    thread::sleep(Duration::from_millis(300));
    assert!(
        child.try_wait().unwrap().is_none(),
        "onemonitord exited on a non-termination signal"
    );

    signal_child(&child, Signal::SIGTERM);
    assert_eq!(wait_for_exit(&mut child).code(), Some(0));
}

#[cfg(target_os = "linux")]
fn cloexec(pid: u32, fd: i32) -> bool {
    let fdinfo = std::fs::read_to_string(format!("/proc/{pid}/fdinfo/{fd}")).unwrap();
    let flags = fdinfo
        .lines()
        .find_map(|line| line.strip_prefix("flags:"))
        .map(|value| u32::from_str_radix(value.trim(), 8).unwrap())
        .unwrap();
    flags & libc::O_CLOEXEC as u32 != 0
}

#[cfg(target_os = "linux")]
#[test]
fn file_logging_detaches_stdio_to_null() {
    let install = Installation::new(FILE_CONFIG);
    let mut child = install
        .command()
        .stdout(Stdio::piped())
        .spawn()
        .expect("failed to spawn onemonitord");
    install.wait_for_log(READY_LINE);

    for fd in 0..3 {
        let target = std::fs::read_link(format!("/proc/{}/fd/{fd}", child.id())).unwrap();
        assert_eq!(target, std::path::Path::new("/dev/null"), "fd {fd}");
        assert!(!cloexec(child.id(), fd), "fd {fd} is close-on-exec");
    }

    signal_child(&child, Signal::SIGTERM);
    assert_eq!(wait_for_exit(&mut child).code(), Some(0));
}

#[cfg(target_os = "linux")]
#[test]
fn stdout_logging_keeps_terminal_and_closes_on_exec() {
    let install = Installation::new("LOG = [ SYSTEM = std, DEBUG_LEVEL = 2 ]\n");
    let mut child = install
        .command()
        .stdout(Stdio::piped())
        .spawn()
        .expect("failed to spawn onemonitord");

    let stdout = child.stdout.take().unwrap();
    let mut lines = BufReader::new(stdout).lines();
    let mut seen = Vec::new();
    for line in lines.by_ref() {
        let line = line.unwrap();
        let ready = line.contains(READY_LINE);
        seen.push(line);
        if ready {
            break;
        }
    }
    assert!(seen.iter().any(|l| l.contains("[MON][I]: Init Monitor Log system")));

    let stdout_target =
        std::fs::read_link(format!("/proc/{}/fd/1", child.id())).unwrap();
    assert!(stdout_target.to_string_lossy().starts_with("pipe:"));
    for fd in 0..3 {
        assert!(cloexec(child.id(), fd), "fd {fd} survives exec");
    }

    signal_child(&child, Signal::SIGINT);
    let rest: Vec<String> = lines.map_while(Result::ok).collect();
    assert_eq!(wait_for_exit(&mut child).code(), Some(0));
    assert!(rest.iter().any(|l| l.contains("Received SIGINT")));
    assert!(!install.log_file().exists());
}
