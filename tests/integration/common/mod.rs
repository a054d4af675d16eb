#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};

use tempfile::TempDir;

pub const READY_LINE: &str = "Monitor started, waiting for SIGINT or SIGTERM";

/// A throwaway `ONE_LOCATION` tree with `etc/monitor.conf` and `var/`.
pub struct Installation {
    root: TempDir,
}

impl Installation {
    pub fn new(config: &str) -> Self {
        let root = tempfile::tempdir().expect("failed to create tempdir");
        fs::create_dir_all(root.path().join("etc")).expect("make etc dir");
        fs::create_dir_all(root.path().join("var")).expect("make var dir");
        fs::write(root.path().join("etc/monitor.conf"), config).expect("write monitor.conf");
        Self { root }
    }

    /// An installation without any configuration file.
    pub fn empty() -> Self {
        let root = tempfile::tempdir().expect("failed to create tempdir");
        Self { root }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn log_file(&self) -> PathBuf {
        self.root.path().join("var/monitor.log")
    }

    pub fn command(&self) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_onemonitord"));
        command
            .env("ONE_LOCATION", self.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
    }

    pub fn spawn(&self) -> Child {
        self.command().spawn().expect("failed to spawn onemonitord")
    }

    /// Log lines with the timestamp stripped, e.g. `[MON][I]: ...`.
    pub fn log_entries(&self) -> Vec<String> {
        fs::read_to_string(self.log_file())
            .unwrap_or_default()
            .lines()
            .filter_map(|line| line.find("[MON]").map(|start| line[start..].to_string()))
            .collect()
    }

    pub fn wait_for_log(&self, needle: &str) {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Ok(content) = fs::read_to_string(self.log_file())
                && content.contains(needle)
            {
                return;
            }

            if Instant::now() >= deadline {
                panic!("Timed out waiting for '{needle}' in {:?}", self.log_file());
            }

            thread::sleep(Duration::from_millis(50));
        }
    }
}

pub fn wait_for_exit(child: &mut Child) -> ExitStatus {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(status) = child.try_wait().expect("failed to poll child") {
            return status;
        }

        if Instant::now() >= deadline {
            let _ = child.kill();
            panic!("onemonitord did not exit in time");
        }

        thread::sleep(Duration::from_millis(50));
    }
}

/// Entries logged after the termination signal was received.
pub fn shutdown_entries(entries: &[String]) -> Vec<String> {
    entries
        .iter()
        .skip_while(|entry| !entry.contains("Received SIG"))
        .skip(1)
        .cloned()
        .collect()
}
