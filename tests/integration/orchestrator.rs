//! Drives `Monitor::start` in-process with a plugged-in monitor loop.
//!
//! Logging can only be activated once per process, so this binary holds a
//! single full startup.
use std::{
    fs::{self, File},
    os::fd::AsRawFd,
    sync::mpsc,
    thread,
    time::Duration,
};

use nix::sys::signal::{SigSet, Signal};
use one_monitor::{
    daemon::StdDescriptors,
    error::LogError,
    logs::{self, LogSettings, LogSystem, OpenMode, Severity},
    monitor::{Monitor, TeardownStep},
    runtime::{Locations, RuntimeSupport},
    worker::ProcessContext,
};
use tempfile::tempdir;

#[test]
fn full_startup_runs_loop_and_tears_down_in_order() {
    let root = tempdir().unwrap();
    fs::create_dir_all(root.path().join("etc")).unwrap();
    fs::create_dir_all(root.path().join("var")).unwrap();
    fs::write(
        root.path().join("etc/monitor.conf"),
        "MANAGER_TIMER = 15\nLOG = [ SYSTEM = file, DEBUG_LEVEL = 3 ]\n",
    )
    .unwrap();
    let log_file = root.path().join("var/monitor.log");

    let stand_ins: Vec<File> = (0..3).map(|_| tempfile::tempfile().unwrap()).collect();
    let stdio = StdDescriptors {
        stdin: stand_ins[0].as_raw_fd(),
        stdout: stand_ins[1].as_raw_fd(),
        stderr: stand_ins[2].as_raw_fd(),
    };

    let (controller_tx, controller_rx) = mpsc::channel::<libc::pthread_t>();
    let (seen_tx, seen_rx) = mpsc::channel::<(SigSet, Option<String>, bool, bool)>();

    let worker = move |context: ProcessContext| {
        let controller = controller_rx.recv().unwrap();
        let mask = SigSet::thread_get_mask().unwrap();
        let timer = context
            .config()
            .get_single("MANAGER_TIMER")
            .map(str::to_string);
        let file_logging = context.log_settings().system == LogSystem::File;
        let crypto_ready = RuntimeSupport::crypto_lock().is_some();
        seen_tx.send((mask, timer, file_logging, crypto_ready)).unwrap();

        // SAFETY: the controller thread is parked in sigwait until this signal arrives.
        unsafe { libc::pthread_kill(controller, libc::SIGTERM) };

        while !context.shutdown().is_triggered() {
            thread::sleep(Duration::from_millis(10));
        }
    };

    let location = root.path().as_os_str().to_owned();
    let controller = thread::spawn(move || {
        controller_tx.send(unsafe { libc::pthread_self() }).unwrap();
        Monitor::new(Locations::resolve(Some(location)))
            .with_stdio(stdio)
            .with_worker(worker)
            .start()
    });

    let report = controller.join().unwrap().expect("monitor failed");
    assert_eq!(report.signal, Signal::SIGTERM);
    assert_eq!(
        report.teardown,
        vec![
            TeardownStep::StopWorker,
            TeardownStep::ReleaseRuntime,
            TeardownStep::FinalizeLog,
        ]
    );

    let (mask, timer, file_logging, crypto_ready) = seen_rx.recv().unwrap();
    for signal in [Signal::SIGINT, Signal::SIGTERM, Signal::SIGHUP, Signal::SIGUSR1] {
        assert!(mask.contains(signal), "{signal:?} not blocked in monitor loop");
    }
    assert_eq!(timer.as_deref(), Some("15"));
    assert!(file_logging);
    assert!(crypto_ready, "crypto context not ready before the monitor loop");

    #[cfg(target_os = "linux")]
    for file in &stand_ins {
        let target = fs::read_link(format!("/proc/self/fd/{}", file.as_raw_fd())).unwrap();
        assert_eq!(target, std::path::Path::new("/dev/null"));
    }

    let content = fs::read_to_string(&log_file).unwrap();
    let expected = [
        "[MON][I]: Init Monitor Log system",
        "[MON][I]: Starting Monitor Daemon",
        "[MON][I]: Starting monitor loop...",
        "[MON][I]: Monitor started, waiting for SIGINT or SIGTERM",
        "[MON][I]: Received SIGTERM, stopping monitor",
        "[MON][I]: Finalizing Monitor log system",
    ];
    let mut rest = content.as_str();
    for line in expected {
        let at = rest
            .find(line)
            .unwrap_or_else(|| panic!("missing or out of order: {line}\n{content}"));
        rest = &rest[at + line.len()..];
    }

    let again = LogSettings {
        system: LogSystem::Std,
        level: Severity::Error,
        destination: log_file,
        open_mode: OpenMode::Append,
    };
    assert!(matches!(logs::activate(&again, "again"), Err(LogError::AlreadyActive)));
}
