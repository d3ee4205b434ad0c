// Gateway backed by libcec's cec-client tool.
//
// Each command starts a fresh `cec-client -s` process, which opens the
// adapter, sends one command, and exits.

use crate::cec::{parse_power_status, CECCommand, CECMessage, ClientCommand, LogicalAddress};
use crate::metrics;
use crate::tv::{Input, PowerState, TVConnection, TVError};
use log::{debug, warn};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub struct CecClient {
    program: PathBuf,
    timeout: Duration,
    tv: LogicalAddress,
    own_addr: LogicalAddress,
}

impl CecClient {
    pub fn new(
        program: impl Into<PathBuf>,
        timeout: Duration,
        tv: LogicalAddress,
        own_addr: LogicalAddress,
    ) -> Self {
        Self {
            program: program.into(),
            timeout,
            tv,
            own_addr,
        }
    }

    fn send(&self, cmd: &ClientCommand) -> Result<String, TVError> {
        debug!("sending {:?} as {:?}", cmd, cmd.to_string());
        let result = self.run(&cmd.to_string());
        match &result {
            Ok(_) => metrics::record_cec_command(cmd.name(), "ok"),
            Err(e) => {
                warn!("{} failed: {}", cmd.name(), e);
                metrics::record_cec_command(cmd.name(), "error");
            }
        }
        result
    }

    fn run(&self, line: &str) -> Result<String, TVError> {
        let mut child = Command::new(&self.program)
            .args(["-s", "-d", "1"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => TVError::NotFound,
                _ => TVError::Io(e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // The child may exit before reading; a broken pipe here is not a failure.
            if let Err(e) = writeln!(stdin, "{}", line) {
                if e.kind() != io::ErrorKind::BrokenPipe {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(e.into());
                }
            }
        }

        let reader = child.stdout.take().map(|mut stdout| {
            thread::spawn(move || {
                let mut out = String::new();
                let _ = stdout.read_to_string(&mut out);
                out
            })
        });

        let status = self.wait(&mut child)?;
        let output = reader
            .and_then(|r| r.join().ok())
            .unwrap_or_default()
            .trim()
            .to_string();

        if status.success() {
            Ok(output)
        } else if output.is_empty() {
            Err(TVError::CommandFailed(format!(
                "cec-client exited with {}",
                status
            )))
        } else {
            Err(TVError::CommandFailed(output))
        }
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus, TVError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(TVError::TimedOut);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl TVConnection for CecClient {
    fn power_state(&mut self) -> Result<PowerState, TVError> {
        let output = self.send(&ClientCommand::PowerStatus(self.tv))?;
        parse_power_status(&output)
    }

    fn power_on(&mut self, input: Option<Input>) -> Result<(), TVError> {
        self.send(&ClientCommand::On(self.tv))?;
        if let Some(input) = input {
            self.send(&ClientCommand::Transmit(CECCommand {
                initiator: self.own_addr,
                destination: LogicalAddress::Broadcast,
                message: CECMessage::ActiveSource {
                    physical_address: input.physical_address(),
                },
            }))?;
        }
        Ok(())
    }

    fn power_off(&mut self) -> Result<(), TVError> {
        self.send(&ClientCommand::Standby(self.tv))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazy_static::lazy_static;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    // Shell scripts standing in for cec-client. They are all written before
    // any test spawns a process, so no exec races a still-open write handle.
    // The directory is per process and left in the temp dir after the run;
    // tests run in parallel, so no single test can own its removal.
    const SCRIPTS: &[(&str, &str)] = &[
        (
            "status_on",
            "read cmd\necho \"opening a connection to the CEC adapter...\"\necho \"power status: on\"",
        ),
        ("echo_cmd", "read cmd\necho \"power status: $cmd\""),
        ("status_none", "read cmd\necho \"no adapter output\""),
        (
            "fails",
            "read cmd\necho \"unable to open the device\"\nexit 1",
        ),
        ("fails_quietly", "exit 3"),
        ("hangs", "sleep 5"),
        ("records", "read cmd\necho \"$cmd\" >> \"$(dirname \"$0\")/sent.log\""),
    ];

    lazy_static! {
        static ref SCRIPT_DIR: PathBuf = {
            let dir = std::env::temp_dir().join(format!("cecbridge-test-{}", std::process::id()));
            fs::create_dir_all(&dir).unwrap();
            for (name, body) in SCRIPTS {
                let path = dir.join(name);
                fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
                fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            }
            dir
        };
    }

    fn client(name: &str, timeout: Duration) -> CecClient {
        CecClient::new(
            SCRIPT_DIR.join(name),
            timeout,
            LogicalAddress::TV,
            LogicalAddress::RecordingDevice1,
        )
    }

    #[test]
    fn reads_power_status() {
        let mut c = client("status_on", Duration::from_secs(5));
        assert_eq!(c.power_state().unwrap(), PowerState::On);
    }

    #[test]
    fn passes_command_on_stdin() {
        let mut c = client("echo_cmd", Duration::from_secs(5));
        // "pow 0" is not a known status, so it comes back as reported.
        assert_eq!(
            c.power_state().unwrap(),
            PowerState::Other("pow 0".to_string())
        );
    }

    #[test]
    fn unparseable_status_is_error() {
        let mut c = client("status_none", Duration::from_secs(5));
        assert!(matches!(c.power_state(), Err(TVError::Parse(_))));
    }

    #[test]
    fn nonzero_exit_reports_output() {
        let mut c = client("fails", Duration::from_secs(5));
        let err = c.power_off().unwrap_err();
        assert_eq!(err.to_string(), "unable to open the device");
    }

    #[test]
    fn nonzero_exit_without_output() {
        let mut c = client("fails_quietly", Duration::from_secs(5));
        let err = c.power_on(None).unwrap_err();
        assert!(err.to_string().starts_with("cec-client exited with"));
    }

    #[test]
    fn missing_binary() {
        let mut c = client("does_not_exist", Duration::from_secs(5));
        assert!(matches!(c.power_on(None), Err(TVError::NotFound)));
    }

    #[test]
    fn times_out() {
        let mut c = client("hangs", Duration::from_millis(200));
        let start = Instant::now();
        assert!(matches!(c.power_off(), Err(TVError::TimedOut)));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn power_on_with_input_sends_active_source() {
        let log = SCRIPT_DIR.join("sent.log");
        let _ = fs::remove_file(&log);
        let mut c = client("records", Duration::from_secs(5));
        c.power_on(Some(Input::HDMI2)).unwrap();
        let sent = fs::read_to_string(&log).unwrap();
        assert_eq!(sent, "on 0\ntx 1F:82:20:00\n");
    }
}
