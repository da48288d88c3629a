//! Out-of-band management probe

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::FleetConfig;
use crate::secret::{Secret, REDACTED};
use crate::{Error, Result};

/// Where and how to reach a host's management interface
#[derive(Debug, Clone)]
pub struct ProbeTarget {
    pub address: IpAddr,
    pub username: String,
    pub password: Secret,
}

/// Capability snapshot reported by a successful probe
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub memory: Option<String>,
    pub cpu_speed: Option<String>,
    pub cpu_number: Option<String>,
    pub mac: Option<String>,
}

impl Capabilities {
    /// Parse `key=value` lines; unknown keys are ignored
    pub fn parse(output: &str) -> Self {
        let mut caps = Capabilities::default();
        for line in output.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = Some(value.trim().to_string());
            match key.trim() {
                "memory" => caps.memory = value,
                "cpuspeed" => caps.cpu_speed = value,
                "cpunumber" => caps.cpu_number = value,
                "mac" | "hostmac" => caps.mac = value,
                _ => {}
            }
        }
        caps
    }
}

/// Confirms a host's management interface is reachable with the given
/// credentials. Any `Err` means the host could not be probed.
#[cfg_attr(test, mockall::automock)]
pub trait ResourceProbe: Send + Sync {
    fn ping(&self, target: &ProbeTarget) -> Result<Capabilities>;
}

/// Runs the management script: `<script> ping hostname=<ip> usrname=<user> password=<pw>`.
///
/// Exit status zero means reachable; stdout carries `key=value` capability
/// lines. A non-zero exit is a probe failure carrying the script's output.
#[derive(Debug, Clone)]
pub struct ScriptProbe {
    script: PathBuf,
    interpreter: Option<PathBuf>,
}

impl ScriptProbe {
    /// Find the script on the search path; fails if it is nowhere to be found
    pub fn locate(script: &Path, search_paths: &[PathBuf]) -> Result<Self> {
        let found = if script.is_absolute() {
            script.is_file().then(|| script.to_path_buf())
        } else {
            search_paths
                .iter()
                .map(|dir| dir.join(script))
                .find(|candidate| candidate.is_file())
        };

        let script = found.ok_or_else(|| {
            Error::FatalConfiguration(format!("Unable to find key ipmi script {}", script.display()))
        })?;
        tracing::debug!(script = %script.display(), "Located probe script");

        Ok(Self {
            script,
            interpreter: None,
        })
    }

    pub fn from_config(config: &FleetConfig) -> Result<Self> {
        let probe = Self::locate(&config.probe_script, &config.script_search_paths)?;
        Ok(match &config.probe_interpreter {
            Some(program) => probe.with_interpreter(program),
            None => probe,
        })
    }

    pub fn with_interpreter(mut self, program: impl Into<PathBuf>) -> Self {
        self.interpreter = Some(program.into());
        self
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    fn command(&self) -> Command {
        match &self.interpreter {
            Some(program) => {
                let mut cmd = Command::new(program);
                cmd.arg(&self.script);
                cmd
            }
            None => Command::new(&self.script),
        }
    }
}

impl ResourceProbe for ScriptProbe {
    fn ping(&self, target: &ProbeTarget) -> Result<Capabilities> {
        tracing::debug!(
            script = %self.script.display(),
            "ping hostname={} usrname={} password={}",
            target.address,
            target.username,
            REDACTED
        );

        let output = self
            .command()
            .arg("ping")
            .arg(format!("hostname={}", target.address))
            .arg(format!("usrname={}", target.username))
            .arg(format!("password={}", target.password.expose()))
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let reason = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(Error::Probe(format!(
                "exit code {:?}: {}",
                output.status.code(),
                mask(reason.trim(), &target.password)
            )));
        }

        Ok(Capabilities::parse(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Scripts sometimes echo their arguments back; never let the password through
fn mask(text: &str, password: &Secret) -> String {
    if password.is_empty() {
        return text.to_string();
    }
    text.replace(password.expose(), REDACTED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn target() -> ProbeTarget {
        ProbeTarget {
            address: "10.0.0.5".parse().unwrap(),
            username: "admin".into(),
            password: Secret::new("s3cret"),
        }
    }

    fn write_script(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("scripts/util/ipmi.sh");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_capabilities_parse() {
        let caps = Capabilities::parse("memory=4096\ncpuspeed=2400\nnoise\ncpunumber=8\nhostmac=aa:bb\nother=1\n");
        assert_eq!(caps.memory.as_deref(), Some("4096"));
        assert_eq!(caps.cpu_speed.as_deref(), Some("2400"));
        assert_eq!(caps.cpu_number.as_deref(), Some("8"));
        assert_eq!(caps.mac.as_deref(), Some("aa:bb"));
    }

    #[test]
    fn test_locate_missing_script_is_fatal() {
        let temp = TempDir::new().unwrap();
        let err = ScriptProbe::locate(Path::new("scripts/util/ipmi.py"), &[temp.path().to_path_buf()]).unwrap_err();
        assert!(matches!(err, Error::FatalConfiguration(_)));
    }

    #[test]
    fn test_locate_searches_paths_in_order() {
        let temp = TempDir::new().unwrap();
        let path = write_script(&temp, "exit 0\n");
        let empty = TempDir::new().unwrap();

        let probe = ScriptProbe::locate(
            Path::new("scripts/util/ipmi.sh"),
            &[empty.path().to_path_buf(), temp.path().to_path_buf()],
        )
        .unwrap();
        assert_eq!(probe.script(), path.as_path());
    }

    #[cfg(unix)]
    #[test]
    fn test_ping_success_reports_capabilities() {
        let temp = TempDir::new().unwrap();
        let path = write_script(
            &temp,
            "[ \"$1\" = ping ] || exit 3\necho memory=8192\necho cpunumber=4\necho cpuspeed=2000\necho mac=de:ad\n",
        );
        let probe = ScriptProbe::locate(&path, &[]).unwrap().with_interpreter("sh");

        let caps = probe.ping(&target()).unwrap();
        assert_eq!(caps.memory.as_deref(), Some("8192"));
        assert_eq!(caps.cpu_number.as_deref(), Some("4"));
        assert_eq!(caps.mac.as_deref(), Some("de:ad"));
    }

    #[cfg(unix)]
    #[test]
    fn test_ping_failure_masks_password() {
        let temp = TempDir::new().unwrap();
        let path = write_script(&temp, "echo \"cannot reach $2 with $4\" >&2\nexit 1\n");
        let probe = ScriptProbe::locate(&path, &[]).unwrap().with_interpreter("sh");

        let err = probe.ping(&target()).unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, Error::Probe(_)));
        assert!(msg.contains("hostname=10.0.0.5"));
        assert!(!msg.contains("s3cret"));
        assert!(msg.contains(REDACTED));
    }
}
