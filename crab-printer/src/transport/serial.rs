//! Serial (COM port) printers
//!
//! Port settings are applied with the platform's own tool (`mode` on
//! Windows, `stty` elsewhere) and payloads are handed to a copy helper
//! through a temporary file. Only allow-listed values ever reach a command
//! line, and commands are built as program + argument vector, never as a
//! shell string.

use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::validation::{
    serial_port_number, validate_baud_rate, validate_data_bits, validate_serial_port,
    validate_stop_bits,
};
use super::{Channel, ChannelLink};
use crate::error::{TransportError, TransportResult};

/// How long a staged payload file is kept after the copy helper ran
const STAGING_CLEANUP_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
    Mark,
    Space,
}

impl Parity {
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Even => "even",
            Self::Odd => "odd",
            Self::Mark => "mark",
            Self::Space => "space",
        }
    }

    /// Letter used by `mode PARITY=`
    fn mode_letter(&self) -> &'static str {
        match self {
            Self::None => "n",
            Self::Even => "e",
            Self::Odd => "o",
            Self::Mark => "m",
            Self::Space => "s",
        }
    }

    fn stty_flags(&self) -> &'static [&'static str] {
        match self {
            Self::None => &["-parenb"],
            Self::Even => &["parenb", "-parodd"],
            Self::Odd => &["parenb", "parodd"],
            Self::Mark => &["parenb", "parodd", "cmspar"],
            Self::Space => &["parenb", "-parodd", "cmspar"],
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Parity {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "even" => Ok(Self::Even),
            "odd" => Ok(Self::Odd),
            "mark" => Ok(Self::Mark),
            "space" => Ok(Self::Space),
            _ => Err(TransportError::validation(format!("Invalid parity: {:?}", s))),
        }
    }
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

/// Serial port settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialDescriptor {
    pub port_name: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default)]
    pub parity: Parity,
}

impl SerialDescriptor {
    /// 9600 8N1 on the given port
    pub fn new(port_name: impl Into<String>) -> TransportResult<Self> {
        let descriptor = Self {
            port_name: port_name.into(),
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            parity: Parity::None,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_data_bits(mut self, data_bits: u8) -> Self {
        self.data_bits = data_bits;
        self
    }

    pub fn with_stop_bits(mut self, stop_bits: u8) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    pub fn validate(&self) -> TransportResult<()> {
        validate_serial_port(&self.port_name)?;
        validate_baud_rate(self.baud_rate)?;
        validate_data_bits(self.data_bits)?;
        validate_stop_bits(self.stop_bits)
    }

    /// Normalized port name (`com3` → `COM3`)
    pub fn port(&self) -> TransportResult<String> {
        Ok(format!("COM{}", serial_port_number(&self.port_name)?))
    }

    /// Unix device node for this port (`COM1` → `/dev/ttyS0`)
    pub fn unix_device(&self) -> TransportResult<String> {
        let number = serial_port_number(&self.port_name)?;
        if number == 0 {
            return Err(TransportError::validation(format!(
                "{} has no Unix device",
                self.port_name
            )));
        }
        Ok(format!("/dev/ttyS{}", number - 1))
    }
}

/// Which command family to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    Windows,
    Unix,
}

impl HostPlatform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Unix
        }
    }
}

/// An external command, program plus arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Command that applies the port settings
pub fn configure_command(
    descriptor: &SerialDescriptor,
    platform: HostPlatform,
) -> TransportResult<CommandSpec> {
    descriptor.validate()?;
    let spec = match platform {
        HostPlatform::Windows => CommandSpec::new(
            "mode",
            [
                format!("{}:", descriptor.port()?),
                format!("BAUD={}", descriptor.baud_rate),
                format!("PARITY={}", descriptor.parity.mode_letter()),
                format!("DATA={}", descriptor.data_bits),
                format!("STOP={}", descriptor.stop_bits),
            ],
        ),
        HostPlatform::Unix => {
            let mut args = vec![
                "-F".to_string(),
                descriptor.unix_device()?,
                descriptor.baud_rate.to_string(),
                format!("cs{}", descriptor.data_bits),
                if descriptor.stop_bits == 2 {
                    "cstopb".to_string()
                } else {
                    "-cstopb".to_string()
                },
            ];
            args.extend(descriptor.parity.stty_flags().iter().map(|f| f.to_string()));
            args.push("raw".to_string());
            args.push("-echo".to_string());
            CommandSpec { program: "stty".to_string(), args }
        }
    };
    Ok(spec)
}

/// Command that copies a staged payload file to the port
pub fn write_command(
    descriptor: &SerialDescriptor,
    payload: &Path,
    platform: HostPlatform,
) -> TransportResult<CommandSpec> {
    descriptor.validate()?;
    let spec = match platform {
        HostPlatform::Windows => CommandSpec::new(
            "cmd",
            [
                "/C".to_string(),
                "copy".to_string(),
                "/B".to_string(),
                payload.display().to_string(),
                descriptor.port()?,
            ],
        ),
        HostPlatform::Unix => CommandSpec::new(
            "dd",
            [
                format!("if={}", payload.display()),
                format!("of={}", descriptor.unix_device()?),
                "bs=4096".to_string(),
            ],
        ),
    };
    Ok(spec)
}

/// Runs external commands for the serial channel
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &CommandSpec) -> TransportResult<()>;
}

/// Runs commands as child processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    #[instrument(skip(self), fields(program = %command.program))]
    async fn run(&self, command: &CommandSpec) -> TransportResult<()> {
        let output = Command::new(&command.program)
            .args(&command.args)
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TransportError::capability_missing(format!(
                        "{} is not available",
                        command.program
                    ))
                    .with_cause(e)
                } else {
                    TransportError::io(&format!("spawn {}", command.program), e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransportError::connection_lost(format!(
                "{} exited with {}: {}",
                command.program,
                output.status,
                stderr.trim()
            )));
        }
        debug!("Command succeeded");
        Ok(())
    }
}

/// Serial port channel
pub struct SerialChannel {
    descriptor: SerialDescriptor,
    platform: HostPlatform,
    runner: Arc<dyn CommandRunner>,
    configured: bool,
}

impl SerialChannel {
    pub fn new(descriptor: SerialDescriptor) -> TransportResult<Self> {
        Self::with_runner(descriptor, Arc::new(SystemRunner))
    }

    pub fn with_runner(
        descriptor: SerialDescriptor,
        runner: Arc<dyn CommandRunner>,
    ) -> TransportResult<Self> {
        descriptor.validate()?;
        Ok(Self {
            descriptor,
            platform: HostPlatform::current(),
            runner,
            configured: false,
        })
    }

    /// Build commands for another platform (tests, cross-host tooling)
    pub fn with_platform(mut self, platform: HostPlatform) -> Self {
        self.platform = platform;
        self
    }

    pub fn descriptor(&self) -> &SerialDescriptor {
        &self.descriptor
    }

    fn stage(data: &[u8]) -> TransportResult<tempfile::TempPath> {
        let mut file = tempfile::Builder::new()
            .prefix("crab-print-")
            .suffix(".bin")
            .tempfile()
            .map_err(|e| TransportError::io("create staging file", e))?;
        file.write_all(data)
            .and_then(|_| file.flush())
            .map_err(|e| TransportError::io("write staging file", e))?;
        // Close the handle so the copy helper can open it on Windows
        Ok(file.into_temp_path())
    }
}

impl fmt::Debug for SerialChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialChannel")
            .field("descriptor", &self.descriptor)
            .field("platform", &self.platform)
            .field("configured", &self.configured)
            .finish()
    }
}

#[async_trait]
impl Channel for SerialChannel {
    fn describe(&self) -> String {
        format!(
            "serial://{}?{}-{}{}{}",
            self.descriptor.port_name,
            self.descriptor.baud_rate,
            self.descriptor.data_bits,
            self.descriptor.parity.mode_letter().to_ascii_uppercase(),
            self.descriptor.stop_bits
        )
    }

    #[instrument(skip(self, _link), fields(port = %self.descriptor.port_name))]
    async fn open(&mut self, _link: ChannelLink) -> TransportResult<()> {
        self.configured = false;
        let command = configure_command(&self.descriptor, self.platform)?;
        debug!(command = %command, "Configuring serial port");
        self.runner.run(&command).await?;
        self.configured = true;
        info!("Serial port configured");
        Ok(())
    }

    async fn close(&mut self) -> TransportResult<()> {
        self.configured = false;
        Ok(())
    }

    #[instrument(skip(self, data), fields(port = %self.descriptor.port_name, bytes = data.len()))]
    async fn write(&mut self, data: &[u8]) -> TransportResult<()> {
        if !self.configured {
            return Err(TransportError::not_connected("serial port not configured"));
        }

        let staged = Self::stage(data)?;
        let command = write_command(&self.descriptor, &staged, self.platform)?;
        let result = self.runner.run(&command).await;

        tokio::spawn(async move {
            tokio::time::sleep(STAGING_CLEANUP_DELAY).await;
            if let Err(e) = staged.close() {
                warn!(error = %e, "Failed to remove staging file");
            }
        });

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportErrorKind;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingRunner {
        commands: Mutex<Vec<CommandSpec>>,
        payloads: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl CommandRunner for RecordingRunner {
        async fn run(&self, command: &CommandSpec) -> TransportResult<()> {
            if let Some(path) = command.args.iter().find_map(|a| a.strip_prefix("if=")) {
                self.payloads.lock().push(std::fs::read(path).unwrap());
            }
            self.commands.lock().push(command.clone());
            Ok(())
        }
    }

    fn descriptor() -> SerialDescriptor {
        SerialDescriptor::new("COM3")
            .unwrap()
            .with_baud_rate(19200)
            .with_parity(Parity::Even)
    }

    #[test]
    fn test_windows_mode_command() {
        let cmd = configure_command(&descriptor(), HostPlatform::Windows).unwrap();
        assert_eq!(cmd.program, "mode");
        assert_eq!(
            cmd.args,
            vec!["COM3:", "BAUD=19200", "PARITY=e", "DATA=8", "STOP=1"]
        );
    }

    #[test]
    fn test_unix_stty_command() {
        let cmd = configure_command(&descriptor(), HostPlatform::Unix).unwrap();
        assert_eq!(cmd.program, "stty");
        assert_eq!(
            cmd.args,
            vec!["-F", "/dev/ttyS2", "19200", "cs8", "-cstopb", "parenb", "-parodd", "raw", "-echo"]
        );
    }

    #[test]
    fn test_write_commands() {
        let path = Path::new("/tmp/job.bin");
        let cmd = write_command(&descriptor(), path, HostPlatform::Windows).unwrap();
        assert_eq!(cmd.program, "cmd");
        assert_eq!(cmd.args.last().map(String::as_str), Some("COM3"));

        let cmd = write_command(&descriptor(), path, HostPlatform::Unix).unwrap();
        assert_eq!(cmd.to_string(), "dd if=/tmp/job.bin of=/dev/ttyS2 bs=4096");
    }

    #[test]
    fn test_lowercase_port_is_normalized() {
        let d = SerialDescriptor::new("com7").unwrap();
        assert_eq!(d.port().unwrap(), "COM7");
        assert_eq!(d.unix_device().unwrap(), "/dev/ttyS6");
    }

    #[test]
    fn test_invalid_settings_never_build_commands() {
        let mut d = descriptor();
        d.baud_rate = 12345;
        let err = configure_command(&d, HostPlatform::Windows).unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::ValidationError);

        d = descriptor();
        d.port_name = "COM1 && shutdown".to_string();
        assert!(configure_command(&d, HostPlatform::Unix).is_err());
        assert!(write_command(&d, Path::new("x"), HostPlatform::Windows).is_err());
    }

    #[test]
    fn test_parity_parse() {
        assert_eq!("Mark".parse::<Parity>().unwrap(), Parity::Mark);
        assert!("sometimes".parse::<Parity>().is_err());
    }

    #[test]
    fn test_descriptor_defaults_from_json() {
        let d: SerialDescriptor = serde_json::from_str(r#"{"port_name":"COM2"}"#).unwrap();
        assert_eq!(d.baud_rate, 9600);
        assert_eq!(d.data_bits, 8);
        assert_eq!(d.parity, Parity::None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_stages_payload_and_cleans_up() {
        let runner = Arc::new(RecordingRunner::default());
        let mut channel = SerialChannel::with_runner(descriptor(), runner.clone())
            .unwrap()
            .with_platform(HostPlatform::Unix);

        let err = channel.write(b"early").await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::NotConnected);

        channel.open(ChannelLink::detached()).await.unwrap();
        channel.write(&[0x1B, 0x40, b'A']).await.unwrap();

        assert_eq!(runner.payloads.lock().clone(), vec![vec![0x1B, 0x40, b'A']]);
        let staged = {
            let commands = runner.commands.lock();
            assert_eq!(commands.len(), 2);
            assert_eq!(commands[0].program, "stty");
            commands[1].args[0].trim_start_matches("if=").to_string()
        };
        assert!(Path::new(&staged).exists());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!Path::new(&staged).exists());
    }
}
