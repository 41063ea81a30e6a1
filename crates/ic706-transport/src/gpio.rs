//! PWK line through the Linux sysfs GPIO interface.
//!
//! The radio's power key is an active-high input held for about half a
//! second to toggle power. [`SysfsGpio`] exports the pin, configures it as
//! an output driven low, and then writes `1`/`0` to its `value` attribute.
//! [`NullPwkLine`] stands in on hosts without the GPIO and only logs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use ic706_core::error::{Error, Result};
use ic706_core::line::PwkLine;

/// Standard sysfs GPIO class directory.
pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/gpio";

/// GPIO number wired to the PWK input on the reference hardware.
pub const DEFAULT_PWK_GPIO: u32 = 20;

/// How often to look for the `gpioN` directory after exporting.
const EXPORT_POLL: Duration = Duration::from_millis(25);

/// How many times to look before giving up; udev can be slow to create
/// the attribute files.
const EXPORT_ATTEMPTS: u32 = 20;

/// A sysfs-backed output pin.
#[derive(Debug)]
pub struct SysfsGpio {
    pin: u32,
    value_path: PathBuf,
    level: bool,
}

impl SysfsGpio {
    /// Export `pin` under [`DEFAULT_SYSFS_ROOT`] and configure it as an
    /// output driven low.
    pub async fn init_output(pin: u32) -> Result<Self> {
        Self::init_output_at(Path::new(DEFAULT_SYSFS_ROOT), pin).await
    }

    /// Like [`init_output`](Self::init_output) with an explicit sysfs root.
    pub async fn init_output_at(root: &Path, pin: u32) -> Result<Self> {
        let dir = root.join(format!("gpio{pin}"));

        if !exists(&dir).await {
            tracing::debug!(pin, root = %root.display(), "Exporting GPIO");
            write_attr(&root.join("export"), &pin.to_string()).await?;
            wait_for_export(&dir).await?;
        }

        write_attr(&dir.join("direction"), "out").await?;
        let value_path = dir.join("value");
        write_attr(&value_path, "0").await?;

        tracing::info!(pin, "PWK GPIO configured as output");

        Ok(SysfsGpio {
            pin,
            value_path,
            level: false,
        })
    }

    /// The GPIO number.
    pub fn pin(&self) -> u32 {
        self.pin
    }
}

#[async_trait]
impl PwkLine for SysfsGpio {
    async fn set_level(&mut self, high: bool) -> Result<()> {
        write_attr(&self.value_path, if high { "1" } else { "0" }).await?;
        tracing::trace!(pin = self.pin, high, "PWK level written");
        self.level = high;
        Ok(())
    }

    fn level(&self) -> bool {
        self.level
    }
}

/// A PWK line that is not wired to anything.
///
/// Used with `--no-pwk`; power requests are logged and otherwise ignored.
#[derive(Debug, Default)]
pub struct NullPwkLine {
    level: bool,
}

impl NullPwkLine {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PwkLine for NullPwkLine {
    async fn set_level(&mut self, high: bool) -> Result<()> {
        tracing::info!(high, "PWK line not wired; ignoring level change");
        self.level = high;
        Ok(())
    }

    fn level(&self) -> bool {
        self.level
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn wait_for_export(dir: &Path) -> Result<()> {
    for _ in 0..EXPORT_ATTEMPTS {
        if exists(&dir.join("direction")).await {
            return Ok(());
        }
        tokio::time::sleep(EXPORT_POLL).await;
    }
    Err(Error::Gpio(format!(
        "{} did not appear after export",
        dir.display()
    )))
}

async fn write_attr(path: &Path, value: &str) -> Result<()> {
    tokio::fs::write(path, value).await.map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "GPIO attribute write failed");
        Error::Gpio(format!("failed to write {:?} to {}: {}", value, path.display(), e))
    })
}
