//! Key/value control surface.
//!
//! Models the pseudo-files an administrator talks to, independent of the
//! transport that carries them:
//!
//! | Endpoint           | Mode | Content                                        |
//! |--------------------|------|------------------------------------------------|
//! | `enabled`          | rw   | `0` or `1`                                     |
//! | `targets`          | w    | one `+`/`-`/`=` command per write              |
//! | `targets_list`     | r    | one `PATH:SYMBOL delay_ns=N hits=M[ pid=P]` per line |
//! | `stats`            | r    | `enabled`, `targets`, `total_hits`, `total_delay_ns` |
//! | `default_delay_ns` | rw   | decimal nanoseconds                            |
//!
//! A successful write returns the number of bytes consumed.

use alloc::format;
use alloc::string::String;
use core::fmt::{self, Write};

use crate::command::{self, Command};
use crate::error::Error;
use crate::probe::ProbeBackend;
use crate::registry::Registry;

/// One control endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Enabled,
    Targets,
    TargetsList,
    Stats,
    DefaultDelayNs,
}

impl Endpoint {
    pub const ALL: [Endpoint; 5] = [
        Endpoint::Enabled,
        Endpoint::Targets,
        Endpoint::TargetsList,
        Endpoint::Stats,
        Endpoint::DefaultDelayNs,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Targets => "targets",
            Self::TargetsList => "targets_list",
            Self::Stats => "stats",
            Self::DefaultDelayNs => "default_delay_ns",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|endpoint| endpoint.name() == name)
    }

    pub const fn is_readable(self) -> bool {
        !matches!(self, Self::Targets)
    }

    pub const fn is_writable(self) -> bool {
        matches!(self, Self::Enabled | Self::Targets | Self::DefaultDelayNs)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Control surface over a [`Registry`].
pub struct ControlPlane<B: ProbeBackend> {
    registry: Registry<B>,
}

impl<B: ProbeBackend> ControlPlane<B> {
    pub fn new(registry: Registry<B>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry<B> {
        &self.registry
    }

    /// Tear down the surface and hand back the registry.
    pub fn into_registry(self) -> Registry<B> {
        self.registry
    }

    /// Render the current content of `endpoint`.
    pub fn read(&self, endpoint: Endpoint) -> Result<String, Error> {
        if !endpoint.is_readable() {
            return Err(Error::PermissionDenied);
        }

        let content = match endpoint {
            Endpoint::Enabled => format!("{}\n", u8::from(self.registry.is_enabled())),
            Endpoint::DefaultDelayNs => format!("{}\n", self.registry.default_delay_ns()),
            Endpoint::TargetsList => {
                let mut out = String::new();
                for info in self.registry.list() {
                    // Writing into a String cannot fail.
                    let _ = writeln!(out, "{}", info);
                }
                out
            }
            Endpoint::Stats => {
                let stats = self.registry.stats();
                format!(
                    "enabled: {}\ntargets: {}\ntotal_hits: {}\ntotal_delay_ns: {}\n",
                    u8::from(stats.enabled),
                    stats.targets,
                    stats.total_hits,
                    stats.total_delay_ns
                )
            }
            Endpoint::Targets => return Err(Error::PermissionDenied),
        };
        Ok(content)
    }

    /// Apply one write to `endpoint`.
    pub fn write(&self, endpoint: Endpoint, input: &str) -> Result<usize, Error> {
        if !endpoint.is_writable() {
            return Err(Error::PermissionDenied);
        }

        match endpoint {
            Endpoint::Enabled => {
                let value: i32 = command::strip_line_end(input)
                    .parse()
                    .map_err(|_| Error::InvalidArgument)?;
                match value {
                    0 => self.registry.set_enabled(false),
                    1 => self.registry.set_enabled(true),
                    _ => return Err(Error::InvalidArgument),
                }
            }
            Endpoint::DefaultDelayNs => {
                let delay_ns =
                    command::parse_delay(command::strip_line_end(input), self.registry.config())?;
                self.registry.set_default_delay_ns(delay_ns)?;
            }
            Endpoint::Targets => {
                let command = Command::parse_line(input, self.registry.config())?;
                trace!("speed_bump: control command {}", command);
                self.registry.execute(command)?;
            }
            Endpoint::TargetsList | Endpoint::Stats => return Err(Error::PermissionDenied),
        }

        Ok(input.len())
    }

    /// [`ControlPlane::read`] by endpoint name. Unknown names are `NotFound`.
    pub fn read_named(&self, name: &str) -> Result<String, Error> {
        self.read(Endpoint::from_name(name).ok_or(Error::NotFound)?)
    }

    /// [`ControlPlane::write`] by endpoint name. Unknown names are `NotFound`.
    pub fn write_named(&self, name: &str, input: &str) -> Result<usize, Error> {
        self.write(Endpoint::from_name(name).ok_or(Error::NotFound)?, input)
    }
}
