//! [`CommandTable`] – the single source of truth for what each command does.
//!
//! Both front-ends resolve a command name here and get back the same
//! [`Command`] descriptor: which fields it recognises, which device encoder
//! produces its message, and which channel the message travels on.
//!
//! | Command | Fields | Action |
//! |---|---|---|
//! | `brightness` | `level` | control write |
//! | `fullday` | `enable` | control write |
//! | `datetime` | `date`, `fulldayMode` | control write, then `fullday` follow-up |
//! | `lighting` | `color`, `brightness`, `mode`, `powerScreen` | control write |
//! | `clock` | `mode`, `show*`, `color` | control write |
//! | `climate` | `weather`, `temperature` | control write |
//! | `effect` / `visualization` | `mode` | control write |
//! | `score` | `red`, `blue` | control write |
//! | `screenOff` | `enable` | control write |
//! | `setImg` | `path` | async render, bulk write |
//! | `connect` / `disconnect` | – | link toggle |
//! | `status` | – | snapshot only |

use lumen_hal::Device;
use lumen_types::{BridgeError, Channel, FieldKind, FieldSpec, Settings};

/// Which [`Device`] encoder produces a command's control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoder {
    Brightness,
    Fullday,
    Datetime,
    Lighting,
    Clock,
    Climate,
    Effect,
    Visualization,
    Score,
    PowerScreen,
}

impl Encoder {
    /// Run the matching device encoder over `settings`.
    pub fn encode(self, device: &dyn Device, settings: &Settings) -> Result<Vec<u8>, BridgeError> {
        match self {
            Encoder::Brightness => device.brightness(settings),
            Encoder::Fullday => device.fullday(settings),
            Encoder::Datetime => device.datetime(settings),
            Encoder::Lighting => device.lighting(settings),
            Encoder::Clock => device.clock(settings),
            Encoder::Climate => device.climate(settings),
            Encoder::Effect => device.effect(settings),
            Encoder::Visualization => device.visualization(settings),
            Encoder::Score => device.score(settings),
            Encoder::PowerScreen => device.power_screen(settings),
        }
    }
}

/// What executing a command does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Encode synchronously and send on the control channel.
    Write(Encoder),
    /// Render the image named by `path_field`, then send on the bulk channel.
    RenderImage { path_field: &'static str },
    /// Open the link if it is down.
    Connect,
    /// Close the link if it is up.
    Disconnect,
    /// No device traffic; the caller reports a snapshot.
    Status,
}

/// A second write triggered by a field of the first command's settings.
///
/// When `field` is present, `command` is executed with
/// `{as_field: <value of field>}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowUp {
    pub field: &'static str,
    pub command: &'static str,
    pub as_field: &'static str,
}

/// Static descriptor of one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub name: &'static str,
    /// Legacy names still accepted on both surfaces.
    pub aliases: &'static [&'static str],
    pub fields: &'static [FieldSpec],
    pub action: Action,
    /// Whether the request front-end runs the connection gate first.
    pub gated: bool,
    /// Field filled with the current time when the caller left it out.
    pub fill_now: Option<&'static str>,
    pub follow_up: Option<FollowUp>,
}

impl Command {
    const fn write(name: &'static str, fields: &'static [FieldSpec], encoder: Encoder) -> Self {
        Self {
            name,
            aliases: &[],
            fields,
            action: Action::Write(encoder),
            gated: true,
            fill_now: None,
            follow_up: None,
        }
    }

    const fn link(name: &'static str, action: Action) -> Self {
        Self {
            name,
            aliases: &[],
            fields: &[],
            action,
            gated: false,
            fill_now: None,
            follow_up: None,
        }
    }

    /// The channel this command's device message travels on, if any.
    pub fn channel(&self) -> Option<Channel> {
        match self.action {
            Action::Write(_) => Some(Channel::Control),
            Action::RenderImage { .. } => Some(Channel::Bulk),
            Action::Connect | Action::Disconnect | Action::Status => None,
        }
    }

    /// Whether `name` refers to this command, by canonical name or alias.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.aliases.contains(&name)
    }
}

const BRIGHTNESS: &[FieldSpec] = &[FieldSpec::new("level", FieldKind::Int)];

const ENABLE: &[FieldSpec] = &[FieldSpec::new("enable", FieldKind::Bool)];

const DATETIME: &[FieldSpec] = &[
    FieldSpec::new("date", FieldKind::Date),
    FieldSpec::new("fulldayMode", FieldKind::Bool),
];

const LIGHTING: &[FieldSpec] = &[
    FieldSpec::new("color", FieldKind::Text),
    FieldSpec::new("brightness", FieldKind::Int),
    FieldSpec::new("mode", FieldKind::Int),
    FieldSpec::new("powerScreen", FieldKind::Bool),
];

const CLOCK: &[FieldSpec] = &[
    FieldSpec::new("mode", FieldKind::Int),
    FieldSpec::new("showTime", FieldKind::Bool),
    FieldSpec::new("showWeather", FieldKind::Bool),
    FieldSpec::new("showTemperature", FieldKind::Bool),
    FieldSpec::new("showCalendar", FieldKind::Bool),
    FieldSpec::new("color", FieldKind::Color),
];

const CLIMATE: &[FieldSpec] = &[
    FieldSpec::new("weather", FieldKind::Int),
    FieldSpec::new("temperature", FieldKind::Int),
];

const MODE: &[FieldSpec] = &[FieldSpec::new("mode", FieldKind::Int)];

const SCORE: &[FieldSpec] = &[
    FieldSpec::new("red", FieldKind::Int),
    FieldSpec::new("blue", FieldKind::Int),
];

const IMAGE: &[FieldSpec] = &[FieldSpec::new("path", FieldKind::Text)];

/// Every command the bridge knows, fixed at compile time.
pub static COMMANDS: [Command; 14] = [
    Command::write("score", SCORE, Encoder::Score),
    Command::write("brightness", BRIGHTNESS, Encoder::Brightness),
    Command::write("fullday", ENABLE, Encoder::Fullday),
    Command {
        fill_now: Some("date"),
        follow_up: Some(FollowUp {
            field: "fulldayMode",
            command: "fullday",
            as_field: "enable",
        }),
        ..Command::write("datetime", DATETIME, Encoder::Datetime)
    },
    Command::write("clock", CLOCK, Encoder::Clock),
    Command {
        aliases: &["lightning"],
        ..Command::write("lighting", LIGHTING, Encoder::Lighting)
    },
    Command::write("climate", CLIMATE, Encoder::Climate),
    Command::write("effect", MODE, Encoder::Effect),
    Command::write("visualization", MODE, Encoder::Visualization),
    Command::write("screenOff", ENABLE, Encoder::PowerScreen),
    Command {
        name: "setImg",
        aliases: &["img"],
        fields: IMAGE,
        action: Action::RenderImage { path_field: "path" },
        gated: true,
        fill_now: None,
        follow_up: None,
    },
    Command::link("connect", Action::Connect),
    Command::link("disconnect", Action::Disconnect),
    Command::link("status", Action::Status),
];

/// Lookup facade over [`COMMANDS`].
#[derive(Debug, Clone, Copy)]
pub struct CommandTable {
    commands: &'static [Command],
}

impl CommandTable {
    /// The standard table.
    pub fn new() -> Self {
        Self { commands: &COMMANDS }
    }

    /// Resolve `name` (canonical or alias) to its descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::UnknownCommand`] for names not in the table.
    pub fn lookup(&self, name: &str) -> Result<&'static Command, BridgeError> {
        let commands: &'static [Command] = self.commands;
        commands
            .iter()
            .find(|c| c.answers_to(name))
            .ok_or_else(|| BridgeError::UnknownCommand(name.to_string()))
    }

    /// All descriptors, in table order.
    pub fn commands(&self) -> &'static [Command] {
        self.commands
    }

    /// Every name a command answers to, canonical names first per command.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + use<> {
        let commands: &'static [Command] = self.commands;
        commands
            .iter()
            .flat_map(|c| std::iter::once(c.name).chain(c.aliases.iter().copied()))
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}
