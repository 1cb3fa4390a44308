//! Line protocol spoken with the vision host.
//!
//! Host -> device: `HOME`, `ZERO`, `JOG <arg>`, `RES <bean> <class>`.
//! Device -> host: `CAP <bean> <pos>`, `move_complete`.
//!
//! Lines are ASCII, `\n` terminated and whitespace trimmed. Keywords are
//! case sensitive.

use std::fmt;

use sorter_traits::Direction;
use thiserror::Error;

use crate::config::CalibrationCfg;
use crate::slot_ring::BeanId;

/// Largest pulse count accepted by a numeric `JOG`.
pub const MAX_JOG_STEPS: u32 = 10_000;

/// Classification carried by `RES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Defect = 0,
    Normal = 1,
}

impl Classification {
    fn from_wire(v: u8) -> Option<Self> {
        match v {
            0 => Some(Classification::Defect),
            1 => Some(Classification::Normal),
            _ => None,
        }
    }
}

/// Manual alignment move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JogMove {
    /// `a` / `d`
    Small(Direction),
    /// `A` / `D`
    Large(Direction),
    /// Signed pulse count.
    Steps(Direction, u32),
}

impl JogMove {
    /// Direction and pulse count for this move.
    pub fn resolve(self, cal: &CalibrationCfg) -> (Direction, u32) {
        match self {
            JogMove::Small(d) => (d, cal.jog_small_steps),
            JogMove::Large(d) => (d, cal.jog_large_steps),
            JogMove::Steps(d, n) => (d, n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    Home,
    Zero,
    Jog(JogMove),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    Command(AdminCommand),
    Result {
        bean: BeanId,
        class: Classification,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outbound {
    Capture { bean: BeanId, position: usize },
    MoveComplete,
}

impl fmt::Display for Outbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outbound::Capture { bean, position } => write!(f, "CAP {bean} {position}"),
            Outbound::MoveComplete => f.write_str("move_complete"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty line")]
    Empty,
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("bad JOG argument: {0}")]
    BadJog(String),
}

/// Parse one inbound line.
///
/// A line is a result only when it has exactly three fields, a positive bean
/// id and a class of 0 or 1. Anything else is tried as a command.
pub fn parse_line(line: &str) -> Result<Inbound, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ParseError::Empty);
    }
    let fields: Vec<&str> = line.split_whitespace().collect();

    if let Some(res) = parse_result(&fields) {
        return Ok(res);
    }

    match fields.as_slice() {
        ["HOME"] => Ok(Inbound::Command(AdminCommand::Home)),
        ["ZERO"] => Ok(Inbound::Command(AdminCommand::Zero)),
        ["JOG", arg] => parse_jog(arg).map(|m| Inbound::Command(AdminCommand::Jog(m))),
        _ => Err(ParseError::Unknown(line.to_owned())),
    }
}

fn parse_result(fields: &[&str]) -> Option<Inbound> {
    let ["RES", id, class] = fields else {
        return None;
    };
    // plain decimal only: no sign, no leading zeros
    if id.starts_with('0') || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let class = match class.as_bytes() {
        [d @ b'0'..=b'9'] => Classification::from_wire(d - b'0')?,
        _ => return None,
    };
    let bean = BeanId::new(id.parse().ok()?)?;
    Some(Inbound::Result { bean, class })
}

fn parse_jog(arg: &str) -> Result<JogMove, ParseError> {
    match arg {
        "a" => return Ok(JogMove::Small(Direction::Reverse)),
        "d" => return Ok(JogMove::Small(Direction::Forward)),
        "A" => return Ok(JogMove::Large(Direction::Reverse)),
        "D" => return Ok(JogMove::Large(Direction::Forward)),
        _ => {}
    }
    let n: i64 = arg
        .parse()
        .map_err(|_| ParseError::BadJog(arg.to_owned()))?;
    let dir = if n < 0 {
        Direction::Reverse
    } else {
        Direction::Forward
    };
    match u32::try_from(n.unsigned_abs()) {
        Ok(steps) if (1..=MAX_JOG_STEPS).contains(&steps) => Ok(JogMove::Steps(dir, steps)),
        _ => Err(ParseError::BadJog(arg.to_owned())),
    }
}
