//! Line-oriented command console for the controller.
//!
//! Each stdin line is one command. Cell coordinates are `col row`; point
//! coordinates are map pixels. `help` prints the full list.

#[cfg(test)]
#[path = "console_test.rs"]
mod tests;

use std::str::FromStr;

use mapcore::calibration::Feedback;
use mapcore::camera::Point;
use mapcore::fog::CellPos;

pub const HELP: &str = "\
commands:
  load <path> <width> <height>      open a map (dimensions of the decoded image)
  reveal <col> <row> [<col> <row>]...   brush fog away along a path of cells
  hide <col> <row> [<col> <row>]...     brush fog back along a path of cells
  brush <cells>                     fog brush side length
  block <col> <row> <col> <row> [hide]  reveal (or hide) a rectangle of cells
  draw <x> <y> <x> <y> [<x> <y>]...     freehand stroke in map pixels
  undo | redo
  reset | clearfog | cleardrawings
  grid size <px> | grid offset <x> <y> | grid show | grid hide
  grid color <color> | grid opacity <0..1>
  calibrate start | toobig | toosmall | confirm | cancel
  offset <x> <y>                    what the display shows (map pixels)
  ppi <value> | ppi save | ppi restore
  display open | display close
  save | status | help | quit";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("not a number: '{0}'")]
    BadNumber(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrateCommand {
    Start,
    Feedback(Feedback),
    Confirm,
    Cancel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Load { path: String, width: u32, height: u32 },
    Paint { cells: Vec<CellPos>, reveal: bool },
    Brush(u32),
    Block { from: CellPos, to: CellPos, reveal: bool },
    Draw { points: Vec<Point> },
    Undo,
    Redo,
    ResetFog,
    ClearFog,
    ClearDrawings,
    GridSize(f64),
    GridOffset { x: f64, y: f64 },
    GridVisible(bool),
    GridColor(String),
    GridOpacity(f64),
    Calibrate(CalibrateCommand),
    Offset { x: f64, y: f64 },
    Ppi(f64),
    PpiSave,
    PpiRestore,
    Display { open: bool },
    Save,
    Status,
    Help,
    Quit,
}

fn number<T: FromStr>(raw: &str) -> Result<T, ConsoleError> {
    raw.parse().map_err(|_| ConsoleError::BadNumber(raw.to_owned()))
}

fn cells(args: &[&str]) -> Result<Vec<CellPos>, ConsoleError> {
    args.chunks_exact(2).map(|pair| Ok(CellPos::new(number(pair[0])?, number(pair[1])?))).collect()
}

fn points(args: &[&str]) -> Result<Vec<Point>, ConsoleError> {
    args.chunks_exact(2).map(|pair| Ok(Point::new(number(pair[0])?, number(pair[1])?))).collect()
}

/// Parse one console line. `Ok(None)` for a blank line or a `#` comment.
///
/// # Errors
///
/// [`ConsoleError`] describing what is wrong with the line.
pub fn parse(line: &str) -> Result<Option<Command>, ConsoleError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let words: Vec<&str> = line.split_whitespace().collect();
    let (name, args) = (words[0].to_ascii_lowercase(), &words[1..]);

    let command = match (name.as_str(), args) {
        ("load", [.., w, h]) if args.len() >= 3 => {
            let path = args[..args.len() - 2].join(" ");
            Command::Load { path, width: number(w)?, height: number(h)? }
        }
        ("load", _) => return Err(ConsoleError::Usage("load <path> <width> <height>")),

        ("reveal" | "hide", _) if !args.is_empty() && args.len() % 2 == 0 => {
            Command::Paint { cells: cells(args)?, reveal: name == "reveal" }
        }
        ("reveal" | "hide", _) => return Err(ConsoleError::Usage("reveal|hide <col> <row> [<col> <row>]...")),

        ("brush", [size]) => Command::Brush(number(size)?),
        ("brush", _) => return Err(ConsoleError::Usage("brush <cells>")),

        ("block", [c1, r1, c2, r2, rest @ ..]) if rest.is_empty() || rest == ["hide"] => Command::Block {
            from: CellPos::new(number(c1)?, number(r1)?),
            to: CellPos::new(number(c2)?, number(r2)?),
            reveal: rest.is_empty(),
        },
        ("block", _) => return Err(ConsoleError::Usage("block <col> <row> <col> <row> [hide]")),

        ("draw", _) if args.len() >= 4 && args.len() % 2 == 0 => Command::Draw { points: points(args)? },
        ("draw", _) => return Err(ConsoleError::Usage("draw <x> <y> <x> <y> [<x> <y>]...")),

        ("undo", []) => Command::Undo,
        ("redo", []) => Command::Redo,
        ("reset", []) => Command::ResetFog,
        ("clearfog", []) => Command::ClearFog,
        ("cleardrawings", []) => Command::ClearDrawings,

        ("grid", ["size", px]) => Command::GridSize(number(px)?),
        ("grid", ["offset", x, y]) => Command::GridOffset { x: number(x)?, y: number(y)? },
        ("grid", ["show"]) => Command::GridVisible(true),
        ("grid", ["hide"]) => Command::GridVisible(false),
        ("grid", ["color", color]) => Command::GridColor((*color).to_owned()),
        ("grid", ["opacity", o]) => Command::GridOpacity(number(o)?),
        ("grid", _) => return Err(ConsoleError::Usage("grid size|offset|show|hide|color|opacity ...")),

        ("calibrate", [step]) => Command::Calibrate(match step.to_ascii_lowercase().as_str() {
            "start" => CalibrateCommand::Start,
            "toobig" => CalibrateCommand::Feedback(Feedback::TooBig),
            "toosmall" => CalibrateCommand::Feedback(Feedback::TooSmall),
            "confirm" => CalibrateCommand::Confirm,
            "cancel" => CalibrateCommand::Cancel,
            _ => return Err(ConsoleError::Usage("calibrate start|toobig|toosmall|confirm|cancel")),
        }),
        ("calibrate", _) => return Err(ConsoleError::Usage("calibrate start|toobig|toosmall|confirm|cancel")),

        ("offset", [x, y]) => Command::Offset { x: number(x)?, y: number(y)? },
        ("offset", _) => return Err(ConsoleError::Usage("offset <x> <y>")),

        ("ppi", ["save"]) => Command::PpiSave,
        ("ppi", ["restore"]) => Command::PpiRestore,
        ("ppi", [value]) => Command::Ppi(number(value)?),
        ("ppi", _) => return Err(ConsoleError::Usage("ppi <value> | ppi save | ppi restore")),

        ("display", ["open"]) => Command::Display { open: true },
        ("display", ["close"]) => Command::Display { open: false },
        ("display", _) => return Err(ConsoleError::Usage("display open|close")),

        ("save", []) => Command::Save,
        ("status", []) => Command::Status,
        ("help" | "?", _) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,

        _ => return Err(ConsoleError::Unknown(words[0].to_owned())),
    };
    Ok(Some(command))
}
