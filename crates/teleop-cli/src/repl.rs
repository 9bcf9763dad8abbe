//! REPL – Read-Eval-Print Loop for the operator console.
//!
//! Supported slash-commands:
//!   /help                   – show this list
//!   /connect | /retry       – dial the vehicle (also leaves the failed state)
//!   /disconnect             – stop the vehicle and close the link
//!   /drive <mag> <deg>      – hold the drive stick (mag 0..1, 90° = forward)
//!   /stop                   – release the drive stick
//!   /look <mag> <deg>       – hold the camera stick
//!   /release                – release the camera stick (auto-centres later)
//!   /calibrate              – ask the vehicle to calibrate its IMU
//!   /status                 – session, video, pose and health readout
//!   /notifications          – advisory history, most recent first
//!   /quit | /exit           – stop the vehicle and exit

use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::sync::{Arc, Mutex};

use teleop_runtime::{ClientHandle, OperatorInput};
use teleop_types::ChannelKind;

use crate::dashboard::{Dashboard, format_notification};

/// A parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Connect,
    Disconnect,
    Hold {
        channel: ChannelKind,
        magnitude: f32,
        degrees: f32,
    },
    Release { channel: ChannelKind },
    Calibrate,
    Status,
    Notifications,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Command, String> {
        let mut words = line.split_whitespace();
        let head = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();
        let command = match head {
            "/help" => Command::Help,
            "/connect" | "/retry" => Command::Connect,
            "/disconnect" => Command::Disconnect,
            "/drive" => hold(ChannelKind::Movement, &args)?,
            "/look" => hold(ChannelKind::Camera, &args)?,
            "/stop" => Command::Release {
                channel: ChannelKind::Movement,
            },
            "/release" => Command::Release {
                channel: ChannelKind::Camera,
            },
            "/calibrate" => Command::Calibrate,
            "/status" => Command::Status,
            "/notifications" => Command::Notifications,
            "/quit" | "/exit" => Command::Quit,
            other => return Err(format!("Unknown command: {other}")),
        };
        Ok(command)
    }
}

fn hold(channel: ChannelKind, args: &[&str]) -> Result<Command, String> {
    let [magnitude, degrees] = args else {
        return Err("usage: <magnitude 0..1> <degrees>".to_string());
    };
    let magnitude: f32 = magnitude
        .parse()
        .map_err(|_| format!("not a number: {magnitude}"))?;
    let degrees: f32 = degrees.parse().map_err(|_| format!("not a number: {degrees}"))?;
    if !(0.0..=1.0).contains(&magnitude) {
        return Err("magnitude must be between 0 and 1".to_string());
    }
    Ok(Command::Hold {
        channel,
        magnitude,
        degrees,
    })
}

/// Entry point for the interactive REPL. Returns when the operator quits,
/// stdin closes, or the client loop has stopped.
pub fn run(handle: &ClientHandle, dashboard: &Arc<Mutex<Dashboard>>, max_radius: f32) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("{}: {}", "Terminal error".red(), e);
            return;
        }
    };
    let prompt = format!("{} ", "teleop>".bold().cyan());

    loop {
        let line = match editor.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("{}", "⚠  Stopping the vehicle …".yellow().bold());
                break;
            }
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line);

        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                println!("{}  Type {} for help.", e.red(), "/help".bold().cyan());
                continue;
            }
        };

        let input = match command {
            Command::Help => {
                cmd_help();
                continue;
            }
            Command::Status => {
                cmd_status(handle, dashboard);
                continue;
            }
            Command::Notifications => {
                cmd_notifications(dashboard);
                continue;
            }
            Command::Quit => break,
            Command::Connect => OperatorInput::Connect,
            Command::Disconnect => OperatorInput::Disconnect,
            Command::Calibrate => OperatorInput::CalibrateImu,
            Command::Release { channel } => OperatorInput::GestureEnd { channel },
            Command::Hold {
                channel,
                magnitude,
                degrees,
            } => OperatorInput::GestureUpdate {
                channel,
                distance: magnitude * max_radius,
                angle: degrees.to_radians(),
            },
        };

        if let Err(e) = handle.send(input) {
            println!("{}: {}", "Client stopped".red(), e);
            break;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("  {}", "Available commands:".bold());
    println!("  {}  – dial the vehicle", "/connect".bold().cyan());
    println!("  {}  – dial again after retries ran out", "/retry".bold().cyan());
    println!("  {}  – stop the vehicle and close the link", "/disconnect".bold().cyan());
    println!(
        "  {}  – hold the drive stick (mag 0..1, 90° forward)",
        "/drive <mag> <deg>".bold().cyan()
    );
    println!("  {}  – release the drive stick", "/stop".bold().cyan());
    println!("  {}  – hold the camera stick", "/look <mag> <deg>".bold().cyan());
    println!("  {}  – release the camera stick", "/release".bold().cyan());
    println!("  {}  – calibrate the IMU", "/calibrate".bold().cyan());
    println!("  {}  – session and vehicle health", "/status".bold().cyan());
    println!("  {}  – advisory history", "/notifications".bold().cyan());
    println!("  {}  – stop the vehicle and exit", "/quit".bold().cyan());
    println!();
}

fn cmd_status(handle: &ClientHandle, dashboard: &Arc<Mutex<Dashboard>>) {
    let Ok(mut dash) = dashboard.lock() else {
        println!("{}", "Dashboard unavailable".red());
        return;
    };
    dash.session = Some(handle.state());
    println!();
    for line in dash.render() {
        println!("{line}");
    }
    println!();
}

fn cmd_notifications(dashboard: &Arc<Mutex<Dashboard>>) {
    let Ok(dash) = dashboard.lock() else {
        println!("{}", "Dashboard unavailable".red());
        return;
    };
    let mut any = false;
    for n in dash.notifications() {
        println!("  {}", format_notification(n));
        any = true;
    }
    if !any {
        println!("  {}", "No notifications yet.".dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_parses_magnitude_and_degrees() {
        assert_eq!(
            Command::parse("/drive 0.5 90"),
            Ok(Command::Hold {
                channel: ChannelKind::Movement,
                magnitude: 0.5,
                degrees: 90.0
            })
        );
    }

    #[test]
    fn look_requires_two_arguments() {
        assert!(Command::parse("/look 0.5").is_err());
        assert!(Command::parse("/look").is_err());
    }

    #[test]
    fn magnitude_out_of_range_is_rejected() {
        assert!(Command::parse("/drive 1.5 0").is_err());
        assert!(Command::parse("/drive -0.1 0").is_err());
        assert!(Command::parse("/drive fast 0").is_err());
    }

    #[test]
    fn releases_map_to_their_channel() {
        assert_eq!(
            Command::parse("/stop"),
            Ok(Command::Release {
                channel: ChannelKind::Movement
            })
        );
        assert_eq!(
            Command::parse("  /release  "),
            Ok(Command::Release {
                channel: ChannelKind::Camera
            })
        );
    }

    #[test]
    fn retry_is_a_connect() {
        assert_eq!(Command::parse("/retry"), Ok(Command::Connect));
        assert_eq!(Command::parse("/exit"), Ok(Command::Quit));
    }

    #[test]
    fn unknown_command_is_reported() {
        let err = Command::parse("/warp 9").unwrap_err();
        assert!(err.contains("/warp"));
    }
}
