//! Poptiles: rising-board match-three puzzle in the terminal.

mod app;
mod cascade;
mod game;
mod grid;
mod highscores;
mod input;
mod logging;
mod matcher;
mod rise;
mod rules;
mod selection;
mod state;
mod theme;
mod ui;

use anyhow::Result;
use app::App;
use clap::{Parser, ValueEnum};
use rise::SpeedMode;
use rules::BoardConfig;

/// Options derived from the CLI that shape a session and the shell around it.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub board: BoardConfig,
    pub mode: SpeedMode,
    /// Fixed seed for a reproducible board; OS entropy otherwise.
    pub seed: Option<u64>,
    pub no_menu: bool,
    pub no_animation: bool,
    pub frame_rate: f64,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.log_file.as_deref(), args.verbose)?;
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_else(|e| {
        log::warn!("theme not loaded ({e}), using defaults");
        theme::Theme::default()
    });
    let config = GameConfig {
        board: BoardConfig::default().with_kinds(args.kinds),
        mode: SpeedMode::from_label(&args.speed),
        seed: args.seed,
        no_menu: args.no_menu,
        no_animation: args.no_animation,
        frame_rate: args.frame_rate,
    };
    log::debug!("{config:?}");
    let mut app = App::new(config, theme);
    app.run()?;
    Ok(())
}

/// Rising-board match-three puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "poptiles",
    version,
    about = "Rising-board match-three puzzle in the terminal. Pick any three matching tiles before the stack reaches the top.",
    long_about = "Poptiles is a terminal puzzle game.\n\n\
        The board rises from below one row at a time. Pick any three tiles of the same kind, \
        anywhere on the board, to pop them. Tiles above fall into the gaps, and new lines of \
        three or more pop on their own as a chain. The game ends when a tile crosses the \
        danger line at the top; press R to play again.\n\n\
        CONTROLS:\n  Arrows / hjkl  Move cursor    Enter / Space  Pick tile    Mouse click  Pick tile\n  \
        P / Esc        Pause menu     R              Play again    Q            Quit\n\n\
        Use --speed score to tie the rise speed to your score instead of the time survived."
)]
pub struct Args {
    /// Speed mode: time (speeds up with time survived) or score (speeds up with score).
    /// Anything else falls back to time.
    #[arg(short, long, default_value = "time", value_name = "MODE")]
    pub speed: String,

    /// Seed for the tile generator (same seed, same board).
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Number of tile kinds (4 to 12). Fewer kinds make matches easier.
    #[arg(short, long, default_value = "12", value_name = "N")]
    pub kinds: u8,

    /// Path to theme file (btop-style theme[key]="value"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<std::path::PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Skip main menu and start game immediately.
    #[arg(long)]
    pub no_menu: bool,

    /// Disable the pop fade animation.
    #[arg(long)]
    pub no_animation: bool,

    /// Target render frames per second; the board is ticked once per frame.
    #[arg(long, default_value = "60.0", value_name = "RATE")]
    pub frame_rate: f64,

    /// Write debug logs to this file (the terminal is taken by the game).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<std::path::PathBuf>,

    /// Log at trace level (every rise-step and pick). Needs --log-file.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["poptiles"]);
        assert_eq!(args.speed, "time");
        assert_eq!(args.kinds, 12);
        assert_eq!(args.palette, Palette::Normal);
        assert!(args.seed.is_none());
    }

    #[test]
    fn test_unknown_speed_is_accepted_and_falls_back() {
        let args = Args::parse_from(["poptiles", "--speed", "warp", "--palette", "colourblind"]);
        assert_eq!(SpeedMode::from_label(&args.speed), SpeedMode::Time);
        assert_eq!(args.palette, Palette::Colorblind);
    }
}
