#[cfg(feature = "colored-output")]
use colored::*;
use restream_engine::{EndReason, OutputLine, Playlist, RunSummary};
use std::io::{self, Write};

enum Color {
    Green,
    Yellow,
    Red,
    Cyan,
}

/// Console output that is not logging: the playlist listing, the transcoder
/// echo and the final summary.
pub struct OutputManager {
    colored: bool,
}

impl OutputManager {
    pub fn new(colored: bool) -> Self {
        Self { colored }
    }

    pub fn format_playlist(&self, playlist: &Playlist) -> String {
        let mut output = self.colorize(
            &format!("{} item(s) in playlist", playlist.len()),
            &Color::Cyan,
            true,
        );
        output.push('\n');
        for (index, entry) in playlist.entries().iter().enumerate() {
            let label = entry.label();
            if label == entry.location {
                output.push_str(&format!("  {:>3}. {}\n", index + 1, label));
            } else {
                output.push_str(&format!(
                    "  {:>3}. {} ({})\n",
                    index + 1,
                    label,
                    entry.location
                ));
            }
        }
        output
    }

    pub fn print_playlist(&self, playlist: &Playlist) {
        print!("{}", self.format_playlist(playlist));
    }

    /// Echo one transcoder line as-is.
    pub fn echo(&self, line: &OutputLine) {
        let mut stdout = io::stdout().lock();
        // A closed stdout must not stop the stream
        let _ = writeln!(stdout, "{}", line.text);
    }

    pub fn format_summary(&self, summary: &RunSummary) -> String {
        let color = match summary.end {
            EndReason::Exhausted if summary.failures == 0 => Color::Green,
            EndReason::Exhausted | EndReason::Cancelled => Color::Yellow,
            EndReason::Failed | EndReason::Fatal => Color::Red,
        };
        self.colorize(&summary.to_string(), &color, true)
    }

    pub fn print_summary(&self, summary: &RunSummary) {
        println!("{}", self.format_summary(summary));
    }

    fn colorize(&self, text: &str, color: &Color, bold: bool) -> String {
        #[cfg(feature = "colored-output")]
        {
            if self.colored {
                let colored_text = match color {
                    Color::Green => text.green(),
                    Color::Yellow => text.yellow(),
                    Color::Red => text.red(),
                    Color::Cyan => text.cyan(),
                };
                if bold {
                    colored_text.bold().to_string()
                } else {
                    colored_text.to_string()
                }
            } else {
                text.to_string()
            }
        }
        #[cfg(not(feature = "colored-output"))]
        {
            let _ = (color, bold, self.colored);
            text.to_string()
        }
    }
}
