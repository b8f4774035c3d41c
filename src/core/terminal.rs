use console::{Emoji, style};

pub static SUCCESS_ICON: Emoji<'_, '_> = Emoji("✅ ", "");
pub static INFO_ICON: Emoji<'_, '_> = Emoji("ℹ️  ", "");
pub static WARN_ICON: Emoji<'_, '_> = Emoji("⚠️  ", "");
pub static ERROR_ICON: Emoji<'_, '_> = Emoji("❌ ", "");
pub static GLOBE: Emoji<'_, '_> = Emoji("🌐 ", "");
pub static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");

pub fn print_success(msg: &str) {
    println!("{} {}", SUCCESS_ICON, style(msg).green());
}

pub fn print_info(msg: &str) {
    println!("{} {}", INFO_ICON, style(msg).blue());
}

pub fn print_warn(msg: &str) {
    println!("{} {}", WARN_ICON, style(msg).yellow());
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", ERROR_ICON, style(msg).red().bold());
}

pub fn print_status(label: &str, msg: &str) {
    println!("  {} {}: {}", GEAR, style(label).bold().cyan(), msg);
}

pub fn print_step(step: &str) {
    println!("{} {}", SPARKLE, style(step).bold());
}

pub fn print_link(label: &str, url: &str) {
    println!(
        "  {} {}: {}",
        GLOBE,
        style(label).bold(),
        style(url).underlined().cyan()
    );
}

/// A titled block of `command  description` rows in the help screen.
pub struct GuideSection {
    title: &'static str,
    commands: Vec<(&'static str, &'static str)>,
}

impl GuideSection {
    pub fn new(title: &'static str) -> Self {
        Self {
            title,
            commands: Vec::new(),
        }
    }

    pub fn command(mut self, name: &'static str, description: &'static str) -> Self {
        self.commands.push((name, description));
        self
    }

    pub fn print(&self) {
        let width = self
            .commands
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0);
        println!("\n {}", style(self.title).bold().underlined());
        for (name, description) in &self.commands {
            println!(
                "   {}  {}",
                style(format!("{:<width$}", name, width = width)).green(),
                style(description).dim()
            );
        }
    }
}

pub fn print_banner() {
    let lines: &[&str] = &[
        " _     _                         _   _     ",
        "| |__ (_) ___  ___ _   _ _ __  | |_| |__  ",
        "| '_ \\| |/ _ \\/ __| | | | '_ \\ | __| '_ \\ ",
        "| |_) | | (_) \\__ \\ |_| | | | || |_| | | |",
        "|_.__/|_|\\___/|___/\\__, |_| |_| \\__|_| |_|",
        "                   |___/                   ",
    ];

    // Gradient: #34d399 → #22d3ee → #a78bfa (diagonal top-left → bottom-right)
    let stops: [(u8, u8, u8); 3] = [(52, 211, 153), (34, 211, 238), (167, 139, 250)];
    let max_w = 43u32;
    let max_d = max_w + 5 * 10;

    println!();
    for (y, line) in lines.iter().enumerate() {
        for (x, ch) in line.chars().enumerate() {
            if ch == ' ' {
                print!(" ");
                continue;
            }
            let d = ((x as u32 + y as u32 * 10) * 1000 / max_d).min(1000);
            let (r, g, b) = if d <= 500 {
                lerp_color(stops[0], stops[1], d * 2)
            } else {
                lerp_color(stops[1], stops[2], (d - 500) * 2)
            };
            print!("\x1b[38;2;{};{};{}m{}", r, g, b, ch);
        }
        println!();
    }
    print!("\x1b[0m");

    println!("\x1b[38;2;34;211;238mAlgorithms grown from nature, on a schedule.\x1b[0m\n");
}

fn lerp_color(a: (u8, u8, u8), b: (u8, u8, u8), t: u32) -> (u8, u8, u8) {
    let r = (a.0 as u32 * (1000 - t) + b.0 as u32 * t) / 1000;
    let g = (a.1 as u32 * (1000 - t) + b.1 as u32 * t) / 1000;
    let b_val = (a.2 as u32 * (1000 - t) + b.2 as u32 * t) / 1000;
    (r as u8, g as u8, b_val as u8)
}

pub fn print_goodbye() {
    println!("\n{} {}", SPARKLE, style("biosynth stopped.").bold().cyan());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_endpoints_match_stops() {
        assert_eq!(lerp_color((0, 0, 0), (200, 100, 50), 0), (0, 0, 0));
        assert_eq!(lerp_color((0, 0, 0), (200, 100, 50), 1000), (200, 100, 50));
        assert_eq!(lerp_color((0, 0, 0), (200, 100, 50), 500), (100, 50, 25));
    }
}
