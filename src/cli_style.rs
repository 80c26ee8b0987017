use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use crossterm::style::{Attribute, Stylize};
use unicode_width::UnicodeWidthStr;

const SECTION_WIDTH: usize = 60;

// ═══════════════════════════════════════════════════════════════════════════════
// Clap Styles
// ═══════════════════════════════════════════════════════════════════════════════

pub fn get_styles() -> Styles {
    let heading = Style::new()
        .bold()
        .underline()
        .fg_color(Some(Color::Ansi(AnsiColor::Blue)));
    Styles::styled()
        .usage(heading)
        .header(heading)
        .literal(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .invalid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .error(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .valid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Palette
// ═══════════════════════════════════════════════════════════════════════════════

pub mod colors {
    use crossterm::style::Color;

    pub const FRAME: Color = Color::Rgb {
        r: 100,
        g: 149,
        b: 237,
    };
    pub const OK: Color = Color::Rgb {
        r: 0,
        g: 200,
        b: 120,
    };
    pub const WARN: Color = Color::Rgb {
        r: 255,
        g: 165,
        b: 0,
    };
    pub const FAIL: Color = Color::Rgb {
        r: 255,
        g: 85,
        b: 85,
    };
    pub const LABEL: Color = Color::Rgb {
        r: 128,
        g: 128,
        b: 128,
    };
    pub const VALUE: Color = Color::Rgb {
        r: 255,
        g: 255,
        b: 255,
    };
}

mod box_chars {
    pub const TOP_LEFT: &str = "╭";
    pub const TOP_RIGHT: &str = "╮";
    pub const BOTTOM_LEFT: &str = "╰";
    pub const BOTTOM_RIGHT: &str = "╯";
    pub const HORIZONTAL: &str = "─";
    pub const VERTICAL: &str = "│";
    pub const T_LEFT: &str = "├";
    pub const T_RIGHT: &str = "┤";
    pub const T_TOP: &str = "┬";
    pub const T_BOTTOM: &str = "┴";
    pub const CROSS: &str = "┼";
    pub const BULLET: &str = "●";
    pub const CHECK: &str = "✓";
    pub const CROSS_MARK: &str = "✗";
}

// ═══════════════════════════════════════════════════════════════════════════════
// Status lines
// ═══════════════════════════════════════════════════════════════════════════════

pub fn print_success(message: &str) {
    println!(
        " {} {}",
        box_chars::CHECK.with(colors::OK).bold(),
        message.with(colors::OK)
    );
}

pub fn print_error(message: &str) {
    println!(
        " {} {}",
        box_chars::CROSS_MARK.with(colors::FAIL).bold(),
        message.with(colors::FAIL)
    );
}

pub fn print_warning(message: &str) {
    println!(
        " {} {}",
        "⚠".with(colors::WARN).bold(),
        message.with(colors::WARN)
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// Sections
// ═══════════════════════════════════════════════════════════════════════════════

pub fn print_section_header(title: &str) {
    let title_len = title.width();
    let left = SECTION_WIDTH.saturating_sub(title_len + 4) / 2;
    let right = SECTION_WIDTH.saturating_sub(title_len + 4 + left);

    println!();
    println!(
        "{}{} {} {}{}",
        box_chars::TOP_LEFT.with(colors::FRAME),
        box_chars::HORIZONTAL.repeat(left).with(colors::FRAME),
        title.with(colors::FRAME).bold().attribute(Attribute::Italic),
        box_chars::HORIZONTAL.repeat(right).with(colors::FRAME),
        box_chars::TOP_RIGHT.with(colors::FRAME)
    );
}

pub fn print_section_footer() {
    println!(
        "{}{}{}",
        box_chars::BOTTOM_LEFT.with(colors::FRAME),
        box_chars::HORIZONTAL
            .repeat(SECTION_WIDTH)
            .with(colors::FRAME),
        box_chars::BOTTOM_RIGHT.with(colors::FRAME)
    );
    println!();
}

pub fn print_key_value(key: &str, value: &str) {
    println!(
        "  {} {} {}",
        box_chars::BULLET.with(colors::FRAME),
        format!("{}:", key).with(colors::LABEL),
        value.with(colors::VALUE)
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tables
// ═══════════════════════════════════════════════════════════════════════════════

pub struct TableBuilder {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    col_widths: Vec<usize>,
}

impl TableBuilder {
    pub fn new(headers: &[&str]) -> Self {
        TableBuilder {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
            col_widths: headers.iter().map(|h| h.width()).collect(),
        }
    }

    /// Adds a row; cells past the header count are dropped.
    pub fn add_row(&mut self, row: Vec<String>) {
        let mut row = row;
        row.truncate(self.headers.len());
        for (width, cell) in self.col_widths.iter_mut().zip(&row) {
            *width = (*width).max(cell.width());
        }
        self.rows.push(row);
    }

    fn border(&self, left: &str, joint: &str, right: &str) -> String {
        let segments: Vec<String> = self
            .col_widths
            .iter()
            .map(|w| box_chars::HORIZONTAL.repeat(w + 2))
            .collect();
        format!("{}{}{}", left, segments.join(joint), right)
    }

    fn line(&self, cells: &[String]) -> String {
        let mut line = String::from(box_chars::VERTICAL);
        for (i, width) in self.col_widths.iter().enumerate() {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            line.push(' ');
            line.push_str(cell);
            line.push_str(&" ".repeat(width.saturating_sub(cell.width()) + 1));
            line.push_str(box_chars::VERTICAL);
        }
        line
    }

    /// The table as plain lines, without colors.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            self.border(box_chars::TOP_LEFT, box_chars::T_TOP, box_chars::TOP_RIGHT),
            self.line(&self.headers),
            self.border(box_chars::T_LEFT, box_chars::CROSS, box_chars::T_RIGHT),
        ];
        lines.extend(self.rows.iter().map(|row| self.line(row)));
        lines.push(self.border(
            box_chars::BOTTOM_LEFT,
            box_chars::T_BOTTOM,
            box_chars::BOTTOM_RIGHT,
        ));
        lines
    }

    pub fn print(&self) {
        for (i, line) in self.lines().into_iter().enumerate() {
            if i == 1 {
                println!("{}", line.with(colors::FRAME).bold());
            } else {
                println!("{}", line.with(colors::FRAME));
            }
        }
    }
}
