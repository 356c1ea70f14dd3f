use std::io::{self, IsTerminal, Write};

use chrono::Datelike;
use unicode_width::UnicodeWidthStr;

use seasonroom_client::dto::{Member, UserDetail};
use seasonroom_core::calendar::format_iso_date;
use seasonroom_core::config::{Config, KEY_COLOR};
use seasonroom_core::{CalendarDate, OccupancyTier, Reservation, YearMonth};

const WEEKDAY_HEADER: [&str; 7] = ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"];
const CELL_WIDTH: usize = 4;

/// What one calendar cell shows besides the day number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayMark {
    Confirmed,
    Teaching,
    Pending,
    Selected,
    Open,
    Closed,
    Past,
    Tier(OccupancyTier),
}

impl DayMark {
    fn symbol(self) -> &'static str {
        match self {
            Self::Confirmed => "C",
            Self::Teaching => "T",
            Self::Pending => "P",
            Self::Selected => "*",
            Self::Open => "+",
            Self::Closed | Self::Past => " ",
            Self::Tier(OccupancyTier::Low) => "L",
            Self::Tier(OccupancyTier::Medium) => "M",
            Self::Tier(OccupancyTier::High) => "H",
        }
    }

    fn color(self) -> Option<&'static str> {
        match self {
            Self::Confirmed | Self::Teaching | Self::Tier(OccupancyTier::Low) => Some("32"),
            Self::Pending | Self::Tier(OccupancyTier::Medium) => Some("33"),
            Self::Tier(OccupancyTier::High) => Some("31"),
            Self::Selected | Self::Open => Some("36"),
            Self::Past => Some("2"),
            Self::Closed => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool(KEY_COLOR)?.unwrap_or(true);
        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    /// Sunday-first grid for `month`; `mark` decides each day's cell.
    pub fn month_lines<F>(&self, month: YearMonth, mark: F) -> Vec<String>
    where
        F: Fn(CalendarDate) -> DayMark,
    {
        let mut lines = Vec::new();
        lines.push(format!("{:^width$}", month.first_day().format("%B %Y").to_string(), width = CELL_WIDTH * 7));
        lines.push(
            WEEKDAY_HEADER
                .iter()
                .map(|d| format!("{d:>3} "))
                .collect::<String>(),
        );

        let mut line = " ".repeat(CELL_WIDTH * month.first_weekday() as usize);
        for date in month.days() {
            let day_mark = mark(date);
            let cell = format!("{:>2}{}", date.day(), day_mark.symbol());
            let cell = match day_mark.color() {
                Some(code) => self.paint(&cell, code),
                None => cell,
            };
            line.push(' ');
            line.push_str(&cell);
            if date.weekday() == chrono::Weekday::Sat {
                lines.push(line.trim_end().to_string());
                line = String::new();
            }
        }
        if !line.trim().is_empty() {
            lines.push(line.trim_end().to_string());
        }
        lines
    }

    pub fn print_lines(&self, lines: &[String]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        for line in lines {
            writeln!(out, "{line}")?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, reservations))]
    pub fn print_reservations(&self, reservations: &[Reservation]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let headers = ["Date", "Status", "Teaching", "Waiting", "Crew"]
            .map(str::to_string)
            .to_vec();
        let rows = reservations
            .iter()
            .map(|r| {
                let status = if r.is_confirmed() {
                    self.paint(&r.status.to_string(), "32")
                } else {
                    self.paint(&r.status.to_string(), "33")
                };
                vec![
                    format_iso_date(r.date),
                    status,
                    if r.teaching { "yes".to_string() } else { String::new() },
                    r.waiting_order.map(|n| format!("#{n}")).unwrap_or_default(),
                    r.crew_id.map(|id| id.to_string()).unwrap_or_default(),
                ]
            })
            .collect();
        write_table(&mut out, headers, rows)
    }

    #[tracing::instrument(skip(self, members))]
    pub fn print_members(&self, members: &[Member]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let headers = ["Name", "Role", "Teaching", "Registered by"]
            .map(str::to_string)
            .to_vec();
        let rows = members
            .iter()
            .map(|m| {
                vec![
                    m.name.clone(),
                    m.role.clone().unwrap_or_default(),
                    if m.teaching {
                        self.paint("teach", "36")
                    } else {
                        String::new()
                    },
                    m.registered_by_name.clone().unwrap_or_default(),
                ]
            })
            .collect();
        write_table(&mut out, headers, rows)
    }

    pub fn print_user(&self, user: &UserDetail) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "id        {}", user.user_id)?;
        writeln!(out, "name      {}", user.name)?;
        writeln!(out, "email     {}", user.email.clone().unwrap_or_default())?;
        writeln!(out, "role      {}", user.role.clone().unwrap_or_default())?;
        match &user.crew {
            Some(crew) => writeln!(out, "crew      {} ({})", crew.crew_name, crew.crew_id)?,
            None => writeln!(out, "crew      -")?,
        }
        Ok(())
    }

    pub fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths: Vec<usize> = headers
        .iter()
        .map(|h| UnicodeWidthStr::width(h.as_str()))
        .collect();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(&widths) {
        let padding = width.saturating_sub(UnicodeWidthStr::width(header.as_str()));
        write!(writer, "{}{} ", header, " ".repeat(padding))?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }
        if ch == '\x1b' {
            escaped = true;
            continue;
        }
        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::Datelike;
    use seasonroom_core::YearMonth;
    use seasonroom_core::config::{Config, KEY_COLOR};

    use super::{DayMark, Renderer, strip_ansi, write_table};

    #[test]
    fn december_grid() {
        let month = YearMonth::new(2025, 12).expect("month");
        let lines = Renderer::plain().month_lines(month, |date| match date.day() {
            13 => DayMark::Confirmed,
            20 => DayMark::Pending,
            _ => DayMark::Closed,
        });
        assert_eq!(lines[1], " Su  Mo  Tu  We  Th  Fr  Sa ");
        // 2025-12-01 is a Monday.
        assert_eq!(lines[2], "      1   2   3   4   5   6");
        assert_eq!(lines[3], "  7   8   9  10  11  12  13C");
        assert_eq!(lines[4], " 14  15  16  17  18  19  20P");
        assert_eq!(lines.last().map(String::as_str), Some(" 28  29  30  31"));
    }

    #[test]
    fn color_setting_comes_from_config() {
        let mut cfg = Config::default();
        cfg.apply_overrides(vec![(KEY_COLOR.to_string(), "off".to_string())]);
        let renderer = Renderer::new(&cfg).expect("renderer");
        assert!(!renderer.color);
        assert_eq!(renderer.paint("LOW", "32"), "LOW");

        cfg.apply_overrides(vec![(KEY_COLOR.to_string(), "loud".to_string())]);
        assert!(Renderer::new(&cfg).is_err());
    }

    #[test]
    fn painted_cells_keep_alignment() {
        let painted = Renderer { color: true }.paint("HIGH", "31");
        assert_eq!(strip_ansi(&painted), "HIGH");

        let mut out = Vec::new();
        write_table(
            &mut out,
            vec!["Tier".to_string(), "Day".to_string()],
            vec![vec![painted, "13".to_string()]],
        )
        .expect("table");
        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<_> = text.lines().map(strip_ansi).collect();
        assert_eq!(lines[0], "Tier Day ");
        assert_eq!(lines[2], "HIGH 13  ");
    }
}
