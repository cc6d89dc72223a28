use crate::core::registry::UnitDef;
use crate::core::session::Session;
use crate::math::{Evaluator, LineResult};
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    Result,
    Error,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
        StyleType::Result => style(text).green().bold(),
        StyleType::Error => style(text).red(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Creates a new `comfy_table::Table` with standard styling.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Creates a styled header cell for a table.
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn index_cell(index: usize) -> Cell {
    Cell::new(index)
        .fg(Color::DarkGrey)
        .set_alignment(CellAlignment::Right)
}

/// One line of output per evaluated line, e.g. `[1] sqrt(area) => 3.464102`.
pub fn render_line_result(result: &LineResult) -> String {
    match result {
        LineResult::Evaluated {
            index,
            expression,
            display,
            ..
        } => format!(
            "{} {expression} => {}",
            style_text(&format!("[{index}]"), StyleType::Subtle),
            style_text(display, StyleType::Result)
        ),
        LineResult::Failed {
            index,
            expression,
            error,
        } => {
            let prefix = match index {
                Some(index) => format!("[{index}]"),
                None => "[!]".to_string(),
            };
            format!(
                "{} {expression}: {}",
                style_text(&prefix, StyleType::Subtle),
                style_text(error, StyleType::Error)
            )
        }
        LineResult::Missing { index } => style_text(
            &format!("There is no expression number {index} on the pad"),
            StyleType::Error,
        ),
    }
}

pub fn scope_table(session: &Session, evaluator: &Evaluator) -> Table {
    let mut table = new_styled_table();
    table.set_header(vec![
        header_cell("Variable"),
        header_cell("Value"),
        header_cell("Kind"),
    ]);
    for (name, value) in &session.scope {
        table.add_row(vec![
            Cell::new(name).add_attribute(Attribute::Bold),
            Cell::new(evaluator.format_value(value)).set_alignment(CellAlignment::Right),
            Cell::new(value.kind()).fg(Color::DarkGrey),
        ]);
    }
    table
}

pub fn pad_table(session: &Session) -> Table {
    let mut table = new_styled_table();
    table.set_header(vec![header_cell("#"), header_cell("Expression")]);
    for (index, expression) in session.pad.iter().enumerate() {
        table.add_row(vec![index_cell(index), Cell::new(expression)]);
    }
    table
}

/// Rates table, `value` is how many `base` one unit of the code is worth.
pub fn rates_table(rates: &[(String, UnitDef)], base: &str) -> Table {
    let mut table = new_styled_table();
    table.set_header(vec![
        header_cell("Code"),
        header_cell(&format!("Value ({base})")),
        header_cell("Source"),
        header_cell("Updated"),
    ]);
    for (code, def) in rates {
        table.add_row(vec![
            Cell::new(code).add_attribute(Attribute::Bold),
            Cell::new(format_rate(def.factor)).set_alignment(CellAlignment::Right),
            Cell::new(&def.origin),
            Cell::new(def.updated_at.format("%Y-%m-%d %H:%M:%S UTC")).fg(Color::DarkGrey),
        ]);
    }
    table
}

fn format_rate(value: f64) -> String {
    if value != 0.0 && value.abs() < 0.0001 {
        format!("{value:.4e}")
    } else {
        format!("{value:.4}")
    }
}

/// Spinner shown while a turn or a wait is in progress.
pub fn new_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(spinner_style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::Dimension;
    use crate::math::Value;
    use chrono::Utc;

    fn plain(text: String) -> String {
        console::strip_ansi_codes(&text).to_string()
    }

    #[test]
    fn test_render_line_results() {
        let evaluated = LineResult::Evaluated {
            index: 1,
            expression: "sqrt(area)".to_string(),
            value: Value::Number(3.4641016),
            display: "3.464102".to_string(),
        };
        assert_eq!(
            plain(render_line_result(&evaluated)),
            "[1] sqrt(area) => 3.464102"
        );

        let failed = LineResult::Failed {
            index: None,
            expression: "1 / 0 * undefinedVar".to_string(),
            error: "Undefined symbol undefinedVar".to_string(),
        };
        assert_eq!(
            plain(render_line_result(&failed)),
            "[!] 1 / 0 * undefinedVar: Undefined symbol undefinedVar"
        );

        let missing = LineResult::Missing { index: 5 };
        assert_eq!(
            plain(render_line_result(&missing)),
            "There is no expression number 5 on the pad"
        );
    }

    #[test]
    fn test_rates_table_lists_codes() {
        let rates = vec![(
            "EUR".to_string(),
            UnitDef {
                factor: 1.25,
                dimension: Dimension::CURRENCY,
                origin: "fiat".to_string(),
                updated_at: Utc::now(),
            },
        )];
        let rendered = rates_table(&rates, "USD").to_string();
        assert!(rendered.contains("EUR"));
        assert!(rendered.contains("1.2500"));
        assert!(rendered.contains("Value (USD)"));
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(1.25), "1.2500");
        assert_eq!(format_rate(0.00001234), "1.2340e-5");
    }
}
