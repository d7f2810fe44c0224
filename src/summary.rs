//! Quote summary
//!
//! Renders a quote for a terminal: one table of lines, one table of currency groups, and
//! the settlement total underneath.

use std::{fmt::Write, io, ops::Range};

use smallvec::SmallVec;
use tabled::{
    builder::Builder,
    grid::config::HorizontalLine,
    settings::{
        Alignment, Color, Style, Theme,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{
    aggregate::AggregateTotal,
    format::{format_currency, format_discount, format_percent},
    lines::{LineError, PricedLine},
};

/// Errors raised while rendering a quote.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// A line could not be priced.
    #[error(transparent)]
    Line(#[from] LineError),

    /// IO error
    #[error("IO error")]
    IO,
}

/// Write the quote tables and totals.
///
/// # Errors
///
/// Returns an error if a line cannot be priced or the output cannot be written.
pub fn write_to(
    mut out: impl io::Write,
    lines: &[PricedLine<'_>],
    totals: &AggregateTotal<'_>,
) -> Result<(), SummaryError> {
    write_table(&mut out, line_rows(lines)?, Columns::new(2..6))?;
    write_table(&mut out, group_rows(totals), Columns::new(1..5))?;
    write_totals(&mut out, totals)
}

fn line_rows(lines: &[PricedLine<'_>]) -> Result<Builder, SummaryError> {
    let mut builder = Builder::default();

    builder.push_record(["", "Line", "Qty", "Unit Price", "Discount", "Total"]);

    for (idx, line) in lines.iter().enumerate() {
        let pricing = line.price()?;

        let total = if line.discount().is_none() {
            format_currency(&pricing.final_amount)
        } else {
            format!(
                "{} → {}",
                format_currency(&pricing.total_before_discount),
                format_currency(&pricing.final_amount)
            )
        };

        builder.push_record([
            format!("#{}", idx + 1),
            line.name().to_string(),
            line.quantity().to_string(),
            format_currency(line.base_price()),
            format_discount(line.discount()),
            total,
        ]);
    }

    Ok(builder)
}

fn group_rows(totals: &AggregateTotal<'_>) -> Builder {
    let mut builder = Builder::default();
    let general = totals
        .general_discount()
        .map_or_else(|| "-".to_string(), format_percent);

    builder.push_record([
        "Currency",
        "Subtotal",
        "After Line Discounts",
        "General Discount",
        "Total",
    ]);

    for group in totals.groups() {
        builder.push_record([
            group.currency.iso_alpha_code.to_string(),
            format_currency(&group.subtotal),
            format_currency(&group.discounted),
            general.clone(),
            format_currency(&group.total),
        ]);
    }

    builder
}

fn write_table(
    out: &mut impl io::Write,
    builder: Builder,
    amounts: Columns<Range<usize>>,
) -> Result<(), SummaryError> {
    let mut table = builder.build();
    let mut theme = Theme::from(Style::modern_rounded());

    theme.remove_horizontal_lines();
    theme.insert_horizontal_line(
        1,
        HorizontalLine::new(Some('─'), Some('┼'), Some('├'), Some('┤')),
    );

    table.with(theme);
    table.modify(Rows::first(), Color::BOLD);
    table.modify(amounts, Alignment::right());

    let table_str = colorize_borders(&table.to_string());

    writeln!(out, "\n{table_str}").map_err(|_err| SummaryError::IO)
}

fn write_totals(out: &mut impl io::Write, totals: &AggregateTotal<'_>) -> Result<(), SummaryError> {
    let mut rows: SmallVec<[(String, String); 3]> = SmallVec::new();

    rows.push((
        " \x1b[1mGrand Total:\x1b[0m".to_string(),
        format!("\x1b[1m{}\x1b[0m", format_currency(&totals.grand_total())),
    ));

    if totals.is_degraded() {
        rows.push((
            " \x1b[33mWarning:\x1b[0m".to_string(),
            "exchange rates unavailable, foreign amounts not converted".to_string(),
        ));
    }

    let label_width = rows
        .iter()
        .map(|(label, _)| visible_width(label))
        .max()
        .unwrap_or_default();

    for (label, value) in &rows {
        let pad = label_width.saturating_sub(visible_width(label));

        writeln!(out, "{:>pad$}{label}  {value}", "").map_err(|_err| SummaryError::IO)?;
    }

    writeln!(out).map_err(|_err| SummaryError::IO)
}

/// Wraps runs of box-drawing characters (U+2500..U+257F) in dark grey.
fn colorize_borders(table: &str) -> String {
    let mut out = String::with_capacity(table.len() + 256);
    let mut in_run = false;

    for ch in table.chars() {
        let box_char = ('\u{2500}'..='\u{257F}').contains(&ch);

        if box_char && !in_run {
            _ = out.write_str("\x1b[90m");
            in_run = true;
        } else if !box_char && in_run {
            _ = out.write_str("\x1b[0m");
            in_run = false;
        }

        out.push(ch);
    }

    if in_run {
        _ = out.write_str("\x1b[0m");
    }

    out
}

/// Width of a string ignoring ANSI escapes.
fn visible_width(s: &str) -> usize {
    let mut width = 0usize;
    let mut in_escape = false;

    for ch in s.chars() {
        if in_escape {
            in_escape = !ch.is_ascii_alphabetic();
        } else if ch == '\x1b' {
            in_escape = true;
        } else {
            width += 1;
        }
    }

    width
}
