//! Output of a dashboard refresh. The computation never depends on this module.

use anyhow::Result;
use std::io::Write;

use crate::dashboard::DashboardView;
use crate::exposure::NotionalStatus;

pub trait Render {
    fn render(&mut self, view: &DashboardView) -> Result<()>;
}

/// `$1,234.56`, `-$200,000.00`
pub fn format_usd(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let dollars = (cents / 100).to_string();

    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
    for (i, c) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}${grouped}.{:02}", cents % 100)
}

/// The notional line, e.g. `$450,000.00 (Manual)` or `Price Not Set`.
pub fn notional_display(view: &DashboardView) -> String {
    let amount = format_usd(view.result.total_notional);
    let suffix = view
        .source_label
        .as_deref()
        .map(|label| format!(" {label}"))
        .unwrap_or_default();

    match view.status {
        NotionalStatus::NoPositions => amount,
        NotionalStatus::Unpriced { .. } => "Price Not Set".to_string(),
        NotionalStatus::Partial { unresolved, total } => {
            format!("{amount}{suffix} ({unresolved} of {total} positions unpriced)")
        }
        NotionalStatus::Priced => format!("{amount}{suffix}"),
    }
}

/// Plain-text report.
pub struct TerminalRenderer<W: Write> {
    out: W,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn get_ref(&self) -> &W {
        &self.out
    }
}

impl<W: Write> Render for TerminalRenderer<W> {
    fn render(&mut self, view: &DashboardView) -> Result<()> {
        let out = &mut self.out;
        writeln!(out, "Account:        {}", view.account_number)?;
        writeln!(out, "Net Liq:        {}", format_usd(view.net_liquidating_value))?;
        writeln!(out, "Notional Value: {}", notional_display(view))?;
        writeln!(out, "Leverage:       {:.2}x", view.result.leverage)?;
        writeln!(out, "Net Position:   {}", view.net_position)?;
        writeln!(out, "Risk:           {}", view.result.risk.label)?;

        if !view.exposure.lines.is_empty() {
            writeln!(out, "Positions:")?;
        }
        for line in &view.exposure.lines {
            let underlying = line.underlying.as_deref().unwrap_or(&line.root);
            write!(out, "  {} ({}) Qty: {}", line.symbol, underlying, line.quantity)?;
            match (line.price, line.source) {
                (Some(price), Some(source)) => writeln!(
                    out,
                    "  @ {:.2} x {} = {} [{}]",
                    price,
                    line.size,
                    format_usd(line.notional),
                    source
                )?,
                _ => writeln!(out, "  price not set")?,
            }
        }

        writeln!(out, "As of {}", view.as_of.format("%Y-%m-%d %H:%M:%S UTC"))?;
        out.flush()?;
        Ok(())
    }
}

/// The whole view as one JSON document.
pub struct JsonRenderer<W: Write> {
    out: W,
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn get_ref(&self) -> &W {
        &self.out
    }
}

impl<W: Write> Render for JsonRenderer<W> {
    fn render(&mut self, view: &DashboardView) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.out, view)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}
