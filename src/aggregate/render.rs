//! Text renderings of a crosstab: markdown, TSV and a terminal table.

use crate::models::{format_percent, ContingencyTable, Crosstab, PercentageTable, TOTAL_LABEL};

/// Markdown table of displayed percentages.
pub fn percentages_markdown(row_axis: &str, table: &PercentageTable) -> String {
    let header = std::iter::once(row_axis.to_string())
        .chain(table.col_labels.iter().cloned())
        .collect::<Vec<_>>();
    let rows = table
        .row_labels
        .iter()
        .zip(&table.values)
        .map(|(label, cells)| {
            std::iter::once(label.clone())
                .chain(cells.iter().map(|v| format_percent(*v)))
                .collect()
        })
        .collect::<Vec<_>>();
    markdown_table(&header, &rows)
}

/// Markdown table of raw counts.
pub fn counts_markdown(table: &ContingencyTable) -> String {
    let header = std::iter::once(table.row_axis.clone())
        .chain(table.col_labels.iter().cloned())
        .collect::<Vec<_>>();
    let rows = table
        .row_labels
        .iter()
        .zip(&table.counts)
        .map(|(label, cells)| {
            std::iter::once(label.clone())
                .chain(cells.iter().map(|n| n.to_string()))
                .collect()
        })
        .collect::<Vec<_>>();
    markdown_table(&header, &rows)
}

/// Both views as one markdown document.
pub fn crosstab_markdown(crosstab: &Crosstab) -> String {
    let counts = &crosstab.counts;
    format!(
        "## {} x {}\n\n### Percentages (row-wise)\n\n{}\n### Counts\n\n{}",
        counts.row_axis,
        counts.col_axis,
        percentages_markdown(&counts.row_axis, &crosstab.percentages),
        counts_markdown(counts)
    )
}

/// Tab-separated percentages in display form, for pasting into a spreadsheet.
pub fn percentages_tsv(row_axis: &str, table: &PercentageTable) -> String {
    let mut out = String::new();
    out.push_str(row_axis);
    for label in &table.col_labels {
        out.push('\t');
        out.push_str(label);
    }
    out.push('\n');
    for (label, cells) in table.row_labels.iter().zip(&table.values) {
        out.push_str(label);
        for v in cells {
            out.push('\t');
            out.push_str(&format_percent(*v));
        }
        out.push('\n');
    }
    out
}

/// Aligned plain-text table with `count (pct)` cells.
pub fn crosstab_text(crosstab: &Crosstab) -> String {
    let counts = &crosstab.counts;
    let pct = &crosstab.percentages;

    let mut grid: Vec<Vec<String>> = Vec::with_capacity(counts.row_labels.len() + 1);
    grid.push(
        std::iter::once(format!("{} \\ {}", counts.row_axis, counts.col_axis))
            .chain(counts.col_labels.iter().cloned())
            .collect(),
    );
    for (r, label) in counts.row_labels.iter().enumerate() {
        let mut line = vec![label.clone()];
        for c in 0..counts.col_labels.len() {
            let n = counts.counts[r][c];
            let p = pct.values.get(r).and_then(|row| row.get(c)).copied().unwrap_or(0.0);
            line.push(format!("{} ({})", n, format_percent(p)));
        }
        grid.push(line);
    }

    let widths: Vec<usize> = (0..grid[0].len())
        .map(|c| {
            grid.iter()
                .map(|line| line.get(c).map(|s| s.chars().count()).unwrap_or(0))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    for (i, line) in grid.iter().enumerate() {
        if i == grid.len() - 1 && counts.row_labels.last().map(String::as_str) == Some(TOTAL_LABEL) {
            let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
            out.push_str(rule.join("  ").trim_end());
            out.push('\n');
        }
        let cells: Vec<String> = line
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(c, (cell, w))| {
                let pad = w.saturating_sub(cell.chars().count());
                if c == 0 {
                    format!("{}{}", cell, " ".repeat(pad))
                } else {
                    format!("{}{}", " ".repeat(pad), cell)
                }
            })
            .collect();
        out.push_str(cells.join("  ").trim_end());
        out.push('\n');
    }
    out
}

/// Pipe table with a `---` separator line.
pub fn markdown_table(header: &[String], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    out.push_str(&format!("| {} |\n", header.join(" | ")));
    out.push_str(&format!(
        "| {} |\n",
        vec!["---"; header.len()].join(" | ")
    ));
    for row in rows {
        out.push_str(&format!("| {} |\n", row.join(" | ")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::row_percentages;

    fn sample() -> Crosstab {
        let counts = ContingencyTable {
            row_axis: "Gender".into(),
            col_axis: "Satisfaction".into(),
            row_labels: vec!["Male".into(), "Female".into(), "Total".into()],
            col_labels: vec!["Satisfied".into(), "Unsatisfied".into(), "Total".into()],
            counts: vec![vec![250, 40, 290], vec![150, 60, 210], vec![400, 100, 500]],
        };
        let percentages = row_percentages(&counts);
        Crosstab {
            counts,
            percentages,
        }
    }

    #[test]
    fn test_percentages_markdown() {
        let crosstab = sample();
        let md = percentages_markdown("Gender", &crosstab.percentages);
        let lines: Vec<&str> = md.lines().collect();
        assert_eq!(lines[0], "| Gender | Satisfied | Unsatisfied | Total |");
        assert_eq!(lines[1], "| --- | --- | --- | --- |");
        assert_eq!(lines[2], "| Male | 86.2% | 13.8% | 100.0% |");
        assert_eq!(lines[4], "| Total | 80.0% | 20.0% | 100.0% |");
    }

    #[test]
    fn test_tsv_uses_display_values() {
        let crosstab = sample();
        let tsv = percentages_tsv("Gender", &crosstab.percentages);
        assert!(tsv.starts_with("Gender\tSatisfied\tUnsatisfied\tTotal\n"));
        assert!(tsv.contains("Female\t71.4%\t28.6%\t100.0%\n"));
    }

    #[test]
    fn test_text_table_has_rule_before_total() {
        let text = crosstab_text(&sample());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[3].starts_with("------"));
        assert!(lines[4].starts_with("Total"));
        assert!(lines[1].contains("250 (86.2%)"));
    }

    #[test]
    fn test_crosstab_markdown_has_both_views() {
        let md = crosstab_markdown(&sample());
        assert!(md.contains("### Percentages"));
        assert!(md.contains("| Male | 250 | 40 | 290 |"));
    }
}
