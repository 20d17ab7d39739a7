use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Left-aligned columns separated by two spaces, with a dashed rule under
/// the header.
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    for line in render_table(headers, rows) {
        println!("{line}");
    }
}

fn render_table(headers: &[&str], rows: &[Vec<String>]) -> Vec<String> {
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            rows.iter()
                .filter_map(|row| row.get(i))
                .map(String::len)
                .fold(h.len(), usize::max)
        })
        .collect();

    let render = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{cell:w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(render(headers.to_vec()));
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in rows {
        lines.push(render(row.iter().map(String::as_str).collect()));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_fit_widest_cell() {
        let rows = vec![
            vec!["jp-gemma3".to_string(), "Modelfile".to_string(), "hello".to_string()],
            vec!["llama3:8b".to_string(), "models/Llama".to_string(), "-".to_string()],
        ];
        let lines = render_table(&["MODEL", "MODELFILE", "SMOKE PROMPT"], &rows);
        assert_eq!(lines[0], "MODEL      MODELFILE     SMOKE PROMPT");
        assert_eq!(lines[1], "---------  ------------  ------------");
        assert_eq!(lines[2], "jp-gemma3  Modelfile     hello");
        assert_eq!(lines[3], "llama3:8b  models/Llama  -");
    }

    #[test]
    fn empty_table_prints_header_only() {
        let lines = render_table(&["MODEL"], &[]);
        assert_eq!(lines, vec!["MODEL", "-----"]);
    }
}
