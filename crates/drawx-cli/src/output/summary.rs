//! Per-document summary CSV.

use std::path::Path;

use drawx_core::OrderResult;

pub fn write_summary(path: &Path, order: &OrderResult) -> anyhow::Result<()> {
    let wtr = csv::Writer::from_path(path)?;
    write_records(wtr, order)?;
    Ok(())
}

fn write_records<W: std::io::Write>(mut wtr: csv::Writer<W>, order: &OrderResult) -> anyhow::Result<W> {
    wtr.write_record([
        "source",
        "status",
        "part_number",
        "material",
        "surface_treatment",
        "warnings",
        "error",
    ])?;

    for document in &order.documents {
        if let Some(item) = document.item() {
            wtr.write_record([
                document.source.as_str(),
                "success",
                item.part_number.as_deref().unwrap_or_default(),
                item.material.as_deref().unwrap_or_default(),
                item.surface_treatment.as_deref().unwrap_or_default(),
                &document.warnings().join(" | "),
                "",
            ])?;
        } else {
            let error = document.failure().map(|r| r.to_string()).unwrap_or_default();
            wtr.write_record([document.source.as_str(), "failed", "", "", "", "", &error])?;
        }
    }

    wtr.flush()?;
    wtr.into_inner().map_err(|e| anyhow::anyhow!("Failed to finish CSV: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::fixtures;

    #[test]
    fn test_summary_rows() {
        let data = write_records(csv::Writer::from_writer(vec![]), &fixtures::order()).unwrap();
        let data = String::from_utf8(data).unwrap();
        let lines: Vec<&str> = data.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "source,status,part_number,material,surface_treatment,warnings,error");
        assert_eq!(lines[1], "20250017,success,20250017,RVS 2 mm,,4x M6 (6H) tapped hole,");
        assert!(lines[2].starts_with("20250018,failed,,,,,"));
    }

    #[test]
    fn test_write_summary_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        write_summary(&path, &fixtures::order()).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("20250018,failed"));
    }
}
