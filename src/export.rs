//! 保存済みレコードのCSV出力

use std::fs::File;
use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::error::ScraperError;
use crate::product::ProductRecord;

/// ヘッダー行（常に出力）と1レコード1行で書き出す
pub fn write_csv(path: impl AsRef<Path>, records: &[ProductRecord]) -> Result<(), ScraperError> {
    let path = path.as_ref();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }

    let file = File::create(path)?;
    write_records(file, records)?;

    info!("Exported {} products to {:?}", records.len(), path);
    Ok(())
}

/// 任意の出力先に書き出す
pub fn write_records<W: Write>(writer: W, records: &[ProductRecord]) -> Result<(), ScraperError> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    wtr.write_record(ProductRecord::FIELD_NAMES)?;
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(url: &str, image: Option<&str>) -> ProductRecord {
        ProductRecord {
            product_name: "Seifenspender, weiß".to_string(),
            breadcrumb: None,
            variant: None,
            supplier_article_number: "ART-1".to_string(),
            ean_gtin: None,
            article_number: None,
            description: None,
            supplier: Some("igefa".to_string()),
            supplier_url: url.to_string(),
            image_url: image.map(str::to_string),
            manufacturer: None,
            additional_description: None,
            scraped_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_header_only_for_empty_export() {
        let mut out = Vec::new();
        write_records(&mut out, &[]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.trim_end(), ProductRecord::FIELD_NAMES.join(","));
    }

    #[test]
    fn test_rows_follow_header() {
        let mut out = Vec::new();
        write_records(
            &mut out,
            &[
                record("https://store.example.com/p/1", Some("https://cdn.example.com/1.jpg")),
                record("https://store.example.com/p/2", None),
            ],
        )
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("product_name,breadcrumb,variant"));
        assert!(lines[1].starts_with(
            "\"Seifenspender, weiß\",,,ART-1,,,,igefa,https://store.example.com/p/1,\
             https://cdn.example.com/1.jpg,,,2024-05-01T12:00:00"
        ));
        assert!(lines[2].contains("https://store.example.com/p/2,,,,2024-05-01T12:00:00"));
    }

    #[test]
    fn test_write_csv_creates_file() {
        let dir = std::env::temp_dir().join(format!("catalog-harvester-{}", std::process::id()));
        let path = dir.join("export").join("products.csv");

        write_csv(&path, &[record("https://store.example.com/p/9", None)]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
