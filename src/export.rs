//! Columnar export: one CSV file per persisted table, with declared column types in the header.
//!
//! Header cells are `name:TYPE` (e.g. `schedule_id:INTEGER`), so downstream loaders get column
//! types without a sidecar file. Values are rendered as SQLite reports them; NULL becomes an
//! empty cell.

use std::path::Path;

use rusqlite::types::ValueRef;

use crate::{error::Result, store::Store, store::schema::EXPORT_TABLES};

/// Summary of one exported table.
#[derive(Clone, PartialEq, Debug)]
pub struct TableExport {
    /// Table name, which is also the file stem.
    pub table: String,
    /// Rows written (excluding the header).
    pub rows: u64,
}

/// Export every persisted table to `out_dir`, creating it if needed. Returns one summary per
/// table, in schema order.
pub fn export_all(store: &Store, out_dir: &Path) -> Result<Vec<TableExport>> {
    std::fs::create_dir_all(out_dir)?;

    let mut summaries = Vec::with_capacity(EXPORT_TABLES.len());
    for (table, columns) in EXPORT_TABLES {
        let rows = export_table(store, out_dir, table, columns)?;
        log::info!("exported {rows} row(s) from {table}");
        summaries.push(TableExport {
            table: (*table).to_string(),
            rows,
        });
    }

    Ok(summaries)
}

fn export_table(store: &Store, out_dir: &Path, table: &str, columns: &[(&str, &str)]) -> Result<u64> {
    let mut writer = csv::Writer::from_path(out_dir.join(format!("{table}.csv"))).map_err(crate::error::Error::from)?;

    let header: Vec<String> = columns
        .iter()
        .map(|(name, declared_type)| format!("{name}:{declared_type}"))
        .collect();
    writer.write_record(&header)?;

    let column_list: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
    let sql = format!("SELECT {} FROM {table}", column_list.join(", "));

    let mut stmt = store.connection().prepare(&sql)?;
    let mut rows = stmt.query([])?;

    let mut written = 0u64;
    while let Some(row) = rows.next()? {
        let record: Vec<String> = (0..columns.len())
            .map(|index| cell_text(row.get_ref(index)))
            .collect::<rusqlite::Result<_>>()?;
        writer.write_record(&record)?;
        written += 1;
    }

    writer.flush()?;
    Ok(written)
}

fn cell_text(value: rusqlite::Result<ValueRef<'_>>) -> rusqlite::Result<String> {
    Ok(match value? {
        ValueRef::Null => String::new(),
        ValueRef::Integer(integer) => integer.to_string(),
        ValueRef::Real(real) => real.to_string(),
        ValueRef::Text(text) => String::from_utf8_lossy(text).into_owned(),
        ValueRef::Blob(blob) => String::from_utf8_lossy(blob).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::store::records::{LeagueUpdate, now_timestamp};
    use crate::tests::asserts::*;

    use super::*;

    #[test]
    fn exports_one_file_per_table_with_typed_headers() {
        let store = Store::open_in_memory().unwrap();
        let _ = store
            .upsert_league(
                1558,
                &LeagueUpdate {
                    name: "The OBRL".into(),
                    url: "https://host/league_series.php?league_id=1558".into(),
                    scraped_at: now_timestamp(),
                    description: Some("desc".into()),
                },
            )
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let summaries = export_all(&store, dir.path()).unwrap();

        assert_eq!(summaries.len(), EXPORT_TABLES.len());
        assert_eq!(summaries[0].table, "leagues");
        assert_eq!(summaries[0].rows, 1);

        let leagues_csv = std::fs::read_to_string(dir.path().join("leagues.csv")).unwrap();
        let mut lines = leagues_csv.lines();
        let header = lines.next().unwrap();
        assert_true!(header.starts_with("league_id:INTEGER,name:TEXT"));
        let row = lines.next().unwrap();
        assert_true!(row.starts_with("1558,The OBRL,desc,"));

        // Empty tables still produce a file with the typed header.
        let races_csv = std::fs::read_to_string(dir.path().join("races.csv")).unwrap();
        assert_eq!(races_csv.lines().count(), 1);
    }
}
