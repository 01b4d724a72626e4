//! The single row shape this engine knows how to store: a schema-catalog record describing
//! a table or an index, keyed by `rowid`.
use crate::errors::{err, Error};

pub const TYPE_SIZE: usize = 16;
pub const NAME_SIZE: usize = 64;
pub const TBL_NAME_SIZE: usize = 64;
pub const SQL_SIZE: usize = 256;

const ROWID_SIZE: usize = 4;
const ROOT_PAGE_SIZE: usize = 4;

/// `ROWID | TYPE | NAME | TBL_NAME | ROOT_PAGE | SQL`, little-endian integers, null-padded text.
pub const ROW_SIZE: usize =
    ROWID_SIZE + TYPE_SIZE + NAME_SIZE + TBL_NAME_SIZE + ROOT_PAGE_SIZE + SQL_SIZE;

const ROWID_OFFSET: usize = 0;
const TYPE_OFFSET: usize = ROWID_OFFSET + ROWID_SIZE;
const NAME_OFFSET: usize = TYPE_OFFSET + TYPE_SIZE;
const TBL_NAME_OFFSET: usize = NAME_OFFSET + NAME_SIZE;
const ROOT_PAGE_OFFSET: usize = TBL_NAME_OFFSET + TBL_NAME_SIZE;
const SQL_OFFSET: usize = ROOT_PAGE_OFFSET + ROOT_PAGE_SIZE;

/// A catalog row: one table or index definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRow {
    pub rowid: u32,
    pub kind: String,
    pub name: String,
    pub tbl_name: String,
    pub root_page: u32,
    pub sql: String,
}

impl SchemaRow {
    pub fn new(
        kind: impl Into<String>,
        name: impl Into<String>,
        tbl_name: impl Into<String>,
        sql: impl Into<String>,
    ) -> Self {
        SchemaRow {
            rowid: 0,
            kind: kind.into(),
            name: name.into(),
            tbl_name: tbl_name.into(),
            root_page: 0,
            sql: sql.into(),
        }
    }
}

fn write_text(dest: &mut [u8], field: &str, cap: usize) -> Result<(), Error> {
    let bytes = field.as_bytes();
    if bytes.len() >= cap {
        return Err(err!(Prepare, "String is too long."));
    }
    dest[..bytes.len()].copy_from_slice(bytes);
    dest[bytes.len()..cap].fill(0);
    Ok(())
}

fn read_text(src: &[u8]) -> String {
    let end = src.iter().position(|&b| b == 0).unwrap_or(src.len());
    String::from_utf8_lossy(&src[..end]).into_owned()
}

/// Serializes `row` into `dest`, which must be at least `ROW_SIZE` bytes long.
pub fn serialize(row: &SchemaRow, dest: &mut [u8]) -> Result<(), Error> {
    if dest.len() < ROW_SIZE {
        return Err(err!(Corrupt, "row buffer too small: {} < {}", dest.len(), ROW_SIZE));
    }
    dest[ROWID_OFFSET..ROWID_OFFSET + ROWID_SIZE].copy_from_slice(&row.rowid.to_le_bytes());
    write_text(&mut dest[TYPE_OFFSET..TYPE_OFFSET + TYPE_SIZE], &row.kind, TYPE_SIZE)?;
    write_text(&mut dest[NAME_OFFSET..NAME_OFFSET + NAME_SIZE], &row.name, NAME_SIZE)?;
    write_text(
        &mut dest[TBL_NAME_OFFSET..TBL_NAME_OFFSET + TBL_NAME_SIZE],
        &row.tbl_name,
        TBL_NAME_SIZE,
    )?;
    dest[ROOT_PAGE_OFFSET..ROOT_PAGE_OFFSET + ROOT_PAGE_SIZE]
        .copy_from_slice(&row.root_page.to_le_bytes());
    write_text(&mut dest[SQL_OFFSET..SQL_OFFSET + SQL_SIZE], &row.sql, SQL_SIZE)?;
    Ok(())
}

/// Deserializes a `SchemaRow` out of `src`, which must be at least `ROW_SIZE` bytes long.
pub fn deserialize(src: &[u8]) -> Result<SchemaRow, Error> {
    if src.len() < ROW_SIZE {
        return Err(err!(Corrupt, "row buffer too small: {} < {}", src.len(), ROW_SIZE));
    }
    let rowid = u32::from_le_bytes(src[ROWID_OFFSET..ROWID_OFFSET + ROWID_SIZE].try_into().unwrap());
    let root_page = u32::from_le_bytes(
        src[ROOT_PAGE_OFFSET..ROOT_PAGE_OFFSET + ROOT_PAGE_SIZE]
            .try_into()
            .unwrap(),
    );
    Ok(SchemaRow {
        rowid,
        kind: read_text(&src[TYPE_OFFSET..TYPE_OFFSET + TYPE_SIZE]),
        name: read_text(&src[NAME_OFFSET..NAME_OFFSET + NAME_SIZE]),
        tbl_name: read_text(&src[TBL_NAME_OFFSET..TBL_NAME_OFFSET + TBL_NAME_SIZE]),
        root_page,
        sql: read_text(&src[SQL_OFFSET..SQL_OFFSET + SQL_SIZE]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_row() {
        let row = SchemaRow {
            rowid: 7,
            kind: "table".into(),
            name: "users".into(),
            tbl_name: "users".into(),
            root_page: 3,
            sql: "CREATE TABLE users (id int)".into(),
        };
        let mut buf = vec![0u8; ROW_SIZE];
        serialize(&row, &mut buf).unwrap();
        assert_eq!(deserialize(&buf).unwrap(), row);
    }

    #[test]
    fn rejects_oversized_text_fields() {
        let row = SchemaRow::new("table", "x".repeat(NAME_SIZE), "t", "sql");
        let mut buf = vec![0u8; ROW_SIZE];
        assert!(serialize(&row, &mut buf).is_err());
    }

    #[test]
    fn trims_at_first_nul_even_when_field_is_full() {
        let mut buf = vec![0u8; ROW_SIZE];
        buf[TYPE_OFFSET..TYPE_OFFSET + TYPE_SIZE].copy_from_slice(&[b'x'; TYPE_SIZE]);
        let row = deserialize(&buf).unwrap();
        assert_eq!(row.kind, "x".repeat(TYPE_SIZE));
    }
}
