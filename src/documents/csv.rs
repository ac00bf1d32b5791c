use crate::errors::ServiceError;
use serde::{de::DeserializeOwned, Serialize};

/// Serializes `rows` as CSV with a header row taken from the record's field names.
pub fn write_records<T: Serialize>(rows: &[T]) -> Result<Vec<u8>, ServiceError> {
    let mut writer = ::csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| ServiceError::InternalError(format!("CSV flush failed: {}", e)))
}

/// Parses a CSV upload. Header names are matched to field names after trimming; blank cells
/// deserialize as `None` for optional fields.
pub fn read_records<T: DeserializeOwned>(data: &[u8]) -> Result<Vec<T>, ServiceError> {
    let mut reader = ::csv::ReaderBuilder::new()
        .trim(::csv::Trim::All)
        .flexible(false)
        .from_reader(data);

    let mut rows = Vec::new();
    for (index, record) in reader.deserialize::<T>().enumerate() {
        let row = record.map_err(|e| {
            ServiceError::InvalidInput(format!("Malformed CSV at row {}: {}", index + 2, e))
        })?;
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Row {
        name: String,
        quantity: i32,
        note: Option<String>,
    }

    #[test]
    fn writes_header_and_quotes_commas() {
        let out = write_records(&[Row {
            name: "Acetone, technical".into(),
            quantity: 4,
            note: None,
        }])
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "name,quantity,note\n\"Acetone, technical\",4,\n");
    }

    #[test]
    fn reads_trimmed_rows_with_blank_optionals() {
        let rows: Vec<Row> =
            read_records(b"name , quantity,note\nToluene, 12 ,\nXylene,3,fragile\n").unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Toluene");
        assert_eq!(rows[0].quantity, 12);
        assert_eq!(rows[0].note, None);
        assert_eq!(rows[1].note.as_deref(), Some("fragile"));
    }

    #[test]
    fn reports_row_of_bad_value() {
        let err = read_records::<Row>(b"name,quantity,note\nToluene,many,\n").unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(msg) if msg.contains("row 2")));
    }
}
