use crate::application::repos::StoreError;

pub fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::ColumnDecode { index, source } => {
            StoreError::Decode(format!("column {index}: {source}"))
        }
        sqlx::Error::Decode(source) => StoreError::Decode(source.to_string()),
        sqlx::Error::Database(db) if db.message().contains("no such table") => {
            StoreError::Query(format!("{} (has `amberlink migrate` been run?)", db.message()))
        }
        other => StoreError::query(other),
    }
}
