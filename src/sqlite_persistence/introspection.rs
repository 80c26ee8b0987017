use rusqlite::{params, Connection};
use std::fmt;

#[macro_export]
macro_rules! sqlite_column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            // Allow unused_mut because the variable is only mutated when optional
            // field assignments are passed to the macro (e.g., `is_primary_key = true`)
            #[allow(unused_mut)]
            let mut column = Column {
                name: $name,
                sql_type: $sql_type,
                is_primary_key: false,
                non_null: false,
            };
            $(
                column.$field = $value;
            )*
            column
        }
    };
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SqlType {
    Text,
    Integer,
    Real,
    Blob,
}

impl SqlType {
    fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Blob => "BLOB",
        }
    }
}

/// A column of a table layout known ahead of time.
pub struct Column {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub is_primary_key: bool,
    pub non_null: bool,
}

/// Static description of a table, used to build databases with a given layout.
pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub indices: &'static [(&'static str, &'static str)],
}

impl Table {
    pub fn create(&self, conn: &Connection) -> rusqlite::Result<()> {
        let mut create_sql = format!("CREATE TABLE {} (", quote_identifier(self.name));
        for (column_index, column) in self.columns.iter().enumerate() {
            if column_index > 0 {
                create_sql.push_str(", ");
            }
            create_sql.push_str(&format!(
                "{} {}",
                quote_identifier(column.name),
                column.sql_type.as_sql()
            ));
            if column.is_primary_key {
                create_sql.push_str(" PRIMARY KEY");
            }
            if column.non_null {
                create_sql.push_str(" NOT NULL");
            }
        }
        create_sql.push_str(");");
        conn.execute(&create_sql, params![])?;

        for (index_name, column_name) in self.indices {
            conn.execute(
                &format!(
                    "CREATE INDEX {} ON {}({});",
                    quote_identifier(index_name),
                    quote_identifier(self.name),
                    quote_identifier(column_name)
                ),
                params![],
            )?;
        }
        Ok(())
    }
}

/// Quotes an identifier so that foreign table names can be interpolated into SQL.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// A column as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    pub name: String,
    /// Declared type, as written in the CREATE statement. Often empty in
    /// databases written by dynamic ORMs.
    pub declared_type: String,
    pub is_primary_key: bool,
    pub non_null: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    pub name: String,
    pub columns: Vec<ColumnLayout>,
    pub row_count: i64,
}

impl TableLayout {
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Case-insensitive column lookup, returning the name as stored.
    pub fn column(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .map(|c| c.name.as_str())
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

impl fmt::Display for TableLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.column_names().join(", "))
    }
}

/// Every user table of a database, in name order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DatabaseLayout {
    pub tables: Vec<TableLayout>,
}

impl DatabaseLayout {
    pub fn read(conn: &Connection) -> rusqlite::Result<Self> {
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )?;
        let table_names = stmt
            .query_map(params![], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut tables = Vec::with_capacity(table_names.len());
        for name in table_names {
            let mut stmt =
                conn.prepare(&format!("PRAGMA table_info({});", quote_identifier(&name)))?;
            let columns = stmt
                .query_map(params![], |row| {
                    Ok(ColumnLayout {
                        name: row.get(1)?,
                        declared_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                        non_null: row.get::<_, i32>(3)? == 1,
                        is_primary_key: row.get::<_, i32>(5)? > 0,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let row_count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", quote_identifier(&name)),
                params![],
                |row| row.get(0),
            )?;

            tables.push(TableLayout {
                name,
                columns,
                row_count,
            });
        }

        Ok(DatabaseLayout { tables })
    }

    /// Case-insensitive table lookup.
    pub fn table(&self, name: &str) -> Option<&TableLayout> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }
}

impl fmt::Display for DatabaseLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tables.is_empty() {
            return write!(f, "<no tables>");
        }
        let described: Vec<String> = self.tables.iter().map(|t| t.to_string()).collect();
        write!(f, "{}", described.join(", "))
    }
}
