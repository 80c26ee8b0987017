mod introspection;

pub use introspection::{
    quote_identifier, Column, ColumnLayout, DatabaseLayout, SqlType, Table, TableLayout,
};
