//! Shared fixtures for unit tests.

use crate::catalog::{
    CheckConstraintDescriptor, ForeignKeyDescriptor, TableDescriptor,
};

/// A `books` table: single-column PK, one FK, one check constraint, one
/// column excluded from DML.
pub(crate) fn books_descriptor() -> TableDescriptor {
    TableDescriptor {
        name: "books".to_string(),
        base_schema: "public".to_string(),
        staging_schema: "staging".to_string(),
        columns: vec![
            "book_id".to_string(),
            "book_title".to_string(),
            "genre".to_string(),
            "notes".to_string(),
        ],
        dml_columns: vec![
            "book_id".to_string(),
            "book_title".to_string(),
            "genre".to_string(),
        ],
        primary_key: vec!["book_id".to_string()],
        not_null_columns: vec!["book_title".to_string(), "genre".to_string()],
        foreign_keys: vec![ForeignKeyDescriptor {
            name: "books_genre_fkey".to_string(),
            columns: vec!["genre".to_string()],
            ref_schema: "public".to_string(),
            ref_table: "genres".to_string(),
            ref_columns: vec!["genre".to_string()],
        }],
        check_constraints: vec![CheckConstraintDescriptor {
            name: "books_title_check".to_string(),
            expression: "length(book_title) > 0".to_string(),
        }],
    }
}

/// A `book_authors` link table: composite PK covering every column, two FKs,
/// no check constraints.
pub(crate) fn book_authors_descriptor() -> TableDescriptor {
    TableDescriptor {
        name: "book_authors".to_string(),
        base_schema: "public".to_string(),
        staging_schema: "staging".to_string(),
        columns: vec!["book_id".to_string(), "author_id".to_string()],
        dml_columns: vec!["book_id".to_string(), "author_id".to_string()],
        primary_key: vec!["book_id".to_string(), "author_id".to_string()],
        not_null_columns: vec![],
        foreign_keys: vec![
            ForeignKeyDescriptor {
                name: "book_authors_book_id_fkey".to_string(),
                columns: vec!["book_id".to_string()],
                ref_schema: "public".to_string(),
                ref_table: "books".to_string(),
                ref_columns: vec!["book_id".to_string()],
            },
            ForeignKeyDescriptor {
                name: "book_authors_author_id_fkey".to_string(),
                columns: vec!["author_id".to_string()],
                ref_schema: "public".to_string(),
                ref_table: "authors".to_string(),
                ref_columns: vec!["author_id".to_string()],
            },
        ],
        check_constraints: vec![],
    }
}

/// A `logs` table without a primary key.
pub(crate) fn no_pk_descriptor() -> TableDescriptor {
    TableDescriptor {
        name: "logs".to_string(),
        base_schema: "public".to_string(),
        staging_schema: "staging".to_string(),
        columns: vec!["logged_at".to_string(), "message".to_string()],
        dml_columns: vec!["logged_at".to_string(), "message".to_string()],
        primary_key: vec![],
        not_null_columns: vec!["message".to_string()],
        foreign_keys: vec![],
        check_constraints: vec![],
    }
}
