//! Entity catalog.
//!
//! Every table the API exposes is described by a static [`TableSpec`]: its
//! columns (API name, storage name, kind, write rules) and the relations that
//! can be eager-loaded. Criteria, projections, and mutation bodies resolve
//! names only through this registry.

mod tables;
mod value;

pub use tables::{ALL_TABLES, COMPLAINTS, EXPENSES, FLATS, LEDGER_ENTRIES, RESIDENTS, lookup};
pub use value::Operand;
pub(crate) use value::json_text;

use crate::error::{AppError, AppResult};

/// Storage type of a column, used to parse and compare values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Uuid,
    Text,
    Integer,
    Decimal,
    Date,
    Timestamp,
    Boolean,
    /// Text restricted to a fixed set of values.
    Enum(&'static [&'static str]),
}

impl ColumnKind {
    /// Whether pattern operators can run directly on the column without a cast.
    pub fn is_textual(&self) -> bool {
        matches!(self, ColumnKind::Text | ColumnKind::Enum(_))
    }
}

/// Who sets a column's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Managed {
    /// Supplied by API callers.
    Caller,
    /// Primary key, generated on insert.
    Id,
    /// Set to the current time on insert.
    CreatedAt,
    /// Set to the current time on insert and on every update.
    UpdatedAt,
    /// Derived by the service layer (e.g. running balances).
    Derived,
}

/// A column of an exposed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// API name (camelCase), used as the JSON key in rows.
    pub field: &'static str,
    /// Storage name (snake_case).
    pub name: &'static str,
    pub kind: ColumnKind,
    pub required: bool,
    pub unique: bool,
    pub managed: Managed,
    /// Table this column references, if it is a foreign key.
    pub references: Option<&'static str>,
    /// Default applied on insert when the caller omits the column.
    pub default: Option<&'static str>,
}

impl Column {
    pub const fn new(field: &'static str, name: &'static str, kind: ColumnKind) -> Self {
        Self {
            field,
            name,
            kind,
            required: false,
            unique: false,
            managed: Managed::Caller,
            references: None,
            default: None,
        }
    }

    pub const fn id() -> Self {
        Self::new("id", "id", ColumnKind::Uuid).managed(Managed::Id)
    }

    pub const fn created_at() -> Self {
        Self::new("createdAt", "created_at", ColumnKind::Timestamp).managed(Managed::CreatedAt)
    }

    pub const fn updated_at() -> Self {
        Self::new("updatedAt", "updated_at", ColumnKind::Timestamp).managed(Managed::UpdatedAt)
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub const fn managed(mut self, managed: Managed) -> Self {
        self.managed = managed;
        self
    }

    pub const fn references(mut self, table: &'static str) -> Self {
        self.references = Some(table);
        self
    }

    pub const fn default(mut self, value: &'static str) -> Self {
        self.default = Some(value);
        self
    }

    /// Whether callers may set this column in a mutation body.
    pub fn is_writable(&self) -> bool {
        self.managed == Managed::Caller
    }
}

/// Whether a relation attaches one row or a list of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// An eager-loadable relation from one table to another.
#[derive(Debug, Clone, Copy)]
pub struct Relation {
    /// Key under which related rows are attached.
    pub name: &'static str,
    /// Target table name.
    pub target: &'static str,
    /// API name of the binding column on the source table.
    pub local: &'static str,
    /// API name of the binding column on the target table.
    pub foreign: &'static str,
    pub cardinality: Cardinality,
}

impl Relation {
    pub const fn one(
        name: &'static str,
        target: &'static str,
        local: &'static str,
        foreign: &'static str,
    ) -> Self {
        Self {
            name,
            target,
            local,
            foreign,
            cardinality: Cardinality::One,
        }
    }

    pub const fn many(
        name: &'static str,
        target: &'static str,
        local: &'static str,
        foreign: &'static str,
    ) -> Self {
        Self {
            name,
            target,
            local,
            foreign,
            cardinality: Cardinality::Many,
        }
    }
}

/// Static description of an exposed table.
#[derive(Debug)]
pub struct TableSpec {
    /// Storage table name.
    pub name: &'static str,
    /// Singular label used in messages ("flat", "ledger entry").
    pub label: &'static str,
    pub columns: &'static [Column],
    pub relations: &'static [Relation],
}

impl TableSpec {
    /// Resolve a column by its API name or its storage name.
    ///
    /// Only exact matches are accepted; anything else is an
    /// [`AppError::UnknownColumn`].
    pub fn resolve(&'static self, name: &str) -> AppResult<&'static Column> {
        self.columns
            .iter()
            .find(|c| c.field == name || c.name == name)
            .ok_or_else(|| AppError::UnknownColumn {
                table: self.name.to_string(),
                column: name.to_string(),
            })
    }

    /// Look up a column by API name.
    pub fn column(&'static self, field: &str) -> Option<&'static Column> {
        self.columns.iter().find(|c| c.field == field)
    }

    /// Resolve a relation by name.
    pub fn relation(&'static self, name: &str) -> AppResult<&'static Relation> {
        self.relations
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| AppError::UnknownRelation {
                table: self.name.to_string(),
                relation: name.to_string(),
            })
    }

    /// The primary key column.
    pub fn primary_key(&'static self) -> &'static Column {
        self.columns
            .iter()
            .find(|c| c.managed == Managed::Id)
            .unwrap_or(&self.columns[0])
    }

    /// Permission string required to mutate rows of this table.
    pub fn write_permission(&self) -> String {
        format!("{}.write", self.name)
    }
}
