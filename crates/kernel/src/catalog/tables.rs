//! Column registries for every exposed table.

use super::{Column, ColumnKind, Managed, Relation, TableSpec};

const OCCUPANCY: &[&str] = &["occupied", "vacant"];
const RESIDENT_TYPES: &[&str] = &["owner", "tenant"];
const EXPENSE_STATUS: &[&str] = &["pending", "paid"];
const PRIORITIES: &[&str] = &["low", "medium", "high"];
const COMPLAINT_STATUS: &[&str] = &["open", "in_progress", "resolved", "closed"];
pub(crate) const ENTRY_TYPES: &[&str] = &["credit", "debit"];
pub(crate) const ENTRY_STATUS: &[&str] = &["pending", "completed", "cancelled"];

pub static FLATS: TableSpec = TableSpec {
    name: "flats",
    label: "flat",
    columns: &[
        Column::id(),
        Column::new("flatNumber", "flat_number", ColumnKind::Text)
            .required()
            .unique(),
        Column::new("floorNumber", "floor_number", ColumnKind::Integer).required(),
        Column::new("block", "block", ColumnKind::Text),
        Column::new("flatType", "flat_type", ColumnKind::Text),
        Column::new("areaSqft", "area_sqft", ColumnKind::Decimal),
        Column::new(
            "occupancyStatus",
            "occupancy_status",
            ColumnKind::Enum(OCCUPANCY),
        )
        .default("vacant"),
        Column::new(
            "maintenanceAmount",
            "maintenance_amount",
            ColumnKind::Decimal,
        ),
        Column::created_at(),
        Column::updated_at(),
    ],
    relations: &[
        Relation::many("residents", "residents", "id", "flatId"),
        Relation::many("complaints", "complaints", "id", "flatId"),
        Relation::many("ledgerEntries", "ledger_entries", "id", "flatId"),
    ],
};

pub static RESIDENTS: TableSpec = TableSpec {
    name: "residents",
    label: "resident",
    columns: &[
        Column::id(),
        Column::new("flatId", "flat_id", ColumnKind::Uuid)
            .required()
            .references("flats"),
        Column::new("name", "name", ColumnKind::Text).required(),
        Column::new("email", "email", ColumnKind::Text).unique(),
        Column::new("phone", "phone", ColumnKind::Text),
        Column::new(
            "residentType",
            "resident_type",
            ColumnKind::Enum(RESIDENT_TYPES),
        )
        .required(),
        Column::new("moveInDate", "move_in_date", ColumnKind::Date),
        Column::new("isActive", "is_active", ColumnKind::Boolean).default("true"),
        Column::created_at(),
        Column::updated_at(),
    ],
    relations: &[
        Relation::one("flat", "flats", "flatId", "id"),
        Relation::many("complaints", "complaints", "id", "residentId"),
    ],
};

pub static EXPENSES: TableSpec = TableSpec {
    name: "expenses",
    label: "expense",
    columns: &[
        Column::id(),
        Column::new("category", "category", ColumnKind::Text).required(),
        Column::new("description", "description", ColumnKind::Text),
        Column::new("amount", "amount", ColumnKind::Decimal).required(),
        Column::new("expenseDate", "expense_date", ColumnKind::Date).required(),
        Column::new("paidBy", "paid_by", ColumnKind::Text),
        Column::new("vendor", "vendor", ColumnKind::Text),
        Column::new("status", "status", ColumnKind::Enum(EXPENSE_STATUS)).default("pending"),
        Column::created_at(),
        Column::updated_at(),
    ],
    relations: &[],
};

pub static COMPLAINTS: TableSpec = TableSpec {
    name: "complaints",
    label: "complaint",
    columns: &[
        Column::id(),
        Column::new("flatId", "flat_id", ColumnKind::Uuid)
            .required()
            .references("flats"),
        Column::new("residentId", "resident_id", ColumnKind::Uuid).references("residents"),
        Column::new("title", "title", ColumnKind::Text).required(),
        Column::new("description", "description", ColumnKind::Text),
        Column::new("category", "category", ColumnKind::Text),
        Column::new("priority", "priority", ColumnKind::Enum(PRIORITIES)).default("medium"),
        Column::new("status", "status", ColumnKind::Enum(COMPLAINT_STATUS)).default("open"),
        Column::new("resolvedAt", "resolved_at", ColumnKind::Timestamp),
        Column::created_at(),
        Column::updated_at(),
    ],
    relations: &[
        Relation::one("flat", "flats", "flatId", "id"),
        Relation::one("resident", "residents", "residentId", "id"),
    ],
};

pub static LEDGER_ENTRIES: TableSpec = TableSpec {
    name: "ledger_entries",
    label: "ledger entry",
    columns: &[
        Column::id(),
        Column::new("transactionDate", "transaction_date", ColumnKind::Date).required(),
        Column::new("entryType", "entry_type", ColumnKind::Enum(ENTRY_TYPES)).required(),
        Column::new("category", "category", ColumnKind::Text),
        Column::new("flatId", "flat_id", ColumnKind::Uuid).references("flats"),
        Column::new("residentId", "resident_id", ColumnKind::Uuid).references("residents"),
        Column::new("paidBy", "paid_by", ColumnKind::Text),
        Column::new("description", "description", ColumnKind::Text),
        Column::new("paymentMode", "payment_mode", ColumnKind::Text),
        Column::new("amount", "amount", ColumnKind::Decimal).required(),
        Column::new("runningBalance", "running_balance", ColumnKind::Decimal)
            .managed(Managed::Derived)
            .default("0"),
        Column::new("status", "status", ColumnKind::Enum(ENTRY_STATUS)).default("completed"),
        Column::created_at(),
    ],
    relations: &[
        Relation::one("flat", "flats", "flatId", "id"),
        Relation::one("resident", "residents", "residentId", "id"),
    ],
};

/// Every exposed table.
pub static ALL_TABLES: &[&TableSpec] = &[&FLATS, &RESIDENTS, &EXPENSES, &COMPLAINTS, &LEDGER_ENTRIES];

/// Find a table by storage name.
pub fn lookup(name: &str) -> Option<&'static TableSpec> {
    ALL_TABLES.iter().copied().find(|t| t.name == name)
}
