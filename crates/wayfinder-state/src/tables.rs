//! redb table definitions for the Wayfinder cache store.

use redb::TableDefinition;

/// Whole documents keyed by a fixed name (e.g. `gateway-cache`).
pub const DOCUMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");
