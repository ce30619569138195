//! Tables whose rows continue across a page boundary.

use crate::types::TableGrid;

/// Header rows are structurally equal: same column count, same strings, same order.
pub fn headers_match(a: &TableGrid, b: &TableGrid) -> bool {
    a.headers.len() == b.headers.len() && a.headers == b.headers
}

/// Merge runs of adjacent tables with matching headers.
///
/// `tables` must be in page order. A merged table keeps the bbox, page number,
/// headers and nested columns of the first table of its run; rows and cells are
/// concatenated in order.
pub fn merge_continuation_tables(tables: Vec<TableGrid>) -> Vec<TableGrid> {
    let mut merged: Vec<TableGrid> = Vec::with_capacity(tables.len());

    for table in tables {
        match merged.last_mut() {
            Some(current) if headers_match(current, &table) => {
                tracing::debug!(
                    from_page = current.page_number,
                    continued_on = table.page_number,
                    rows = table.rows.len(),
                    "Merging continuation table"
                );
                current.rows.extend(table.rows);
                current.cells.extend(table.cells);
            }
            _ => merged.push(table),
        }
    }

    merged
}
