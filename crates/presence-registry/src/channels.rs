//! Channel naming.
//!
//! Channel names partition presence traffic by resource and purpose, in the
//! shape `{resourceType}:{resourceId}[:{subResourceId}]:{purpose}`. They
//! are pure functions of resource ids so any process derives the same name
//! without coordination.

/// Active-cell cursors within a table.
pub fn cell_presence(table_id: &str) -> String {
    format!("table:{table_id}:cellPresence")
}

/// Connected collaborator list for a table.
pub fn collaborators(table_id: &str) -> String {
    format!("table:{table_id}:collaborators")
}

/// Live row count for a view.
pub fn row_count(table_id: &str, view_id: &str) -> String {
    format!("table:{table_id}:{view_id}:rowCount")
}

/// Live aggregation results for a view.
pub fn aggregation(table_id: &str, view_id: &str) -> String {
    format!("table:{table_id}:{view_id}:aggregation")
}

/// Live group-by breakpoints for a view.
pub fn group_points(table_id: &str, view_id: &str) -> String {
    format!("table:{table_id}:{view_id}:groupPoints")
}

/// High-level action notifications for a table (add record, filter change,
/// …) that tell polling clients whether to re-fetch.
pub fn action_trigger(table_id: &str) -> String {
    format!("table:{table_id}:actionTrigger")
}

/// Committed-op notifications for one document.
pub fn doc_ops(collection: &str, doc_id: &str) -> String {
    format!("{collection}:{doc_id}:ops")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_deterministic() {
        // Any process must compute the same channel from ids alone
        assert_eq!(cell_presence("tbl1"), cell_presence("tbl1"));
        assert_eq!(row_count("tbl1", "viw1"), row_count("tbl1", "viw1"));
    }

    #[test]
    fn test_name_shapes() {
        assert_eq!(cell_presence("tbl1"), "table:tbl1:cellPresence");
        assert_eq!(collaborators("tbl1"), "table:tbl1:collaborators");
        assert_eq!(row_count("tbl1", "viw1"), "table:tbl1:viw1:rowCount");
        assert_eq!(aggregation("tbl1", "viw1"), "table:tbl1:viw1:aggregation");
        assert_eq!(group_points("tbl1", "viw1"), "table:tbl1:viw1:groupPoints");
        assert_eq!(action_trigger("tbl1"), "table:tbl1:actionTrigger");
        assert_eq!(doc_ops("record", "rec1"), "record:rec1:ops");
    }

    #[test]
    fn test_distinct_resources_get_distinct_channels() {
        assert_ne!(row_count("tbl1", "viw1"), row_count("tbl1", "viw2"));
        assert_ne!(row_count("tbl1", "viw1"), aggregation("tbl1", "viw1"));
        assert_ne!(cell_presence("tbl1"), cell_presence("tbl2"));
    }
}
