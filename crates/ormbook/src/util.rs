//! Small SQL text helpers shared by the synthesis stages.

/// Prefix a non-empty fragment with a single space so it can be appended
/// directly after the preceding clause.
pub fn add_extra_space_if_exists(fragment: &str) -> String {
    if fragment.is_empty() {
        String::new()
    } else {
        format!(" {fragment}")
    }
}

/// Wrap a statement in an explicit transaction block.
pub fn wrap_tx(sql: &str) -> String {
    wrap_tx_with(&[], sql)
}

/// Wrap a statement in an explicit transaction block, preceded by auxiliary
/// statements. Each statement sits on its own indented line.
pub fn wrap_tx_with(exprs: &[String], sql: &str) -> String {
    let mut out = String::from("BEGIN TRANSACTION;\n");
    for expr in exprs {
        out.push('\t');
        out.push_str(expr);
        out.push_str(";\n");
    }
    out.push('\t');
    out.push_str(sql);
    out.push_str(";\nCOMMIT;");
    out
}
