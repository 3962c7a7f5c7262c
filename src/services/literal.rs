// Literal rendering for an engine without prepared-statement placeholders.
//
// Every argument is rendered into the statement text here; nothing is handed
// to the transport as a bound parameter.

use crate::error::AdapterError;
use crate::models::Value;

/// Escape text for use inside a single-quoted dialect string literal.
pub fn escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '\'' => result.push_str("''"),
            '\0' => result.push_str("\\0"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\x1a' => result.push_str("\\Z"),
            c => result.push(c),
        }
    }
    result
}

/// Inverse of [`escape`]: decode the body of a single-quoted literal.
pub fn unescape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('0') => result.push('\0'),
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('Z') => result.push('\x1a'),
                Some(other) => result.push(other),
                None => result.push('\\'),
            },
            '\'' if chars.peek() == Some(&'\'') => {
                chars.next();
                result.push('\'');
            }
            c => result.push(c),
        }
    }
    result
}

/// Render a value as a SQL literal: NULL, quoted escaped text, or the bare literal.
pub fn quote_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Text(s) => format!("'{}'", escape(s)),
        Value::Timestamp(ts) => format!("'{}'", ts.format("%Y-%m-%d %H:%M:%S%.f")),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Decimal(d) => d.clone(),
    }
}

/// Substitute rendered arguments into `%s` placeholders.
///
/// `%%` yields a literal percent sign. Templates are returned untouched when
/// there are no arguments, so DDL text never needs percent escaping.
pub fn substitute(template: &str, args: &[Value]) -> Result<String, AdapterError> {
    if args.is_empty() {
        return Ok(template.to_string());
    }

    let mut result = String::with_capacity(template.len() + args.len() * 8);
    let mut remaining = args.iter();
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => {
                let arg = remaining.next().ok_or_else(|| {
                    AdapterError::Compilation(format!(
                        "Not enough arguments for statement template ({} supplied)",
                        args.len()
                    ))
                })?;
                result.push_str(&quote_value(arg));
            }
            Some('%') => result.push('%'),
            other => {
                return Err(AdapterError::Compilation(format!(
                    "Unsupported placeholder '%{}' in statement template",
                    other.map(String::from).unwrap_or_default()
                )))
            }
        }
    }

    let unused = remaining.count();
    if unused > 0 {
        return Err(AdapterError::Compilation(format!(
            "{} argument(s) left unused by statement template",
            unused
        )));
    }

    Ok(result)
}

/// Drop exactly one trailing semicolon; the engine rejects them.
pub fn strip_terminator(sql: &str) -> &str {
    sql.strip_suffix(';').unwrap_or(sql)
}

/// Full statement preparation: substitution followed by terminator cleanup.
pub fn prepare(template: &str, args: &[Value]) -> Result<String, AdapterError> {
    let sql = substitute(template, args)?;
    Ok(strip_terminator(&sql).to_string())
}
