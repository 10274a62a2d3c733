use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::OnceLock;

use regex::Regex;

use crate::runtime::base::{GTValue, ObjId};
use crate::runtime::collector::CycleCollector;
use crate::utils::error::{GTErrCode, GTError};

// Placeholder text the structured renderer emits for a cycle edge
static RECURSION_PATTERN: OnceLock<Regex> = OnceLock::new();

fn recursion_pattern() -> &'static Regex {
    RECURSION_PATTERN
        .get_or_init(|| Regex::new(r"<Recursion on (.*) with id=([0-9]+)>").unwrap())
}

/// Render a captured object for a report.
///
/// Formatting runs inside failure-reporting paths, so it must never fail past
/// this boundary: a structured rendering that cannot be produced falls back
/// to a direct one, and that falls back to a fixed-shape error string.
pub fn format_object(gc: &CycleCollector, id: ObjId) -> String {
    let (cls, addr) = match (gc.cls_of(id), gc.address_of(id)) {
        (Some(cls), Some(addr)) => (cls, addr),
        _ => {
            return format!(
                "<Formatting error: repr raises {:?}: object {} is not alive>",
                GTErrCode::NotValidObject,
                id
            )
        }
    };

    let body = match render_structured(gc, id) {
        Ok(s) => s,
        Err(_) => match render_direct(gc, id) {
            Ok(s) => s,
            Err(e) => format!(
                "<Formatting error: repr raises {:?}: {}>",
                e.code(),
                e.message()
            ),
        },
    };
    let body = rewrite_recursion_markers(&body);

    format!(
        "<class '{}'> object at 0x{:x}:\n{}",
        gc.qualified_name(cls),
        addr,
        body
    )
}

fn render_structured(gc: &CycleCollector, id: ObjId) -> Result<String, GTError> {
    let mut out = String::new();
    let mut path: Vec<ObjId> = Vec::new();
    render_value(gc, id, 0, &mut path, &mut out)?;
    Ok(out)
}

fn render_value(
    gc: &CycleCollector,
    id: ObjId,
    indent: usize,
    path: &mut Vec<ObjId>,
    out: &mut String,
) -> Result<(), GTError> {
    let cls = match gc.cls_of(id) {
        Some(cls) => cls,
        None => {
            return Err(GTError::new(
                format!("object {} is not alive", id),
                GTErrCode::NotValidObject,
            ))
        }
    };

    if path.contains(&id) {
        // Structure refers back to an ancestor; emit the placeholder the
        // post-processing pass rewrites.
        let addr = gc.address_of(id).unwrap_or(0);
        out.push_str(&format!(
            "<Recursion on {} with id={}>",
            gc.qualified_name(cls),
            addr
        ));
        return Ok(());
    }

    if let Some(repr_fn) = gc.get_class(cls).repr_fn {
        let rendered = catch_unwind(AssertUnwindSafe(|| repr_fn(gc, id)))
            .map_err(|_| GTError::new("repr hook panicked", GTErrCode::FormatFailed))??;
        out.push_str(&rendered);
        return Ok(());
    }

    let value = match gc.value_of(id) {
        Some(value) => value,
        None => {
            return Err(GTError::new(
                format!("object {} is not alive", id),
                GTErrCode::NotValidObject,
            ))
        }
    };

    match value {
        GTValue::Integer(i) => out.push_str(&i.to_string()),
        GTValue::Float(f) => out.push_str(&f.to_string()),
        GTValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        GTValue::String(s) => out.push_str(&format!("'{}'", s)),
        GTValue::None => out.push_str("none"),
        GTValue::Frame(f) => out.push_str(&format!(
            "<frame '{}' with {} locals>",
            f.get_function(),
            f.locals.len()
        )),
        GTValue::Code(c) => out.push_str(&format!("<code '{}'>", c.get_name())),
        GTValue::List(l) => {
            if l.vs.is_empty() {
                out.push_str("[]");
            } else {
                path.push(id);
                out.push_str("[\n");
                for &item in &l.vs {
                    out.push_str(&" ".repeat(indent + 2));
                    render_value(gc, item, indent + 2, path, out)?;
                    out.push_str(",\n");
                }
                out.push_str(&" ".repeat(indent));
                out.push(']');
                path.pop();
            }
        }
        GTValue::Inst(inst) => {
            let name = gc.get_class(cls).get_name().to_string();
            if inst.attrs.is_empty() {
                out.push_str(&format!("{} {{}}", name));
            } else {
                path.push(id);
                out.push_str(&format!("{} {{\n", name));
                for (attr, &val) in &inst.attrs {
                    out.push_str(&" ".repeat(indent + 2));
                    out.push_str(&format!("{}: ", attr));
                    render_value(gc, val, indent + 2, path, out)?;
                    out.push_str(",\n");
                }
                out.push_str(&" ".repeat(indent));
                out.push('}');
                path.pop();
            }
        }
    }
    Ok(())
}

// Tier-two rendering: type and summary only, never descends, no hooks.
fn render_direct(gc: &CycleCollector, id: ObjId) -> Result<String, GTError> {
    let cls = match gc.cls_of(id) {
        Some(cls) => cls,
        None => {
            return Err(GTError::new(
                format!("object {} is not alive", id),
                GTErrCode::NotValidObject,
            ))
        }
    };
    let value = match gc.value_of(id) {
        Some(value) => value,
        None => {
            return Err(GTError::new(
                format!("object {} is not alive", id),
                GTErrCode::NotValidObject,
            ))
        }
    };

    let out = match value {
        GTValue::Integer(i) => i.to_string(),
        GTValue::Float(f) => f.to_string(),
        GTValue::Bool(b) => String::from(if *b { "true" } else { "false" }),
        GTValue::String(s) => format!("'{}'", s),
        GTValue::None => "none".to_string(),
        GTValue::List(l) => format!("<{} with {} items>", gc.qualified_name(cls), l.vs.len()),
        GTValue::Inst(inst) => {
            format!("<{} with {} attrs>", gc.qualified_name(cls), inst.attrs.len())
        }
        GTValue::Frame(f) => format!(
            "<frame '{}' with {} locals>",
            f.get_function(),
            f.locals.len()
        ),
        GTValue::Code(c) => format!("<code '{}'>", c.get_name()),
    };
    Ok(out)
}

// The placeholder carries a decimal identity; the report form is explicit
// about what it is and shows the address in hex.
fn rewrite_recursion_markers(text: &str) -> String {
    recursion_pattern()
        .replace_all(text, |caps: &regex::Captures| {
            let addr: usize = caps[2].parse().unwrap_or(0);
            format!("<Recursive reference to {} object at 0x{:x}>", &caps[1], addr)
        })
        .into_owned()
}
