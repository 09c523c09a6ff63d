//! Per-block JSON content helpers: RFC-6902 patch application and a
//! merge-diff convenience for producing a patch between two documents.
//!
//! Grounded in `original_source/jsondoc.go`'s `JsonDoc.ApplyPatch`/`Diff`,
//! re-expressed against `serde_json::Value` and the `json-patch` crate
//! instead of hand-rolled merge-patch bytes.

use json_patch::{diff, patch, Patch};
use serde_json::Value;

use crate::error::Result;

/// Apply an RFC-6902 patch to `doc` in place, initializing `doc` to `{}`
/// first if it is `None` (content docs start empty, per spec §4.4's
/// `patch` op: "initialize to `{}` when absent").
pub fn apply_patch(doc: &mut Option<Value>, ops: &Patch) -> Result<()> {
    let mut value = doc.take().unwrap_or_else(|| Value::Object(Default::default()));
    patch(&mut value, ops)?;
    *doc = Some(value);
    Ok(())
}

/// Compute the RFC-6902 patch that transforms `from` into `to`. Used by
/// callers that want to ship a delta rather than a full document (e.g. a
/// future sync sink), mirroring `JsonDoc.Diff` in the original source.
pub fn diff_patch(from: &Value, to: &Value) -> Patch {
    diff(from, to)
}
