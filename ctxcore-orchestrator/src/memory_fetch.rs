//! The `memory_fetch` tool surface (§6): line- or byte-range reads against
//! the Memory Store, with hard range caps enforced before the store is ever
//! touched.

use ctxcore_core::StoreError;
use ctxcore_store::MemoryStore;

const MAX_LINES: usize = 2000;
const MAX_BYTES: usize = 65_536;

/// One `memory_fetch` call's arguments. Exactly one of the line range or
/// byte range should be set; if both are, the line range takes precedence.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryFetchRequest<'a> {
    pub memory_id: &'a str,
    pub line_start: Option<usize>,
    pub line_end: Option<usize>,
    pub byte_offset: Option<usize>,
    pub byte_length: Option<usize>,
}

/// The failure payload returned when a request violates range constraints
/// or the store lookup fails. The store is never touched for a constraint
/// violation.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryFetchError {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemoryFetchResult {
    Text(String),
    Bytes(Vec<u8>),
}

/// P12: reject oversized ranges before calling into the store at all.
pub fn fetch_memory(store: &MemoryStore, request: MemoryFetchRequest<'_>) -> Result<MemoryFetchResult, MemoryFetchError> {
    if let (Some(start), Some(end)) = (request.line_start, request.line_end) {
        if start < 1 || end < start {
            return Err(MemoryFetchError {
                reason: format!("invalid line range: line_start={start} line_end={end}"),
            });
        }
        if end - start + 1 > MAX_LINES {
            return Err(MemoryFetchError {
                reason: format!("line range spans {} lines, exceeding the {MAX_LINES}-line cap", end - start + 1),
            });
        }
        return store
            .get_slice(request.memory_id, start - 1, end)
            .map(MemoryFetchResult::Text)
            .map_err(|e| MemoryFetchError { reason: store_error_reason(e) });
    }

    if let Some(length) = request.byte_length {
        if length > MAX_BYTES {
            return Err(MemoryFetchError {
                reason: format!("byte_length {length} exceeds the {MAX_BYTES}-byte cap"),
            });
        }
        let offset = request.byte_offset.unwrap_or(0);
        return store
            .get_bytes(request.memory_id, offset, length)
            .map(MemoryFetchResult::Bytes)
            .map_err(|e| MemoryFetchError { reason: store_error_reason(e) });
    }

    Err(MemoryFetchError {
        reason: "memory_fetch requires either a line range or a byte range".to_string(),
    })
}

fn store_error_reason(e: StoreError) -> String {
    e.to_string()
}
