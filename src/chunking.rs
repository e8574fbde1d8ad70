//! Boundary-aware splitting of unstructured text into bounded chunks.
//!
//! [`chunk_text`] walks a cursor over the input and slices off at most
//! `chunk_size` bytes at a time, preferring semantically safe split points
//! over hard cuts. Candidate boundaries are located by [`BoundaryFinder`]
//! functions tried in priority order: end of a code block, end of a
//! paragraph, end of a sentence. A boundary is only accepted when it lies
//! beyond 30% of the window, so no finder can produce a degenerately short
//! chunk.
//!
//! The whole module is synchronous and pure: no I/O, no failure modes.

/// Default target chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 5000;

/// Fraction of the window a boundary must clear before it is accepted.
const MIN_BOUNDARY_FRACTION: f64 = 0.3;

/// Locates a cut point inside `window` (the slice `text[start..start + chunk_size]`).
///
/// Returns the *absolute* offset into the original text at which the current
/// chunk should end, or `None` when no safe boundary exists in this window.
pub type BoundaryFinder = fn(window: &str, chunk_size: usize, start: usize) -> Option<usize>;

/// Finders tried in priority order by [`chunk_text_default`].
pub const DEFAULT_BOUNDARY_FINDERS: &[BoundaryFinder] =
    &[find_code_fence, find_paragraph_end, find_sentence_end];

fn beyond_threshold(offset: usize, chunk_size: usize) -> bool {
    offset as f64 > chunk_size as f64 * MIN_BOUNDARY_FRACTION
}

/// Cut at the last triple-backtick marker in the window.
///
/// The chunk ends *at* the marker rather than after it, so the fence itself
/// starts the next chunk. Fence parity is not tracked: a fence pair can be
/// split across chunks when an odd number of fences precedes the match.
pub fn find_code_fence(window: &str, chunk_size: usize, start: usize) -> Option<usize> {
    let fence = window.rfind("```")?;
    beyond_threshold(fence, chunk_size).then_some(start + fence)
}

/// Cut at the last blank line (double newline) in the window.
pub fn find_paragraph_end(window: &str, chunk_size: usize, start: usize) -> Option<usize> {
    let brk = window.rfind("\n\n")?;
    beyond_threshold(brk, chunk_size).then_some(start + brk)
}

/// Cut one past the last `". "` in the window, keeping the period with the
/// current chunk.
pub fn find_sentence_end(window: &str, chunk_size: usize, start: usize) -> Option<usize> {
    let period = window.rfind(". ")?;
    beyond_threshold(period, chunk_size).then_some(start + period + 1)
}

/// Splits `text` into an ordered sequence of non-empty trimmed chunks.
///
/// The cursor only ever moves forward (`start = max(start + 1, end)`), so the
/// loop terminates for every input. Inputs shorter than `chunk_size` yield a
/// single chunk; empty input yields none. When no finder accepts a boundary
/// the window is hard-cut at `chunk_size`.
pub fn chunk_text(text: &str, chunk_size: usize, finders: &[BoundaryFinder]) -> Vec<String> {
    let mut chunks = Vec::new();
    let text_length = text.len();
    let mut start = 0usize;

    while start < text_length {
        let mut end = start.saturating_add(chunk_size);

        if end >= text_length {
            let tail = text[start..].trim();
            if !tail.is_empty() {
                chunks.push(tail.to_string());
            }
            break;
        }

        // `end` is a byte offset; back up to the nearest char boundary so the
        // window slice is valid for multi-byte input.
        while !text.is_char_boundary(end) {
            end -= 1;
        }

        let window = &text[start..end];
        let cut = finders
            .iter()
            .find_map(|finder| finder(window, chunk_size, start))
            .unwrap_or(end);

        let chunk = text[start..cut].trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        start = (start + 1).max(cut);
        while start < text_length && !text.is_char_boundary(start) {
            start += 1;
        }
    }

    chunks
}

/// [`chunk_text`] with the default chunk size and finder stack.
pub fn chunk_text_default(text: &str) -> Vec<String> {
    chunk_text(text, DEFAULT_CHUNK_SIZE, DEFAULT_BOUNDARY_FINDERS)
}
