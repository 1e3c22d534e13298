use super::types::DiffOp;
use similar::{capture_diff_slices, Algorithm, DiffTag};
use std::collections::HashMap;

/// Splits both texts into newline-inclusive lines and maps every distinct line
/// to a symbol, so the sequence diff runs over line counts instead of bytes.
fn lines_to_symbols<'a>(old: &'a str, new: &'a str) -> (Vec<&'a str>, Vec<usize>, Vec<usize>) {
    let mut table: Vec<&'a str> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();

    let mut encode = |text: &'a str| -> Vec<usize> {
        text.split_inclusive('\n')
            .map(|line| {
                *index.entry(line).or_insert_with(|| {
                    table.push(line);
                    table.len() - 1
                })
            })
            .collect()
    };

    let old_symbols = encode(old);
    let new_symbols = encode(new);
    (table, old_symbols, new_symbols)
}

fn expand(table: &[&str], symbols: &[usize]) -> String {
    symbols.iter().map(|&symbol| table[symbol]).collect()
}

/// Appends a span, merging it into the previous op when both have the same kind.
pub(crate) fn push_span(ops: &mut Vec<DiffOp>, op: DiffOp) {
    if op.text().is_empty() {
        return;
    }
    match (ops.last_mut(), op) {
        (Some(DiffOp::Equal(prev)), DiffOp::Equal(text))
        | (Some(DiffOp::Insert(prev)), DiffOp::Insert(text))
        | (Some(DiffOp::Delete(prev)), DiffOp::Delete(text)) => prev.push_str(&text),
        (_, op) => ops.push(op),
    }
}

/// Line-granularity diff followed by a semantic cleanup pass.
pub fn compute_line_diff(old: &str, new: &str) -> Vec<DiffOp> {
    let (table, old_symbols, new_symbols) = lines_to_symbols(old, new);
    let mut ops = Vec::new();

    for op in capture_diff_slices(Algorithm::Myers, &old_symbols, &new_symbols) {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        let removed = || DiffOp::Delete(expand(&table, &old_symbols[old_range.clone()]));
        let inserted = || DiffOp::Insert(expand(&table, &new_symbols[new_range.clone()]));
        match tag {
            DiffTag::Equal => push_span(
                &mut ops,
                DiffOp::Equal(expand(&table, &old_symbols[old_range.clone()])),
            ),
            DiffTag::Delete => push_span(&mut ops, removed()),
            DiffTag::Insert => push_span(&mut ops, inserted()),
            DiffTag::Replace => {
                push_span(&mut ops, removed());
                push_span(&mut ops, inserted());
            }
        }
    }

    cleanup_semantic(ops)
}

/// Folds whitespace-only Equal spans that sit between two edits into the
/// surrounding Delete/Insert pair and merges the resulting adjacent edits.
/// Within each edit run deletions are emitted before insertions.
pub fn cleanup_semantic(ops: Vec<DiffOp>) -> Vec<DiffOp> {
    let mut merged: Vec<DiffOp> = Vec::with_capacity(ops.len());
    for op in ops {
        push_span(&mut merged, op);
    }

    let mut result = Vec::with_capacity(merged.len());
    let mut pending_delete = String::new();
    let mut pending_insert = String::new();

    for (i, op) in merged.iter().enumerate() {
        match op {
            DiffOp::Delete(text) => pending_delete.push_str(text),
            DiffOp::Insert(text) => pending_insert.push_str(text),
            DiffOp::Equal(text) => {
                let has_pending = !pending_delete.is_empty() || !pending_insert.is_empty();
                let edit_follows = merged.get(i + 1).is_some_and(DiffOp::is_edit);
                if has_pending && edit_follows && text.trim().is_empty() {
                    pending_delete.push_str(text);
                    pending_insert.push_str(text);
                    continue;
                }
                flush(&mut result, &mut pending_delete, &mut pending_insert);
                push_span(&mut result, DiffOp::Equal(text.clone()));
            }
        }
    }
    flush(&mut result, &mut pending_delete, &mut pending_insert);

    result
}

fn flush(result: &mut Vec<DiffOp>, delete: &mut String, insert: &mut String) {
    push_span(result, DiffOp::Delete(std::mem::take(delete)));
    push_span(result, DiffOp::Insert(std::mem::take(insert)));
}
