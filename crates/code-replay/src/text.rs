/// Split on `\n`, dropping a `\r` before each break. N breaks give N+1 lines.
pub(crate) fn split_lines_preserve_trailing(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}

/// `text` with every break reduced to a bare `\n`, the way a line split reads it.
pub(crate) fn normalize_breaks(text: &str) -> String {
    split_lines_preserve_trailing(text).join("\n")
}

/// Byte index of character `column` in `line`, clamped to the end of the line.
pub(crate) fn byte_index(line: &str, column: usize) -> usize {
    line.char_indices()
        .nth(column)
        .map(|(idx, _)| idx)
        .unwrap_or(line.len())
}

pub(crate) fn char_len(line: &str) -> usize {
    line.chars().count()
}
