/// Append one entry, retaining only the newest `limit` entries.
pub fn append_with_limit<T: Clone>(items: &[T], next: T, limit: usize) -> Vec<T> {
    let mut combined = items.to_vec();
    combined.push(next);
    trim_to_limit(combined, limit)
}

/// Append a batch of entries, retaining only the newest `limit` entries.
pub fn append_many_with_limit<T: Clone>(items: &[T], next_items: Vec<T>, limit: usize) -> Vec<T> {
    if next_items.is_empty() {
        return items.to_vec();
    }
    let mut combined = items.to_vec();
    combined.extend(next_items);
    trim_to_limit(combined, limit)
}

fn trim_to_limit<T>(mut combined: Vec<T>, limit: usize) -> Vec<T> {
    if combined.len() > limit {
        combined.split_off(combined.len() - limit)
    } else {
        combined
    }
}
