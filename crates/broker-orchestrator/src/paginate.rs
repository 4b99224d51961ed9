//! Pagination (§4.7): slices the final entity list by an opaque cursor.

use broker_types::{cursor, Entity};

/// Slices `entities` by `[offset, offset+limit)`, where `offset` comes from
/// `cursor` (0 if absent/malformed). Returns the page, the next cursor (if
/// there's more), and whether there's more.
pub fn paginate(entities: Vec<Entity>, cursor_str: Option<&str>, limit: usize) -> (Vec<Entity>, Option<String>, bool) {
    let offset = cursor::decode(cursor_str) as usize;
    let total = entities.len();

    let page = if offset >= total {
        Vec::new()
    } else {
        let end = (offset + limit).min(total);
        entities[offset..end].to_vec()
    };

    let has_more = offset + limit < total;
    let next_cursor = has_more.then(|| cursor::encode((offset + limit) as u64));

    (page, next_cursor, has_more)
}
