use std::collections::HashMap;

use crate::types::Post;

/// Removes posts with a repeated `url`.
///
/// The last post seen for a url wins and takes the slot of the first
/// occurrence, so the result is deterministic for a given input order.
pub fn dedup_by_url(posts: Vec<Post>) -> Vec<Post> {
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(posts.len());
    let mut unique: Vec<Post> = Vec::with_capacity(posts.len());

    for post in posts {
        match slots.get(&post.url) {
            Some(&idx) => unique[idx] = post,
            None => {
                slots.insert(post.url.clone(), unique.len());
                unique.push(post);
            }
        }
    }

    unique
}
