//! Display-label case transforms. These are cosmetic only: stored and submitted values keep their original form.

/// Title-case an option value: split on `_`, capitalize each token, join with spaces.
/// e.g. "audit_manager" -> "Audit Manager", "in_progress" -> "In Progress"
pub fn title_case(s: &str) -> String {
    s.split('_')
        .filter(|t| !t.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Turn a camelCase or snake_case field key into a label.
/// e.g. "fixActions" -> "Fix Actions", "due_date" -> "Due Date"
pub fn humanize_key(key: &str) -> String {
    let mut snake = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                snake.push('_');
            }
            snake.extend(c.to_lowercase());
        } else {
            snake.push(c);
        }
    }
    title_case(&snake)
}

fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => {
            let mut out = String::with_capacity(token.len());
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
            out
        }
        None => String::new(),
    }
}
