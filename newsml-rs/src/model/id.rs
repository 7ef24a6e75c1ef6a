//! Deterministic node id generation.

/// Sequential id generator scoped to one document.
///
/// Ids look like `paragraph-3`: a prefix naming what was created and a
/// counter shared by every prefix. Nothing depends on time or randomness, so
/// importing the same XML or replaying the same changes always produces the
/// same ids.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    count: u32,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self { count: 0 }
    }

    /// Generates the next id with the given prefix, skipping any id for which
    /// `taken` returns true.
    pub fn next_id(&mut self, prefix: &str, taken: impl Fn(&str) -> bool) -> String {
        let prefix = sanitize(prefix);
        loop {
            self.count += 1;
            let id = format!("{}-{}", prefix, self.count);
            if !taken(&id) {
                return id;
            }
        }
    }

    /// Number of ids handed out so far.
    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Reduces a tag or type name to a readable id prefix.
fn sanitize(prefix: &str) -> String {
    let local = crate::xml::local_name(prefix);
    let local = local.rsplit('/').next().unwrap_or(local);
    let cleaned: String = local
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '-' })
        .collect();
    if cleaned.is_empty() {
        "node".to_string()
    } else {
        cleaned
    }
}
