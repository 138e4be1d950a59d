//! Project-specific utilities live here.

/// Formats a shared log target prefix for module logs.
pub fn log_prefix(module: &str) -> String {
    format!("bookshelf::{module}")
}

#[cfg(test)]
mod tests {
    #[test]
    fn prefixes_module_name() {
        assert_eq!(super::log_prefix("books"), "bookshelf::books");
    }
}
