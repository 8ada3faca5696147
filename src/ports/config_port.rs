//! Configuration access port trait.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;

    /// All keys with a value in `section`, sorted by key.
    fn section_entries(&self, section: &str) -> Vec<(String, String)>;
}
