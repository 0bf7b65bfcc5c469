//! Dotted-path configuration provider
//!
//! Vendor server hierarchies have a depth that is only known at runtime
//! (`<vendor>.levels`), so they cannot be described by a fixed serde struct.
//! [`ConfigSource`] exposes the document through `<vendor>.servers.<key>...`
//! style paths instead, and [`TomlConfig`] implements it over a parsed TOML
//! document with the built-in defaults merged underneath.
//!
//! Dotted paths cannot name keys that themselves contain a dot (`"St. Louis"`),
//! so the tree walking accessors also come in a `*_at` form taking one key
//! per segment.

use toml::value::Table;
use toml::Value;

use super::AppConfig;
use crate::error::ConfigError;

/// Shape of a configuration value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// String, number or boolean
    Scalar,
    /// Array
    List,
    /// Table
    Table,
}

impl ValueKind {
    pub fn label(self) -> &'static str {
        match self {
            ValueKind::Scalar => "value",
            ValueKind::List => "list",
            ValueKind::Table => "table",
        }
    }
}

/// Read-only access to configuration values by dotted path
pub trait ConfigSource: Send + Sync {
    /// Whether any value exists at `path`
    fn exists(&self, path: &str) -> bool;

    /// String value at `path`
    fn string(&self, path: &str) -> Option<String>;

    /// List of strings at `path`; a scalar yields a single element list
    fn string_list(&self, path: &str) -> Vec<String>;

    /// Keys of the table at `path`, in provider order
    fn map_keys(&self, path: &str) -> Vec<String>;

    /// Integer value at `path`
    fn int(&self, path: &str) -> Option<i64>;

    /// Boolean value at `path`, `false` when unset
    fn bool(&self, path: &str) -> bool;

    /// Shape of the value at `segments`, `None` when unset
    fn kind_at(&self, segments: &[String]) -> Option<ValueKind>;

    /// [`ConfigSource::string_list`] addressed by segments
    fn string_list_at(&self, segments: &[String]) -> Vec<String>;

    /// [`ConfigSource::map_keys`] addressed by segments
    fn map_keys_at(&self, segments: &[String]) -> Vec<String>;
}

/// TOML backed [`ConfigSource`]
#[derive(Debug, Clone)]
pub struct TomlConfig {
    root: Value,
}

impl TomlConfig {
    /// Built-in defaults only
    pub fn defaults() -> Self {
        Self {
            root: Value::Table(default_table()),
        }
    }

    /// Wrap an already parsed document without defaults
    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    /// Parse `content` and layer it over the built-in defaults
    pub fn from_str_with_defaults(content: &str) -> Result<Self, ConfigError> {
        let mut parsed: Table = toml::from_str(content)?;
        normalize_legacy_keys(&mut parsed);
        let mut merged = default_table();
        merge_tables(&mut merged, parsed);
        Ok(Self {
            root: Value::Table(merged),
        })
    }

    /// Deserialize the fixed-shape sections
    pub fn app(&self) -> Result<AppConfig, ConfigError> {
        Ok(self.root.clone().try_into::<AppConfig>()?)
    }

    /// Configured vendor names, in file order
    pub fn vendors(&self) -> Vec<String> {
        self.string_list("vendors")
    }

    fn get(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return Some(&self.root);
        }
        self.walk(path.split('.'))
    }

    fn walk<'k>(&self, keys: impl IntoIterator<Item = &'k str>) -> Option<&Value> {
        keys.into_iter()
            .try_fold(&self.root, |value, key| value.as_table()?.get(key))
    }

    fn get_at(&self, segments: &[String]) -> Option<&Value> {
        self.walk(segments.iter().map(String::as_str))
    }
}

impl ConfigSource for TomlConfig {
    fn exists(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    fn string(&self, path: &str) -> Option<String> {
        match self.get(path)? {
            Value::String(s) => Some(s.clone()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Boolean(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn string_list(&self, path: &str) -> Vec<String> {
        list_of(self.get(path))
    }

    fn map_keys(&self, path: &str) -> Vec<String> {
        keys_of(self.get(path))
    }

    fn int(&self, path: &str) -> Option<i64> {
        match self.get(path)? {
            Value::Integer(i) => Some(*i),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn bool(&self, path: &str) -> bool {
        match self.get(path) {
            Some(Value::Boolean(b)) => *b,
            Some(Value::String(s)) => matches!(s.as_str(), "true" | "yes" | "1"),
            _ => false,
        }
    }

    fn kind_at(&self, segments: &[String]) -> Option<ValueKind> {
        Some(match self.get_at(segments)? {
            Value::Array(_) => ValueKind::List,
            Value::Table(_) => ValueKind::Table,
            _ => ValueKind::Scalar,
        })
    }

    fn string_list_at(&self, segments: &[String]) -> Vec<String> {
        list_of(self.get_at(segments))
    }

    fn map_keys_at(&self, segments: &[String]) -> Vec<String> {
        keys_of(self.get_at(segments))
    }
}

fn list_of(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_to_string).collect(),
        Some(other) => scalar_to_string(other).into_iter().collect(),
        None => Vec::new(),
    }
}

fn keys_of(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Table(table)) => table.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

fn default_table() -> Table {
    let mut listen = Table::new();
    listen.insert("address".into(), Value::String("0.0.0.0".into()));
    listen.insert("http".into(), Value::Integer(8000));
    listen.insert("https".into(), Value::Integer(-1));

    let mut router = Table::new();
    router.insert("mode".into(), Value::String("ssh".into()));
    router.insert("host".into(), Value::String("192.168.1.1".into()));
    router.insert("port".into(), Value::Integer(22));
    router.insert("user".into(), Value::String("admin".into()));

    let mut root = Table::new();
    root.insert("listen".into(), Value::Table(listen));
    root.insert("router".into(), Value::Table(router));
    root
}

/// `router.username` is accepted as a spelling of `router.user`
fn normalize_legacy_keys(table: &mut Table) {
    if let Some(Value::Table(router)) = table.get_mut("router") {
        if !router.contains_key("user") {
            if let Some(user) = router.remove("username") {
                router.insert("user".into(), user);
            }
        }
    }
}

/// Recursively overlay `overlay` onto `base`; tables merge, everything else replaces
fn merge_tables(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(existing)), Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
