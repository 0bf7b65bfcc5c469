//! Placeholder substitution for router commands and VPN config files
//!
//! Templates reference variables as `{{ Name }}`. The Go-style spelling
//! `{{ .Name }}` is accepted as well so existing config templates keep
//! working. There are no conditionals or loops; a template is plain text
//! with holes.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::RenderError;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Variable names available to the VPN config template
pub mod vars {
    /// Selected exit (address or hostname)
    pub const VPN_SERVER: &str = "VpnServer";
    /// Active vendor
    pub const VENDOR: &str = "Vendor";
    /// Active exit
    pub const EXIT: &str = "Exit";
    /// Human connectivity label
    pub const CONNECTED: &str = "Connected";
    /// Directory path to the exit, `/` separated
    pub const EXIT_PATH: &str = "ExitPath";
}

/// Values substituted into a template
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    values: BTreeMap<String, String>,
}

impl TemplateVars {
    /// Empty variable set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a variable
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Look up a variable
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// Render `template` with `vars`
pub fn render(template: &str, vars: &TemplateVars) -> Result<String, RenderError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];
        let end = after_open.find(CLOSE).ok_or(RenderError::Unterminated {
            offset: offset + start,
        })?;

        let name = after_open[..end].trim();
        let name = name.strip_prefix('.').unwrap_or(name).trim();
        let value = vars
            .get(name)
            .ok_or_else(|| RenderError::UnknownVariable(name.to_string()))?;
        out.push_str(value);

        let consumed = start + OPEN.len() + end + CLOSE.len();
        offset += consumed;
        rest = &rest[consumed..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Read the template at `path` and render it with `vars`
pub fn render_file(path: &Path, vars: &TemplateVars) -> Result<String, RenderError> {
    let source = std::fs::read_to_string(path).map_err(|source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    render(&source, vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vars() -> TemplateVars {
        TemplateVars::new()
            .with(vars::VENDOR, "acme")
            .with(vars::EXIT, "10.0.0.5")
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(render("ipsec status", &vars()).unwrap(), "ipsec status");
    }

    #[test]
    fn test_both_placeholder_spellings() {
        let rendered = render("status {{ .Vendor }} {{Exit}}!", &vars()).unwrap();
        assert_eq!(rendered, "status acme 10.0.0.5!");
    }

    #[test]
    fn test_unknown_variable() {
        let err = render("{{ .Nope }}", &vars()).unwrap_err();
        assert!(matches!(err, RenderError::UnknownVariable(name) if name == "Nope"));
    }

    #[test]
    fn test_unterminated_placeholder() {
        let err = render("ok {{ .Vendor", &vars()).unwrap_err();
        assert!(matches!(err, RenderError::Unterminated { offset: 3 }));
    }

    #[test]
    fn test_render_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "conn vpn\n  right={{{{ .VpnServer }}}}").unwrap();
        let vars = TemplateVars::new().with(vars::VPN_SERVER, "198.51.100.7");
        let rendered = render_file(file.path(), &vars).unwrap();
        assert_eq!(rendered, "conn vpn\n  right=198.51.100.7\n");
    }

    #[test]
    fn test_render_missing_file() {
        let err = render_file(Path::new("/nonexistent/template"), &vars()).unwrap_err();
        assert!(matches!(err, RenderError::Io { .. }));
    }
}
