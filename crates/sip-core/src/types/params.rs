//! Generic `;name=value` parameter lists shared by Via and address headers.

use std::fmt;

/// One `;name` or `;name=value` parameter, order-preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub value: Option<String>,
}

impl Param {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Param {
            name: name.into(),
            value,
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "{}={}", self.name, v),
            None => write!(f, "{}", self.name),
        }
    }
}

/// An ordered list of parameters with case-insensitive name lookup.
///
/// Unknown parameters on a known header are kept here rather than aborting
/// parsing, per §4.2: "unknown tokens inside a known header ... are attached
/// as generic parameters."
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParamList(pub Vec<Param>);

impl ParamList {
    pub fn new() -> Self {
        ParamList(Vec::new())
    }

    pub fn get(&self, name: &str) -> Option<Option<&str>> {
        self.0
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.value.as_deref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.0.iter().any(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn push(&mut self, name: impl Into<String>, value: Option<String>) {
        self.0.push(Param::new(name, value));
    }

    pub fn set(&mut self, name: impl Into<String>, value: Option<String>) {
        let name = name.into();
        if let Some(p) = self.0.iter_mut().find(|p| p.name.eq_ignore_ascii_case(&name)) {
            p.value = value;
        } else {
            self.0.push(Param::new(name, value));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ParamList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for p in &self.0 {
            write!(f, ";{}", p)?;
        }
        Ok(())
    }
}
