// src/core/session/resolver.rs

//! The per-call source of the "current" session name.
//!
//! How a name is chosen (header, cookie, CLI flag) is the presentation layer's
//! business; the core reads it once per call and never second-guesses it.

/// Supplies the session name the current caller is acting under, if any.
pub trait SessionResolver: Send + Sync {
    fn session_id(&self) -> Option<String>;
}

/// A resolver that always answers with the same name (or with none).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticResolver(Option<String>);

impl StaticResolver {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Some(name.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl SessionResolver for StaticResolver {
    fn session_id(&self) -> Option<String> {
        self.0.clone()
    }
}

impl<F> SessionResolver for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn session_id(&self) -> Option<String> {
        self()
    }
}
