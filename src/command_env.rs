//! The environment handed to the executable. Either the parent's environment untouched,
//! or, as soon as a single entry is added, exactly the added entries and nothing else.

use std::env;
use std::ffi::{OsStr, OsString};
use std::os::unix::prelude::OsStringExt;

#[derive(Clone, Debug, Default)]
pub struct CommandEnv {
    // `KEY=VALUE` entries in insertion order, passed through verbatim
    vars: Vec<OsString>,
}

impl CommandEnv {
    pub fn push(&mut self, entry: &OsStr) {
        self.vars.push(entry.to_owned());
    }

    pub fn push_pair(&mut self, key: &OsStr, value: &OsStr) {
        let mut entry = OsString::with_capacity(key.len() + value.len() + 1);
        entry.push(key);
        entry.push("=");
        entry.push(value);
        self.vars.push(entry);
    }

    /// True when the child should inherit the parent's environment.
    pub fn is_inherited(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn entries(&self) -> &[OsString] {
        &self.vars
    }

    /// The `KEY=VALUE` byte strings for the child's `envp`.
    pub fn capture(&self) -> Vec<Vec<u8>> {
        if self.is_inherited() {
            env::vars_os()
                .map(|(k, v)| {
                    let mut entry = k;
                    entry.reserve_exact(v.len() + 1);
                    entry.push("=");
                    entry.push(&v);
                    entry.into_vec()
                })
                .collect()
        } else {
            self.vars.iter().cloned().map(OsString::into_vec).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_inherits_parent() {
        let env = CommandEnv::default();
        assert!(env.is_inherited());
        let captured = env.capture();
        assert_eq!(captured.len(), env::vars_os().count());
    }

    #[test]
    fn test_entries_replace_parent_in_order() {
        let mut env = CommandEnv::default();
        env.push(OsStr::new("LD_LIBRARY_PATH=../lib"));
        env.push_pair(OsStr::new("FOO"), OsStr::new("bar"));
        env.push(OsStr::new("FOO=baz"));
        assert!(!env.is_inherited());
        assert_eq!(
            env.capture(),
            vec![
                b"LD_LIBRARY_PATH=../lib".to_vec(),
                b"FOO=bar".to_vec(),
                b"FOO=baz".to_vec(),
            ]
        );
    }
}
