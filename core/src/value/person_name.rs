//! Handling of DICOM person names (VR PN).
//!
//! A person name has up to three component groups
//! (alphabetic, ideographic, phonetic) separated by `=`,
//! each with up to five components
//! (family, given, middle, prefix, suffix) separated by `^`.
//!
//! The parsed form preserves the exact component layout,
//! including empty components which precede non-empty ones,
//! so that re-encoding reproduces the original text.
use std::fmt;

use snafu::{ensure, Snafu};

use crate::value::C;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("too many component groups: got {}, maximum is 3", count))]
    TooManyGroups { count: usize },

    #[snafu(display("too many name components: got {}, maximum is 5", count))]
    TooManyComponents { count: usize },
}

/// One component group of a person name,
/// holding the `^`-separated components exactly as they appeared.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NameGroup {
    components: C<String>,
}

impl NameGroup {
    fn parse(text: &str) -> Result<Self, Error> {
        let components: C<String> = text.split('^').map(|c| c.to_string()).collect();
        ensure!(
            components.len() <= 5,
            TooManyComponentsSnafu {
                count: components.len()
            }
        );
        Ok(NameGroup { components })
    }

    fn component(&self, index: usize) -> Option<&str> {
        match self.components.get(index).map(|s| s.as_str()) {
            Some("") | None => None,
            some => some,
        }
    }

    /// The family name complex, when present and non-empty.
    pub fn family(&self) -> Option<&str> {
        self.component(0)
    }

    /// The given name complex, when present and non-empty.
    pub fn given(&self) -> Option<&str> {
        self.component(1)
    }

    /// The middle name, when present and non-empty.
    pub fn middle(&self) -> Option<&str> {
        self.component(2)
    }

    /// The name prefix, when present and non-empty.
    pub fn prefix(&self) -> Option<&str> {
        self.component(3)
    }

    /// The name suffix, when present and non-empty.
    pub fn suffix(&self) -> Option<&str> {
        self.component(4)
    }
}

impl fmt::Display for NameGroup {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.components.join("^"))
    }
}

/// A structured DICOM person name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonName {
    groups: C<NameGroup>,
}

impl PersonName {
    /// Parse a person name from its text form.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let groups: Result<C<NameGroup>, Error> = text.split('=').map(NameGroup::parse).collect();
        let groups = groups?;
        ensure!(
            groups.len() <= 3,
            TooManyGroupsSnafu {
                count: groups.len()
            }
        );
        Ok(PersonName { groups })
    }

    /// The alphabetic component group.
    pub fn alphabetic(&self) -> Option<&NameGroup> {
        self.groups.first()
    }

    /// The ideographic component group, when present.
    pub fn ideographic(&self) -> Option<&NameGroup> {
        self.groups.get(1)
    }

    /// The phonetic component group, when present.
    pub fn phonetic(&self) -> Option<&NameGroup> {
        self.groups.get(2)
    }
}

impl fmt::Display for PersonName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let parts: Vec<String> = self.groups.iter().map(|g| g.to_string()).collect();
        f.write_str(&parts.join("="))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_name_components() {
        let pn = PersonName::parse("Adams^John Robert Quincy^^Rev.^B.A. M.Div.").unwrap();
        let alpha = pn.alphabetic().unwrap();
        assert_eq!(alpha.family(), Some("Adams"));
        assert_eq!(alpha.given(), Some("John Robert Quincy"));
        assert_eq!(alpha.middle(), None);
        assert_eq!(alpha.prefix(), Some("Rev."));
        assert_eq!(alpha.suffix(), Some("B.A. M.Div."));
    }

    #[test]
    fn round_trip_preserves_layout() {
        for text in [
            "Doe^Jane",
            "Doe^^Middle",
            "Doe^Jane^",
            "Yamada^Tarou=山田^太郎=やまだ^たろう",
            "=Wang^XiaoDong",
            "Smith^^^^",
        ] {
            let pn = PersonName::parse(text).unwrap();
            assert_eq!(pn.to_string(), text);
        }
    }

    #[test]
    fn limits_are_enforced() {
        assert!(PersonName::parse("a=b=c=d").is_err());
        assert!(PersonName::parse("a^b^c^d^e^f").is_err());
    }
}
