//! The standard data element dictionary and unique identifier dictionary.
//!
//! Both dictionaries are process-wide read-only tables,
//! initialized lazily on first use.
//! The data element dictionary maps tags to their standard alias and VR,
//! which drives VR resolution under implicit VR transfer syntaxes.
pub mod entries;
pub mod tags;
pub mod uids;

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::header::{Tag, VR};

/// An entry of the data element dictionary.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DictionaryEntry {
    /// the attribute tag
    pub tag: Tag,
    /// the standard keyword, in PascalCase
    pub alias: &'static str,
    /// the value representation assigned by the standard
    /// (the first option when the standard admits more than one)
    pub vr: VR,
}

/// A read-only data element dictionary,
/// mapping tags and keywords to dictionary entries.
pub trait DataDictionary {
    /// Look up an entry by attribute tag.
    fn by_tag(&self, tag: Tag) -> Option<&DictionaryEntry>;

    /// Look up an entry by its standard keyword.
    fn by_name(&self, name: &str) -> Option<&DictionaryEntry>;

    /// Determine the VR of the given tag,
    /// falling back to UN when the tag is not known.
    ///
    /// Group length elements always resolve to UL.
    fn vr_of(&self, tag: Tag) -> VR {
        if tag.is_group_length() {
            return VR::UL;
        }
        self.by_tag(tag).map(|e| e.vr).unwrap_or(VR::UN)
    }
}

static BY_TAG: Lazy<HashMap<Tag, &'static DictionaryEntry>> = Lazy::new(|| {
    entries::ENTRIES
        .iter()
        .map(|e| (e.tag, e))
        .collect()
});

static BY_NAME: Lazy<HashMap<&'static str, &'static DictionaryEntry>> = Lazy::new(|| {
    entries::ENTRIES
        .iter()
        .map(|e| (e.alias, e))
        .collect()
});

/// The standard data element dictionary,
/// holding a curated subset of PS3.6 chapter 6
/// plus the command elements of PS3.7.
#[derive(Debug, Default, Copy, Clone)]
pub struct StandardDataDictionary;

impl DataDictionary for StandardDataDictionary {
    fn by_tag(&self, tag: Tag) -> Option<&DictionaryEntry> {
        BY_TAG.get(&tag).copied()
    }

    fn by_name(&self, name: &str) -> Option<&DictionaryEntry> {
        BY_NAME.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_lookup() {
        let dict = StandardDataDictionary;
        let entry = dict.by_tag(Tag(0x0010, 0x0010)).unwrap();
        assert_eq!(entry.alias, "PatientName");
        assert_eq!(entry.vr, VR::PN);

        let entry = dict.by_name("TransferSyntaxUID").unwrap();
        assert_eq!(entry.tag, Tag(0x0002, 0x0010));
    }

    #[test]
    fn unknown_tags_fall_back_to_un() {
        let dict = StandardDataDictionary;
        assert_eq!(dict.vr_of(Tag(0x0009, 0x1234)), VR::UN);
        assert_eq!(dict.vr_of(Tag(0x0009, 0x0000)), VR::UL);
        assert_eq!(dict.vr_of(tags::ROWS), VR::US);
    }
}
