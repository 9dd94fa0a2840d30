//! In-memory DICOM data sets and data elements.
use std::borrow::Cow;
use std::collections::btree_map;
use std::collections::BTreeMap;

use snafu::{OptionExt, ResultExt, Snafu};

use medicom_core::dictionary::tags;
use medicom_core::header::{DataElementHeader, Header, Length, Tag, VR};
use medicom_core::value::{
    ConvertValueError, DicomDate, DicomTime, PersonName, PrimitiveValue, Value, C,
};
use medicom_encoding::text::SpecificCharacterSet;

/// An error accessing an element of a data set.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum AccessError {
    /// The data set has no element with the requested tag.
    #[snafu(display("no such data element {}", tag))]
    NoSuchElement { tag: Tag },

    /// The element exists but its value could not be converted
    /// to the requested type.
    #[snafu(display("could not convert value of {}", tag))]
    ConvertValue {
        tag: Tag,
        source: ConvertValueError,
    },

    /// The element exists but does not hold a primitive value.
    #[snafu(display("element {} is not a primitive value", tag))]
    NotPrimitive { tag: Tag },
}

pub type Result<T, E = AccessError> = std::result::Result<T, E>;

/// An owned DICOM data element: a header and a value,
/// where sequence items are nested [`DataSet`]s.
///
/// Equality compares the tag, the VR and the value;
/// the declared length does not participate.
#[derive(Debug, Clone)]
pub struct DataElement {
    header: DataElementHeader,
    value: Value<DataSet>,
}

impl PartialEq for DataElement {
    fn eq(&self, other: &Self) -> bool {
        self.header.tag == other.header.tag
            && self.header.vr == other.header.vr
            && self.value == other.value
    }
}

impl DataElement {
    /// Create a data element from the given parts.
    ///
    /// The header length is set to undefined for sequences
    /// and left for the writer to compute otherwise.
    pub fn new(tag: Tag, vr: VR, value: impl Into<Value<DataSet>>) -> Self {
        let value = value.into();
        let len = match &value {
            Value::Primitive(_) => Length(0),
            Value::Sequence { length, .. } => *length,
            Value::PixelSequence { .. } => Length::UNDEFINED,
        };
        DataElement {
            header: DataElementHeader::new(tag, vr, len),
            value,
        }
    }

    /// Create a data element with an already formed header.
    pub fn from_parts(header: DataElementHeader, value: Value<DataSet>) -> Self {
        DataElement { header, value }
    }

    /// Create an empty data element.
    pub fn empty(tag: Tag, vr: VR) -> Self {
        DataElement::new(tag, vr, PrimitiveValue::Empty)
    }

    /// Retrieve the element header.
    pub fn header(&self) -> &DataElementHeader {
        &self.header
    }

    /// Retrieve the value representation.
    pub fn vr(&self) -> VR {
        self.header.vr
    }

    /// Retrieve the value.
    pub fn value(&self) -> &Value<DataSet> {
        &self.value
    }

    /// Retrieve the primitive value, when the element holds one.
    pub fn primitive(&self) -> Result<&PrimitiveValue> {
        self.value.primitive().context(NotPrimitiveSnafu {
            tag: self.header.tag,
        })
    }

    /// Read the value as a single string.
    pub fn to_str(&self) -> Result<Cow<'_, str>> {
        Ok(self.primitive()?.to_clean_str())
    }

    /// Read the value as a signed 32-bit integer.
    pub fn to_int(&self) -> Result<i32> {
        self.primitive()?.to_int().context(ConvertValueSnafu {
            tag: self.header.tag,
        })
    }

    /// Read the value as a double-precision float.
    pub fn to_float64(&self) -> Result<f64> {
        self.primitive()?.to_float64().context(ConvertValueSnafu {
            tag: self.header.tag,
        })
    }
}

impl Header for DataElement {
    fn tag(&self) -> Tag {
        self.header.tag
    }

    fn len(&self) -> Length {
        self.header.len
    }
}

/// An in-memory DICOM data set:
/// an ordered map from tags to data elements.
///
/// Iteration is always in ascending tag order,
/// as mandated for data set encoding.
///
/// Equality compares the elements tag for tag and value for value;
/// the declared item length form does not participate.
#[derive(Debug, Clone)]
pub struct DataSet {
    elements: BTreeMap<Tag, DataElement>,
    charset: SpecificCharacterSet,
    /// the declared length form when this data set is a sequence item
    length: Length,
}

impl PartialEq for DataSet {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
    }
}

impl Default for DataSet {
    fn default() -> Self {
        DataSet::new()
    }
}

impl DataSet {
    /// Create a new empty data set.
    pub fn new() -> Self {
        DataSet {
            elements: BTreeMap::new(),
            charset: SpecificCharacterSet::Default,
            length: Length::UNDEFINED,
        }
    }

    /// Create an empty data set
    /// which encodes as an item with the given length form.
    pub(crate) fn with_length(length: Length) -> Self {
        DataSet {
            elements: BTreeMap::new(),
            charset: SpecificCharacterSet::Default,
            length,
        }
    }

    /// The specific character set in effect for this data set.
    pub fn charset(&self) -> &SpecificCharacterSet {
        &self.charset
    }

    /// Set the character set in effect,
    /// used to propagate the enclosing data set's character set
    /// into sequence items.
    pub(crate) fn set_charset(&mut self, charset: SpecificCharacterSet) {
        self.charset = charset;
    }

    /// The declared length form of this data set
    /// when encoded as a sequence item.
    pub fn length(&self) -> Length {
        self.length
    }

    /// The number of data elements at this level.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the data set has no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Retrieve a data element by tag, if present.
    pub fn get(&self, tag: Tag) -> Option<&DataElement> {
        self.elements.get(&tag)
    }

    /// Retrieve a data element by tag,
    /// reporting an access error when absent.
    pub fn element(&self, tag: Tag) -> Result<&DataElement> {
        self.elements.get(&tag).context(NoSuchElementSnafu { tag })
    }

    /// Insert a data element, replacing any previous element
    /// with the same tag.
    ///
    /// Inserting a _Specific Character Set_ element
    /// also updates the character set in effect.
    pub fn put(&mut self, element: DataElement) {
        if element.tag() == tags::SPECIFIC_CHARACTER_SET {
            if let Ok(term) = element.to_str() {
                self.charset = SpecificCharacterSet::from_term(&term);
            }
        }
        self.elements.insert(element.tag(), element);
    }

    /// Insert a primitive valued element from its parts.
    pub fn put_value(&mut self, tag: Tag, vr: VR, value: impl Into<PrimitiveValue>) {
        self.put(DataElement::new(tag, vr, Value::Primitive(value.into())));
    }

    /// Remove the element with the given tag,
    /// returning it if it was present.
    pub fn remove(&mut self, tag: Tag) -> Option<DataElement> {
        self.elements.remove(&tag)
    }

    /// Whether an element with this tag is present.
    pub fn contains(&self, tag: Tag) -> bool {
        self.elements.contains_key(&tag)
    }

    /// Iterate over the data elements in ascending tag order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.elements.values(),
        }
    }

    /// Read the string value of the element with the given tag,
    /// trimmed of trailing padding.
    pub fn string(&self, tag: Tag) -> Result<Cow<'_, str>> {
        self.element(tag)?.to_str()
    }

    /// Read all string values of the element with the given tag.
    pub fn strings(&self, tag: Tag) -> Result<C<String>> {
        self.element(tag)?
            .primitive()?
            .strings()
            .context(ConvertValueSnafu { tag })
    }

    /// Read the UID value of the element with the given tag,
    /// trimmed of trailing null padding.
    pub fn uid(&self, tag: Tag) -> Result<Cow<'_, str>> {
        self.string(tag)
    }

    /// Read an integer value with VR coercion.
    pub fn int(&self, tag: Tag) -> Result<i32> {
        self.element(tag)?.to_int()
    }

    /// Read an unsigned 16-bit value with VR coercion.
    pub fn uint16(&self, tag: Tag) -> Result<u16> {
        self.element(tag)?
            .primitive()?
            .to_u16()
            .context(ConvertValueSnafu { tag })
    }

    /// Read a float value with VR coercion (including DS text).
    pub fn float64(&self, tag: Tag) -> Result<f64> {
        self.element(tag)?.to_float64()
    }

    /// Read all float values with VR coercion (including DS text).
    pub fn multi_float64(&self, tag: Tag) -> Result<C<f64>> {
        self.element(tag)?
            .primitive()?
            .to_multi_float64()
            .context(ConvertValueSnafu { tag })
    }

    /// Read a date value with VR coercion.
    pub fn date(&self, tag: Tag) -> Result<DicomDate> {
        self.element(tag)?
            .primitive()?
            .to_date()
            .context(ConvertValueSnafu { tag })
    }

    /// Read a time value with VR coercion.
    pub fn time(&self, tag: Tag) -> Result<DicomTime> {
        self.element(tag)?
            .primitive()?
            .to_time()
            .context(ConvertValueSnafu { tag })
    }

    /// Read a person name value.
    pub fn person_name(&self, tag: Tag) -> Result<PersonName> {
        self.element(tag)?
            .primitive()?
            .to_person_name()
            .context(ConvertValueSnafu { tag })
    }
}

/// An iterator over the data elements of a data set,
/// in ascending tag order.
pub struct Iter<'a> {
    inner: btree_map::Values<'a, Tag, DataElement>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a DataElement;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl<'a> IntoIterator for &'a DataSet {
    type Item = &'a DataElement;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<DataElement> for DataSet {
    fn from_iter<T: IntoIterator<Item = DataElement>>(iter: T) -> Self {
        let mut ds = DataSet::new();
        for element in iter {
            ds.put(element);
        }
        ds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elements_iterate_in_tag_order() {
        let mut ds = DataSet::new();
        ds.put_value(tags::PATIENT_NAME, VR::PN, "Doe^John");
        ds.put_value(tags::SOP_INSTANCE_UID, VR::UI, "1.2.3.4");
        ds.put_value(tags::MODALITY, VR::CS, "CT");

        let order: Vec<Tag> = ds.iter().map(|e| e.tag()).collect();
        assert_eq!(
            order,
            vec![tags::SOP_INSTANCE_UID, tags::MODALITY, tags::PATIENT_NAME]
        );
    }

    #[test]
    fn typed_getters_apply_coercion() {
        let mut ds = DataSet::new();
        ds.put_value(tags::ROWS, VR::US, 512_u16);
        ds.put_value(tags::WINDOW_CENTER, VR::DS, "40.0");
        ds.put_value(tags::SERIES_NUMBER, VR::IS, "3");

        assert_eq!(ds.uint16(tags::ROWS).unwrap(), 512);
        assert_eq!(ds.float64(tags::WINDOW_CENTER).unwrap(), 40.0);
        assert_eq!(ds.int(tags::SERIES_NUMBER).unwrap(), 3);
        assert!(matches!(
            ds.string(tags::PATIENT_NAME),
            Err(AccessError::NoSuchElement { .. })
        ));
    }

    #[test]
    fn specific_character_set_is_tracked() {
        let mut ds = DataSet::new();
        ds.put_value(tags::SPECIFIC_CHARACTER_SET, VR::CS, "ISO_IR 192");
        assert_eq!(ds.charset(), &SpecificCharacterSet::Utf8);
    }
}
