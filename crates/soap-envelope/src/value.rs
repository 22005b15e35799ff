//! Value model: named, typed arguments grouped into ordered lists.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::warn;
use url::Url;

use crate::marshal;

/// SOAP encoding style of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Use {
    /// No type annotations; the receiver relies on an external schema.
    #[default]
    Literal,
    /// Every element carries `xsi:type` (and `xsi:arrayType` for arrays).
    Encoded,
}

/// Qualified XML Schema type reference (namespace + local name).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedType {
    pub namespace: String,
    pub name: String,
}

impl QualifiedType {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

/// Typed payload of a [`Value`].
///
/// The set is closed: every kind the marshaler knows has a variant, and
/// anything else travels as [`Payload::Opaque`] with a pre-rendered string.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    String(String),
    Char(char),
    Url(Url),
    Bytes(Vec<u8>),
    Int(i32),
    Long(i64),
    UInt(u32),
    ULong(u64),
    Bool(bool),
    Float(f32),
    Double(f64),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(DateTime<Utc>),
    List(ValueList),
    /// Application kind outside the marshaler's enumeration.
    Opaque {
        /// Kind name, reported in diagnostics.
        kind: String,
        /// Generic string conversion sent as element content.
        text: String,
    },
}

impl Payload {
    /// Short kind name used in log fields.
    pub fn kind(&self) -> &str {
        match self {
            Payload::String(_) => "string",
            Payload::Char(_) => "char",
            Payload::Url(_) => "url",
            Payload::Bytes(_) => "bytes",
            Payload::Int(_) => "int",
            Payload::Long(_) => "long",
            Payload::UInt(_) => "uint",
            Payload::ULong(_) => "ulong",
            Payload::Bool(_) => "bool",
            Payload::Float(_) => "float",
            Payload::Double(_) => "double",
            Payload::Date(_) => "date",
            Payload::Time(_) => "time",
            Payload::DateTime(_) => "datetime",
            Payload::List(_) => "list",
            Payload::Opaque { kind, .. } => kind,
        }
    }

    pub fn as_list(&self) -> Option<&ValueList> {
        match self {
            Payload::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Payload::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view across all integer widths, when the value fits in i64.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Payload::Int(v) => Some(i64::from(v)),
            Payload::Long(v) => Some(v),
            Payload::UInt(v) => Some(i64::from(v)),
            Payload::ULong(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Text as it would appear on the wire.
    pub fn to_text(&self) -> String {
        marshal::text_value(self)
    }
}

macro_rules! payload_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Payload {
                fn from(v: $ty) -> Self {
                    Payload::$variant(v)
                }
            }
        )*
    };
}

payload_from! {
    String => String,
    char => Char,
    Url => Url,
    Vec<u8> => Bytes,
    i32 => Int,
    i64 => Long,
    u32 => UInt,
    u64 => ULong,
    bool => Bool,
    f32 => Float,
    f64 => Double,
    NaiveDate => Date,
    NaiveTime => Time,
    DateTime<Utc> => DateTime,
    ValueList => List,
}

impl From<&str> for Payload {
    fn from(v: &str) -> Self {
        Payload::String(v.to_string())
    }
}

impl From<&[u8]> for Payload {
    fn from(v: &[u8]) -> Self {
        Payload::Bytes(v.to_vec())
    }
}

/// A named argument or struct field.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    name: String,
    namespace: Option<String>,
    payload: Payload,
}

impl Value {
    /// Create a value.
    ///
    /// An empty name is kept as given; the envelope builder writes such a
    /// value under [`crate::envelope::UNNAMED_ELEMENT`].
    pub fn new(name: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            payload: payload.into(),
        }
    }

    /// Qualify the element with an explicit namespace.
    ///
    /// Without one the element inherits the message namespace. An empty
    /// namespace writes an unqualified element.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }
}

/// Ordered list of values, optionally typed as a struct or an array.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueList {
    values: Vec<Value>,
    type_name: Option<QualifiedType>,
    array_type: Option<QualifiedType>,
}

impl ValueList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the struct type emitted as `xsi:type` under encoded use.
    pub fn with_type(mut self, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        self.type_name = Some(QualifiedType::new(namespace, name));
        self
    }

    /// Declare array metadata emitted as `xsi:arrayType="ns:type[len]"`.
    pub fn with_array_type(
        mut self,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        self.array_type = Some(QualifiedType::new(namespace, name));
        self
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    /// Append a named value and return `self` for chaining.
    pub fn with(mut self, name: impl Into<String>, payload: impl Into<Payload>) -> Self {
        self.values.push(Value::new(name, payload));
        self
    }

    pub fn type_name(&self) -> Option<&QualifiedType> {
        self.type_name.as_ref()
    }

    pub fn array_type(&self) -> Option<&QualifiedType> {
        self.array_type.as_ref()
    }

    pub fn is_array(&self) -> bool {
        self.array_type.is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }

    /// First value with the given name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|v| v.name == name)
    }

    /// Count elements whose type does not match the declared array element
    /// type. Mismatches are logged and never rejected.
    pub fn check_array_elements(&self) -> usize {
        let Some(element_type) = &self.array_type else {
            return 0;
        };

        let mut mismatches = 0;
        for value in &self.values {
            let compatible = match value.payload() {
                Payload::List(list) => list
                    .type_name()
                    .map_or(true, |t| t.name == element_type.name),
                payload => match marshal::xml_type(payload) {
                    Some(xml_type) => xml_type
                        .rsplit(':')
                        .next()
                        .is_some_and(|local| local == element_type.name),
                    None => false,
                },
            };
            if !compatible {
                mismatches += 1;
                warn!(
                    element = value.name(),
                    kind = value.payload().kind(),
                    declared = %element_type.name,
                    "Array element does not match declared element type"
                );
            }
        }
        mismatches
    }
}

impl<'a> IntoIterator for &'a ValueList {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl IntoIterator for ValueList {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl FromIterator<Value> for ValueList {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
            ..Self::default()
        }
    }
}

/// Top-level SOAP message: the call arguments plus their encoding style.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    arguments: ValueList,
    use_style: Use,
}

impl Message {
    pub fn new(use_style: Use) -> Self {
        Self {
            arguments: ValueList::new(),
            use_style,
        }
    }

    pub fn literal() -> Self {
        Self::new(Use::Literal)
    }

    pub fn encoded() -> Self {
        Self::new(Use::Encoded)
    }

    pub fn from_arguments(arguments: ValueList, use_style: Use) -> Self {
        Self {
            arguments,
            use_style,
        }
    }

    pub fn add_argument(&mut self, name: impl Into<String>, payload: impl Into<Payload>) {
        self.arguments.push(Value::new(name, payload));
    }

    /// Chaining form of [`Message::add_argument`].
    pub fn with_argument(mut self, name: impl Into<String>, payload: impl Into<Payload>) -> Self {
        self.add_argument(name, payload);
        self
    }

    pub fn push(&mut self, value: Value) {
        self.arguments.push(value);
    }

    pub fn arguments(&self) -> &ValueList {
        &self.arguments
    }

    pub fn use_style(&self) -> Use {
        self.use_style
    }

    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name)
    }

    /// Payload of the first argument; single-result replies carry one.
    pub fn first_payload(&self) -> Option<&Payload> {
        self.arguments.iter().next().map(Value::payload)
    }
}
