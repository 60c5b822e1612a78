use std::collections::HashMap;

use log::{debug, warn};

use super::types::TypeId;
use super::{Error, Result};
use crate::bitcode::{Fields, Record};
use crate::schema::blocks::{AttributeCode, AttributeEncoding, AttributeGroupCode};
use crate::schema::enums::AttrKind;

/// What an attribute group applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributePosition {
    Function,
    Return,
    /// Zero-based parameter number
    Parameter(u32),
}

impl AttributePosition {
    /// Decodes the group's `paramidx` operand.
    pub fn from_raw(raw: u64) -> Result<Self> {
        match raw {
            0xFFFF_FFFF => Ok(Self::Function),
            0 => Ok(Self::Return),
            n => u32::try_from(n - 1)
                .map(Self::Parameter)
                .map_err(|_| Error::InvalidRecord("attribute group position")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    Enum(AttrKind),
    Int(AttrKind, u64),
    String {
        key: String,
        value: Option<String>,
    },
    Type(AttrKind, Option<TypeId>),
    ConstantRange {
        kind: AttrKind,
        bit_width: u32,
        lower: i64,
        upper: i64,
    },
    ConstantRangeList {
        kind: AttrKind,
        bit_width: u32,
        ranges: Vec<(i64, i64)>,
    },
    /// Well-formed but with a kind id this crate does not know.
    Unknown {
        encoding: AttributeEncoding,
        kind: u64,
    },
}

impl Attribute {
    pub fn kind(&self) -> Option<AttrKind> {
        match self {
            Self::Enum(kind)
            | Self::Int(kind, _)
            | Self::Type(kind, _)
            | Self::ConstantRange { kind, .. }
            | Self::ConstantRangeList { kind, .. } => Some(*kind),
            Self::String { .. } | Self::Unknown { .. } => None,
        }
    }

    fn read(ops: &mut Fields) -> Result<Self> {
        let encoding = u8::try_from(ops.u64()?)
            .ok()
            .and_then(|e| AttributeEncoding::try_from(e).ok())
            .ok_or(Error::InvalidRecord("attribute encoding"))?;
        if let AttributeEncoding::String | AttributeEncoding::StringWithValue = encoding {
            let key = ops.zstring();
            let value = (encoding == AttributeEncoding::StringWithValue).then(|| ops.zstring());
            return Ok(Self::String { key, value });
        }

        let raw_kind = ops.u64()?;
        let kind = u8::try_from(raw_kind)
            .ok()
            .and_then(|k| AttrKind::try_from(k).ok());
        let attribute = match encoding {
            AttributeEncoding::Enum => kind.map(Self::Enum),
            AttributeEncoding::Int => {
                let value = ops.u64()?;
                kind.map(|kind| Self::Int(kind, value))
            }
            AttributeEncoding::Type => kind.map(|kind| Self::Type(kind, None)),
            AttributeEncoding::TypeWithId => {
                let ty = TypeId(ops.u32()?);
                kind.map(|kind| Self::Type(kind, Some(ty)))
            }
            AttributeEncoding::ConstantRange => {
                let bit_width = read_bit_width(ops)?;
                let (lower, upper) = (ops.i64()?, ops.i64()?);
                kind.map(|kind| Self::ConstantRange {
                    kind,
                    bit_width,
                    lower,
                    upper,
                })
            }
            AttributeEncoding::ConstantRangeList => {
                let count = ops.u64()? as usize;
                let bit_width = read_bit_width(ops)?;
                let mut ranges = Vec::with_capacity(count.min(ops.len() / 2));
                for _ in 0..count {
                    ranges.push((ops.i64()?, ops.i64()?));
                }
                kind.map(|kind| Self::ConstantRangeList {
                    kind,
                    bit_width,
                    ranges,
                })
            }
            AttributeEncoding::String | AttributeEncoding::StringWithValue => None,
        };
        Ok(attribute.unwrap_or_else(|| {
            warn!("unknown attribute kind {raw_kind}");
            Self::Unknown {
                encoding,
                kind: raw_kind,
            }
        }))
    }
}

/// Ranges wider than 64 bits are written as multi-word values, which this
/// crate does not decode.
fn read_bit_width(ops: &mut Fields) -> Result<u32> {
    match ops.u32()? {
        width @ 1..=64 => Ok(width),
        _ => Err(Error::InvalidRecord("attribute constant range")),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeGroup {
    pub id: u64,
    pub position: AttributePosition,
    pub attributes: Vec<Attribute>,
}

/// The attributes of one function: a set of groups, each bound to a
/// position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeList {
    groups: Vec<AttributeGroup>,
}

impl AttributeList {
    pub fn groups(&self) -> &[AttributeGroup] {
        &self.groups
    }

    /// Every attribute that applies at `position`.
    pub fn at(&self, position: AttributePosition) -> impl Iterator<Item = &Attribute> {
        self.groups
            .iter()
            .filter(move |group| group.position == position)
            .flat_map(|group| group.attributes.iter())
    }

    pub fn contains(&self, position: AttributePosition, kind: AttrKind) -> bool {
        self.at(position).any(|attr| attr.kind() == Some(kind))
    }

    /// Value of a string attribute such as `"target-cpu"`.
    pub fn string(&self, position: AttributePosition, key: &str) -> Option<&str> {
        self.at(position).find_map(|attr| match attr {
            Attribute::String { key: k, value } if k == key => Some(value.as_deref().unwrap_or("")),
            _ => None,
        })
    }
}

/// Contents of the `PARAMATTR_GROUP` and `PARAMATTR` blocks.
#[derive(Debug, Clone, Default)]
pub struct AttributeTable {
    groups: HashMap<u64, AttributeGroup>,
    lists: Vec<AttributeList>,
}

impl AttributeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(&self, id: u64) -> Option<&AttributeGroup> {
        self.groups.get(&id)
    }

    pub fn lists(&self) -> &[AttributeList] {
        &self.lists
    }

    pub fn list(&self, index: usize) -> Option<&AttributeList> {
        self.lists.get(index)
    }

    /// `[grpid, paramidx, attr...]`
    pub(crate) fn parse_group_record(&mut self, record: &Record) -> Result<()> {
        if u8::try_from(record.id).ok().and_then(|c| AttributeGroupCode::try_from(c).ok()).is_none()
        {
            debug!("ignoring attribute group record {}", record.id);
            return Ok(());
        }
        let mut ops = record.operands();
        let id = ops.u64()?;
        let position = AttributePosition::from_raw(ops.u64()?)?;
        let mut attributes = Vec::new();
        while !ops.is_empty() {
            attributes.push(Attribute::read(&mut ops)?);
        }
        self.groups.insert(
            id,
            AttributeGroup {
                id,
                position,
                attributes,
            },
        );
        Ok(())
    }

    /// `[grpid...]`
    pub(crate) fn parse_list_record(&mut self, record: &Record) -> Result<()> {
        match u8::try_from(record.id).ok().and_then(|c| AttributeCode::try_from(c).ok()) {
            Some(AttributeCode::Entry) => {
                let groups = record
                    .operands()
                    .rest()
                    .into_iter()
                    .map(|id| self.groups.get(&id).cloned().ok_or(Error::UnknownAttributeGroup(id)))
                    .collect::<Result<_>>()?;
                self.lists.push(AttributeList { groups });
            }
            Some(AttributeCode::EntryOld) => {
                // Keeps list numbering intact for the functions that use it.
                warn!("obsolete parameter attribute encoding ignored");
                self.lists.push(AttributeList::default());
            }
            None => debug!("ignoring attribute record {}", record.id),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> impl Iterator<Item = u64> + '_ {
        s.bytes().map(u64::from).chain(std::iter::once(0))
    }

    #[test]
    fn group_position_must_fit_a_parameter_index() {
        assert_eq!(AttributePosition::from_raw(0).unwrap(), AttributePosition::Return);
        assert_eq!(
            AttributePosition::from_raw(0xFFFF_FFFF).unwrap(),
            AttributePosition::Function
        );
        assert_eq!(
            AttributePosition::from_raw(3).unwrap(),
            AttributePosition::Parameter(2)
        );

        let mut table = AttributeTable::new();
        let oversized = Record::new(AttributeGroupCode::Entry as u64, vec![1, u64::MAX - 1]);
        assert!(matches!(
            table.parse_group_record(&oversized),
            Err(Error::InvalidRecord(_))
        ));
        assert!(table.group(1).is_none());
    }

    #[test]
    fn group_decodes_every_encoding() {
        let mut fields = vec![1, 0xFFFF_FFFF];
        fields.extend([0, AttrKind::NoUnwind as u64]);
        fields.extend([1, AttrKind::Alignment as u64, 16]);
        fields.push(4);
        fields.extend(chars("target-cpu"));
        fields.extend(chars("generic"));
        fields.extend([6, AttrKind::ByVal as u64, 3]);
        fields.extend([7, AttrKind::Range as u64, 8, 0, 20]);
        fields.extend([0, 250]);

        let mut table = AttributeTable::new();
        table
            .parse_group_record(&Record::new(AttributeGroupCode::Entry as u64, fields))
            .unwrap();
        let group = table.group(1).unwrap();
        assert_eq!(group.position, AttributePosition::Function);
        assert_eq!(
            group.attributes,
            vec![
                Attribute::Enum(AttrKind::NoUnwind),
                Attribute::Int(AttrKind::Alignment, 16),
                Attribute::String {
                    key: "target-cpu".into(),
                    value: Some("generic".into()),
                },
                Attribute::Type(AttrKind::ByVal, Some(TypeId(3))),
                Attribute::ConstantRange {
                    kind: AttrKind::Range,
                    bit_width: 8,
                    lower: 0,
                    upper: 10,
                },
                Attribute::Unknown {
                    encoding: AttributeEncoding::Enum,
                    kind: 250,
                },
            ]
        );
    }

    #[test]
    fn lists_are_queried_by_position() {
        let mut table = AttributeTable::new();
        let groups = [
            vec![1, 0xFFFF_FFFF, 0, AttrKind::NoInline as u64],
            vec![2, 0, 0, AttrKind::Noundef as u64],
            vec![3, 2, 0, AttrKind::NoCapture as u64],
        ];
        for fields in groups {
            table
                .parse_group_record(&Record::new(AttributeGroupCode::Entry as u64, fields))
                .unwrap();
        }
        table
            .parse_list_record(&Record::new(AttributeCode::Entry as u64, vec![1, 2, 3]))
            .unwrap();

        let list = table.list(0).unwrap();
        assert!(list.contains(AttributePosition::Function, AttrKind::NoInline));
        assert!(list.contains(AttributePosition::Return, AttrKind::Noundef));
        assert!(list.contains(AttributePosition::Parameter(1), AttrKind::NoCapture));
        assert!(!list.contains(AttributePosition::Parameter(0), AttrKind::NoCapture));
    }

    #[test]
    fn list_with_unknown_group_is_rejected() {
        let mut table = AttributeTable::new();
        let err = table
            .parse_list_record(&Record::new(AttributeCode::Entry as u64, vec![9]))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownAttributeGroup(9)));
    }
}
