//! Canonical axes and multi-source mapping resolution.
//!
//! Four sources are applied in strict priority order (explicit mapping,
//! accessors, field keys, auto-detection). Each axis is a small state machine
//! that only leaves [`AxisState::Unset`] once; later passes never overwrite it.

use std::{fmt, str::FromStr, sync::Arc};

use anyhow::{Result, anyhow};
use log::debug;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de, ser::SerializeMap};

use crate::data::RawRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Axis {
    X,
    Y,
    Color,
    Size,
    Category,
    Value,
}

impl Axis {
    pub const ALL: [Axis; 6] = [
        Axis::X,
        Axis::Y,
        Axis::Color,
        Axis::Size,
        Axis::Category,
        Axis::Value,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Color => "color",
            Axis::Size => "size",
            Axis::Category => "category",
            Axis::Value => "value",
        }
    }

    /// Exact canonical name only; no trimming, case folding or aliases.
    pub fn from_canonical(name: &str) -> Option<Axis> {
        Axis::ALL.into_iter().find(|axis| axis.as_str() == name)
    }

    fn position(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Axis {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "x" => Ok(Axis::X),
            "y" => Ok(Axis::Y),
            "color" | "colour" => Ok(Axis::Color),
            "size" => Ok(Axis::Size),
            "category" => Ok(Axis::Category),
            "value" => Ok(Axis::Value),
            other => Err(anyhow!("Unknown axis '{other}'")),
        }
    }
}

impl Serialize for Axis {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Axis {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

type AccessorFn = dyn Fn(&RawRecord) -> Result<serde_json::Value> + Send + Sync;

/// Caller-supplied value extraction. Returning `Err` or panicking both count
/// as a failed extraction for the row.
#[derive(Clone)]
pub struct Accessor(Arc<AccessorFn>);

impl Accessor {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&RawRecord) -> Result<serde_json::Value> + Send + Sync + 'static,
    {
        Accessor(Arc::new(f))
    }

    pub fn call(&self, row: &RawRecord) -> Result<serde_json::Value> {
        (self.0)(row)
    }

    pub fn ptr_eq(&self, other: &Accessor) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Accessor(<fn>)")
    }
}

#[derive(Debug, Clone, Default)]
pub enum AxisResolver {
    #[default]
    Unmapped,
    Field(String),
    Accessor(Accessor),
}

impl AxisResolver {
    pub fn field(name: impl Into<String>) -> Self {
        AxisResolver::Field(name.into())
    }

    /// Empty field names count as "not defined" by a mapping source.
    pub fn is_defined(&self) -> bool {
        match self {
            AxisResolver::Unmapped => false,
            AxisResolver::Field(name) => !name.is_empty(),
            AxisResolver::Accessor(_) => true,
        }
    }

    pub fn field_name(&self) -> Option<&str> {
        match self {
            AxisResolver::Field(name) if !name.is_empty() => Some(name),
            _ => None,
        }
    }
}

impl PartialEq for AxisResolver {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AxisResolver::Unmapped, AxisResolver::Unmapped) => true,
            (AxisResolver::Field(a), AxisResolver::Field(b)) => a == b,
            (AxisResolver::Accessor(a), AxisResolver::Accessor(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Serialize for AxisResolver {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            AxisResolver::Unmapped => serializer.serialize_str(""),
            AxisResolver::Field(name) => serializer.serialize_str(name),
            AxisResolver::Accessor(_) => serializer.serialize_str("<accessor>"),
        }
    }
}

/// One optional entry per canonical axis.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisMap<T> {
    entries: [Option<T>; 6],
}

impl<T> Default for AxisMap<T> {
    fn default() -> Self {
        Self {
            entries: [None, None, None, None, None, None],
        }
    }
}

impl<T> AxisMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, axis: Axis, value: T) -> Self {
        self.set(axis, value);
        self
    }

    pub fn set(&mut self, axis: Axis, value: T) {
        self.entries[axis.position()] = Some(value);
    }

    pub fn get(&self, axis: Axis) -> Option<&T> {
        self.entries[axis.position()].as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(Option::is_none)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Axis, &T)> {
        Axis::ALL
            .iter()
            .filter_map(|axis| self.get(*axis).map(|value| (*axis, value)))
    }
}

impl<T: Serialize> Serialize for AxisMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (axis, value) in self.iter() {
            map.serialize_entry(axis.as_str(), value)?;
        }
        map.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for AxisMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = std::collections::BTreeMap::<Axis, T>::deserialize(deserializer)?;
        let mut map = AxisMap::new();
        for (axis, value) in raw {
            map.set(axis, value);
        }
        Ok(map)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum AxisState {
    #[default]
    Unset,
    SetByMapping,
    SetByAccessor,
    SetByKey,
    SetByAuto,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AxisSlot {
    pub resolver: AxisResolver,
    pub state: AxisState,
}

/// Fully populated six-axis mapping. Unmapped axes hold the empty resolver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalMapping {
    slots: [AxisSlot; 6],
}

impl CanonicalMapping {
    pub fn resolver(&self, axis: Axis) -> &AxisResolver {
        &self.slots[axis.position()].resolver
    }

    pub fn state(&self, axis: Axis) -> AxisState {
        self.slots[axis.position()].state
    }

    pub fn field(&self, axis: Axis) -> Option<&str> {
        self.resolver(axis).field_name()
    }

    pub fn is_set(&self, axis: Axis) -> bool {
        self.state(axis) != AxisState::Unset
    }

    pub fn iter(&self) -> impl Iterator<Item = (Axis, &AxisResolver)> {
        Axis::ALL.iter().map(|axis| (*axis, self.resolver(*axis)))
    }

    /// Writes the axis only out of `Unset`. Returns whether the write happened.
    fn assign(&mut self, axis: Axis, resolver: AxisResolver, state: AxisState) -> bool {
        let slot = &mut self.slots[axis.position()];
        if slot.state != AxisState::Unset || !resolver.is_defined() {
            return false;
        }
        slot.resolver = resolver;
        slot.state = state;
        true
    }
}

impl Serialize for CanonicalMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Axis::ALL.len()))?;
        for (axis, resolver) in self.iter() {
            map.serialize_entry(axis.as_str(), resolver)?;
        }
        map.end()
    }
}

/// Applies mapping sources in priority order. Call the passes highest
/// priority first; the order of calls is what encodes the priority.
#[derive(Debug, Default)]
pub struct MappingResolver {
    mapping: CanonicalMapping,
}

impl MappingResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_explicit(&mut self, source: &AxisMap<AxisResolver>) -> &mut Self {
        for (axis, resolver) in source.iter() {
            self.write(axis, resolver.clone(), AxisState::SetByMapping);
        }
        self
    }

    pub fn apply_accessors(&mut self, source: &AxisMap<Accessor>) -> &mut Self {
        for (axis, accessor) in source.iter() {
            self.write(
                axis,
                AxisResolver::Accessor(accessor.clone()),
                AxisState::SetByAccessor,
            );
        }
        self
    }

    pub fn apply_keys(&mut self, source: &AxisMap<String>) -> &mut Self {
        for (axis, key) in source.iter() {
            self.write(axis, AxisResolver::Field(key.clone()), AxisState::SetByKey);
        }
        self
    }

    pub fn apply_auto(&mut self, source: &AxisMap<String>) -> &mut Self {
        for (axis, field) in source.iter() {
            self.write(axis, AxisResolver::Field(field.clone()), AxisState::SetByAuto);
        }
        self
    }

    pub fn is_set(&self, axis: Axis) -> bool {
        self.mapping.is_set(axis)
    }

    pub fn finish(self) -> CanonicalMapping {
        self.mapping
    }

    fn write(&mut self, axis: Axis, resolver: AxisResolver, state: AxisState) {
        if self.mapping.assign(axis, resolver, state) {
            debug!("Axis '{axis}' resolved ({state:?})");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn explicit_mapping_wins_over_every_other_source() {
        let accessor = Accessor::new(|row| Ok(row["b"].clone()));
        let mut resolver = MappingResolver::new();
        resolver
            .apply_explicit(&AxisMap::new().with(Axis::Y, AxisResolver::field("a")))
            .apply_accessors(&AxisMap::new().with(Axis::Y, accessor))
            .apply_keys(&AxisMap::new().with(Axis::Y, "c".to_string()))
            .apply_auto(&AxisMap::new().with(Axis::Y, "d".to_string()));
        let mapping = resolver.finish();

        assert_eq!(mapping.field(Axis::Y), Some("a"));
        assert_eq!(mapping.state(Axis::Y), AxisState::SetByMapping);
    }

    #[test]
    fn lower_priority_sources_fill_untouched_axes() {
        let accessor = Accessor::new(|_| Ok(json!(1)));
        let mut resolver = MappingResolver::new();
        resolver
            .apply_explicit(&AxisMap::new().with(Axis::X, AxisResolver::field("month")))
            .apply_accessors(&AxisMap::new().with(Axis::Y, accessor))
            .apply_keys(
                &AxisMap::new()
                    .with(Axis::Y, "sales".to_string())
                    .with(Axis::Color, "region".to_string()),
            )
            .apply_auto(&AxisMap::new().with(Axis::Size, "volume".to_string()));
        let mapping = resolver.finish();

        assert_eq!(mapping.state(Axis::X), AxisState::SetByMapping);
        assert_eq!(mapping.state(Axis::Y), AxisState::SetByAccessor);
        assert_eq!(mapping.field(Axis::Color), Some("region"));
        assert_eq!(mapping.state(Axis::Size), AxisState::SetByAuto);
        assert_eq!(*mapping.resolver(Axis::Value), AxisResolver::Unmapped);
    }

    #[test]
    fn empty_field_names_do_not_claim_an_axis() {
        let mut resolver = MappingResolver::new();
        resolver
            .apply_explicit(&AxisMap::new().with(Axis::X, AxisResolver::field("")))
            .apply_keys(&AxisMap::new().with(Axis::X, "date".to_string()));
        assert_eq!(resolver.finish().field(Axis::X), Some("date"));
    }

    #[test]
    fn mapping_serializes_all_six_axes() {
        let mut resolver = MappingResolver::new();
        resolver.apply_keys(&AxisMap::new().with(Axis::Y, "sales".to_string()));
        let rendered = serde_json::to_value(resolver.finish()).unwrap();
        assert_eq!(
            rendered,
            json!({"x": "", "y": "sales", "color": "", "size": "", "category": "", "value": ""})
        );
    }

    #[test]
    fn axis_parses_case_insensitively() {
        assert_eq!("Color".parse::<Axis>().unwrap(), Axis::Color);
        assert!("z".parse::<Axis>().is_err());
    }

    #[test]
    fn canonical_names_match_exactly() {
        assert_eq!(Axis::from_canonical("size"), Some(Axis::Size));
        for name in ["Size", "COLOR", "colour", " y", "X"] {
            assert_eq!(Axis::from_canonical(name), None, "{name}");
        }
    }
}
