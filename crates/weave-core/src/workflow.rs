//! Flat workflow document types.
//!
//! These types represent the user-authored workflow YAML: a mapping from
//! node name to a declaration naming its predecessors. The same shape is
//! produced by the canonical exporter, so a document can round-trip
//! through an as-code repository unchanged.
//!
//! Maps whose key order or key uniqueness matters (`workflow`,
//! `parameters`, `payload`, `permissions`) are decoded as ordered pair
//! lists so that duplicates are reported instead of silently overwritten.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder version tag used when a document omits one.
pub const DEFAULT_VERSION: &str = "v1.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct WorkflowDocument {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, with = "ordered_pairs")]
    #[schemars(with = "BTreeMap<String, NodeDeclaration>")]
    pub workflow: Vec<(String, NodeDeclaration)>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub metadata: IndexMap<String, String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_ordered_pairs"
    )]
    #[schemars(with = "Option<BTreeMap<String, i64>>")]
    pub permissions: Option<Vec<(String, i64)>>,
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

impl WorkflowDocument {
    /// Decode a document from YAML (JSON is a subset and decodes too).
    pub fn from_yaml(input: &str) -> crate::Result<Self> {
        Ok(serde_yaml::from_str(input)?)
    }

    /// Encode the document as YAML.
    pub fn to_yaml(&self) -> crate::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Encode the document as pretty-printed JSON.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Look up a declaration by node name.
    pub fn declaration(&self, name: &str) -> Option<&NodeDeclaration> {
        self.workflow
            .iter()
            .find(|(node, _)| node == name)
            .map(|(_, decl)| decl)
    }
}

/// One entry of the `workflow` map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NodeDeclaration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "ordered_pairs")]
    #[schemars(with = "BTreeMap<String, String>")]
    pub parameters: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "ordered_pairs")]
    #[schemars(with = "BTreeMap<String, String>")]
    pub payload: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Condition>,
}

/// Opaque gating condition.
///
/// The engine never evaluates a condition; it only carries the raw source
/// needed to re-export it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Condition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub check: Vec<ConditionCheck>,
}

impl Condition {
    pub fn script(source: impl Into<String>) -> Self {
        Self {
            script: Some(source.into()),
            check: vec![],
        }
    }

    /// A condition with neither a script nor checks is always true.
    pub fn is_empty(&self) -> bool {
        self.script.as_deref().is_none_or(|s| s.trim().is_empty()) && self.check.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConditionCheck {
    pub variable: String,
    pub operator: String,
    pub value: String,
}

/// Serde adapter: a map encoded as an ordered `Vec<(String, V)>`.
pub mod ordered_pairs {
    use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
    use serde::ser::{Serialize, Serializer};
    use std::fmt;
    use std::marker::PhantomData;

    pub fn serialize<S, V>(pairs: &[(String, V)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Serialize,
    {
        serializer.collect_map(pairs.iter().map(|(k, v)| (k, v)))
    }

    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        deserializer.deserialize_map(PairsVisitor(PhantomData))
    }

    struct PairsVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for PairsVisitor<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a mapping")
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, value)) = map.next_entry::<String, V>()? {
                pairs.push((key, value));
            }
            Ok(pairs)
        }
    }
}

/// Serde adapter: an optional map encoded as `Option<Vec<(String, V)>>`.
///
/// Presence matters: an absent block and an empty block mean different
/// things for permissions.
pub mod optional_ordered_pairs {
    use serde::de::value::MapAccessDeserializer;
    use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
    use serde::ser::{Serialize, Serializer};
    use std::fmt;
    use std::marker::PhantomData;

    pub fn serialize<S, V>(pairs: &Option<Vec<(String, V)>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Serialize,
    {
        match pairs {
            Some(pairs) => super::ordered_pairs::serialize(pairs, serializer),
            None => serializer.serialize_none(),
        }
    }

    /// A null block (`permissions:` with no value) decodes as absent.
    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<Option<Vec<(String, V)>>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        deserializer.deserialize_option(OptionalPairsVisitor(PhantomData))
    }

    struct OptionalPairsVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for OptionalPairsVisitor<V> {
        type Value = Option<Vec<(String, V)>>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a mapping or null")
        }

        fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
            super::ordered_pairs::deserialize(deserializer).map(Some)
        }

        fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
            super::ordered_pairs::deserialize(MapAccessDeserializer::new(map)).map(Some)
        }
    }
}
