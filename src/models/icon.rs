use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use std::fmt;
use std::str::FromStr;

/// Every icon the catalog knows how to draw.
///
/// Unknown keys fail to parse instead of falling back to a default glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum IconKind {
    Tractor,
    Harvester,
    Drone,
    Planter,
    Sprayer,
    Tiller,
    Truck,
    WaterPump,
}

/// Lookup table from catalog keys to icons.
const ICON_TABLE: [(&str, IconKind); 8] = [
    ("tractor", IconKind::Tractor),
    ("harvester", IconKind::Harvester),
    ("drone", IconKind::Drone),
    ("planter", IconKind::Planter),
    ("sprayer", IconKind::Sprayer),
    ("tiller", IconKind::Tiller),
    ("truck", IconKind::Truck),
    ("water-pump", IconKind::WaterPump),
];

impl IconKind {
    pub fn all() -> impl Iterator<Item = IconKind> {
        ICON_TABLE.iter().map(|(_, kind)| *kind)
    }

    pub fn key(self) -> &'static str {
        match self {
            IconKind::Tractor => "tractor",
            IconKind::Harvester => "harvester",
            IconKind::Drone => "drone",
            IconKind::Planter => "planter",
            IconKind::Sprayer => "sprayer",
            IconKind::Tiller => "tiller",
            IconKind::Truck => "truck",
            IconKind::WaterPump => "water-pump",
        }
    }

    pub fn asset_path(self) -> String {
        format!("/static/icons/{}.svg", self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownIcon(pub String);

impl fmt::Display for UnknownIcon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown icon '{}'", self.0)
    }
}

impl FromStr for IconKind {
    type Err = UnknownIcon;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ICON_TABLE
            .iter()
            .find(|(key, _)| *key == s)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| UnknownIcon(s.to_string()))
    }
}

impl fmt::Display for IconKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct IconRef {
    pub kind: IconKind,
    pub asset: String,
}

impl From<IconKind> for IconRef {
    fn from(kind: IconKind) -> Self {
        IconRef {
            kind,
            asset: kind.asset_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_every_variant_once() {
        let kinds: Vec<IconKind> = IconKind::all().collect();
        assert_eq!(kinds.len(), ICON_TABLE.len());
        for kind in &kinds {
            assert_eq!(kinds.iter().filter(|k| *k == kind).count(), 1);
            assert_eq!(kind.key().parse::<IconKind>(), Ok(*kind));
        }
    }

    #[test]
    fn keys_match_serde_names() {
        for kind in IconKind::all() {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.key()));
        }
    }

    #[test]
    fn unknown_key_is_an_error() {
        assert_eq!(
            "tracktor".parse::<IconKind>(),
            Err(UnknownIcon("tracktor".to_string()))
        );
        assert!(serde_json::from_str::<IconKind>("\"tracktor\"").is_err());
    }

    #[test]
    fn resolves_asset_path() {
        assert_eq!(IconKind::WaterPump.asset_path(), "/static/icons/water-pump.svg");
    }
}
